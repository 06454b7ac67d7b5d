//! User-defined callables deduplicated by [`FunctionKey`].

use std::hash::{Hash, Hasher};
use std::sync::OnceLock;

use tessel_ir::Block;

/// Logical identity of a function.
///
/// Two keys are equal when `func_id` and `instance_id` match; `func_name` is
/// carried for diagnostics only.
#[derive(Debug, Clone)]
pub struct FunctionKey {
    pub func_name: String,
    pub func_id: u64,
    pub instance_id: u64,
}

impl FunctionKey {
    pub fn new(func_name: impl Into<String>, func_id: u64, instance_id: u64) -> Self {
        Self { func_name: func_name.into(), func_id, instance_id }
    }
}

impl PartialEq for FunctionKey {
    fn eq(&self, other: &Self) -> bool {
        self.func_id == other.func_id && self.instance_id == other.instance_id
    }
}

impl Eq for FunctionKey {}

impl Hash for FunctionKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.func_id.hash(state);
        self.instance_id.hash(state);
    }
}

impl std::fmt::Display for FunctionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}_{}_{}", self.func_name, self.func_id, self.instance_id)
    }
}

#[derive(Debug)]
pub struct Function {
    key: FunctionKey,
    body: OnceLock<Block>,
}

impl Function {
    pub(crate) fn new(key: FunctionKey) -> Self {
        Self { key, body: OnceLock::new() }
    }

    pub fn key(&self) -> &FunctionKey {
        &self.key
    }

    /// Set the body once; returns `false` if a body was already set.
    pub fn set_body(&self, body: Block) -> bool {
        self.body.set(body).is_ok()
    }

    pub fn body(&self) -> Option<&Block> {
        self.body.get()
    }
}
