//! Kernels and the builder used to populate their bodies.

use std::ops::{Deref, DerefMut};
use std::sync::{Arc, OnceLock};

use tessel_dtype::DType;
use tessel_ir::{Block, IrBuilder, Stmt, StmtId};

use crate::error::Result;
use crate::program_impl::RuntimeContext;

/// Executable produced by a backend for one kernel.
pub type FunctionType = Arc<dyn Fn(&RuntimeContext<'_>) -> Result<()> + Send + Sync>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum AutodiffMode {
    #[default]
    None,
    Forward,
    Reverse,
    CheckAutodiffValid,
}

/// Builds a kernel body together with its argument and return signature.
#[derive(Debug, Default)]
pub struct KernelBuilder {
    ir: IrBuilder,
    args: Vec<DType>,
    rets: Vec<DType>,
}

impl KernelBuilder {
    /// Declare the next argument and read it.
    pub fn arg(&mut self, dtype: DType) -> StmtId {
        let index = self.args.len();
        self.args.push(dtype);
        self.ir.arg(index, dtype)
    }

    /// Declare the next return slot, typed after `value`, and write `value` into it.
    pub fn ret(&mut self, value: StmtId) -> StmtId {
        let index = self.rets.len();
        self.rets.push(self.ir.block().get(value).map_or(DType::Void, Stmt::dtype));
        self.ir.ret(index, value)
    }

    pub(crate) fn finish(self) -> (Block, Vec<DType>, Vec<DType>) {
        (self.ir.finish(), self.args, self.rets)
    }
}

impl Deref for KernelBuilder {
    type Target = IrBuilder;

    fn deref(&self) -> &IrBuilder {
        &self.ir
    }
}

impl DerefMut for KernelBuilder {
    fn deref_mut(&mut self) -> &mut IrBuilder {
        &mut self.ir
    }
}

/// A unit of work owned by exactly one program.
pub struct Kernel {
    id: u64,
    name: String,
    ir: Block,
    args: Vec<DType>,
    rets: Vec<DType>,
    autodiff_mode: AutodiffMode,
    is_evaluator: bool,
    compiled: OnceLock<FunctionType>,
}

impl std::fmt::Debug for Kernel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Kernel")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("args", &self.args)
            .field("rets", &self.rets)
            .field("autodiff_mode", &self.autodiff_mode)
            .field("is_evaluator", &self.is_evaluator)
            .field("compiled", &self.is_compiled())
            .finish()
    }
}

impl Kernel {
    pub(crate) fn new(
        id: u64,
        name: impl Into<String>,
        body: impl FnOnce(&mut KernelBuilder),
        autodiff_mode: AutodiffMode,
    ) -> Self {
        let mut builder = KernelBuilder::default();
        body(&mut builder);
        let (ir, args, rets) = builder.finish();
        Self {
            id,
            name: name.into(),
            ir,
            args,
            rets,
            autodiff_mode,
            is_evaluator: false,
            compiled: OnceLock::new(),
        }
    }

    pub(crate) fn evaluator(mut self) -> Self {
        self.is_evaluator = true;
        self
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ir(&self) -> &Block {
        &self.ir
    }

    pub fn args(&self) -> &[DType] {
        &self.args
    }

    pub fn rets(&self) -> &[DType] {
        &self.rets
    }

    pub fn autodiff_mode(&self) -> AutodiffMode {
        self.autodiff_mode
    }

    /// Synthesized by the JIT evaluator cache.
    pub fn is_evaluator(&self) -> bool {
        self.is_evaluator
    }

    pub fn is_compiled(&self) -> bool {
        self.compiled.get().is_some()
    }

    pub fn compiled(&self) -> Option<&FunctionType> {
        self.compiled.get()
    }

    /// Cache `function`, keeping the first one if another thread won the race.
    pub(crate) fn set_compiled(&self, function: FunctionType) -> FunctionType {
        self.compiled.get_or_init(|| function).clone()
    }
}
