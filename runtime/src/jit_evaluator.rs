//! Cache of single-operator kernels used by constant folding.
//!
//! Keys carry the calling thread's id: some backends produce compiled
//! artifacts that must not cross threads, so the same operator and types are
//! compiled once per calling thread.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::thread::ThreadId;

use parking_lot::Mutex;
use tessel_dtype::DType;
use tessel_ir::{BinaryOp, ScalarOp, UnaryOp};

use crate::error::Result;
use crate::kernel::Kernel;

/// Identity of one evaluator kernel.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JitEvaluatorId {
    pub thread_id: ThreadId,
    pub op: ScalarOp,
    pub ret: DType,
    pub lhs: DType,
    pub rhs: DType,
    /// Trace tag of the request site.
    pub tb: String,
}

impl JitEvaluatorId {
    pub fn is_binary(&self) -> bool {
        self.op.is_binary()
    }

    /// # Panics
    ///
    /// Panics if the id names a binary operator.
    pub fn unary_op(&self) -> UnaryOp {
        match self.op {
            ScalarOp::Unary(op) => op,
            ScalarOp::Binary(op) => panic!("evaluator id holds binary operator {op}, not a unary one"),
        }
    }

    /// # Panics
    ///
    /// Panics if the id names a unary operator.
    pub fn binary_op(&self) -> BinaryOp {
        match self.op {
            ScalarOp::Binary(op) => op,
            ScalarOp::Unary(op) => panic!("evaluator id holds unary operator {op}, not a binary one"),
        }
    }
}

#[derive(Debug, Default)]
pub struct JitEvaluatorCache {
    kernels: Mutex<HashMap<JitEvaluatorId, Arc<Kernel>>>,
    counter: AtomicU32,
}

impl JitEvaluatorCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached kernel for `id` or build one with `compile`.
    ///
    /// The lock is held across `compile`, so concurrent misses on the same id
    /// compile once. `compile` receives a fresh unique kernel name.
    pub fn get_or_compile<F>(&self, id: JitEvaluatorId, compile: F) -> Result<Arc<Kernel>>
    where
        F: FnOnce(&JitEvaluatorId, String) -> Result<Kernel>,
    {
        let mut kernels = self.kernels.lock();
        if let Some(kernel) = kernels.get(&id) {
            return Ok(Arc::clone(kernel));
        }

        let name = format!("jit_evaluator_{}", self.counter.fetch_add(1, Ordering::Relaxed));
        tracing::debug!(
            kernel.name = %name,
            op = %id.op,
            ret = %id.ret,
            lhs = %id.lhs,
            rhs = %id.rhs,
            "evaluator cache miss"
        );
        let kernel = Arc::new(compile(&id, name)?);
        kernels.insert(id, Arc::clone(&kernel));
        Ok(kernel)
    }

    pub fn len(&self) -> usize {
        self.kernels.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.kernels.lock().is_empty()
    }

    pub(crate) fn clear(&self) {
        self.kernels.lock().clear();
    }
}
