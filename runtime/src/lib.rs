//! Program execution context for tessel kernels.
//!
//! A [`Program`] is the long-lived object behind one compilation target. It
//! owns the SNode trees holding field data, the kernels compiled against them,
//! ndarrays and textures, and the backend ([`ProgramImpl`]) that turns kernel
//! IR into something runnable.
//!
//! # Backends
//!
//! Backends are looked up in [`BACKENDS`] by architecture. The host backend
//! ([`CpuProgramImpl`]) stores fields in host memory and interprets kernel IR.
//!
//! # Constant folding
//!
//! [`Program::evaluate_unary`] and [`Program::evaluate_binary`] fold scalar
//! operators by running tiny kernels from the [`JitEvaluatorCache`], so folded
//! results match what the backend computes at run time.

pub mod aot;
pub mod backends;
pub mod config;
pub mod error;
pub mod function;
pub mod jit_evaluator;
pub mod kernel;
pub mod ndarray;
pub mod profiler;
pub mod program;
pub mod program_impl;
pub mod result_buffer;
pub mod snode_tree;
pub mod texture;


pub use aot::{AotModuleBuilder, AotModuleMetadata, CpuAotModuleBuilder};
pub use backends::{BACKENDS, BackendFactory, BackendRegistry, CpuProgramImpl};
pub use config::{CompileConfig, ConfigOverlay};
pub use error::*;
pub use function::{Function, FunctionKey};
pub use jit_evaluator::{JitEvaluatorCache, JitEvaluatorId};
pub use kernel::{AutodiffMode, FunctionType, Kernel, KernelBuilder};
pub use ndarray::{Ndarray, NdarrayId, NdarrayLayout};
pub use profiler::{HostKernelProfiler, KernelProfileStats, KernelProfiler};
pub use program::Program;
pub use program_impl::{ProgramImpl, RuntimeContext};
pub use result_buffer::{MAX_RESULT_SLOTS, ResultBuffer, ResultValue};
pub use snode_tree::{SNodeTree, SNodeTreeRegistry};
pub use texture::{Texture, TextureId};
