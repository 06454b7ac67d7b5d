//! Kernel IR consumed by the tessel runtime.
//!
//! Kernel bodies are flat statement lists ([`Block`]) built with [`IrBuilder`].
//! Fields live in [`SNode`] layout trees; scalar semantics of every operator are
//! defined once in [`eval`] and shared by backends and constant folding.

pub mod error;
pub mod eval;
pub mod passes;
pub mod snode;
pub mod stmt;
pub mod types;


pub use error::{Error, Result};
pub use snode::{SNode, SNodeId, SNodeKind};
pub use stmt::{Block, IrBuilder, Stmt, StmtId};
pub use types::{BinaryOp, ConstValue, ScalarOp, UnaryOp};
