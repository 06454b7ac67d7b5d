//! Error types for the program runtime.

use std::path::PathBuf;

use snafu::Snafu;
use tessel_dtype::Arch;
use tessel_ir::SNodeId;

use crate::ndarray::NdarrayId;

/// Result type for runtime operations.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors that can occur while compiling or running kernels.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    /// Device error occurred.
    #[snafu(display("device error: {source}"))]
    Device { source: tessel_device::Error },

    /// Kernel IR failed validation while lowering.
    #[snafu(display("invalid IR in kernel '{kernel}': {source}"))]
    InvalidIr { kernel: String, source: tessel_ir::Error },

    /// Backend rejected the kernel.
    #[snafu(display("compilation of kernel '{kernel}' failed: {reason}"))]
    Compilation { kernel: String, reason: String },

    /// No backend can serve the requested architecture.
    #[snafu(display("no backend available for {arch}"))]
    UnsupportedArch { arch: Arch },

    /// Operation is not provided by this backend.
    #[snafu(display("{backend} backend does not support {operation}"))]
    Unsupported { backend: String, operation: String },

    /// Kernel launched with the wrong number of arguments.
    #[snafu(display("kernel '{kernel}' expects {expected} arguments, got {actual}"))]
    ArgumentCount { kernel: String, expected: usize, actual: usize },

    /// Scalar operation has no defined result (e.g. integer division by zero).
    #[snafu(display("kernel '{kernel}' cannot evaluate {stmt}"))]
    Evaluation { kernel: String, stmt: String },

    /// Field access outside the field's shape.
    #[snafu(display("kernel '{kernel}' accessed {snode} at {indices:?} outside shape {shape:?}"))]
    OutOfBounds { kernel: String, snode: SNodeId, indices: Vec<i64>, shape: Vec<usize> },

    /// SNode does not belong to any materialized tree.
    #[snafu(display("{snode} is not materialized"))]
    SNodeNotMaterialized { snode: SNodeId },

    /// SNode is not a place in any live tree.
    #[snafu(display("{snode} is not a field of a live SNode tree"))]
    SNodeNotFound { snode: SNodeId },

    /// Byte size of a resource does not fit in `usize`.
    #[snafu(display("size of {what} overflows usize"))]
    SizeOverflow { what: String },

    /// Ndarray handle is unknown or already deleted.
    #[snafu(display("ndarray {id} not found"))]
    NdarrayNotFound { id: NdarrayId },

    /// Device reported a fault while running a kernel.
    #[snafu(display("runtime error: {message}"))]
    Runtime { message: String },

    #[snafu(display("failed to write {}: {source}", path.display()))]
    Io { path: PathBuf, source: std::io::Error },

    #[snafu(display("failed to serialize AOT metadata: {source}"))]
    Serialize { source: serde_json::Error },
}
