use snafu::Snafu;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Clone, PartialEq, Eq, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    /// Device memory limit would be exceeded.
    #[snafu(display("out of device memory: requested {requested} bytes with {in_use} of {limit} in use"))]
    OutOfMemory { requested: usize, in_use: usize, limit: usize },

    /// Host could not reserve backing memory.
    #[snafu(display("failed to reserve {requested} bytes of host memory"))]
    HostAllocation { requested: usize },

    /// Resource byte size does not fit in `usize`.
    #[snafu(display("size of {what} overflows usize"))]
    SizeOverflow { what: String },

    /// Allocation handle is not (or no longer) owned by this device.
    #[snafu(display("unknown allocation {id} on {device}"))]
    UnknownAllocation { device: String, id: u64 },

    /// Invalid access parameters.
    #[snafu(display("invalid access: offset {offset} + size {size} exceeds allocation size {alloc_size}"))]
    InvalidAccess { offset: usize, size: usize, alloc_size: usize },

    /// Operation is not provided by this device.
    #[snafu(display("{device} does not support {operation}"))]
    Unsupported { device: String, operation: &'static str },

    /// Memory pool was already terminated.
    #[snafu(display("memory pool is terminated"))]
    PoolTerminated,
}
