//! Device abstraction used by program backends.
//!
//! A [`Device`] hands out opaque [`DeviceAllocation`] handles and moves bytes
//! between host and device. Backends own their devices; the runtime reaches
//! them through the backend's compute/graphics accessors.

use smallvec::SmallVec;
use tessel_dtype::DType;

use crate::error::{Result, UnsupportedSnafu};

/// Opaque handle to a block of device memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceAllocation {
    pub id: u64,
    pub size: usize,
}

impl DeviceAllocation {
    pub fn ptr(&self, offset: usize) -> DevicePtr {
        DevicePtr { allocation: *self, offset }
    }
}

/// Byte position inside an allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DevicePtr {
    pub allocation: DeviceAllocation,
    pub offset: usize,
}

/// Options for memory allocation.
#[derive(Debug, Clone, Default)]
pub struct AllocParams {
    pub size: usize,
    /// The host reads this memory back.
    pub host_read: bool,
    /// The host writes this memory directly.
    pub host_write: bool,
    /// Whether to zero-initialize the allocation.
    pub zero_init: bool,
}

impl AllocParams {
    pub fn new(size: usize) -> Self {
        Self { size, ..Default::default() }
    }

    pub fn zeroed(size: usize) -> Self {
        Self { size, zero_init: true, ..Default::default() }
    }
}

/// Description of an image (texture) resource.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageParams {
    pub dtype: DType,
    pub num_channels: usize,
    pub shape: SmallVec<[usize; 3]>,
}

impl ImageParams {
    /// `None` when the image is too large to address.
    pub fn size_in_bytes(&self) -> Option<usize> {
        self.dtype.array_bytes(&self.shape)?.checked_mul(self.num_channels)
    }
}

pub trait Device: Send + Sync + std::fmt::Debug {
    fn allocate(&self, params: &AllocParams) -> Result<DeviceAllocation>;

    fn deallocate(&self, allocation: DeviceAllocation) -> Result<()>;

    /// Copy `dst.len()` bytes starting at `src` into host memory.
    fn read(&self, src: DevicePtr, dst: &mut [u8]) -> Result<()>;

    /// Copy host bytes to `dst`.
    fn write(&self, dst: DevicePtr, src: &[u8]) -> Result<()>;

    /// Fill the whole allocation with a repeated 32-bit pattern.
    fn fill_u32(&self, allocation: &DeviceAllocation, value: u32) -> Result<()>;

    fn create_image(&self, _params: &ImageParams) -> Result<DeviceAllocation> {
        UnsupportedSnafu { device: self.name(), operation: "images" }.fail()
    }

    fn synchronize(&self) -> Result<()> {
        Ok(())
    }

    /// Bytes currently held by live allocations.
    fn allocated_bytes(&self) -> usize;

    fn name(&self) -> &str;
}
