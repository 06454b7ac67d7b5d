use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use snafu::{OptionExt, ensure};

use crate::device::{AllocParams, Device, DeviceAllocation, DevicePtr, ImageParams};
use crate::error::{
    HostAllocationSnafu, InvalidAccessSnafu, OutOfMemorySnafu, Result, SizeOverflowSnafu, UnknownAllocationSnafu,
};

/// Device backed by host memory.
#[derive(Debug, Default)]
pub struct CpuDevice {
    memory: Mutex<HashMap<u64, Box<[u8]>>>,
    next_id: AtomicU64,
    limit: Option<usize>,
}

impl CpuDevice {
    pub fn new() -> Self {
        Self::default()
    }

    /// Refuse allocations once `limit` bytes are live.
    pub fn with_limit(limit: usize) -> Self {
        Self { limit: Some(limit), ..Self::default() }
    }

    fn unknown(&self, id: u64) -> crate::error::Error {
        UnknownAllocationSnafu { device: self.name(), id }.build()
    }

    fn access(&self, ptr: DevicePtr, len: usize, f: impl FnOnce(&mut [u8])) -> Result<()> {
        let mut memory = self.memory.lock();
        let data = memory.get_mut(&ptr.allocation.id).ok_or_else(|| self.unknown(ptr.allocation.id))?;
        let end = ptr.offset.checked_add(len).filter(|&end| end <= data.len());
        let Some(end) = end else {
            return InvalidAccessSnafu { offset: ptr.offset, size: len, alloc_size: data.len() }.fail();
        };
        f(&mut data[ptr.offset..end]);
        Ok(())
    }
}

impl Device for CpuDevice {
    fn allocate(&self, params: &AllocParams) -> Result<DeviceAllocation> {
        let mut memory = self.memory.lock();
        if let Some(limit) = self.limit {
            let in_use: usize = memory.values().map(|data| data.len()).sum();
            let fits = in_use.checked_add(params.size).is_some_and(|total| total <= limit);
            ensure!(fits, OutOfMemorySnafu { requested: params.size, in_use, limit });
        }

        // Host memory is always zeroed on allocation.
        let mut data = Vec::new();
        data.try_reserve_exact(params.size).ok().context(HostAllocationSnafu { requested: params.size })?;
        data.resize(params.size, 0u8);
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        memory.insert(id, data.into_boxed_slice());
        Ok(DeviceAllocation { id, size: params.size })
    }

    fn deallocate(&self, allocation: DeviceAllocation) -> Result<()> {
        match self.memory.lock().remove(&allocation.id) {
            Some(_) => Ok(()),
            None => Err(self.unknown(allocation.id)),
        }
    }

    fn read(&self, src: DevicePtr, dst: &mut [u8]) -> Result<()> {
        self.access(src, dst.len(), |data| dst.copy_from_slice(data))
    }

    fn write(&self, dst: DevicePtr, src: &[u8]) -> Result<()> {
        self.access(dst, src.len(), |data| data.copy_from_slice(src))
    }

    fn fill_u32(&self, allocation: &DeviceAllocation, value: u32) -> Result<()> {
        let pattern = value.to_le_bytes();
        self.access(allocation.ptr(0), allocation.size, |data| {
            for chunk in data.chunks_mut(4) {
                chunk.copy_from_slice(&pattern[..chunk.len()]);
            }
        })
    }

    /// Images are plain linear allocations on the host.
    fn create_image(&self, params: &ImageParams) -> Result<DeviceAllocation> {
        let size = params
            .size_in_bytes()
            .with_context(|| SizeOverflowSnafu { what: format!("{:?} image", params.shape) })?;
        self.allocate(&AllocParams::zeroed(size))
    }

    fn allocated_bytes(&self) -> usize {
        self.memory.lock().values().map(|data| data.len()).sum()
    }

    fn name(&self) -> &str {
        "CPU"
    }
}
