//! Per-program memory pool.
//!
//! Freed allocations are kept on a per-size free list and handed out again on
//! the next request of the same size. Terminating the pool returns everything
//! it still caches to the device.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use snafu::ensure;

use crate::device::{AllocParams, Device, DeviceAllocation};
use crate::error::{PoolTerminatedSnafu, Result};

/// Counters describing pool activity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Allocations obtained from the device.
    pub fresh: usize,
    /// Allocations served from the free lists.
    pub reused: usize,
    /// Allocations currently cached for reuse.
    pub cached: usize,
}

#[derive(Debug, Default)]
struct PoolState {
    free: HashMap<usize, Vec<DeviceAllocation>>,
    stats: PoolStats,
    terminated: bool,
}

#[derive(Debug)]
pub struct MemoryPool {
    device: Arc<dyn Device>,
    state: Mutex<PoolState>,
    max_cached_per_size: usize,
}

impl MemoryPool {
    pub fn new(device: Arc<dyn Device>) -> Self {
        Self::with_capacity(device, 32)
    }

    pub fn with_capacity(device: Arc<dyn Device>, max_cached_per_size: usize) -> Self {
        Self { device, state: Mutex::new(PoolState::default()), max_cached_per_size }
    }

    pub fn device(&self) -> &Arc<dyn Device> {
        &self.device
    }

    pub fn allocate(&self, params: &AllocParams) -> Result<DeviceAllocation> {
        let reused = {
            let mut state = self.state.lock();
            ensure!(!state.terminated, PoolTerminatedSnafu);
            let hit = state.free.get_mut(&params.size).and_then(Vec::pop);
            if hit.is_some() {
                state.stats.reused += 1;
                state.stats.cached -= 1;
            }
            hit
        };

        if let Some(allocation) = reused {
            if params.zero_init {
                self.device.fill_u32(&allocation, 0)?;
            }
            tracing::trace!(
                allocation.id = allocation.id,
                allocation.size = allocation.size,
                "reused pooled allocation"
            );
            return Ok(allocation);
        }

        let allocation = match self.device.allocate(params) {
            Ok(allocation) => allocation,
            Err(e) => {
                // Give cached memory back to the device and retry once.
                self.drain()?;
                self.device.allocate(params).map_err(|_| e)?
            }
        };
        self.state.lock().stats.fresh += 1;
        Ok(allocation)
    }

    /// Return an allocation to the pool.
    pub fn release(&self, allocation: DeviceAllocation) -> Result<()> {
        {
            let mut state = self.state.lock();
            if !state.terminated {
                let bucket = state.free.entry(allocation.size).or_default();
                if bucket.len() < self.max_cached_per_size {
                    bucket.push(allocation);
                    state.stats.cached += 1;
                    return Ok(());
                }
            }
        }
        self.device.deallocate(allocation)
    }

    /// Release all cached memory and refuse further allocations.
    pub fn terminate(&self) -> Result<()> {
        self.state.lock().terminated = true;
        self.drain()
    }

    pub fn is_terminated(&self) -> bool {
        self.state.lock().terminated
    }

    pub fn stats(&self) -> PoolStats {
        self.state.lock().stats
    }

    fn drain(&self) -> Result<()> {
        let cached: Vec<_> = {
            let mut state = self.state.lock();
            state.stats.cached = 0;
            state.free.drain().flat_map(|(_, bucket)| bucket).collect()
        };
        for allocation in cached {
            self.device.deallocate(allocation)?;
        }
        Ok(())
    }
}
