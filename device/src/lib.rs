//! Memory devices for tessel backends.
//!
//! [`Device`] is the seam backends allocate through; [`CpuDevice`] keeps
//! allocations in host memory and [`MemoryPool`] recycles them per program.

pub mod cpu;
pub mod device;
pub mod error;
pub mod pool;


pub use cpu::CpuDevice;
pub use device::{AllocParams, Device, DeviceAllocation, DevicePtr, ImageParams};
pub use error::{Error, Result};
pub use pool::{MemoryPool, PoolStats};
