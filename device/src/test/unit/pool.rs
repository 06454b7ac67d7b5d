use std::sync::Arc;

use crate::cpu::CpuDevice;
use crate::device::{AllocParams, Device};
use crate::error::Error;
use crate::pool::{MemoryPool, PoolStats};

fn pool() -> (Arc<CpuDevice>, MemoryPool) {
    let device = Arc::new(CpuDevice::new());
    let pool = MemoryPool::new(device.clone());
    (device, pool)
}

#[test]
fn test_release_then_reuse() {
    let (_, pool) = pool();
    let a = pool.allocate(&AllocParams::new(64)).unwrap();
    pool.release(a).unwrap();
    let b = pool.allocate(&AllocParams::new(64)).unwrap();

    assert_eq!(a, b);
    assert_eq!(pool.stats(), PoolStats { fresh: 1, reused: 1, cached: 0 });
}

#[test]
fn test_sizes_do_not_mix() {
    let (_, pool) = pool();
    let a = pool.allocate(&AllocParams::new(64)).unwrap();
    pool.release(a).unwrap();
    let b = pool.allocate(&AllocParams::new(32)).unwrap();
    assert_ne!(a.id, b.id);
}

#[test]
fn test_reuse_honors_zero_init() {
    let (device, pool) = pool();
    let a = pool.allocate(&AllocParams::new(8)).unwrap();
    device.fill_u32(&a, u32::MAX).unwrap();
    pool.release(a).unwrap();

    let b = pool.allocate(&AllocParams::zeroed(8)).unwrap();
    let mut out = [0xff; 8];
    device.read(b.ptr(0), &mut out).unwrap();
    assert_eq!(out, [0; 8]);
}

#[test]
fn test_capacity_limits_cache() {
    let device = Arc::new(CpuDevice::new());
    let pool = MemoryPool::with_capacity(device.clone(), 1);
    let a = pool.allocate(&AllocParams::new(16)).unwrap();
    let b = pool.allocate(&AllocParams::new(16)).unwrap();
    pool.release(a).unwrap();
    pool.release(b).unwrap();

    assert_eq!(pool.stats().cached, 1);
    assert_eq!(device.allocated_bytes(), 16);
}

#[test]
fn test_terminate_returns_memory() {
    let (device, pool) = pool();
    let a = pool.allocate(&AllocParams::new(128)).unwrap();
    pool.release(a).unwrap();
    pool.terminate().unwrap();

    assert_eq!(device.allocated_bytes(), 0);
    assert!(pool.is_terminated());
    assert_eq!(pool.allocate(&AllocParams::new(8)).unwrap_err(), Error::PoolTerminated);
}

#[test]
fn test_oom_drains_cache_and_retries() {
    let device = Arc::new(CpuDevice::with_limit(64));
    let pool = MemoryPool::new(device.clone());
    let a = pool.allocate(&AllocParams::new(48)).unwrap();
    pool.release(a).unwrap();

    let b = pool.allocate(&AllocParams::new(32)).unwrap();
    assert_eq!(b.size, 32);
    assert_eq!(device.allocated_bytes(), 32);
}
