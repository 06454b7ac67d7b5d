use tessel_dtype::DType;
use test_case::test_case;

use crate::cpu::CpuDevice;
use crate::device::{AllocParams, Device, ImageParams};
use crate::error::Error;

#[test]
fn test_allocation_is_zeroed() {
    let device = CpuDevice::new();
    let alloc = device.allocate(&AllocParams::new(16)).unwrap();
    let mut out = [0xaa; 16];
    device.read(alloc.ptr(0), &mut out).unwrap();
    assert_eq!(out, [0; 16]);
    assert_eq!(device.allocated_bytes(), 16);
}

#[test]
fn test_write_then_read() {
    let device = CpuDevice::new();
    let alloc = device.allocate(&AllocParams::new(8)).unwrap();
    device.write(alloc.ptr(4), &42u32.to_le_bytes()).unwrap();

    let mut out = [0; 4];
    device.read(alloc.ptr(4), &mut out).unwrap();
    assert_eq!(u32::from_le_bytes(out), 42);
}

#[test]
fn test_out_of_bounds_access() {
    let device = CpuDevice::new();
    let alloc = device.allocate(&AllocParams::new(8)).unwrap();
    let err = device.write(alloc.ptr(6), &[0; 4]).unwrap_err();
    assert_eq!(err, Error::InvalidAccess { offset: 6, size: 4, alloc_size: 8 });
}

#[test]
fn test_fill_u32_with_tail() {
    let device = CpuDevice::new();
    let alloc = device.allocate(&AllocParams::new(6)).unwrap();
    device.fill_u32(&alloc, 0x0403_0201).unwrap();
    let mut out = [0; 6];
    device.read(alloc.ptr(0), &mut out).unwrap();
    assert_eq!(out, [1, 2, 3, 4, 1, 2]);
}

#[test]
fn test_double_free() {
    let device = CpuDevice::new();
    let alloc = device.allocate(&AllocParams::new(4)).unwrap();
    device.deallocate(alloc).unwrap();
    assert!(matches!(device.deallocate(alloc), Err(Error::UnknownAllocation { .. })));
    assert_eq!(device.allocated_bytes(), 0);
}

#[test]
fn test_memory_limit() {
    let device = CpuDevice::with_limit(64);
    let _a = device.allocate(&AllocParams::new(48)).unwrap();
    let err = device.allocate(&AllocParams::new(32)).unwrap_err();
    assert_eq!(err, Error::OutOfMemory { requested: 32, in_use: 48, limit: 64 });
}

#[test]
fn test_limit_check_does_not_overflow() {
    let device = CpuDevice::with_limit(64);
    let _a = device.allocate(&AllocParams::new(16)).unwrap();
    let err = device.allocate(&AllocParams::new(usize::MAX)).unwrap_err();
    assert_eq!(err, Error::OutOfMemory { requested: usize::MAX, in_use: 16, limit: 64 });
    assert_eq!(device.allocated_bytes(), 16);
}

#[test]
fn test_unreservable_allocation_is_an_error() {
    let device = CpuDevice::new();
    let err = device.allocate(&AllocParams::new(usize::MAX)).unwrap_err();
    assert_eq!(err, Error::HostAllocation { requested: usize::MAX });
    assert_eq!(device.allocated_bytes(), 0);
}

#[test]
fn test_oversized_image_is_rejected() {
    let device = CpuDevice::new();
    let shape = [usize::MAX / 2, 2].into_iter().collect();
    let params = ImageParams { dtype: DType::Float32, num_channels: 4, shape };
    assert_eq!(params.size_in_bytes(), None);
    assert!(matches!(device.create_image(&params), Err(Error::SizeOverflow { .. })));
}

#[test_case(DType::Float32, 4, &[8, 8] => 4 * 4 * 64 ; "rgba32f 2d")]
#[test_case(DType::UInt8, 1, &[16] => 16 ; "r8 1d")]
#[test_case(DType::Float64, 2, &[2, 3, 4] => 8 * 2 * 24 ; "rg64f 3d")]
fn test_image_is_linear(dtype: DType, num_channels: usize, shape: &[usize]) -> usize {
    let device = CpuDevice::new();
    let params = ImageParams { dtype, num_channels, shape: shape.iter().copied().collect() };
    device.create_image(&params).unwrap().size
}
