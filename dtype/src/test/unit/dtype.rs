use proptest::prelude::*;
use strum::VariantArray;

use crate::{DType, ScalarDType};

#[test]
fn test_scalar_bytes() {
    assert_eq!(ScalarDType::Bool.bytes(), 1);
    assert_eq!(ScalarDType::Int16.bytes(), 2);
    assert_eq!(DType::Int32.bytes(), 4);
    assert_eq!(DType::Float64.bytes(), 8);
    assert_eq!(DType::Void.bytes(), 0);
}

#[test]
fn test_array_bytes() {
    assert_eq!(DType::Float32.array_bytes(&[4, 4]), Some(64));
    assert_eq!(DType::Int8.array_bytes(&[]), Some(1));
    assert_eq!(DType::Int64.array_bytes(&[usize::MAX / 4, 4]), None);
    assert_eq!(DType::Void.array_bytes(&[usize::MAX, 2]), Some(0));
}

#[test]
fn test_display() {
    assert_eq!(DType::Float32.to_string(), "float32");
    assert_eq!(DType::UInt8.to_string(), "uint8");
    assert_eq!(DType::Void.to_string(), "void");
}

proptest! {
    #[test]
    fn scalar_kinds_are_exclusive(idx in 0..ScalarDType::VARIANTS.len()) {
        let s = ScalarDType::VARIANTS[idx];
        let kinds = [s.is_bool(), s.is_int(), s.is_float()];
        prop_assert_eq!(kinds.iter().filter(|k| **k).count(), 1);
        prop_assert!(!(s.is_signed() && s.is_unsigned()));
    }
}
