//! Fixed-size channel carrying scalar kernel return values back to the host.

use std::sync::atomic::{AtomicU64, Ordering};

/// Number of 64-bit result slots.
pub const MAX_RESULT_SLOTS: usize = 32;

/// Result slots filled by kernel `Return` statements.
///
/// Every slot holds the bit pattern produced by `ConstValue::to_bits`, so
/// integers and floats survive the trip exactly.
#[derive(Debug)]
pub struct ResultBuffer {
    slots: [AtomicU64; MAX_RESULT_SLOTS],
}

impl Default for ResultBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl ResultBuffer {
    pub fn new() -> Self {
        Self { slots: std::array::from_fn(|_| AtomicU64::new(0)) }
    }

    /// # Panics
    ///
    /// Panics if `index >= MAX_RESULT_SLOTS`.
    pub fn load(&self, index: usize) -> u64 {
        assert!(index < MAX_RESULT_SLOTS, "result slot {index} out of range");
        self.slots[index].load(Ordering::Acquire)
    }

    /// # Panics
    ///
    /// Panics if `index >= MAX_RESULT_SLOTS`.
    pub fn store(&self, index: usize, bits: u64) {
        assert!(index < MAX_RESULT_SLOTS, "result slot {index} out of range");
        self.slots[index].store(bits, Ordering::Release);
    }

    pub fn fetch<T: ResultValue>(&self, index: usize) -> T {
        T::from_result_bits(self.load(index))
    }
}

/// Host types that can be decoded from a result slot.
pub trait ResultValue: Sized {
    fn from_result_bits(bits: u64) -> Self;
}

macro_rules! impl_result_value_int {
    ($($ty:ty),*) => {
        $(impl ResultValue for $ty {
            #[inline]
            fn from_result_bits(bits: u64) -> Self {
                bits as $ty
            }
        })*
    };
}

impl_result_value_int!(i8, i16, i32, i64, u8, u16, u32, u64);

impl ResultValue for bool {
    fn from_result_bits(bits: u64) -> Self {
        bits & 1 != 0
    }
}

impl ResultValue for f32 {
    fn from_result_bits(bits: u64) -> Self {
        f32::from_bits(bits as u32)
    }
}

impl ResultValue for f64 {
    fn from_result_bits(bits: u64) -> Self {
        f64::from_bits(bits)
    }
}
