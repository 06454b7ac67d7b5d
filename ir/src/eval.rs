//! Scalar evaluation of unary and binary operators.
//!
//! Used by the CPU interpreter backend for every arithmetic statement, and
//! therefore by the JIT evaluator kernels that constant folding relies on.

use tessel_dtype::{DType, ScalarDType};

use crate::types::{BinaryOp, ConstValue, UnaryOp};

/// Evaluate a unary operation on a constant value.
///
/// Returns `None` if the operation is not supported for the value's variant.
///
/// Floating point operations follow IEEE 754, integer operations wrap.
pub fn eval_unary_op(op: UnaryOp, v: ConstValue) -> Option<ConstValue> {
    match op {
        UnaryOp::Neg => eval_neg(v),
        UnaryOp::Not => eval_not(v),
        UnaryOp::Abs => eval_abs(v),
        UnaryOp::Sqrt => float_only(v, f64::sqrt),
        UnaryOp::Exp2 => float_only(v, f64::exp2),
        UnaryOp::Log2 => float_only(v, f64::log2),
        UnaryOp::Sin => float_only(v, f64::sin),
        UnaryOp::Cos => float_only(v, f64::cos),
        UnaryOp::Reciprocal => float_only(v, |x| 1.0 / x),
        UnaryOp::Trunc => float_only(v, f64::trunc),
        UnaryOp::Floor => float_only(v, f64::floor),
    }
}

/// Evaluate a binary operation on constant values of the same variant.
///
/// Returns `None` for mismatched variants, unsupported combinations and
/// integer division by zero.
pub fn eval_binary_op(op: BinaryOp, a: ConstValue, b: ConstValue) -> Option<ConstValue> {
    match op {
        BinaryOp::Add => eval_add(a, b),
        BinaryOp::Sub => eval_sub(a, b),
        BinaryOp::Mul => eval_mul(a, b),
        BinaryOp::Mod => eval_mod(a, b),
        BinaryOp::Max => eval_max(a, b),
        BinaryOp::Min => eval_min(a, b),
        BinaryOp::Pow => eval_pow(a, b),
        BinaryOp::Idiv => eval_idiv(a, b),
        BinaryOp::Fdiv => eval_fdiv(a, b),
        BinaryOp::Lt => compare(a, b, |o| o.is_lt()),
        BinaryOp::Le => compare(a, b, |o| o.is_le()),
        BinaryOp::Gt => compare(a, b, |o| o.is_gt()),
        BinaryOp::Ge => compare(a, b, |o| o.is_ge()),
        BinaryOp::Eq => eval_eq(a, b),
        BinaryOp::Ne => eval_eq(a, b).map(|v| ConstValue::Bool(v == ConstValue::Bool(false))),
        BinaryOp::And => eval_and(a, b),
        BinaryOp::Or => eval_or(a, b),
        BinaryOp::Xor => eval_xor(a, b),
        BinaryOp::Shl => eval_shl(a, b),
        BinaryOp::Shr => eval_shr(a, b),
    }
}

/// Evaluate a unary statement with declared operand and result types.
///
/// The operand is converted to `ret` before the operator applies, so `sqrt`
/// of an `i32` operand declared as `f32` computes in single precision.
pub fn eval_unary_typed(op: UnaryOp, v: ConstValue, operand: DType, ret: DType) -> Option<ConstValue> {
    let v = v.cast(&operand)?.cast(&ret)?;
    eval_unary_op(op, v)?.cast(&ret)
}

/// Evaluate a binary statement with declared operand and result types.
///
/// Comparisons compute in the common type of both operands, shifts in the
/// left operand's type and everything else in the result type.
pub fn eval_binary_typed(
    op: BinaryOp,
    a: ConstValue,
    lhs: DType,
    b: ConstValue,
    rhs: DType,
    ret: DType,
) -> Option<ConstValue> {
    let work = if op.is_comparison() {
        common_dtype(lhs, rhs)?
    } else if matches!(op, BinaryOp::Shl | BinaryOp::Shr) {
        lhs
    } else {
        ret
    };
    let a = a.cast(&lhs)?.cast(&work)?;
    let b = b.cast(&rhs)?.cast(&work)?;
    eval_binary_op(op, a, b)?.cast(&ret)
}

/// Smallest type both operands convert to without changing kind.
///
/// Floats dominate integers, wider types dominate narrower ones and unsigned
/// wins a tie in width.
pub fn common_dtype(lhs: DType, rhs: DType) -> Option<DType> {
    let (l, r) = (lhs.scalar()?, rhs.scalar()?);
    if l == r {
        return Some(lhs);
    }
    let rank = |s: ScalarDType| (s.is_float(), s.bytes(), s.is_unsigned());
    Some(if rank(l) >= rank(r) { lhs } else { rhs })
}

// ============================================================================
// Unary Operations
// ============================================================================

#[inline]
fn float_only(v: ConstValue, f: impl FnOnce(f64) -> f64) -> Option<ConstValue> {
    match v {
        ConstValue::Float(x) => Some(ConstValue::Float(f(x))),
        _ => None,
    }
}

#[inline]
fn eval_neg(v: ConstValue) -> Option<ConstValue> {
    match v {
        ConstValue::Int(x) => Some(ConstValue::Int(x.wrapping_neg())),
        ConstValue::UInt(x) => Some(ConstValue::UInt(x.wrapping_neg())),
        ConstValue::Float(x) => Some(ConstValue::Float(-x)),
        ConstValue::Bool(_) => None,
    }
}

#[inline]
fn eval_not(v: ConstValue) -> Option<ConstValue> {
    match v {
        ConstValue::Int(x) => Some(ConstValue::Int(!x)),
        ConstValue::UInt(x) => Some(ConstValue::UInt(!x)),
        ConstValue::Bool(x) => Some(ConstValue::Bool(!x)),
        ConstValue::Float(_) => None,
    }
}

#[inline]
fn eval_abs(v: ConstValue) -> Option<ConstValue> {
    match v {
        ConstValue::Int(x) => Some(ConstValue::Int(x.wrapping_abs())),
        ConstValue::UInt(x) => Some(ConstValue::UInt(x)),
        ConstValue::Float(x) => Some(ConstValue::Float(x.abs())),
        ConstValue::Bool(_) => None,
    }
}

// ============================================================================
// Binary Arithmetic Operations
// ============================================================================

#[inline]
fn eval_add(a: ConstValue, b: ConstValue) -> Option<ConstValue> {
    match (a, b) {
        (ConstValue::Int(x), ConstValue::Int(y)) => Some(ConstValue::Int(x.wrapping_add(y))),
        (ConstValue::UInt(x), ConstValue::UInt(y)) => Some(ConstValue::UInt(x.wrapping_add(y))),
        (ConstValue::Float(x), ConstValue::Float(y)) => Some(ConstValue::Float(x + y)),
        _ => None,
    }
}

#[inline]
fn eval_sub(a: ConstValue, b: ConstValue) -> Option<ConstValue> {
    match (a, b) {
        (ConstValue::Int(x), ConstValue::Int(y)) => Some(ConstValue::Int(x.wrapping_sub(y))),
        (ConstValue::UInt(x), ConstValue::UInt(y)) => Some(ConstValue::UInt(x.wrapping_sub(y))),
        (ConstValue::Float(x), ConstValue::Float(y)) => Some(ConstValue::Float(x - y)),
        _ => None,
    }
}

#[inline]
fn eval_mul(a: ConstValue, b: ConstValue) -> Option<ConstValue> {
    match (a, b) {
        (ConstValue::Int(x), ConstValue::Int(y)) => Some(ConstValue::Int(x.wrapping_mul(y))),
        (ConstValue::UInt(x), ConstValue::UInt(y)) => Some(ConstValue::UInt(x.wrapping_mul(y))),
        (ConstValue::Float(x), ConstValue::Float(y)) => Some(ConstValue::Float(x * y)),
        _ => None,
    }
}

#[inline]
fn eval_mod(a: ConstValue, b: ConstValue) -> Option<ConstValue> {
    match (a, b) {
        (ConstValue::Int(x), ConstValue::Int(y)) if y != 0 => Some(ConstValue::Int(x.wrapping_rem(y))),
        (ConstValue::UInt(x), ConstValue::UInt(y)) if y != 0 => Some(ConstValue::UInt(x % y)),
        (ConstValue::Float(x), ConstValue::Float(y)) => Some(ConstValue::Float(x % y)),
        _ => None,
    }
}

#[inline]
fn eval_max(a: ConstValue, b: ConstValue) -> Option<ConstValue> {
    match (a, b) {
        (ConstValue::Int(x), ConstValue::Int(y)) => Some(ConstValue::Int(x.max(y))),
        (ConstValue::UInt(x), ConstValue::UInt(y)) => Some(ConstValue::UInt(x.max(y))),
        (ConstValue::Float(x), ConstValue::Float(y)) => Some(ConstValue::Float(x.max(y))),
        _ => None,
    }
}

#[inline]
fn eval_min(a: ConstValue, b: ConstValue) -> Option<ConstValue> {
    match (a, b) {
        (ConstValue::Int(x), ConstValue::Int(y)) => Some(ConstValue::Int(x.min(y))),
        (ConstValue::UInt(x), ConstValue::UInt(y)) => Some(ConstValue::UInt(x.min(y))),
        (ConstValue::Float(x), ConstValue::Float(y)) => Some(ConstValue::Float(x.min(y))),
        _ => None,
    }
}

#[inline]
fn eval_pow(a: ConstValue, b: ConstValue) -> Option<ConstValue> {
    match (a, b) {
        (ConstValue::Float(x), ConstValue::Float(y)) => Some(ConstValue::Float(x.powf(y))),
        (ConstValue::Int(x), ConstValue::Int(y)) if y >= 0 => {
            Some(ConstValue::Int(x.wrapping_pow(u32::try_from(y).ok()?)))
        }
        (ConstValue::UInt(x), ConstValue::UInt(y)) => Some(ConstValue::UInt(x.wrapping_pow(u32::try_from(y).ok()?))),
        _ => None,
    }
}

#[inline]
fn eval_idiv(a: ConstValue, b: ConstValue) -> Option<ConstValue> {
    match (a, b) {
        (ConstValue::Int(x), ConstValue::Int(y)) if y != 0 => Some(ConstValue::Int(x.wrapping_div(y))),
        (ConstValue::UInt(x), ConstValue::UInt(y)) if y != 0 => Some(ConstValue::UInt(x / y)),
        (ConstValue::Float(x), ConstValue::Float(y)) => Some(ConstValue::Float((x / y).trunc())),
        _ => None,
    }
}

#[inline]
fn eval_fdiv(a: ConstValue, b: ConstValue) -> Option<ConstValue> {
    match (a, b) {
        (ConstValue::Float(x), ConstValue::Float(y)) => Some(ConstValue::Float(x / y)),
        _ => None,
    }
}

// ============================================================================
// Binary Comparison Operations
// ============================================================================

#[inline]
fn compare(a: ConstValue, b: ConstValue, pick: impl FnOnce(std::cmp::Ordering) -> bool) -> Option<ConstValue> {
    let ordering = match (a, b) {
        (ConstValue::Int(x), ConstValue::Int(y)) => x.cmp(&y),
        (ConstValue::UInt(x), ConstValue::UInt(y)) => x.cmp(&y),
        (ConstValue::Bool(x), ConstValue::Bool(y)) => x.cmp(&y),
        // NaN compares false with everything.
        (ConstValue::Float(x), ConstValue::Float(y)) => match x.partial_cmp(&y) {
            Some(ordering) => ordering,
            None => return Some(ConstValue::Bool(false)),
        },
        _ => return None,
    };
    Some(ConstValue::Bool(pick(ordering)))
}

#[inline]
fn eval_eq(a: ConstValue, b: ConstValue) -> Option<ConstValue> {
    match (a, b) {
        (ConstValue::Int(x), ConstValue::Int(y)) => Some(ConstValue::Bool(x == y)),
        (ConstValue::UInt(x), ConstValue::UInt(y)) => Some(ConstValue::Bool(x == y)),
        (ConstValue::Float(x), ConstValue::Float(y)) => Some(ConstValue::Bool(x == y)),
        (ConstValue::Bool(x), ConstValue::Bool(y)) => Some(ConstValue::Bool(x == y)),
        _ => None,
    }
}

// ============================================================================
// Binary Bitwise Operations
// ============================================================================

#[inline]
fn eval_and(a: ConstValue, b: ConstValue) -> Option<ConstValue> {
    match (a, b) {
        (ConstValue::Int(x), ConstValue::Int(y)) => Some(ConstValue::Int(x & y)),
        (ConstValue::UInt(x), ConstValue::UInt(y)) => Some(ConstValue::UInt(x & y)),
        (ConstValue::Bool(x), ConstValue::Bool(y)) => Some(ConstValue::Bool(x & y)),
        _ => None,
    }
}

#[inline]
fn eval_or(a: ConstValue, b: ConstValue) -> Option<ConstValue> {
    match (a, b) {
        (ConstValue::Int(x), ConstValue::Int(y)) => Some(ConstValue::Int(x | y)),
        (ConstValue::UInt(x), ConstValue::UInt(y)) => Some(ConstValue::UInt(x | y)),
        (ConstValue::Bool(x), ConstValue::Bool(y)) => Some(ConstValue::Bool(x | y)),
        _ => None,
    }
}

#[inline]
fn eval_xor(a: ConstValue, b: ConstValue) -> Option<ConstValue> {
    match (a, b) {
        (ConstValue::Int(x), ConstValue::Int(y)) => Some(ConstValue::Int(x ^ y)),
        (ConstValue::UInt(x), ConstValue::UInt(y)) => Some(ConstValue::UInt(x ^ y)),
        (ConstValue::Bool(x), ConstValue::Bool(y)) => Some(ConstValue::Bool(x ^ y)),
        _ => None,
    }
}

#[inline]
fn eval_shl(a: ConstValue, b: ConstValue) -> Option<ConstValue> {
    match (a, b) {
        (ConstValue::Int(x), ConstValue::Int(y)) if (0..64).contains(&y) => {
            Some(ConstValue::Int(x.wrapping_shl(y as u32)))
        }
        (ConstValue::UInt(x), ConstValue::UInt(y)) if y < 64 => Some(ConstValue::UInt(x.wrapping_shl(y as u32))),
        _ => None,
    }
}

#[inline]
fn eval_shr(a: ConstValue, b: ConstValue) -> Option<ConstValue> {
    match (a, b) {
        (ConstValue::Int(x), ConstValue::Int(y)) if (0..64).contains(&y) => {
            Some(ConstValue::Int(x.wrapping_shr(y as u32)))
        }
        (ConstValue::UInt(x), ConstValue::UInt(y)) if y < 64 => Some(ConstValue::UInt(x.wrapping_shr(y as u32))),
        _ => None,
    }
}
