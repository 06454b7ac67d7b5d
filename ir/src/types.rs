//! Constant values and scalar operator kinds.

use tessel_dtype::{DType, ScalarDType};

/// Constant value flowing through the kernel interpreter and evaluators.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConstValue {
    Int(i64),
    UInt(u64),
    Float(f64),
    Bool(bool),
}

/// Cast to target width and back to storage type (for proper truncation/extension).
macro_rules! cast_via {
    ($v:expr, $target:ty, $storage:ty) => {
        ($v as $target) as $storage
    };
}

#[inline]
fn cast_bool(v: bool, to: ScalarDType) -> ConstValue {
    use ScalarDType::*;
    match to {
        Bool => ConstValue::Bool(v),
        Int8 | Int16 | Int32 | Int64 => ConstValue::Int(v as i64),
        UInt8 | UInt16 | UInt32 | UInt64 => ConstValue::UInt(v as u64),
        Float32 | Float64 => ConstValue::Float(v as u8 as f64),
    }
}

#[inline]
fn cast_int(v: i64, to: ScalarDType) -> ConstValue {
    use ScalarDType::*;
    match to {
        Bool => ConstValue::Bool(v != 0),
        Int8 => ConstValue::Int(cast_via!(v, i8, i64)),
        Int16 => ConstValue::Int(cast_via!(v, i16, i64)),
        Int32 => ConstValue::Int(cast_via!(v, i32, i64)),
        Int64 => ConstValue::Int(v),
        UInt8 => ConstValue::UInt(cast_via!(v, u8, u64)),
        UInt16 => ConstValue::UInt(cast_via!(v, u16, u64)),
        UInt32 => ConstValue::UInt(cast_via!(v, u32, u64)),
        UInt64 => ConstValue::UInt(v as u64),
        Float32 => ConstValue::Float(cast_via!(v, f32, f64)),
        Float64 => ConstValue::Float(v as f64),
    }
}

#[inline]
fn cast_uint(v: u64, to: ScalarDType) -> ConstValue {
    use ScalarDType::*;
    match to {
        Bool => ConstValue::Bool(v != 0),
        Int8 => ConstValue::Int(cast_via!(v, i8, i64)),
        Int16 => ConstValue::Int(cast_via!(v, i16, i64)),
        Int32 => ConstValue::Int(cast_via!(v, i32, i64)),
        Int64 => ConstValue::Int(v as i64),
        UInt8 => ConstValue::UInt(cast_via!(v, u8, u64)),
        UInt16 => ConstValue::UInt(cast_via!(v, u16, u64)),
        UInt32 => ConstValue::UInt(cast_via!(v, u32, u64)),
        UInt64 => ConstValue::UInt(v),
        Float32 => ConstValue::Float(cast_via!(v, f32, f64)),
        Float64 => ConstValue::Float(v as f64),
    }
}

#[inline]
fn cast_float(v: f64, to: ScalarDType) -> ConstValue {
    use ScalarDType::*;
    match to {
        Bool => ConstValue::Bool(v != 0.0),
        Int8 => ConstValue::Int(cast_via!(v, i8, i64)),
        Int16 => ConstValue::Int(cast_via!(v, i16, i64)),
        Int32 => ConstValue::Int(cast_via!(v, i32, i64)),
        Int64 => ConstValue::Int(v as i64),
        // Float-to-unsigned routes through i64 first.
        UInt8 => ConstValue::UInt(cast_via!(v as i64, u8, u64)),
        UInt16 => ConstValue::UInt(cast_via!(v as i64, u16, u64)),
        UInt32 => ConstValue::UInt(cast_via!(v as i64, u32, u64)),
        UInt64 => ConstValue::UInt((v as i64) as u64),
        Float32 => ConstValue::Float(cast_via!(v, f32, f64)),
        Float64 => ConstValue::Float(v),
    }
}

impl ConstValue {
    /// Natural dtype of the storage variant.
    pub const fn dtype(&self) -> DType {
        match self {
            ConstValue::Int(_) => DType::Int64,
            ConstValue::UInt(_) => DType::UInt64,
            ConstValue::Float(_) => DType::Float64,
            ConstValue::Bool(_) => DType::Bool,
        }
    }

    pub const fn zero(dtype: ScalarDType) -> Self {
        use ScalarDType::*;
        match dtype {
            Bool => Self::Bool(false),
            Int8 | Int16 | Int32 | Int64 => Self::Int(0),
            UInt8 | UInt16 | UInt32 | UInt64 => Self::UInt(0),
            Float32 | Float64 => Self::Float(0.0),
        }
    }

    /// Cast this constant to `dtype`, truncating or rounding like a C cast.
    ///
    /// Returns `None` for `DType::Void`.
    pub fn cast(&self, dtype: &DType) -> Option<Self> {
        let to = dtype.scalar()?;
        Some(match *self {
            ConstValue::Bool(v) => cast_bool(v, to),
            ConstValue::Int(v) => cast_int(v, to),
            ConstValue::UInt(v) => cast_uint(v, to),
            ConstValue::Float(v) => cast_float(v, to),
        })
    }

    /// Encode as the 64-bit word stored in result slots and field memory.
    ///
    /// Integers occupy the low `dtype.bytes()` bytes, floats keep their exact
    /// IEEE-754 bit pattern.
    pub fn to_bits(&self, dtype: &DType) -> Option<u64> {
        use ScalarDType::*;
        let bits = match (self.cast(dtype)?, dtype.scalar()?) {
            (ConstValue::Bool(v), _) => v as u64,
            (ConstValue::Int(v), Int8) => v as i8 as u8 as u64,
            (ConstValue::Int(v), Int16) => v as i16 as u16 as u64,
            (ConstValue::Int(v), Int32) => v as i32 as u32 as u64,
            (ConstValue::Int(v), _) => v as u64,
            (ConstValue::UInt(v), _) => v,
            (ConstValue::Float(v), Float32) => (v as f32).to_bits() as u64,
            (ConstValue::Float(v), _) => v.to_bits(),
        };
        Some(bits)
    }

    /// Decode a 64-bit word produced by [`ConstValue::to_bits`].
    pub fn from_bits(bits: u64, dtype: &DType) -> Option<Self> {
        use ScalarDType::*;
        Some(match dtype.scalar()? {
            Bool => ConstValue::Bool(bits & 1 != 0),
            Int8 => ConstValue::Int(bits as u8 as i8 as i64),
            Int16 => ConstValue::Int(bits as u16 as i16 as i64),
            Int32 => ConstValue::Int(bits as u32 as i32 as i64),
            Int64 => ConstValue::Int(bits as i64),
            UInt8 => ConstValue::UInt(bits as u8 as u64),
            UInt16 => ConstValue::UInt(bits as u16 as u64),
            UInt32 => ConstValue::UInt(bits as u32 as u64),
            UInt64 => ConstValue::UInt(bits),
            Float32 => ConstValue::Float(f32::from_bits(bits as u32) as f64),
            Float64 => ConstValue::Float(f64::from_bits(bits)),
        })
    }
}

impl std::fmt::Display for ConstValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConstValue::Int(v) => write!(f, "{v}"),
            ConstValue::UInt(v) => write!(f, "{v}u"),
            ConstValue::Float(v) => write!(f, "{v:?}"),
            ConstValue::Bool(v) => write!(f, "{v}"),
        }
    }
}

/// Unary operation types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum UnaryOp {
    /// Negation: -x
    Neg,
    /// Logical not on bools, bitwise not on integers.
    Not,
    /// Absolute value.
    Abs,
    /// Square root.
    Sqrt,
    /// Base-2 exponential.
    Exp2,
    /// Base-2 logarithm.
    Log2,
    /// Sine (float only).
    Sin,
    /// Cosine (float only).
    Cos,
    /// Reciprocal: 1/x
    Reciprocal,
    /// Truncate towards zero.
    Trunc,
    /// Round towards negative infinity.
    Floor,
}

/// Binary operation types.
///
/// Arithmetic operations produce the statement's declared dtype; comparisons
/// always produce a boolean that is then cast to the declared dtype.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    /// C-style remainder (sign of the dividend).
    Mod,
    Max,
    Min,
    Pow,
    /// Integer division truncated toward zero.
    Idiv,
    /// Float division.
    Fdiv,

    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,

    And,
    Or,
    Xor,
    Shl,
    Shr,
}

impl BinaryOp {
    /// Returns true if this is a comparison operation.
    pub fn is_comparison(self) -> bool {
        matches!(self, Self::Lt | Self::Le | Self::Gt | Self::Ge | Self::Eq | Self::Ne)
    }

    /// Returns true if this is a bitwise/shift operation.
    pub fn is_bitwise(self) -> bool {
        matches!(self, Self::And | Self::Or | Self::Xor | Self::Shl | Self::Shr)
    }
}

/// A scalar operator: either unary or binary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarOp {
    Unary(UnaryOp),
    Binary(BinaryOp),
}

impl ScalarOp {
    pub fn is_binary(&self) -> bool {
        matches!(self, Self::Binary(_))
    }
}

impl std::fmt::Display for ScalarOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unary(op) => write!(f, "{op}"),
            Self::Binary(op) => write!(f, "{op}"),
        }
    }
}

impl From<UnaryOp> for ScalarOp {
    fn from(op: UnaryOp) -> Self {
        Self::Unary(op)
    }
}

impl From<BinaryOp> for ScalarOp {
    fn from(op: BinaryOp) -> Self {
        Self::Binary(op)
    }
}
