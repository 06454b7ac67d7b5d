use snafu::Snafu;
use tessel_dtype::DType;

use crate::stmt::StmtId;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Clone, PartialEq, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    /// A statement refers to an operand that is not defined before it.
    #[snafu(display("{stmt} uses {operand} before it is defined"))]
    UseBeforeDef { stmt: StmtId, operand: StmtId },

    /// An argument statement reads past the declared argument list.
    #[snafu(display("{stmt} reads argument {index} but the kernel declares {num_args}"))]
    ArgOutOfRange { stmt: StmtId, index: usize, num_args: usize },

    /// An argument statement disagrees with the declared argument type.
    #[snafu(display("{stmt} reads argument {index} as {actual} but it is declared {expected}"))]
    ArgTypeMismatch { stmt: StmtId, index: usize, expected: DType, actual: DType },

    /// A void value is used as an operand.
    #[snafu(display("{stmt} uses void value {operand}"))]
    VoidOperand { stmt: StmtId, operand: StmtId },

    /// A value-producing statement is declared void.
    #[snafu(display("{stmt} produces a value but is declared void"))]
    VoidResult { stmt: StmtId },

    /// A return statement writes a slot that is not declared.
    #[snafu(display("{stmt} returns into slot {index} but the kernel declares {num_rets}"))]
    ReturnOutOfRange { stmt: StmtId, index: usize, num_rets: usize },
}
