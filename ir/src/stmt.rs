//! Kernel statements.
//!
//! A kernel body is a flat [`Block`] of statements in definition order. Every
//! statement is addressed by its position ([`StmtId`]) and may only refer to
//! statements that precede it.

use smallvec::SmallVec;
use tessel_dtype::DType;

use crate::snode::SNodeId;
use crate::types::{BinaryOp, ConstValue, UnaryOp};

/// Position of a statement inside its block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StmtId(pub usize);

impl std::fmt::Display for StmtId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "${}", self.0)
    }
}

pub type Indices = SmallVec<[StmtId; 4]>;

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Const { value: ConstValue, dtype: DType },
    /// Read kernel argument `index`.
    Arg { index: usize, dtype: DType },
    Unary { op: UnaryOp, operand: StmtId, dtype: DType },
    Binary { op: BinaryOp, lhs: StmtId, rhs: StmtId, dtype: DType },
    Cast { src: StmtId, dtype: DType },
    /// Read one element of a placed field.
    GlobalLoad { snode: SNodeId, indices: Indices, dtype: DType },
    /// Write one element of a placed field.
    GlobalStore { snode: SNodeId, indices: Indices, value: StmtId },
    /// Write `value` into result slot `index`.
    Return { index: usize, value: StmtId },
}

impl Stmt {
    /// Type of the value this statement produces.
    pub fn dtype(&self) -> DType {
        match self {
            Self::Const { dtype, .. }
            | Self::Arg { dtype, .. }
            | Self::Unary { dtype, .. }
            | Self::Binary { dtype, .. }
            | Self::Cast { dtype, .. }
            | Self::GlobalLoad { dtype, .. } => *dtype,
            Self::GlobalStore { .. } | Self::Return { .. } => DType::Void,
        }
    }

    pub fn operands(&self) -> Indices {
        match self {
            Self::Const { .. } | Self::Arg { .. } => Indices::new(),
            Self::Unary { operand, .. } => smallvec::smallvec![*operand],
            Self::Binary { lhs, rhs, .. } => smallvec::smallvec![*lhs, *rhs],
            Self::Cast { src, .. } => smallvec::smallvec![*src],
            Self::GlobalLoad { indices, .. } => indices.clone(),
            Self::GlobalStore { indices, value, .. } => {
                let mut ops = indices.clone();
                ops.push(*value);
                ops
            }
            Self::Return { value, .. } => smallvec::smallvec![*value],
        }
    }

    /// Rewrite every operand through `f`.
    pub fn map_operands(&self, mut f: impl FnMut(StmtId) -> StmtId) -> Self {
        let mut stmt = self.clone();
        match &mut stmt {
            Self::Const { .. } | Self::Arg { .. } => {}
            Self::Unary { operand, .. } => *operand = f(*operand),
            Self::Binary { lhs, rhs, .. } => {
                *lhs = f(*lhs);
                *rhs = f(*rhs);
            }
            Self::Cast { src, .. } => *src = f(*src),
            Self::GlobalLoad { indices, .. } => indices.iter_mut().for_each(|i| *i = f(*i)),
            Self::GlobalStore { indices, value, .. } => {
                indices.iter_mut().for_each(|i| *i = f(*i));
                *value = f(*value);
            }
            Self::Return { value, .. } => *value = f(*value),
        }
        stmt
    }

    pub fn has_side_effects(&self) -> bool {
        matches!(self, Self::GlobalStore { .. } | Self::Return { .. })
    }
}

impl std::fmt::Display for Stmt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let join = |ids: &Indices| ids.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ");
        match self {
            Self::Const { value, dtype } => write!(f, "const {dtype} {value}"),
            Self::Arg { index, dtype } => write!(f, "arg[{index}] {dtype}"),
            Self::Unary { op, operand, dtype } => write!(f, "{op} {dtype} {operand}"),
            Self::Binary { op, lhs, rhs, dtype } => write!(f, "{op} {dtype} {lhs}, {rhs}"),
            Self::Cast { src, dtype } => write!(f, "cast {dtype} {src}"),
            Self::GlobalLoad { snode, indices, dtype } => write!(f, "load {dtype} {snode}[{}]", join(indices)),
            Self::GlobalStore { snode, indices, value } => write!(f, "store {snode}[{}] <- {value}", join(indices)),
            Self::Return { index, value } => write!(f, "return[{index}] {value}"),
        }
    }
}

/// Flat list of statements forming a kernel or function body.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Block {
    stmts: Vec<Stmt>,
}

impl Block {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, stmt: Stmt) -> StmtId {
        self.stmts.push(stmt);
        StmtId(self.stmts.len() - 1)
    }

    pub fn get(&self, id: StmtId) -> Option<&Stmt> {
        self.stmts.get(id.0)
    }

    pub fn stmts(&self) -> &[Stmt] {
        &self.stmts
    }

    pub fn iter(&self) -> impl Iterator<Item = (StmtId, &Stmt)> {
        self.stmts.iter().enumerate().map(|(i, s)| (StmtId(i), s))
    }

    pub fn len(&self) -> usize {
        self.stmts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stmts.is_empty()
    }
}

impl std::fmt::Display for Block {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (id, stmt) in self.iter() {
            writeln!(f, "{id} = {stmt}")?;
        }
        Ok(())
    }
}

/// Appends statements to a block and hands back their ids.
#[derive(Debug, Default)]
pub struct IrBuilder {
    block: Block,
}

impl IrBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn const_(&mut self, value: ConstValue, dtype: DType) -> StmtId {
        self.block.push(Stmt::Const { value, dtype })
    }

    pub fn arg(&mut self, index: usize, dtype: DType) -> StmtId {
        self.block.push(Stmt::Arg { index, dtype })
    }

    pub fn unary(&mut self, op: UnaryOp, operand: StmtId, dtype: DType) -> StmtId {
        self.block.push(Stmt::Unary { op, operand, dtype })
    }

    pub fn binary(&mut self, op: BinaryOp, lhs: StmtId, rhs: StmtId, dtype: DType) -> StmtId {
        self.block.push(Stmt::Binary { op, lhs, rhs, dtype })
    }

    pub fn cast(&mut self, src: StmtId, dtype: DType) -> StmtId {
        self.block.push(Stmt::Cast { src, dtype })
    }

    pub fn load(&mut self, snode: SNodeId, indices: &[StmtId], dtype: DType) -> StmtId {
        self.block.push(Stmt::GlobalLoad { snode, indices: Indices::from_slice(indices), dtype })
    }

    pub fn store(&mut self, snode: SNodeId, indices: &[StmtId], value: StmtId) -> StmtId {
        self.block.push(Stmt::GlobalStore { snode, indices: Indices::from_slice(indices), value })
    }

    pub fn ret(&mut self, index: usize, value: StmtId) -> StmtId {
        self.block.push(Stmt::Return { index, value })
    }

    pub fn block(&self) -> &Block {
        &self.block
    }

    pub fn finish(self) -> Block {
        self.block
    }
}
