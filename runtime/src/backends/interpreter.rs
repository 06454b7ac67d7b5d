//! Host interpreter for lowered kernel IR.

use snafu::ResultExt;
use tessel_device::{Device, DeviceAllocation};
use tessel_dtype::DType;
use tessel_ir::eval::{eval_binary_typed, eval_unary_typed};
use tessel_ir::{Block, ConstValue, SNodeId, Stmt, StmtId};

use crate::backends::layout::FieldLayout;
use crate::error::*;
use crate::program_impl::RuntimeContext;

/// Storage of one materialized field.
#[derive(Debug, Clone)]
pub(crate) struct FieldBinding {
    pub allocation: DeviceAllocation,
    pub layout: FieldLayout,
}

/// Everything a launch needs besides the IR itself.
pub(crate) struct Frame<'a> {
    pub kernel: &'a str,
    pub device: &'a dyn Device,
    pub field: &'a dyn Fn(SNodeId) -> Option<FieldBinding>,
}

impl Frame<'_> {
    pub fn run(&self, block: &Block, ctx: &RuntimeContext<'_>) -> Result<()> {
        let mut values: Vec<Option<ConstValue>> = Vec::with_capacity(block.len());
        for (id, stmt) in block.iter() {
            let value = self.step(block, &values, id, stmt, ctx)?;
            values.push(value);
        }
        Ok(())
    }

    fn step(
        &self,
        block: &Block,
        values: &[Option<ConstValue>],
        id: StmtId,
        stmt: &Stmt,
        ctx: &RuntimeContext<'_>,
    ) -> Result<Option<ConstValue>> {
        let operand = |op: StmtId| self.defined(values.get(op.0).copied().flatten(), id, stmt);
        let dtype_of = |op: StmtId| block.get(op).map_or(DType::Void, Stmt::dtype);

        let value = match stmt {
            Stmt::Const { value, dtype } => value.cast(dtype),
            Stmt::Arg { index, dtype } => ctx.args.get(*index).and_then(|v| v.cast(dtype)),
            Stmt::Unary { op, operand: src, dtype } => eval_unary_typed(*op, operand(*src)?, dtype_of(*src), *dtype),
            Stmt::Binary { op, lhs, rhs, dtype } => {
                eval_binary_typed(*op, operand(*lhs)?, dtype_of(*lhs), operand(*rhs)?, dtype_of(*rhs), *dtype)
            }
            Stmt::Cast { src, dtype } => operand(*src)?.cast(dtype),
            Stmt::GlobalLoad { snode, indices, .. } => {
                let indices = self.indices(indices, &operand)?;
                Some(self.load(*snode, &indices)?)
            }
            Stmt::GlobalStore { snode, indices, value } => {
                let indices = self.indices(indices, &operand)?;
                self.store(*snode, &indices, operand(*value)?)?;
                return Ok(None);
            }
            Stmt::Return { index, value } => {
                let bits = operand(*value)?.to_bits(&dtype_of(*value));
                ctx.result_buffer.store(*index, self.defined(bits, id, stmt)?);
                return Ok(None);
            }
        };
        self.defined(value, id, stmt).map(Some)
    }

    fn defined<T>(&self, value: Option<T>, id: StmtId, stmt: &Stmt) -> Result<T> {
        value.ok_or_else(|| EvaluationSnafu { kernel: self.kernel, stmt: format!("{id} = {stmt}") }.build())
    }

    fn indices(&self, ids: &[StmtId], operand: &impl Fn(StmtId) -> Result<ConstValue>) -> Result<Vec<i64>> {
        ids.iter()
            .map(|&id| match operand(id)?.cast(&DType::Int64) {
                Some(ConstValue::Int(i)) => Ok(i),
                _ => EvaluationSnafu { kernel: self.kernel, stmt: format!("index {id}") }.fail(),
            })
            .collect()
    }

    fn locate(&self, snode: SNodeId, indices: &[i64]) -> Result<(FieldBinding, usize)> {
        let binding = (self.field)(snode).ok_or_else(|| SNodeNotMaterializedSnafu { snode }.build())?;
        let Some(offset) = binding.layout.element_offset(indices) else {
            return OutOfBoundsSnafu {
                kernel: self.kernel,
                snode,
                indices: indices.to_vec(),
                shape: binding.layout.shape.to_vec(),
            }
            .fail();
        };
        Ok((binding, offset))
    }

    fn load(&self, snode: SNodeId, indices: &[i64]) -> Result<ConstValue> {
        let (binding, offset) = self.locate(snode, indices)?;
        let dtype = binding.layout.dtype;
        let mut bytes = [0u8; 8];
        self.device.read(binding.allocation.ptr(offset), &mut bytes[..dtype.bytes()]).context(DeviceSnafu)?;
        let value = ConstValue::from_bits(u64::from_le_bytes(bytes), &dtype);
        value.ok_or_else(|| EvaluationSnafu { kernel: self.kernel, stmt: format!("load {snode}") }.build())
    }

    fn store(&self, snode: SNodeId, indices: &[i64], value: ConstValue) -> Result<()> {
        let (binding, offset) = self.locate(snode, indices)?;
        let dtype = binding.layout.dtype;
        let Some(bits) = value.to_bits(&dtype) else {
            return EvaluationSnafu { kernel: self.kernel, stmt: format!("store {snode}") }.fail();
        };
        self.device.write(binding.allocation.ptr(offset), &bits.to_le_bytes()[..dtype.bytes()]).context(DeviceSnafu)
    }
}
