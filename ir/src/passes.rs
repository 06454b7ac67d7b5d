//! Lowering passes run by the compilation pipeline before a body reaches a backend.

use std::collections::HashMap;

use snafu::ensure;
use tessel_dtype::DType;

use crate::error::*;
use crate::stmt::{Block, Stmt, StmtId};

/// Check that every statement is well formed.
///
/// Operands must be defined before use and non-void, arguments must match the
/// declared signature and return slots must be within `num_rets`.
pub fn verify(block: &Block, args: &[DType], num_rets: usize) -> Result<()> {
    for (id, stmt) in block.iter() {
        for operand in stmt.operands() {
            ensure!(operand < id, UseBeforeDefSnafu { stmt: id, operand });
            let Some(def) = block.get(operand) else {
                return UseBeforeDefSnafu { stmt: id, operand }.fail();
            };
            ensure!(!def.dtype().is_void(), VoidOperandSnafu { stmt: id, operand });
        }

        match stmt {
            Stmt::Arg { index, dtype } => {
                let Some(expected) = args.get(*index) else {
                    return ArgOutOfRangeSnafu { stmt: id, index: *index, num_args: args.len() }.fail();
                };
                ensure!(
                    expected == dtype,
                    ArgTypeMismatchSnafu { stmt: id, index: *index, expected: *expected, actual: *dtype }
                );
            }
            Stmt::Return { index, .. } => {
                ensure!(*index < num_rets, ReturnOutOfRangeSnafu { stmt: id, index: *index, num_rets });
            }
            _ => ensure!(stmt.has_side_effects() || !stmt.dtype().is_void(), VoidResultSnafu { stmt: id }),
        }
    }
    Ok(())
}

/// Drop statements whose values never reach a store or a return.
///
/// Surviving statements keep their relative order; operand ids are renumbered.
pub fn eliminate_dead_code(block: &Block) -> Block {
    let stmts = block.stmts();
    let mut live = vec![false; stmts.len()];
    for (i, stmt) in stmts.iter().enumerate().rev() {
        if stmt.has_side_effects() {
            live[i] = true;
        }
        if live[i] {
            for operand in stmt.operands() {
                if let Some(slot) = live.get_mut(operand.0) {
                    *slot = true;
                }
            }
        }
    }

    let mut remap = HashMap::new();
    let mut out = Block::new();
    for (i, stmt) in stmts.iter().enumerate() {
        if !live[i] {
            continue;
        }
        let rewritten = stmt.map_operands(|op| remap.get(&op).copied().unwrap_or(op));
        remap.insert(StmtId(i), out.push(rewritten));
    }
    out
}
