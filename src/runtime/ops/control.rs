//! Branch instructions
//!
//! A branch unwinds the operand stack right away: it keeps the label's arity
//! values, drops everything down to the label's height and reports how many
//! labels the interpreter still has to leave.

use super::{RuntimeError, Stack, Trap};
use crate::runtime::control::{BlockEnd, LabelStack};

fn perform_branch(stack: &mut Stack, labels: &LabelStack, depth: u32) -> Result<BlockEnd, RuntimeError> {
    let label = labels.get(depth).ok_or(RuntimeError::WrongInstanceIndex(depth))?;
    let kept = stack.pop_n(label.arity)?;
    stack.truncate(label.stack_height);
    stack.push_all(kept);
    Ok(BlockEnd::Branch(depth))
}

pub fn br(stack: &mut Stack, labels: &LabelStack, depth: u32) -> Result<BlockEnd, RuntimeError> {
    perform_branch(stack, labels, depth)
}

pub fn br_if(stack: &mut Stack, labels: &LabelStack, depth: u32) -> Result<BlockEnd, RuntimeError> {
    if stack.pop_i32()? != 0 {
        perform_branch(stack, labels, depth)
    } else {
        Ok(BlockEnd::Normal)
    }
}

/// br_table: an out-of-range selector takes the default label
pub fn br_table(stack: &mut Stack, labels: &LabelStack, targets: &[u32], default: u32) -> Result<BlockEnd, RuntimeError> {
    let selector = stack.pop_i32()? as u32 as usize;
    let depth = targets.get(selector).copied().unwrap_or(default);
    perform_branch(stack, labels, depth)
}

pub fn return_op() -> Result<BlockEnd, RuntimeError> {
    Ok(BlockEnd::Return)
}

pub fn unreachable() -> Result<BlockEnd, RuntimeError> {
    Err(Trap::Unreachable.into())
}
