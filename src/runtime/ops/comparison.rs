//! Tests and comparisons; every result is an i32 of 0 or 1

use super::{RuntimeError, Stack, Value};

fn push_bool(stack: &mut Stack, cond: bool) -> Result<(), RuntimeError> {
    stack.push(Value::I32(cond as i32));
    Ok(())
}

fn i32_relop(stack: &mut Stack, op: impl FnOnce(i32, i32) -> bool) -> Result<(), RuntimeError> {
    let c2 = stack.pop_i32()?;
    let c1 = stack.pop_i32()?;
    push_bool(stack, op(c1, c2))
}

fn i64_relop(stack: &mut Stack, op: impl FnOnce(i64, i64) -> bool) -> Result<(), RuntimeError> {
    let c2 = stack.pop_i64()?;
    let c1 = stack.pop_i64()?;
    push_bool(stack, op(c1, c2))
}

fn f32_relop(stack: &mut Stack, op: impl FnOnce(f32, f32) -> bool) -> Result<(), RuntimeError> {
    let c2 = stack.pop_f32()?;
    let c1 = stack.pop_f32()?;
    push_bool(stack, op(c1, c2))
}

fn f64_relop(stack: &mut Stack, op: impl FnOnce(f64, f64) -> bool) -> Result<(), RuntimeError> {
    let c2 = stack.pop_f64()?;
    let c1 = stack.pop_f64()?;
    push_bool(stack, op(c1, c2))
}

pub fn i32_eqz(stack: &mut Stack) -> Result<(), RuntimeError> {
    let c = stack.pop_i32()?;
    push_bool(stack, c == 0)
}

pub fn i32_eq(stack: &mut Stack) -> Result<(), RuntimeError> {
    i32_relop(stack, |a, b| a == b)
}

pub fn i32_ne(stack: &mut Stack) -> Result<(), RuntimeError> {
    i32_relop(stack, |a, b| a != b)
}

pub fn i32_lt_s(stack: &mut Stack) -> Result<(), RuntimeError> {
    i32_relop(stack, |a, b| a < b)
}

pub fn i32_lt_u(stack: &mut Stack) -> Result<(), RuntimeError> {
    i32_relop(stack, |a, b| (a as u32) < (b as u32))
}

pub fn i32_gt_s(stack: &mut Stack) -> Result<(), RuntimeError> {
    i32_relop(stack, |a, b| a > b)
}

pub fn i32_gt_u(stack: &mut Stack) -> Result<(), RuntimeError> {
    i32_relop(stack, |a, b| (a as u32) > (b as u32))
}

pub fn i32_le_s(stack: &mut Stack) -> Result<(), RuntimeError> {
    i32_relop(stack, |a, b| a <= b)
}

pub fn i32_le_u(stack: &mut Stack) -> Result<(), RuntimeError> {
    i32_relop(stack, |a, b| (a as u32) <= (b as u32))
}

pub fn i32_ge_s(stack: &mut Stack) -> Result<(), RuntimeError> {
    i32_relop(stack, |a, b| a >= b)
}

pub fn i32_ge_u(stack: &mut Stack) -> Result<(), RuntimeError> {
    i32_relop(stack, |a, b| (a as u32) >= (b as u32))
}

pub fn i64_eqz(stack: &mut Stack) -> Result<(), RuntimeError> {
    let c = stack.pop_i64()?;
    push_bool(stack, c == 0)
}

pub fn i64_eq(stack: &mut Stack) -> Result<(), RuntimeError> {
    i64_relop(stack, |a, b| a == b)
}

pub fn i64_ne(stack: &mut Stack) -> Result<(), RuntimeError> {
    i64_relop(stack, |a, b| a != b)
}

pub fn i64_lt_s(stack: &mut Stack) -> Result<(), RuntimeError> {
    i64_relop(stack, |a, b| a < b)
}

pub fn i64_lt_u(stack: &mut Stack) -> Result<(), RuntimeError> {
    i64_relop(stack, |a, b| (a as u64) < (b as u64))
}

pub fn i64_gt_s(stack: &mut Stack) -> Result<(), RuntimeError> {
    i64_relop(stack, |a, b| a > b)
}

pub fn i64_gt_u(stack: &mut Stack) -> Result<(), RuntimeError> {
    i64_relop(stack, |a, b| (a as u64) > (b as u64))
}

pub fn i64_le_s(stack: &mut Stack) -> Result<(), RuntimeError> {
    i64_relop(stack, |a, b| a <= b)
}

pub fn i64_le_u(stack: &mut Stack) -> Result<(), RuntimeError> {
    i64_relop(stack, |a, b| (a as u64) <= (b as u64))
}

pub fn i64_ge_s(stack: &mut Stack) -> Result<(), RuntimeError> {
    i64_relop(stack, |a, b| a >= b)
}

pub fn i64_ge_u(stack: &mut Stack) -> Result<(), RuntimeError> {
    i64_relop(stack, |a, b| (a as u64) >= (b as u64))
}

// Float comparisons follow IEEE 754: any comparison with NaN is false except `ne`

pub fn f32_eq(stack: &mut Stack) -> Result<(), RuntimeError> {
    f32_relop(stack, |a, b| a == b)
}

pub fn f32_ne(stack: &mut Stack) -> Result<(), RuntimeError> {
    f32_relop(stack, |a, b| a != b)
}

pub fn f32_lt(stack: &mut Stack) -> Result<(), RuntimeError> {
    f32_relop(stack, |a, b| a < b)
}

pub fn f32_gt(stack: &mut Stack) -> Result<(), RuntimeError> {
    f32_relop(stack, |a, b| a > b)
}

pub fn f32_le(stack: &mut Stack) -> Result<(), RuntimeError> {
    f32_relop(stack, |a, b| a <= b)
}

pub fn f32_ge(stack: &mut Stack) -> Result<(), RuntimeError> {
    f32_relop(stack, |a, b| a >= b)
}

pub fn f64_eq(stack: &mut Stack) -> Result<(), RuntimeError> {
    f64_relop(stack, |a, b| a == b)
}

pub fn f64_ne(stack: &mut Stack) -> Result<(), RuntimeError> {
    f64_relop(stack, |a, b| a != b)
}

pub fn f64_lt(stack: &mut Stack) -> Result<(), RuntimeError> {
    f64_relop(stack, |a, b| a < b)
}

pub fn f64_gt(stack: &mut Stack) -> Result<(), RuntimeError> {
    f64_relop(stack, |a, b| a > b)
}

pub fn f64_le(stack: &mut Stack) -> Result<(), RuntimeError> {
    f64_relop(stack, |a, b| a <= b)
}

pub fn f64_ge(stack: &mut Stack) -> Result<(), RuntimeError> {
    f64_relop(stack, |a, b| a >= b)
}
