//! Bitwise operations: logic, shifts, rotates and bit counting
//!
//! Shift and rotate counts are taken modulo the operand width.

use super::{RuntimeError, Stack, Value};

fn i32_binop(stack: &mut Stack, op: impl FnOnce(i32, i32) -> i32) -> Result<(), RuntimeError> {
    let c2 = stack.pop_i32()?;
    let c1 = stack.pop_i32()?;
    stack.push(Value::I32(op(c1, c2)));
    Ok(())
}

fn i64_binop(stack: &mut Stack, op: impl FnOnce(i64, i64) -> i64) -> Result<(), RuntimeError> {
    let c2 = stack.pop_i64()?;
    let c1 = stack.pop_i64()?;
    stack.push(Value::I64(op(c1, c2)));
    Ok(())
}

pub fn i32_and(stack: &mut Stack) -> Result<(), RuntimeError> {
    i32_binop(stack, |a, b| a & b)
}

pub fn i32_or(stack: &mut Stack) -> Result<(), RuntimeError> {
    i32_binop(stack, |a, b| a | b)
}

pub fn i32_xor(stack: &mut Stack) -> Result<(), RuntimeError> {
    i32_binop(stack, |a, b| a ^ b)
}

pub fn i32_shl(stack: &mut Stack) -> Result<(), RuntimeError> {
    i32_binop(stack, |a, b| a.wrapping_shl(b as u32))
}

pub fn i32_shr_s(stack: &mut Stack) -> Result<(), RuntimeError> {
    i32_binop(stack, |a, b| a.wrapping_shr(b as u32))
}

pub fn i32_shr_u(stack: &mut Stack) -> Result<(), RuntimeError> {
    i32_binop(stack, |a, b| (a as u32).wrapping_shr(b as u32) as i32)
}

pub fn i32_rotl(stack: &mut Stack) -> Result<(), RuntimeError> {
    i32_binop(stack, |a, b| a.rotate_left(b as u32 % 32))
}

pub fn i32_rotr(stack: &mut Stack) -> Result<(), RuntimeError> {
    i32_binop(stack, |a, b| a.rotate_right(b as u32 % 32))
}

pub fn i32_clz(stack: &mut Stack) -> Result<(), RuntimeError> {
    let c = stack.pop_i32()?;
    stack.push(Value::I32(c.leading_zeros() as i32));
    Ok(())
}

pub fn i32_ctz(stack: &mut Stack) -> Result<(), RuntimeError> {
    let c = stack.pop_i32()?;
    stack.push(Value::I32(c.trailing_zeros() as i32));
    Ok(())
}

pub fn i32_popcnt(stack: &mut Stack) -> Result<(), RuntimeError> {
    let c = stack.pop_i32()?;
    stack.push(Value::I32(c.count_ones() as i32));
    Ok(())
}

pub fn i64_and(stack: &mut Stack) -> Result<(), RuntimeError> {
    i64_binop(stack, |a, b| a & b)
}

pub fn i64_or(stack: &mut Stack) -> Result<(), RuntimeError> {
    i64_binop(stack, |a, b| a | b)
}

pub fn i64_xor(stack: &mut Stack) -> Result<(), RuntimeError> {
    i64_binop(stack, |a, b| a ^ b)
}

pub fn i64_shl(stack: &mut Stack) -> Result<(), RuntimeError> {
    i64_binop(stack, |a, b| a.wrapping_shl(b as u32))
}

pub fn i64_shr_s(stack: &mut Stack) -> Result<(), RuntimeError> {
    i64_binop(stack, |a, b| a.wrapping_shr(b as u32))
}

pub fn i64_shr_u(stack: &mut Stack) -> Result<(), RuntimeError> {
    i64_binop(stack, |a, b| (a as u64).wrapping_shr(b as u32) as i64)
}

pub fn i64_rotl(stack: &mut Stack) -> Result<(), RuntimeError> {
    i64_binop(stack, |a, b| a.rotate_left((b as u64 % 64) as u32))
}

pub fn i64_rotr(stack: &mut Stack) -> Result<(), RuntimeError> {
    i64_binop(stack, |a, b| a.rotate_right((b as u64 % 64) as u32))
}

pub fn i64_clz(stack: &mut Stack) -> Result<(), RuntimeError> {
    let c = stack.pop_i64()?;
    stack.push(Value::I64(c.leading_zeros() as i64));
    Ok(())
}

pub fn i64_ctz(stack: &mut Stack) -> Result<(), RuntimeError> {
    let c = stack.pop_i64()?;
    stack.push(Value::I64(c.trailing_zeros() as i64));
    Ok(())
}

pub fn i64_popcnt(stack: &mut Stack) -> Result<(), RuntimeError> {
    let c = stack.pop_i64()?;
    stack.push(Value::I64(c.count_ones() as i64));
    Ok(())
}
