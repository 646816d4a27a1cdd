//! Memory loads, stores, `memory.size` and `memory.grow`
//!
//! The effective address is the unsigned i32 operand plus the static offset,
//! computed in 64 bits so it can never wrap; anything past the end of the
//! buffer traps with `MemoryOutOfBounds`.

use super::*;

fn effective_address(stack: &mut Stack, memarg: &MemArg) -> Result<u64, RuntimeError> {
    let base = stack.pop_i32()? as u32 as u64;
    base.checked_add(memarg.offset)
        .ok_or_else(|| Trap::MemoryOutOfBounds.into())
}

// ============================================================================
// Loads
// ============================================================================

pub fn i32_load(stack: &mut Stack, memory: &Memory, memarg: &MemArg) -> Result<(), RuntimeError> {
    let ea = effective_address(stack, memarg)?;
    stack.push(Value::I32(memory.read_u32(ea)? as i32));
    Ok(())
}

pub fn i64_load(stack: &mut Stack, memory: &Memory, memarg: &MemArg) -> Result<(), RuntimeError> {
    let ea = effective_address(stack, memarg)?;
    stack.push(Value::I64(memory.read_u64(ea)? as i64));
    Ok(())
}

pub fn f32_load(stack: &mut Stack, memory: &Memory, memarg: &MemArg) -> Result<(), RuntimeError> {
    let ea = effective_address(stack, memarg)?;
    stack.push(Value::F32(memory.read_f32(ea)?));
    Ok(())
}

pub fn f64_load(stack: &mut Stack, memory: &Memory, memarg: &MemArg) -> Result<(), RuntimeError> {
    let ea = effective_address(stack, memarg)?;
    stack.push(Value::F64(memory.read_f64(ea)?));
    Ok(())
}

pub fn i32_load8_s(stack: &mut Stack, memory: &Memory, memarg: &MemArg) -> Result<(), RuntimeError> {
    let ea = effective_address(stack, memarg)?;
    stack.push(Value::I32(memory.read_u8(ea)? as i8 as i32));
    Ok(())
}

pub fn i32_load8_u(stack: &mut Stack, memory: &Memory, memarg: &MemArg) -> Result<(), RuntimeError> {
    let ea = effective_address(stack, memarg)?;
    stack.push(Value::I32(memory.read_u8(ea)? as i32));
    Ok(())
}

pub fn i32_load16_s(stack: &mut Stack, memory: &Memory, memarg: &MemArg) -> Result<(), RuntimeError> {
    let ea = effective_address(stack, memarg)?;
    stack.push(Value::I32(memory.read_u16(ea)? as i16 as i32));
    Ok(())
}

pub fn i32_load16_u(stack: &mut Stack, memory: &Memory, memarg: &MemArg) -> Result<(), RuntimeError> {
    let ea = effective_address(stack, memarg)?;
    stack.push(Value::I32(memory.read_u16(ea)? as i32));
    Ok(())
}

pub fn i64_load8_s(stack: &mut Stack, memory: &Memory, memarg: &MemArg) -> Result<(), RuntimeError> {
    let ea = effective_address(stack, memarg)?;
    stack.push(Value::I64(memory.read_u8(ea)? as i8 as i64));
    Ok(())
}

pub fn i64_load8_u(stack: &mut Stack, memory: &Memory, memarg: &MemArg) -> Result<(), RuntimeError> {
    let ea = effective_address(stack, memarg)?;
    stack.push(Value::I64(memory.read_u8(ea)? as i64));
    Ok(())
}

pub fn i64_load16_s(stack: &mut Stack, memory: &Memory, memarg: &MemArg) -> Result<(), RuntimeError> {
    let ea = effective_address(stack, memarg)?;
    stack.push(Value::I64(memory.read_u16(ea)? as i16 as i64));
    Ok(())
}

pub fn i64_load16_u(stack: &mut Stack, memory: &Memory, memarg: &MemArg) -> Result<(), RuntimeError> {
    let ea = effective_address(stack, memarg)?;
    stack.push(Value::I64(memory.read_u16(ea)? as i64));
    Ok(())
}

pub fn i64_load32_s(stack: &mut Stack, memory: &Memory, memarg: &MemArg) -> Result<(), RuntimeError> {
    let ea = effective_address(stack, memarg)?;
    stack.push(Value::I64(memory.read_u32(ea)? as i32 as i64));
    Ok(())
}

pub fn i64_load32_u(stack: &mut Stack, memory: &Memory, memarg: &MemArg) -> Result<(), RuntimeError> {
    let ea = effective_address(stack, memarg)?;
    stack.push(Value::I64(memory.read_u32(ea)? as i64));
    Ok(())
}

// ============================================================================
// Stores: the value is on top, the address below it
// ============================================================================

pub fn i32_store(stack: &mut Stack, memory: &Memory, memarg: &MemArg) -> Result<(), RuntimeError> {
    let value = stack.pop_i32()?;
    let ea = effective_address(stack, memarg)?;
    memory.write_u32(ea, value as u32)
}

pub fn i64_store(stack: &mut Stack, memory: &Memory, memarg: &MemArg) -> Result<(), RuntimeError> {
    let value = stack.pop_i64()?;
    let ea = effective_address(stack, memarg)?;
    memory.write_u64(ea, value as u64)
}

pub fn f32_store(stack: &mut Stack, memory: &Memory, memarg: &MemArg) -> Result<(), RuntimeError> {
    let value = stack.pop_f32()?;
    let ea = effective_address(stack, memarg)?;
    memory.write_f32(ea, value)
}

pub fn f64_store(stack: &mut Stack, memory: &Memory, memarg: &MemArg) -> Result<(), RuntimeError> {
    let value = stack.pop_f64()?;
    let ea = effective_address(stack, memarg)?;
    memory.write_f64(ea, value)
}

pub fn i32_store8(stack: &mut Stack, memory: &Memory, memarg: &MemArg) -> Result<(), RuntimeError> {
    let value = stack.pop_i32()?;
    let ea = effective_address(stack, memarg)?;
    memory.write_u8(ea, value as u8)
}

pub fn i32_store16(stack: &mut Stack, memory: &Memory, memarg: &MemArg) -> Result<(), RuntimeError> {
    let value = stack.pop_i32()?;
    let ea = effective_address(stack, memarg)?;
    memory.write_u16(ea, value as u16)
}

pub fn i64_store8(stack: &mut Stack, memory: &Memory, memarg: &MemArg) -> Result<(), RuntimeError> {
    let value = stack.pop_i64()?;
    let ea = effective_address(stack, memarg)?;
    memory.write_u8(ea, value as u8)
}

pub fn i64_store16(stack: &mut Stack, memory: &Memory, memarg: &MemArg) -> Result<(), RuntimeError> {
    let value = stack.pop_i64()?;
    let ea = effective_address(stack, memarg)?;
    memory.write_u16(ea, value as u16)
}

pub fn i64_store32(stack: &mut Stack, memory: &Memory, memarg: &MemArg) -> Result<(), RuntimeError> {
    let value = stack.pop_i64()?;
    let ea = effective_address(stack, memarg)?;
    memory.write_u32(ea, value as u32)
}

// ============================================================================
// Size and growth
// ============================================================================

pub fn memory_size(stack: &mut Stack, memory: &Memory) -> Result<(), RuntimeError> {
    stack.push(Value::I32(memory.page_size() as i32));
    Ok(())
}

/// memory.grow pushes the previous page count, or -1 when growth fails
pub fn memory_grow(stack: &mut Stack, memory: &Memory) -> Result<(), RuntimeError> {
    let delta = stack.pop_i32()? as u32 as u64;
    let result = match memory.grow_page(delta) {
        Ok(old) => old as i32,
        Err(RuntimeError::Trap(Trap::MemoryOutOfBounds)) => -1,
        Err(e) => return Err(e),
    };
    stack.push(Value::I32(result));
    Ok(())
}
