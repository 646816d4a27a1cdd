//! Table and reference instructions

use super::{RuntimeError, Stack, Value};
use crate::ast::types::RefType;
use crate::runtime::module::ModuleData;

pub fn table_get(stack: &mut Stack, module: &ModuleData, idx: u32) -> Result<(), RuntimeError> {
    let table = module.table(idx)?;
    let elem = stack.pop_i32()? as u32;
    stack.push(table.get(elem)?);
    Ok(())
}

pub fn table_set(stack: &mut Stack, module: &ModuleData, idx: u32) -> Result<(), RuntimeError> {
    let table = module.table(idx)?;
    let value = stack.pop()?;
    let elem = stack.pop_i32()? as u32;
    table.set(elem, value)
}

pub fn table_size(stack: &mut Stack, module: &ModuleData, idx: u32) -> Result<(), RuntimeError> {
    let table = module.table(idx)?;
    stack.push(Value::I32(table.size() as i32));
    Ok(())
}

/// table.grow: `[ref i32] -> [i32]`, pushing the old size or -1 on failure
pub fn table_grow(stack: &mut Stack, module: &ModuleData, idx: u32) -> Result<(), RuntimeError> {
    let table = module.table(idx)?;
    let delta = stack.pop_i32()? as u32;
    let init = stack.pop()?;
    let result = table.grow(delta, Some(init)).map_or(-1, |old| old as i32);
    stack.push(Value::I32(result));
    Ok(())
}

pub fn ref_null(stack: &mut Stack, ty: RefType) -> Result<(), RuntimeError> {
    stack.push(Value::null(ty));
    Ok(())
}

pub fn ref_is_null(stack: &mut Stack) -> Result<(), RuntimeError> {
    let value = stack.pop()?;
    match value {
        Value::FuncRef(_) | Value::ExternRef(_) => {
            stack.push(Value::I32(value.is_null() as i32));
            Ok(())
        }
        other => Err(RuntimeError::type_mismatch("reference", other.typ())),
    }
}

pub fn ref_func(stack: &mut Stack, module: &ModuleData, idx: u32) -> Result<(), RuntimeError> {
    let func = module.function(idx)?;
    stack.push(Value::func_ref(&func));
    Ok(())
}
