//! Local and global variable access

use super::{RuntimeError, Stack};
use crate::runtime::frame::Frame;
use crate::runtime::module::ModuleData;

fn local_slot(frame: &mut Frame, idx: u32) -> Result<&mut crate::runtime::Value, RuntimeError> {
    frame
        .locals
        .get_mut(idx as usize)
        .ok_or(RuntimeError::WrongInstanceIndex(idx))
}

pub fn local_get(stack: &mut Stack, frame: &mut Frame, idx: u32) -> Result<(), RuntimeError> {
    let value = local_slot(frame, idx)?.clone();
    stack.push(value);
    Ok(())
}

pub fn local_set(stack: &mut Stack, frame: &mut Frame, idx: u32) -> Result<(), RuntimeError> {
    let value = stack.pop()?;
    *local_slot(frame, idx)? = value;
    Ok(())
}

/// local.tee: like local.set but leaves the operand on the stack
pub fn local_tee(stack: &mut Stack, frame: &mut Frame, idx: u32) -> Result<(), RuntimeError> {
    let value = stack.peek().cloned().ok_or_else(|| RuntimeError::type_mismatch("operand", "empty stack"))?;
    *local_slot(frame, idx)? = value;
    Ok(())
}

pub fn global_get(stack: &mut Stack, module: &ModuleData, idx: u32) -> Result<(), RuntimeError> {
    stack.push(module.global(idx)?.get());
    Ok(())
}

/// global.set writes through to the shared instance, so importers see it
pub fn global_set(stack: &mut Stack, module: &ModuleData, idx: u32) -> Result<(), RuntimeError> {
    let value = stack.pop()?;
    module.global(idx)?.set(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::{ModuleInstance, Value};
    use std::sync::Arc;

    fn frame(locals: Vec<Value>) -> Frame {
        let module = ModuleInstance::new("");
        Frame::new(locals, Arc::clone(module.arc()))
    }

    #[test]
    fn locals_round_trip() {
        let mut frame = frame(vec![Value::I32(0), Value::I64(0)]);
        let mut stack = Stack::new();
        stack.push(Value::I64(9));
        local_tee(&mut stack, &mut frame, 1).unwrap();
        assert_eq!(stack.depth(), 1);
        local_set(&mut stack, &mut frame, 0).unwrap();
        local_get(&mut stack, &mut frame, 0).unwrap();
        assert_eq!(stack.pop().unwrap(), Value::I64(9));
        assert_eq!(frame.locals[1], Value::I64(9));
        assert_eq!(local_get(&mut stack, &mut frame, 5), Err(RuntimeError::WrongInstanceIndex(5)));
    }
}
