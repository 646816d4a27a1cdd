//! Parametric operations

use super::{RuntimeError, Stack};

pub fn drop(stack: &mut Stack) -> Result<(), RuntimeError> {
    stack.pop()?;
    Ok(())
}

/// select: `[t t i32] -> [t]`, keeping the first operand when the condition is non-zero
pub fn select(stack: &mut Stack) -> Result<(), RuntimeError> {
    let cond = stack.pop_i32()?;
    let val2 = stack.pop()?;
    let val1 = stack.pop()?;
    stack.push(if cond != 0 { val1 } else { val2 });
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::Value;

    #[test]
    fn select_picks_by_condition() {
        let mut stack = Stack::new();
        stack.push_all([Value::I32(1), Value::I32(2), Value::I32(0)]);
        select(&mut stack).unwrap();
        assert_eq!(stack.pop().unwrap(), Value::I32(2));
        stack.push_all([Value::I64(1), Value::I64(2), Value::I32(7)]);
        select(&mut stack).unwrap();
        assert_eq!(stack.pop().unwrap(), Value::I64(1));
        assert!(stack.is_empty());
    }
}
