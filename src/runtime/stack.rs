//! WebAssembly value stack

use super::{RuntimeError, Value};
use crate::ast::types::ValType;

/// Operand stack shared by every frame of one invocation
#[derive(Debug, Default)]
pub struct Stack {
    values: Vec<Value>,
}

impl Stack {
    pub fn new() -> Self {
        Stack { values: Vec::new() }
    }

    pub fn push(&mut self, value: Value) {
        self.values.push(value);
    }

    pub fn push_all(&mut self, values: impl IntoIterator<Item = Value>) {
        self.values.extend(values);
    }

    pub fn pop(&mut self) -> Result<Value, RuntimeError> {
        self.values
            .pop()
            .ok_or_else(|| RuntimeError::type_mismatch("operand", "empty stack"))
    }

    /// Pop a value and check it against `expected`
    pub fn pop_typed(&mut self, expected: ValType) -> Result<Value, RuntimeError> {
        let value = self.pop()?;
        if !value.matches(expected) {
            return Err(RuntimeError::type_mismatch(expected, value.typ()));
        }
        Ok(value)
    }

    pub fn pop_i32(&mut self) -> Result<i32, RuntimeError> {
        match self.pop()? {
            Value::I32(v) => Ok(v),
            other => Err(RuntimeError::type_mismatch(ValType::I32, other.typ())),
        }
    }

    pub fn pop_i64(&mut self) -> Result<i64, RuntimeError> {
        match self.pop()? {
            Value::I64(v) => Ok(v),
            other => Err(RuntimeError::type_mismatch(ValType::I64, other.typ())),
        }
    }

    pub fn pop_f32(&mut self) -> Result<f32, RuntimeError> {
        match self.pop()? {
            Value::F32(v) => Ok(v),
            other => Err(RuntimeError::type_mismatch(ValType::F32, other.typ())),
        }
    }

    pub fn pop_f64(&mut self) -> Result<f64, RuntimeError> {
        match self.pop()? {
            Value::F64(v) => Ok(v),
            other => Err(RuntimeError::type_mismatch(ValType::F64, other.typ())),
        }
    }

    /// Pop the top `n` values, returned in push order
    pub fn pop_n(&mut self, n: usize) -> Result<Vec<Value>, RuntimeError> {
        let len = self.values.len();
        if n > len {
            return Err(RuntimeError::type_mismatch(format!("{n} operands"), format!("{len}")));
        }
        Ok(self.values.split_off(len - n))
    }

    /// Drop everything above `height`
    pub fn truncate(&mut self, height: usize) {
        self.values.truncate(height);
    }

    pub fn depth(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn peek(&self) -> Option<&Value> {
        self.values.last()
    }
}
