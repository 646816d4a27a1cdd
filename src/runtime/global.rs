//! Global variable instances

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use super::instance::GlobalInstance;
use super::{RuntimeError, Value};
use crate::ast::types::GlobalType;

pub struct Global {
    ty: GlobalType,
    value: RwLock<Value>,
}

impl Global {
    pub fn new(ty: GlobalType, value: Value) -> Result<GlobalInstance, RuntimeError> {
        if !value.matches(ty.content) {
            return Err(RuntimeError::type_mismatch(ty.content, value.typ()));
        }
        Ok(GlobalInstance::from_arc(Arc::new(Global {
            ty,
            value: RwLock::new(value),
        })))
    }

    pub fn ty(&self) -> &GlobalType {
        &self.ty
    }

    pub fn get(&self) -> Value {
        self.value.read().clone()
    }

    /// Replace the value of a `Var` global
    pub fn set(&self, value: Value) -> Result<(), RuntimeError> {
        if !self.ty.is_mutable() {
            return Err(RuntimeError::SetValueToConst);
        }
        if !value.matches(self.ty.content) {
            return Err(RuntimeError::SetValueErrorType {
                expected: self.ty.content.to_string(),
                actual: value.typ().to_string(),
            });
        }
        *self.value.write() = value;
        Ok(())
    }
}

impl fmt::Debug for Global {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Global")
            .field("ty", &self.ty)
            .field("value", &*self.value.read())
            .finish()
    }
}
