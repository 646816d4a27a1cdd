//! Activation record of a module-defined function

use std::sync::Arc;

use super::control::LabelStack;
use super::module::ModuleData;
use super::Value;

#[derive(Debug)]
pub struct Frame {
    /// Parameters followed by declared locals
    pub locals: Vec<Value>,
    /// Module whose index spaces the body refers to
    pub module: Arc<ModuleData>,
    pub labels: LabelStack,
}

impl Frame {
    pub fn new(locals: Vec<Value>, module: Arc<ModuleData>) -> Self {
        Frame {
            locals,
            module,
            labels: LabelStack::new(),
        }
    }
}
