//! Exception tag instances

use std::sync::Arc;

use super::instance::TagInstance;
use crate::ast::types::{FunctionType, TagType};

#[derive(Debug)]
pub struct Tag {
    ty: TagType,
}

impl Tag {
    pub fn new(ty: TagType) -> TagInstance {
        TagInstance::from_arc(Arc::new(Tag { ty }))
    }

    pub fn ty(&self) -> &TagType {
        &self.ty
    }

    /// Payload signature, borrowed from the tag
    pub fn function_type(&self) -> &FunctionType {
        self.ty.function_type()
    }
}
