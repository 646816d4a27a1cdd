//! Instruction implementations, grouped by category
//!
//! Every operation works on the operand stack directly and returns a trap as
//! an error; structured control flow lives in the interpreter.

pub mod bitwise;
pub mod comparison;
pub mod control;
pub mod conversion;
pub mod memory;
pub mod numeric;
pub mod parametric;
pub mod table;
pub mod variable;

pub(crate) use crate::ast::instruction::MemArg;
pub(crate) use crate::runtime::memory::Memory;
pub(crate) use crate::runtime::stack::Stack;
pub(crate) use crate::runtime::{RuntimeError, Trap, Value};
