//! WebAssembly runtime implementation
//!
//! This module provides the embedding surface of the engine: the store that
//! links modules by name, the instance object model, the executor with its
//! interpreter, and the context handed to host functions.

pub mod async_handle;
pub mod calling_frame;
pub mod config;
mod control;
pub mod error;
pub mod executor;
mod frame;
pub mod function;
pub mod global;
pub mod instance;
mod instantiate;
mod interpreter;
pub mod memory;
pub mod module;
mod ops;
pub mod plugin;
mod stack;
pub mod statistics;
pub mod store;
pub mod string;
pub mod table;
pub mod tag;
pub mod value;
pub mod wasi;

pub use async_handle::{Async, AsyncState};
pub use calling_frame::CallingFrame;
pub use config::{Configure, StatisticsConfig};
pub use error::{Completion, ErrCategory, ErrCode, ResultCode, RuntimeError, Trap};
pub use executor::Executor;
pub use function::{CompiledCode, Function, HostFunction, WrapFn};
pub use global::Global;
pub use instance::{
    FunctionInstance, FunctionRef, GlobalInstance, GlobalRef, InstanceHandle, InstanceRef, MemoryInstance, MemoryRef,
    TableInstance, TableRef, TagInstance, TagRef,
};
pub use memory::{Memory, MAX_PAGES, PAGE_SIZE};
pub use module::{ModuleData, ModuleInstance, ModuleRef};
pub use plugin::{ModuleDescriptor, PluginDescriptor, PluginRegistry};
pub use statistics::Statistics;
pub use store::Store;
pub use string::{Bytes, WasmString};
pub use table::Table;
pub use tag::Tag;
pub use value::{ExternAddr, FuncAddr, Value};
