//! An embeddable WebAssembly execution engine.
//!
//! wasmbed takes validated modules, links them against each other through a
//! [`Store`](runtime::Store), and runs them with an interpreter or with
//! externally compiled native code. Embedders inject native host functions
//! that guest code imports like any other export.
//!
//! # Modules
//!
//! - [`ast`] -- Module descriptions: types, the structured instruction tree, and
//!   [`ast::ModuleBuilder`] for assembling modules without a binary decoder.
//! - [`runtime`] -- Store, instances, executor, host-function contract, WASI
//!   preview1 host module, and plugin descriptors.
//!
//! # Example
//!
//! Register a host module exporting `add`, then call it through the store:
//!
//! ```
//! use wasmbed::ast::{FunctionType, ValType};
//! use wasmbed::runtime::{Completion, Executor, Function, ModuleInstance, Store, Value};
//!
//! let store = Store::new();
//! let executor = Executor::default();
//!
//! let mut env = ModuleInstance::new("env");
//! let ty = FunctionType::new(vec![ValType::I32, ValType::I32], vec![ValType::I32]);
//! env.add_function(
//!     "add",
//!     Function::new_host(
//!         ty,
//!         |_, params, returns| {
//!             let a = params[0].as_i32().unwrap_or_default();
//!             let b = params[1].as_i32().unwrap_or_default();
//!             returns[0] = Value::I32(a + b);
//!             Ok(())
//!         },
//!         0,
//!     ),
//! );
//! executor.register_import(&store, &env).unwrap();
//!
//! let module = store.find_module("env").unwrap();
//! let add = module.find_function("add").unwrap();
//! let mut returns = [Value::I32(0)];
//! let done = executor.invoke(&add, &[Value::I32(3), Value::I32(4)], &mut returns).unwrap();
//! assert_eq!(done, Completion::Returned);
//! assert_eq!(returns, [Value::I32(7)]);
//! ```

pub mod ast;
pub mod runtime;
