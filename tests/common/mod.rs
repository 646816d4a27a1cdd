//! Common test utilities shared between integration tests

#![allow(dead_code)]

use std::io::Write;
use std::sync::{Arc, Mutex};

use wasmbed::ast::{AstModule, BlockType, FunctionType, Instruction, ModuleBuilder, ValType};
use wasmbed::runtime::{Function, ModuleInstance, RuntimeError, Value};

/// Captured writer that stores output for testing
pub struct CapturedWriter(pub Arc<Mutex<Vec<u8>>>);

impl Write for CapturedWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Route engine logs to the test harness; `RUST_LOG` picks the level
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn binary_i32() -> FunctionType {
    FunctionType::new(vec![ValType::I32, ValType::I32], vec![ValType::I32])
}

pub fn arg_i32(params: &[Value], idx: usize) -> Result<i32, RuntimeError> {
    params[idx]
        .as_i32()
        .ok_or_else(|| RuntimeError::type_mismatch(ValType::I32, params[idx].typ()))
}

/// Host module `env` exporting `add(i32, i32) -> i32`
pub fn env_module() -> ModuleInstance {
    let mut env = ModuleInstance::new("env");
    env.add_function(
        "add",
        Function::new_host(
            binary_i32(),
            |_, params, returns| {
                returns[0] = Value::I32(arg_i32(params, 0)?.wrapping_add(arg_i32(params, 1)?));
                Ok(())
            },
            0,
        ),
    );
    env
}

/// `count(n)` spins until its counter reaches `n`, then returns 42
pub fn loop_module() -> AstModule {
    let mut builder = ModuleBuilder::new();
    let count = builder.function(
        FunctionType::new(vec![ValType::I32], vec![ValType::I32]),
        vec![ValType::I32],
        vec![
            Instruction::Loop {
                ty: BlockType::Empty,
                body: vec![
                    Instruction::LocalGet(1),
                    Instruction::I32Const(1),
                    Instruction::I32Add,
                    Instruction::LocalTee(1),
                    Instruction::LocalGet(0),
                    Instruction::I32LtS,
                    Instruction::BrIf(0),
                ],
            },
            Instruction::I32Const(42),
        ],
    );
    builder.export_function("count", count);
    builder.build().unwrap()
}

/// Same as [`loop_module`] but the loop never exits
pub fn spin_module() -> AstModule {
    let mut builder = ModuleBuilder::new();
    let spin = builder.function(
        FunctionType::new(vec![], vec![ValType::I32]),
        vec![],
        vec![
            Instruction::Loop {
                ty: BlockType::Empty,
                body: vec![Instruction::Br(0)],
            },
            Instruction::I32Const(0),
        ],
    );
    builder.export_function("spin", spin);
    builder.build().unwrap()
}
