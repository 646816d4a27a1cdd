//! Integration tests for the WASI host module

mod common;

use std::io::Cursor;
use std::sync::{Arc, Mutex};

use common::{init_tracing, CapturedWriter};
use wasmbed::ast::{ConstExpr, ExternalKind, FunctionType, Instruction, Limit, MemoryType, ModuleBuilder, ValType};
use wasmbed::runtime::wasi::{create_wasi_module, create_wasi_module_with, wasi_exit_code, WasiContext, WasiErrno};
use wasmbed::runtime::{Completion, Executor, ModuleInstance, Store, Value};

/// Guest that re-exports the WASI function `name` as `call`, plus its memory
///
/// `data` is placed at the start of memory.
fn forwarder(
    executor: &Executor,
    store: &Store,
    name: &str,
    params: Vec<ValType>,
    results: Vec<ValType>,
    data: &[u8],
) -> ModuleInstance {
    let ty = FunctionType::new(params.clone(), results);
    let mut builder = ModuleBuilder::new();
    let import = builder.import_function("wasi_snapshot_preview1", name, ty.clone());
    builder.memory(MemoryType::new(Limit::new(1, None)));
    let mut body: Vec<Instruction> = (0..params.len() as u32).map(Instruction::LocalGet).collect();
    body.push(Instruction::Call(import));
    let call = builder.function(ty, vec![], body);
    builder
        .export_function("call", call)
        .export("memory", ExternalKind::Memory, 0)
        .data(0, ConstExpr::I32(0), data.to_vec());
    executor.register(store, &builder.build().unwrap(), "guest").unwrap()
}

fn errno(results: &[Value]) -> u32 {
    results[0].as_i32().unwrap() as u32
}

#[test]
fn fd_write_reaches_the_configured_stdout() {
    init_tracing();
    let stdout = Arc::new(Mutex::new(Vec::<u8>::new()));
    let ctx = WasiContext::builder()
        .args(["hello.wasm"])
        .stdout(Box::new(CapturedWriter(Arc::clone(&stdout))))
        .build();
    let store = Store::new();
    let executor = Executor::default();
    let wasi = create_wasi_module_with(ctx);
    executor.register_import(&store, &wasi).unwrap();

    // iovec {ptr: 16, len: 17} at 0, the text at 16
    let mut data = vec![16, 0, 0, 0, 17, 0, 0, 0];
    data.resize(16, 0);
    data.extend_from_slice(b"Hello from WASI!\n");
    let guest = forwarder(
        &executor,
        &store,
        "fd_write",
        vec![ValType::I32; 4],
        vec![ValType::I32],
        &data,
    );

    let params = [Value::I32(1), Value::I32(0), Value::I32(1), Value::I32(100)];
    let (_, results) = executor.invoke_export(&guest, "call", &params).unwrap();
    assert_eq!(errno(&results), WasiErrno::Success.as_u32());
    assert_eq!(stdout.lock().unwrap().as_slice(), b"Hello from WASI!\n");

    let memory = guest.find_memory("memory").unwrap();
    assert_eq!(memory.read_u32(100).unwrap(), 17);

    // fd 0 is not writable
    let params = [Value::I32(0), Value::I32(0), Value::I32(1), Value::I32(100)];
    let (_, results) = executor.invoke_export(&guest, "call", &params).unwrap();
    assert_eq!(errno(&results), WasiErrno::BadF.as_u32());
}

#[test]
fn fd_read_drains_stdin() {
    let ctx = WasiContext::builder()
        .stdin(Box::new(Cursor::new(b"ping".to_vec())))
        .build();
    let store = Store::new();
    let executor = Executor::default();
    let wasi = create_wasi_module_with(ctx);
    executor.register_import(&store, &wasi).unwrap();

    // iovec {ptr: 32, len: 8}
    let guest = forwarder(
        &executor,
        &store,
        "fd_read",
        vec![ValType::I32; 4],
        vec![ValType::I32],
        &[32, 0, 0, 0, 8, 0, 0, 0],
    );
    let params = [Value::I32(0), Value::I32(0), Value::I32(1), Value::I32(64)];
    let (_, results) = executor.invoke_export(&guest, "call", &params).unwrap();
    assert_eq!(errno(&results), 0);

    let memory = guest.find_memory("memory").unwrap();
    assert_eq!(memory.read_u32(64).unwrap(), 4);
    assert_eq!(memory.get_data(32, 4).unwrap(), b"ping");
}

#[test]
fn arguments_are_copied_into_guest_memory() {
    let store = Store::new();
    let executor = Executor::default();
    let wasi = create_wasi_module(&["prog", "-v"], &["HOME=/"], &[]);
    executor.register_import(&store, &wasi).unwrap();

    let mut builder = ModuleBuilder::new();
    let binary = FunctionType::new(vec![ValType::I32, ValType::I32], vec![ValType::I32]);
    let sizes = builder.import_function("wasi_snapshot_preview1", "args_sizes_get", binary.clone());
    let get = builder.import_function("wasi_snapshot_preview1", "args_get", binary.clone());
    builder.memory(MemoryType::new(Limit::new(1, None)));
    // sizes at 0 and 4, pointers at 16, strings at 64
    let run = builder.function(
        FunctionType::new(vec![], vec![ValType::I32]),
        vec![],
        vec![
            Instruction::I32Const(0),
            Instruction::I32Const(4),
            Instruction::Call(sizes),
            Instruction::Drop,
            Instruction::I32Const(16),
            Instruction::I32Const(64),
            Instruction::Call(get),
        ],
    );
    builder
        .export_function("run", run)
        .export("memory", ExternalKind::Memory, 0);
    let guest = executor.register(&store, &builder.build().unwrap(), "guest").unwrap();

    let (_, results) = executor.invoke_export(&guest, "run", &[]).unwrap();
    assert_eq!(errno(&results), 0);
    let memory = guest.find_memory("memory").unwrap();
    assert_eq!(memory.read_u32(0).unwrap(), 2);
    assert_eq!(memory.read_u32(4).unwrap(), 8);
    assert_eq!(memory.read_u32(16).unwrap(), 64);
    assert_eq!(memory.read_u32(20).unwrap(), 69);
    assert_eq!(memory.get_data(64, 8).unwrap(), b"prog\0-v\0");
}

#[test]
fn proc_exit_terminates_and_records_the_code() {
    init_tracing();
    let store = Store::new();
    let executor = Executor::default();
    let wasi = create_wasi_module(&[], &[], &[]);
    executor.register_import(&store, &wasi).unwrap();

    let mut builder = ModuleBuilder::new();
    let exit = builder.import_function(
        "wasi_snapshot_preview1",
        "proc_exit",
        FunctionType::new(vec![ValType::I32], vec![]),
    );
    let start = builder.function(
        FunctionType::new(vec![], vec![]),
        vec![],
        vec![Instruction::I32Const(3), Instruction::Call(exit), Instruction::Unreachable],
    );
    builder.export_function("_start", start);
    let guest = executor.register(&store, &builder.build().unwrap(), "app").unwrap();

    assert_eq!(wasi_exit_code(&wasi), None);
    let done = executor
        .invoke(&guest.find_function("_start").unwrap(), &[], &mut [])
        .unwrap();
    assert_eq!(done, Completion::Terminated);
    assert_eq!(wasi_exit_code(&wasi), Some(3));
    assert_eq!(wasi_exit_code(&guest), None);
}

#[test]
fn random_get_fills_the_buffer() {
    let store = Store::new();
    let executor = Executor::default();
    let wasi = create_wasi_module(&[], &[], &[]);
    executor.register_import(&store, &wasi).unwrap();
    let guest = forwarder(
        &executor,
        &store,
        "random_get",
        vec![ValType::I32; 2],
        vec![ValType::I32],
        &[],
    );

    let (_, results) = executor
        .invoke_export(&guest, "call", &[Value::I32(0), Value::I32(32)])
        .unwrap();
    assert_eq!(errno(&results), 0);
    let memory = guest.find_memory("memory").unwrap();
    assert!(memory.get_data(0, 32).unwrap().iter().any(|b| *b != 0));

    let (_, results) = executor
        .invoke_export(&guest, "call", &[Value::I32(65530), Value::I32(32)])
        .unwrap();
    assert_eq!(errno(&results), WasiErrno::Fault.as_u32());
}

#[test]
fn clock_time_get_reports_time() {
    let store = Store::new();
    let executor = Executor::default();
    let wasi = create_wasi_module(&[], &[], &[]);
    executor.register_import(&store, &wasi).unwrap();
    let guest = forwarder(
        &executor,
        &store,
        "clock_time_get",
        vec![ValType::I32, ValType::I64, ValType::I32],
        vec![ValType::I32],
        &[],
    );

    let (_, results) = executor
        .invoke_export(&guest, "call", &[Value::I32(0), Value::I64(1), Value::I32(8)])
        .unwrap();
    assert_eq!(errno(&results), 0);
    let memory = guest.find_memory("memory").unwrap();
    // later than 2020-01-01
    assert!(memory.read_u64(8).unwrap() > 1_577_836_800_000_000_000);

    let (_, results) = executor
        .invoke_export(&guest, "call", &[Value::I32(9), Value::I64(1), Value::I32(8)])
        .unwrap();
    assert_eq!(errno(&results), WasiErrno::Inval.as_u32());
}

#[test]
fn preopened_directories_are_described() {
    let store = Store::new();
    let executor = Executor::default();
    let wasi = create_wasi_module(&[], &[], &["/sandbox"]);
    executor.register_import(&store, &wasi).unwrap();
    let guest = forwarder(
        &executor,
        &store,
        "fd_prestat_get",
        vec![ValType::I32; 2],
        vec![ValType::I32],
        &[],
    );

    let (_, results) = executor
        .invoke_export(&guest, "call", &[Value::I32(3), Value::I32(0)])
        .unwrap();
    assert_eq!(errno(&results), 0);
    let memory = guest.find_memory("memory").unwrap();
    assert_eq!(memory.read_u8(0).unwrap(), 0);
    assert_eq!(memory.read_u32(4).unwrap(), "/sandbox".len() as u32);

    let (_, results) = executor
        .invoke_export(&guest, "call", &[Value::I32(4), Value::I32(0)])
        .unwrap();
    assert_eq!(errno(&results), WasiErrno::BadF.as_u32());
}
