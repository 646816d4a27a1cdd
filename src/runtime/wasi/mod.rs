//! WASI (WebAssembly System Interface) preview1 host module
//!
//! [`create_wasi_module`] builds a host [`ModuleInstance`] named
//! `wasi_snapshot_preview1` that can be linked into a store like any other
//! import module. Its functions work on the memory of whichever module calls
//! them, reached through the [`CallingFrame`].
//!
//! # Usage
//!
//! ```ignore
//! use wasmbed::runtime::wasi::{create_wasi_module, wasi_exit_code};
//!
//! let wasi = create_wasi_module(&["prog", "arg1"], &["HOME=/"], &["/sandbox"]);
//! executor.register_import(&store, &wasi)?;
//! let app = executor.register(&store, &ast, "app")?;
//! executor.invoke(&app.find_function("_start").unwrap(), &[], &mut [])?;
//! println!("exit code: {:?}", wasi_exit_code(&wasi));
//! ```
//!
//! See: <https://github.com/WebAssembly/WASI/blob/wasi-0.1/preview1/docs.md>

pub mod context;
pub mod types;

pub use context::{FileDescriptor, WasiContext, WasiContextBuilder};
pub use types::{ClockId, WasiErrno};

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use rand::RngCore;

use crate::ast::types::{FunctionType, ValType};
use crate::runtime::{CallingFrame, Function, MemoryRef, ModuleData, ModuleInstance, RuntimeError, Value, WrapFn};

/// Import module name used by preview1 guests
pub const WASI_MODULE_NAME: &str = "wasi_snapshot_preview1";

/// Create the WASI module over the host process's standard streams
pub fn create_wasi_module(args: &[&str], envs: &[&str], preopens: &[&str]) -> ModuleInstance {
    let ctx = WasiContext::builder()
        .args(args.iter().copied())
        .envs(envs.iter().copied())
        .preopens(preopens.iter().copied())
        .inherit_stdio()
        .build();
    create_wasi_module_with(ctx)
}

/// Create the WASI module over a caller-built context
pub fn create_wasi_module_with(ctx: WasiContext) -> ModuleInstance {
    let ctx = Arc::new(ctx);
    let mut module = ModuleInstance::with_data(WASI_MODULE_NAME, Arc::clone(&ctx), None::<fn(Arc<WasiContext>)>);

    use ValType::{I32, I64};
    let functions: [(&str, Vec<ValType>, Vec<ValType>, WrapFn<WasiContext>); 12] = [
        ("args_sizes_get", vec![I32, I32], vec![I32], args_sizes_get),
        ("args_get", vec![I32, I32], vec![I32], args_get),
        ("environ_sizes_get", vec![I32, I32], vec![I32], environ_sizes_get),
        ("environ_get", vec![I32, I32], vec![I32], environ_get),
        ("fd_write", vec![I32, I32, I32, I32], vec![I32], fd_write),
        ("fd_read", vec![I32, I32, I32, I32], vec![I32], fd_read),
        ("fd_close", vec![I32], vec![I32], fd_close),
        ("fd_prestat_get", vec![I32, I32], vec![I32], fd_prestat_get),
        ("fd_prestat_dir_name", vec![I32, I32, I32], vec![I32], fd_prestat_dir_name),
        ("clock_time_get", vec![I32, I64, I32], vec![I32], clock_time_get),
        ("random_get", vec![I32, I32], vec![I32], random_get),
        ("proc_exit", vec![I32], vec![], proc_exit),
    ];
    for (name, params, results, func) in functions {
        let ty = FunctionType::new(params, results);
        module.add_function(name, Function::wrap(ty, Arc::clone(&ctx), func, 0));
    }
    tracing::debug!(module = WASI_MODULE_NAME, args = ctx.args().len(), "created WASI module");
    module
}

/// Exit code recorded by `proc_exit`, if `module` is a WASI module and the
/// guest called it
pub fn wasi_exit_code(module: &ModuleData) -> Option<u32> {
    module.host_data::<Arc<WasiContext>>()?.exit_code()
}

// === helpers ===

/// Store the errno of `outcome` as the single i32 result
fn reply(returns: &mut [Value], outcome: Result<(), WasiErrno>) -> Result<(), RuntimeError> {
    let errno = outcome.err().unwrap_or(WasiErrno::Success);
    if errno != WasiErrno::Success {
        tracing::trace!(?errno, "WASI call failed");
    }
    if let Some(slot) = returns.first_mut() {
        *slot = Value::I32(errno.as_u32() as i32);
    }
    Ok(())
}

fn guest_memory<'f>(frame: &'f CallingFrame<'_>) -> Result<MemoryRef<'f>, WasiErrno> {
    frame.memory(0).ok_or(WasiErrno::Fault)
}

fn arg_u32(params: &[Value], idx: usize) -> Result<u32, WasiErrno> {
    params
        .get(idx)
        .and_then(Value::as_i32)
        .map(|v| v as u32)
        .ok_or(WasiErrno::Inval)
}

fn put_u32(memory: &MemoryRef<'_>, addr: u32, value: u32) -> Result<(), WasiErrno> {
    memory.write_u32(addr as u64, value).map_err(|_| WasiErrno::Fault)
}

fn put_bytes(memory: &MemoryRef<'_>, addr: u32, bytes: &[u8]) -> Result<(), WasiErrno> {
    memory.set_data(bytes, addr as u64).map_err(|_| WasiErrno::Fault)
}

/// Count and total NUL-terminated size of a string list
fn list_sizes(frame: &CallingFrame<'_>, params: &[Value], list: &[String]) -> Result<(), WasiErrno> {
    let count_ptr = arg_u32(params, 0)?;
    let size_ptr = arg_u32(params, 1)?;
    let memory = guest_memory(frame)?;
    let size: usize = list.iter().map(|s| s.len() + 1).sum();
    put_u32(&memory, count_ptr, list.len() as u32)?;
    put_u32(&memory, size_ptr, u32::try_from(size).map_err(|_| WasiErrno::Overflow)?)
}

/// Write a pointer array plus the NUL-terminated strings it points at
fn list_get(frame: &CallingFrame<'_>, params: &[Value], list: &[String]) -> Result<(), WasiErrno> {
    let ptrs = arg_u32(params, 0)?;
    let buf = arg_u32(params, 1)?;
    let memory = guest_memory(frame)?;
    let mut offset = buf;
    for (i, entry) in list.iter().enumerate() {
        put_u32(&memory, ptrs.wrapping_add(i as u32 * 4), offset)?;
        let mut bytes = entry.as_bytes().to_vec();
        bytes.push(0);
        put_bytes(&memory, offset, &bytes)?;
        offset = offset.wrapping_add(bytes.len() as u32);
    }
    Ok(())
}

// === WASI functions ===

fn args_sizes_get(ctx: &WasiContext, frame: &CallingFrame<'_>, params: &[Value], returns: &mut [Value]) -> Result<(), RuntimeError> {
    reply(returns, list_sizes(frame, params, ctx.args()))
}

fn args_get(ctx: &WasiContext, frame: &CallingFrame<'_>, params: &[Value], returns: &mut [Value]) -> Result<(), RuntimeError> {
    reply(returns, list_get(frame, params, ctx.args()))
}

fn environ_sizes_get(ctx: &WasiContext, frame: &CallingFrame<'_>, params: &[Value], returns: &mut [Value]) -> Result<(), RuntimeError> {
    reply(returns, list_sizes(frame, params, ctx.envs()))
}

fn environ_get(ctx: &WasiContext, frame: &CallingFrame<'_>, params: &[Value], returns: &mut [Value]) -> Result<(), RuntimeError> {
    reply(returns, list_get(frame, params, ctx.envs()))
}

/// fd_write(fd, iovs, iovs_len, nwritten) -> errno
fn fd_write(ctx: &WasiContext, frame: &CallingFrame<'_>, params: &[Value], returns: &mut [Value]) -> Result<(), RuntimeError> {
    let outcome = (|| {
        let memory = guest_memory(frame)?;
        let written = ctx.fd_write(&memory, arg_u32(params, 0)?, arg_u32(params, 1)?, arg_u32(params, 2)?)?;
        put_u32(&memory, arg_u32(params, 3)?, written as u32)
    })();
    reply(returns, outcome)
}

/// fd_read(fd, iovs, iovs_len, nread) -> errno
fn fd_read(ctx: &WasiContext, frame: &CallingFrame<'_>, params: &[Value], returns: &mut [Value]) -> Result<(), RuntimeError> {
    let outcome = (|| {
        let memory = guest_memory(frame)?;
        let read = ctx.fd_read(&memory, arg_u32(params, 0)?, arg_u32(params, 1)?, arg_u32(params, 2)?)?;
        put_u32(&memory, arg_u32(params, 3)?, read as u32)
    })();
    reply(returns, outcome)
}

fn fd_close(ctx: &WasiContext, _frame: &CallingFrame<'_>, params: &[Value], returns: &mut [Value]) -> Result<(), RuntimeError> {
    reply(returns, arg_u32(params, 0).and_then(|fd| ctx.close_fd(fd)))
}

/// fd_prestat_get(fd, buf) -> errno; `buf` receives {u8 tag, u32 name_len}
fn fd_prestat_get(ctx: &WasiContext, frame: &CallingFrame<'_>, params: &[Value], returns: &mut [Value]) -> Result<(), RuntimeError> {
    let outcome = (|| {
        let path = ctx.preopen(arg_u32(params, 0)?).ok_or(WasiErrno::BadF)?;
        let buf = arg_u32(params, 1)?;
        let memory = guest_memory(frame)?;
        put_u32(&memory, buf, types::PREOPENTYPE_DIR as u32)?;
        put_u32(&memory, buf.wrapping_add(4), path.len() as u32)
    })();
    reply(returns, outcome)
}

fn fd_prestat_dir_name(ctx: &WasiContext, frame: &CallingFrame<'_>, params: &[Value], returns: &mut [Value]) -> Result<(), RuntimeError> {
    let outcome = (|| {
        let path = ctx.preopen(arg_u32(params, 0)?).ok_or(WasiErrno::BadF)?;
        let (ptr, len) = (arg_u32(params, 1)?, arg_u32(params, 2)?);
        if path.len() > len as usize {
            return Err(WasiErrno::Overflow);
        }
        put_bytes(&guest_memory(frame)?, ptr, path.as_bytes())
    })();
    reply(returns, outcome)
}

/// clock_time_get(id, precision, time) -> errno; the precision is ignored
fn clock_time_get(ctx: &WasiContext, frame: &CallingFrame<'_>, params: &[Value], returns: &mut [Value]) -> Result<(), RuntimeError> {
    let outcome = (|| {
        let nanos = match ClockId::try_from(arg_u32(params, 0)?)? {
            ClockId::Realtime => SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map_err(|_| WasiErrno::Io)?
                .as_nanos() as u64,
            ClockId::Monotonic | ClockId::ProcessCpuTime | ClockId::ThreadCpuTime => ctx.uptime_nanos(),
        };
        let memory = guest_memory(frame)?;
        memory
            .write_u64(arg_u32(params, 2)? as u64, nanos)
            .map_err(|_| WasiErrno::Fault)
    })();
    reply(returns, outcome)
}

fn random_get(_ctx: &WasiContext, frame: &CallingFrame<'_>, params: &[Value], returns: &mut [Value]) -> Result<(), RuntimeError> {
    let outcome = (|| {
        let (buf, len) = (arg_u32(params, 0)?, arg_u32(params, 1)?);
        let memory = guest_memory(frame)?;
        let mut bytes = vec![0u8; len as usize];
        rand::thread_rng().fill_bytes(&mut bytes);
        put_bytes(&memory, buf, &bytes)
    })();
    reply(returns, outcome)
}

/// proc_exit(code): records the code and ends the invocation
fn proc_exit(ctx: &WasiContext, _frame: &CallingFrame<'_>, params: &[Value], _returns: &mut [Value]) -> Result<(), RuntimeError> {
    let code = params.first().and_then(Value::as_i32).unwrap_or_default() as u32;
    tracing::debug!(code, "proc_exit");
    ctx.set_exit_code(code);
    Err(RuntimeError::Terminated)
}
