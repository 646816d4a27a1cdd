//! The executor: instantiation front door and invocation entry points
//!
//! An [`Executor`] is cheap to clone; clones share configuration, statistics
//! and the stop flag. It holds no per-invocation state, so one executor may
//! run many invocations concurrently on different threads.
//!
//! The interpreter recurses on the native stack, so every invocation runs on
//! a worker thread sized from [`Configure::max_wasm_stack`]. Synchronous calls
//! block on that worker; the caller's own stack size never matters.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use super::async_handle::Async;
use super::config::Configure;
use super::function::Function;
use super::instantiate::instantiate;
use super::interpreter::Machine;
use super::module::{ModuleData, ModuleInstance};
use super::statistics::Statistics;
use super::store::Store;
use super::{Completion, RuntimeError, Value};
use crate::ast::module::AstModule;
use crate::ast::types::FunctionType;

#[derive(Clone)]
pub struct Executor {
    config: Arc<Configure>,
    stats: Option<Arc<Statistics>>,
    stop: Arc<AtomicBool>,
    /// Synchronous invocations currently running
    active: Arc<AtomicUsize>,
}

/// Marks one synchronous invocation as running
struct ActiveCall<'a> {
    active: &'a AtomicUsize,
}

impl Drop for ActiveCall<'_> {
    fn drop(&mut self) {
        self.active.fetch_sub(1, Ordering::AcqRel);
    }
}

impl Executor {
    /// Create an executor; `None` selects the default configuration
    pub fn new(config: Option<Configure>, stats: Option<Arc<Statistics>>) -> Self {
        Executor {
            config: Arc::new(config.unwrap_or_default()),
            stats,
            stop: Arc::new(AtomicBool::new(false)),
            active: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn config(&self) -> &Configure {
        &self.config
    }

    /// The attached statistics object, if any
    pub fn statistics(&self) -> Option<&Arc<Statistics>> {
        self.stats.as_ref()
    }

    /// Instantiate `ast` as an anonymous module, resolving imports from `store`
    ///
    /// The result is not linked into `store`.
    pub fn instantiate(&self, store: &Store, ast: &AstModule) -> Result<ModuleInstance, RuntimeError> {
        instantiate(self, store, ast, None)
    }

    /// Instantiate `ast` under `name` and link the result into `store`
    pub fn register(&self, store: &Store, ast: &AstModule, name: &str) -> Result<ModuleInstance, RuntimeError> {
        instantiate(self, store, ast, Some(name))
    }

    /// Link an already built module, typically a host module, into `store`
    pub fn register_import(&self, store: &Store, module: &ModuleInstance) -> Result<(), RuntimeError> {
        store.link(module)
    }

    /// Invoke `func` with `params` and write its results into `returns`
    ///
    /// `params` must match the declared parameter types exactly. `returns` may
    /// be shorter than the declared result arity; surplus results are dropped.
    /// On [`Completion::Terminated`] nothing is written.
    pub fn invoke(&self, func: &Function, params: &[Value], returns: &mut [Value]) -> Result<Completion, RuntimeError> {
        let (completion, results) = self.execute_sync(func, params)?;
        for (slot, value) in returns.iter_mut().zip(results) {
            *slot = value;
        }
        Ok(completion)
    }

    /// Look up the exported function `name` in `module` and invoke it,
    /// returning every result
    pub fn invoke_export(
        &self,
        module: &ModuleData,
        name: &str,
        params: &[Value],
    ) -> Result<(Completion, Vec<Value>), RuntimeError> {
        let func = module.find_function(name).ok_or_else(|| RuntimeError::FuncNotFound(name.to_string()))?;
        self.execute_sync(&func, params)
    }

    /// Run `func` on a background thread and return a handle to the outcome
    pub fn async_invoke(&self, func: &Function, params: &[Value]) -> Result<Async, RuntimeError> {
        check_params(func.ty(), params)?;
        let func = func.arc()?;
        Async::spawn(self.clone(), func, params.to_vec())
    }

    /// Request that synchronous invocations on this executor (and its clones)
    /// stop at their next checkpoint
    ///
    /// A request made while no invocation runs is discarded by the next one.
    /// Background invocations are cancelled through their [`Async`] handle
    /// instead.
    pub fn stop(&self) {
        self.stop.store(true, Ordering::Release);
    }

    /// Only the outermost invocation resets the stop flag, so a host function
    /// re-entering the executor keeps a pending stop alive
    fn enter(&self) -> ActiveCall<'_> {
        if self.active.fetch_add(1, Ordering::AcqRel) == 0 {
            self.stop.store(false, Ordering::Release);
        }
        ActiveCall { active: &self.active }
    }

    /// Run `func` on a sized worker and wait for it
    fn execute_sync(&self, func: &Function, params: &[Value]) -> Result<(Completion, Vec<Value>), RuntimeError> {
        check_params(func.ty(), params)?;
        let _call = self.enter();
        thread::scope(|scope| -> Result<(Completion, Vec<Value>), RuntimeError> {
            let worker = thread::Builder::new()
                .name("wasmbed-invoke".into())
                .stack_size(self.config.worker_stack_size())
                .spawn_scoped(scope, || self.execute(func, params, &self.stop))
                .map_err(|e| RuntimeError::Spawn(e.to_string()))?;
            worker.join().unwrap_or_else(|_| {
                tracing::error!("invocation worker panicked");
                Err(RuntimeError::ExecutionFailed("host function panicked".into()))
            })
        })
    }

    pub(crate) fn execute(
        &self,
        func: &Function,
        params: &[Value],
        cancel: &AtomicBool,
    ) -> Result<(Completion, Vec<Value>), RuntimeError> {
        check_params(func.ty(), params)?;
        let func = func.arc()?;
        let timed = self.config.statistics.time_measuring;
        if let (Some(stats), true) = (&self.stats, timed) {
            stats.start_wasm();
        }
        let result = Machine::new(self, cancel).call(&func, None, params.to_vec());
        if let (Some(stats), true) = (&self.stats, timed) {
            stats.stop_wasm();
        }
        match result {
            Ok(values) => Ok((Completion::Returned, values)),
            Err(RuntimeError::Terminated) => {
                tracing::debug!("execution terminated by host");
                Ok((Completion::Terminated, Vec::new()))
            }
            Err(e) => {
                tracing::error!(error = %e, "invocation failed");
                Err(e)
            }
        }
    }

    /// Run a start function; termination counts as success
    pub(crate) fn run_start(&self, func: &Function) -> Result<(), RuntimeError> {
        self.execute_sync(func, &[]).map(|_| ())
    }
}

fn check_params(ty: &FunctionType, params: &[Value]) -> Result<(), RuntimeError> {
    if params.len() != ty.params_len() {
        return Err(RuntimeError::FuncSigMismatch(format!(
            "expected {} parameters, got {}",
            ty.params_len(),
            params.len()
        )));
    }
    for (idx, (value, expected)) in params.iter().zip(ty.params()).enumerate() {
        if !value.matches(*expected) {
            return Err(RuntimeError::FuncSigMismatch(format!(
                "parameter {idx} has type {}, expected {expected}",
                value.typ()
            )));
        }
    }
    Ok(())
}

impl Default for Executor {
    fn default() -> Self {
        Executor::new(None, None)
    }
}

impl std::fmt::Debug for Executor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Executor")
            .field("config", &self.config)
            .field("statistics", &self.stats.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::types::ValType;
    use crate::runtime::Trap;

    fn add_module() -> ModuleInstance {
        let mut module = ModuleInstance::new("env");
        let ty = FunctionType::new(vec![ValType::I32, ValType::I32], vec![ValType::I32]);
        let add = Function::new_host(
            ty,
            |_, params, returns| {
                let (a, b) = (params[0].as_i32().unwrap_or(0), params[1].as_i32().unwrap_or(0));
                returns[0] = Value::I32(a.wrapping_add(b));
                Ok(())
            },
            0,
        );
        module.add_function("add", add);
        module
    }

    #[test]
    fn invoke_host_function() {
        let executor = Executor::default();
        let module = add_module();
        let add = module.find_function("add").unwrap();
        let mut returns = [Value::I32(0)];
        let completion = executor.invoke(&add, &[Value::I32(3), Value::I32(4)], &mut returns).unwrap();
        assert_eq!(completion, Completion::Returned);
        assert_eq!(returns, [Value::I32(7)]);
    }

    #[test]
    fn short_return_buffer_drops_surplus() {
        let executor = Executor::default();
        let module = add_module();
        let add = module.find_function("add").unwrap();
        let mut returns: [Value; 0] = [];
        assert!(executor.invoke(&add, &[Value::I32(1), Value::I32(1)], &mut returns).is_ok());
    }

    #[test]
    fn parameter_mismatch_is_rejected() {
        let executor = Executor::default();
        let module = add_module();
        let add = module.find_function("add").unwrap();
        let mut returns = [Value::I32(0)];
        assert!(matches!(
            executor.invoke(&add, &[Value::I32(1)], &mut returns),
            Err(RuntimeError::FuncSigMismatch(_))
        ));
        assert!(matches!(
            executor.invoke(&add, &[Value::I32(1), Value::I64(1)], &mut returns),
            Err(RuntimeError::FuncSigMismatch(_))
        ));
    }

    #[test]
    fn host_termination_is_ok() {
        let executor = Executor::default();
        let func = Function::new_host(
            FunctionType::new(vec![], vec![ValType::I32]),
            |_, _, _| Err(RuntimeError::Terminated),
            0,
        );
        let mut returns = [Value::I32(-1)];
        assert_eq!(executor.invoke(&func, &[], &mut returns).unwrap(), Completion::Terminated);
        assert_eq!(returns, [Value::I32(-1)]);
    }

    #[test]
    fn host_error_propagates() {
        let executor = Executor::default();
        let func = Function::new_host(
            FunctionType::new(vec![], vec![]),
            |_, _, _| Err(RuntimeError::Host(7)),
            0,
        );
        assert_eq!(executor.invoke(&func, &[], &mut []), Err(RuntimeError::Host(7)));
    }

    #[test]
    fn host_cost_counts_against_limit() {
        let stats = Arc::new(Statistics::new());
        stats.set_cost_limit(5);
        let executor = Executor::new(None, Some(Arc::clone(&stats)));
        let func = Function::new_host(
            FunctionType::new(vec![], vec![]),
            |_, _, _| Ok(()),
            3,
        );
        executor.invoke(&func, &[], &mut []).unwrap();
        assert_eq!(executor.invoke(&func, &[], &mut []), Err(Trap::CostLimitExceeded.into()));
        assert_eq!(stats.total_cost(), 3);
    }

    #[test]
    fn invoke_export_reports_missing_names() {
        let executor = Executor::default();
        let module = add_module();
        assert_eq!(
            executor.invoke_export(&module, "sub", &[]).unwrap_err(),
            RuntimeError::FuncNotFound("sub".into())
        );
        let (_, values) = executor
            .invoke_export(&module, "add", &[Value::I32(2), Value::I32(5)])
            .unwrap();
        assert_eq!(values, vec![Value::I32(7)]);
    }
}
