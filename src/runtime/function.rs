//! Function instances and the host-function contract

use std::fmt;
use std::sync::{Arc, Weak};

use once_cell::sync::OnceCell;

use super::calling_frame::CallingFrame;
use super::instance::FunctionInstance;
use super::module::ModuleData;
use super::{FuncAddr, RuntimeError, Value};
use crate::ast::module::FunctionBody;
use crate::ast::types::FunctionType;

/// A native callable exposed to guest code
///
/// `params` always has the declared parameter arity. `returns` has the
/// declared result arity and arrives filled with zero values; a successful
/// call must overwrite every slot with a value of the declared type.
///
/// Returning `Err(RuntimeError::Host(code))` reports a user-level failure;
/// `Err(RuntimeError::Terminated)` stops the whole invocation with an OK
/// outcome.
pub trait HostFunction: Send + Sync {
    fn call(&self, frame: &CallingFrame<'_>, params: &[Value], returns: &mut [Value]) -> Result<(), RuntimeError>;
}

impl<F> HostFunction for F
where
    F: Fn(&CallingFrame<'_>, &[Value], &mut [Value]) -> Result<(), RuntimeError> + Send + Sync,
{
    fn call(&self, frame: &CallingFrame<'_>, params: &[Value], returns: &mut [Value]) -> Result<(), RuntimeError> {
        self(frame, params, returns)
    }
}

/// Signature of the bridging form: an opaque receiver plus explicit slices
pub type WrapFn<T> = fn(&T, &CallingFrame<'_>, &[Value], &mut [Value]) -> Result<(), RuntimeError>;

/// Adapter that binds a plain function pointer to an opaque receiver
pub struct Wrapped<T> {
    target: Arc<T>,
    func: WrapFn<T>,
}

impl<T: Send + Sync> HostFunction for Wrapped<T> {
    fn call(&self, frame: &CallingFrame<'_>, params: &[Value], returns: &mut [Value]) -> Result<(), RuntimeError> {
        (self.func)(&self.target, frame, params, returns)
    }
}

/// Native code standing in for the functions a module defines
///
/// Ahead-of-time compilation is external; an [`AstModule`](crate::ast::AstModule)
/// carrying a `CompiledCode` dispatches its defined functions here instead of to
/// the interpreter.
pub trait CompiledCode: Send + Sync {
    /// Entry point for the `index`-th defined function (imports not counted)
    fn entry(&self, index: u32) -> Option<Arc<dyn HostFunction>>;
}

pub(crate) enum FunctionKind {
    Wasm(Arc<FunctionBody>),
    Compiled(Arc<dyn HostFunction>),
    Host { func: Arc<dyn HostFunction>, cost: u64 },
}

pub struct Function {
    ty: FunctionType,
    pub(crate) kind: FunctionKind,
    self_ref: Weak<Function>,
    owner: OnceCell<Weak<ModuleData>>,
}

impl Function {
    fn build(ty: FunctionType, kind: FunctionKind, owner: Option<Weak<ModuleData>>) -> Arc<Function> {
        Arc::new_cyclic(|self_ref| {
            let cell = OnceCell::new();
            if let Some(owner) = owner {
                let _ = cell.set(owner);
            }
            Function {
                ty,
                kind,
                self_ref: self_ref.clone(),
                owner: cell,
            }
        })
    }

    /// Host function from a closure; `cost` is charged per call when metering
    pub fn new_host<F>(ty: FunctionType, func: F, cost: u64) -> FunctionInstance
    where
        F: Fn(&CallingFrame<'_>, &[Value], &mut [Value]) -> Result<(), RuntimeError> + Send + Sync + 'static,
    {
        Self::from_host(ty, Arc::new(func), cost)
    }

    /// Host function from any [`HostFunction`] implementation
    pub fn from_host(ty: FunctionType, func: Arc<dyn HostFunction>, cost: u64) -> FunctionInstance {
        FunctionInstance::from_arc(Self::build(ty, FunctionKind::Host { func, cost }, None))
    }

    /// Host function bound to an opaque receiver
    pub fn wrap<T: Send + Sync + 'static>(ty: FunctionType, target: Arc<T>, func: WrapFn<T>, cost: u64) -> FunctionInstance {
        Self::from_host(ty, Arc::new(Wrapped { target, func }), cost)
    }

    pub(crate) fn new_wasm(ty: FunctionType, body: Arc<FunctionBody>, owner: Weak<ModuleData>) -> Arc<Function> {
        Self::build(ty, FunctionKind::Wasm(body), Some(owner))
    }

    pub(crate) fn new_compiled(ty: FunctionType, entry: Arc<dyn HostFunction>, owner: Weak<ModuleData>) -> Arc<Function> {
        Self::build(ty, FunctionKind::Compiled(entry), Some(owner))
    }

    pub fn ty(&self) -> &FunctionType {
        &self.ty
    }

    pub fn is_host(&self) -> bool {
        matches!(self.kind, FunctionKind::Host { .. })
    }

    /// Metering cost of a host function; zero for module-defined code
    pub fn cost(&self) -> u64 {
        match self.kind {
            FunctionKind::Host { cost, .. } => cost,
            _ => 0,
        }
    }

    pub fn addr(&self) -> FuncAddr {
        FuncAddr::from_weak(self.self_ref.clone())
    }

    pub(crate) fn arc(&self) -> Result<Arc<Function>, RuntimeError> {
        self.self_ref.upgrade().ok_or(RuntimeError::WrongInstanceAddress)
    }

    pub(crate) fn set_owner(&self, owner: Weak<ModuleData>) {
        let _ = self.owner.set(owner);
    }

    /// Module this function belongs to, if it was added to one that is alive
    pub(crate) fn owner(&self) -> Option<Arc<ModuleData>> {
        self.owner.get().and_then(Weak::upgrade)
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.kind {
            FunctionKind::Wasm(_) => "wasm",
            FunctionKind::Compiled(_) => "compiled",
            FunctionKind::Host { .. } => "host",
        };
        f.debug_struct("Function")
            .field("ty", &self.ty)
            .field("kind", &kind)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::types::ValType;

    #[test]
    fn host_function_reports_signature_and_cost() {
        let ty = FunctionType::new(vec![ValType::I32], vec![ValType::I32]);
        let func = Function::new_host(
            ty.clone(),
            |_, params, returns| {
                returns[0] = params[0].clone();
                Ok(())
            },
            12,
        );
        assert_eq!(func.ty(), &ty);
        assert!(func.is_host());
        assert_eq!(func.cost(), 12);
        assert!(func.owner().is_none());
    }

    struct Counter {
        base: i32,
    }

    fn add_base(target: &Counter, _: &CallingFrame<'_>, params: &[Value], returns: &mut [Value]) -> Result<(), RuntimeError> {
        let v = params[0].as_i32().ok_or_else(|| RuntimeError::type_mismatch("i32", params[0].typ()))?;
        returns[0] = Value::I32(v + target.base);
        Ok(())
    }

    #[test]
    fn wrapped_receiver_is_shared() {
        let target = Arc::new(Counter { base: 10 });
        let ty = FunctionType::new(vec![ValType::I32], vec![ValType::I32]);
        let func = Function::wrap(ty, Arc::clone(&target), add_base, 0);
        assert_eq!(Arc::strong_count(&target), 2);
        drop(func);
        assert_eq!(Arc::strong_count(&target), 1);
    }
}
