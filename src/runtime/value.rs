//! WebAssembly value representation

use std::fmt;
use std::sync::{Arc, Weak};

use fhex::ToHex;

use super::function::Function;
use crate::ast::types::{HeapType, RefType, ValType};

/// Non-owning reference to a function instance
///
/// Holding a `FuncAddr` never keeps the function alive. Once the owning module
/// instance is dropped, [`FuncAddr::upgrade`] returns `None`.
#[derive(Clone)]
pub struct FuncAddr(Weak<Function>);

impl FuncAddr {
    pub(crate) fn new(func: &Arc<Function>) -> Self {
        FuncAddr(Arc::downgrade(func))
    }

    pub(crate) fn from_weak(weak: Weak<Function>) -> Self {
        FuncAddr(weak)
    }

    pub fn upgrade(&self) -> Option<Arc<Function>> {
        self.0.upgrade()
    }

    pub fn is_alive(&self) -> bool {
        self.0.strong_count() > 0
    }
}

impl PartialEq for FuncAddr {
    fn eq(&self, other: &Self) -> bool {
        Weak::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for FuncAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FuncAddr({:p})", self.0.as_ptr())
    }
}

/// Embedder-supplied opaque reference; the engine never dereferences it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExternAddr(pub usize);

/// Runtime representation of WebAssembly values
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
    V128(u128),
    FuncRef(Option<FuncAddr>),
    ExternRef(Option<ExternAddr>),
}

impl Value {
    /// Zero value of a type; references default to null
    pub fn default_for(ty: ValType) -> Self {
        match ty {
            ValType::I32 => Value::I32(0),
            ValType::I64 => Value::I64(0),
            ValType::F32 => Value::F32(0.0),
            ValType::F64 => Value::F64(0.0),
            ValType::V128 => Value::V128(0),
            ValType::Ref(r) => Value::null(r),
        }
    }

    pub fn null(ty: RefType) -> Self {
        match ty.heap {
            HeapType::Func => Value::FuncRef(None),
            HeapType::Extern => Value::ExternRef(None),
        }
    }

    pub fn func_ref(func: &Function) -> Self {
        Value::FuncRef(Some(func.addr()))
    }

    pub fn extern_ref(ptr: usize) -> Self {
        Value::ExternRef(Some(ExternAddr(ptr)))
    }

    /// Get the WebAssembly type of this value
    ///
    /// References always report their nullable type.
    pub fn typ(&self) -> ValType {
        match self {
            Value::I32(_) => ValType::I32,
            Value::I64(_) => ValType::I64,
            Value::F32(_) => ValType::F32,
            Value::F64(_) => ValType::F64,
            Value::V128(_) => ValType::V128,
            Value::FuncRef(_) => ValType::FUNCREF,
            Value::ExternRef(_) => ValType::EXTERNREF,
        }
    }

    /// Whether this value may be stored where `ty` is expected
    pub fn matches(&self, ty: ValType) -> bool {
        match (self, ty) {
            (Value::FuncRef(r), ValType::Ref(rt)) if rt.heap == HeapType::Func => rt.nullable || r.is_some(),
            (Value::ExternRef(r), ValType::Ref(rt)) if rt.heap == HeapType::Extern => rt.nullable || r.is_some(),
            _ => self.typ() == ty,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::FuncRef(None) | Value::ExternRef(None))
    }

    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Value::I32(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::I64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f32(&self) -> Option<f32> {
        match self {
            Value::F32(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::F64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_v128(&self) -> Option<u128> {
        match self {
            Value::V128(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_func_ref(&self) -> Option<&FuncAddr> {
        match self {
            Value::FuncRef(r) => r.as_ref(),
            _ => None,
        }
    }

    pub fn as_extern_ref(&self) -> Option<ExternAddr> {
        match self {
            Value::ExternRef(r) => *r,
            _ => None,
        }
    }

    /// Raw 128-bit payload of a numeric or vector value
    pub fn to_bits(&self) -> Option<u128> {
        match self {
            Value::I32(v) => Some(*v as u32 as u128),
            Value::I64(v) => Some(*v as u64 as u128),
            Value::F32(v) => Some(v.to_bits() as u128),
            Value::F64(v) => Some(v.to_bits() as u128),
            Value::V128(v) => Some(*v),
            Value::FuncRef(_) | Value::ExternRef(_) => None,
        }
    }

    /// Rebuild a numeric or vector value from its payload; the payload is
    /// truncated to the width of `ty`
    pub fn from_bits(ty: ValType, bits: u128) -> Option<Self> {
        Some(match ty {
            ValType::I32 => Value::I32(bits as u32 as i32),
            ValType::I64 => Value::I64(bits as u64 as i64),
            ValType::F32 => Value::F32(f32::from_bits(bits as u32)),
            ValType::F64 => Value::F64(f64::from_bits(bits as u64)),
            ValType::V128 => Value::V128(bits),
            ValType::Ref(_) => return None,
        })
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::I32(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::I64(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::F32(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::F64(v)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::I32(v) => write!(f, "i32:{v}"),
            Value::I64(v) => write!(f, "i64:{v}"),
            Value::F32(v) => write!(f, "f32:{}", v.to_hex()),
            Value::F64(v) => write!(f, "f64:{}", v.to_hex()),
            Value::V128(v) => write!(f, "v128:{v:#034x}"),
            Value::FuncRef(None) => write!(f, "funcref:null"),
            Value::FuncRef(Some(addr)) => write!(f, "funcref:{:p}", addr.0.as_ptr()),
            Value::ExternRef(None) => write!(f, "externref:null"),
            Value::ExternRef(Some(addr)) => write!(f, "externref:{:#x}", addr.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::types::FunctionType;

    #[test]
    fn test_value_type() {
        assert_eq!(Value::I32(42).typ(), ValType::I32);
        assert_eq!(Value::I64(42).typ(), ValType::I64);
        assert_eq!(Value::F32(42.0).typ(), ValType::F32);
        assert_eq!(Value::F64(42.0).typ(), ValType::F64);
        assert_eq!(Value::V128(1).typ(), ValType::V128);
        assert_eq!(Value::FuncRef(None).typ(), ValType::FUNCREF);
        assert_eq!(Value::extern_ref(8).typ(), ValType::EXTERNREF);
    }

    #[test]
    fn test_value_conversions() {
        assert_eq!(Value::I32(42).as_i32(), Some(42));
        assert_eq!(Value::I32(42).as_i64(), None);
        assert_eq!(Value::I64(42).as_i64(), Some(42));
        assert_eq!(Value::F32(42.0).as_f32(), Some(42.0));
        assert_eq!(Value::F64(42.0).as_f64(), Some(42.0));
        assert_eq!(Value::extern_ref(0x10).as_extern_ref(), Some(ExternAddr(0x10)));
    }

    #[test]
    fn payload_bits() {
        assert_eq!(Value::I32(-1).to_bits(), Some(0xffff_ffff));
        assert_eq!(Value::from_bits(ValType::I32, 0x1_0000_0005), Some(Value::I32(5)));
        assert_eq!(Value::from_bits(ValType::F64, 1.5f64.to_bits() as u128), Some(Value::F64(1.5)));
        assert_eq!(Value::FuncRef(None).to_bits(), None);
        assert_eq!(Value::from_bits(ValType::FUNCREF, 0), None);
    }

    #[test]
    fn non_null_refs_reject_null() {
        let non_null = ValType::Ref(RefType::non_null(HeapType::Extern));
        assert!(!Value::ExternRef(None).matches(non_null));
        assert!(Value::extern_ref(1).matches(non_null));
        assert!(Value::ExternRef(None).matches(ValType::EXTERNREF));
        assert!(!Value::FuncRef(None).matches(ValType::EXTERNREF));
    }

    #[test]
    fn func_ref_does_not_own_the_function() {
        let func = Function::new_host(FunctionType::new(vec![], vec![]), |_, _, _| Ok(()), 0);
        let value = Value::func_ref(&func);
        assert!(value.as_func_ref().unwrap().is_alive());
        assert_eq!(value, Value::func_ref(&func));
        drop(func);
        assert!(!value.as_func_ref().unwrap().is_alive());
        assert!(value.as_func_ref().unwrap().upgrade().is_none());
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", Value::I32(42)), "i32:42");
        assert_eq!(format!("{}", Value::I64(42)), "i64:42");
        assert_eq!(format!("{}", Value::ExternRef(None)), "externref:null");
        let f32_str = format!("{}", Value::F32(42.0));
        assert!(f32_str.starts_with("f32:"));
    }
}
