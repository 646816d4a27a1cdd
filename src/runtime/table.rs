//! WebAssembly table implementation
//!
//! Tables are typed vectors of references (function refs or external refs) that
//! back indirect calls. Slots always hold a concrete `Value`; an empty slot is
//! the null reference of the table's element type.

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use super::instance::TableInstance;
use super::{RuntimeError, Trap, Value};
use crate::ast::types::{TableType, ValType};

pub struct Table {
    ty: TableType,
    /// Fill value for slots created without an explicit initializer
    default: Value,
    elements: RwLock<Vec<Value>>,
}

impl Table {
    /// Create a table of `ty.limit.min` null references
    pub fn new(ty: TableType) -> Result<TableInstance, RuntimeError> {
        Self::with_init(ty, Value::null(ty.element))
    }

    /// Create a table whose initial and grown slots default to `init`
    pub fn with_init(ty: TableType, init: Value) -> Result<TableInstance, RuntimeError> {
        let limit = ty.limit;
        if limit.has_max && limit.min > limit.max {
            return Err(RuntimeError::Malformed(format!(
                "table minimum {} exceeds maximum {}",
                limit.min, limit.max
            )));
        }
        if limit.min > u32::MAX as u64 {
            return Err(Trap::TableOutOfBounds.into());
        }
        check_element(&ty, &init)?;
        let elements = vec![init.clone(); limit.min as usize];
        Ok(TableInstance::from_arc(Arc::new(Table {
            ty,
            default: init,
            elements: RwLock::new(elements),
        })))
    }

    pub fn ty(&self) -> &TableType {
        &self.ty
    }

    /// Current number of elements
    pub fn size(&self) -> u32 {
        self.elements.read().len() as u32
    }

    /// Get the element at `index`
    pub fn get(&self, index: u32) -> Result<Value, RuntimeError> {
        self.elements
            .read()
            .get(index as usize)
            .cloned()
            .ok_or_else(|| Trap::TableOutOfBounds.into())
    }

    /// Replace the element at `index`, checking it against the element type
    pub fn set(&self, index: u32, value: Value) -> Result<(), RuntimeError> {
        check_element(&self.ty, &value)?;
        let mut elements = self.elements.write();
        let slot = elements.get_mut(index as usize).ok_or(Trap::TableOutOfBounds)?;
        *slot = value;
        Ok(())
    }

    /// Grow by `delta` slots filled with `init`, or with the table's default
    /// value when `init` is `None`, and return the previous size
    ///
    /// Growth beyond the declared maximum fails with `TableOutOfBounds` and
    /// leaves the table unchanged.
    pub fn grow(&self, delta: u32, init: Option<Value>) -> Result<u32, RuntimeError> {
        let fill = match init {
            Some(value) => {
                check_element(&self.ty, &value)?;
                value
            }
            None => self.default.clone(),
        };
        let mut elements = self.elements.write();
        let old = elements.len() as u32;
        let max = self.ty.limit.max().unwrap_or(u32::MAX as u64);
        let new_size = old
            .checked_add(delta)
            .filter(|size| (*size as u64) <= max)
            .ok_or(Trap::TableOutOfBounds)?;
        elements
            .try_reserve_exact(delta as usize)
            .map_err(|_| RuntimeError::from(Trap::TableOutOfBounds))?;
        elements.resize(new_size as usize, fill);
        Ok(old)
    }

    /// Write `items` starting at `offset`; nothing is written when the range
    /// does not fit
    pub(crate) fn init(&self, offset: u32, items: &[Value]) -> Result<(), RuntimeError> {
        let mut elements = self.elements.write();
        let start = offset as usize;
        let end = start
            .checked_add(items.len())
            .filter(|end| *end <= elements.len())
            .ok_or(RuntimeError::ElementSegmentDoesNotFit)?;
        for item in items {
            check_element(&self.ty, item)?;
        }
        elements[start..end].clone_from_slice(items);
        Ok(())
    }
}

fn check_element(ty: &TableType, value: &Value) -> Result<(), RuntimeError> {
    if value.matches(ValType::Ref(ty.element)) {
        Ok(())
    } else {
        Err(RuntimeError::type_mismatch(ty.element, value.typ()))
    }
}

impl fmt::Debug for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Table")
            .field("ty", &self.ty)
            .field("size", &self.size())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::types::{Limit, RefType};

    fn funcref_table(min: u64, max: Option<u64>) -> TableInstance {
        Table::new(TableType::new(RefType::FUNCREF, Limit::new(min, max))).unwrap()
    }

    #[test]
    fn test_table_creation() {
        assert_eq!(funcref_table(10, Some(20)).size(), 10);
        let table = Table::new(TableType::new(RefType::EXTERNREF, Limit::new(5, None))).unwrap();
        assert_eq!(table.size(), 5);
        assert_eq!(table.get(4).unwrap(), Value::ExternRef(None));
    }

    #[test]
    fn test_table_get_set() {
        let table = Table::new(TableType::new(RefType::EXTERNREF, Limit::new(2, None))).unwrap();
        table.set(0, Value::extern_ref(42)).unwrap();
        assert_eq!(table.get(0).unwrap(), Value::extern_ref(42));
        table.set(0, Value::ExternRef(None)).unwrap();
        assert!(table.get(0).unwrap().is_null());
    }

    #[test]
    fn test_table_bounds() {
        let table = funcref_table(10, Some(20));
        assert_eq!(table.get(10), Err(Trap::TableOutOfBounds.into()));
        assert_eq!(table.set(10, Value::FuncRef(None)), Err(Trap::TableOutOfBounds.into()));
    }

    #[test]
    fn grow_fills_with_null_by_default() {
        let table = funcref_table(1, Some(4));
        assert_eq!(table.grow(2, None).unwrap(), 1);
        assert_eq!(table.size(), 3);
        assert!(table.get(1).unwrap().is_null());
        assert!(table.get(2).unwrap().is_null());
    }

    #[test]
    fn grow_fills_with_declared_default() {
        let ty = TableType::new(RefType::EXTERNREF, Limit::new(1, None));
        let table = Table::with_init(ty, Value::extern_ref(7)).unwrap();
        assert_eq!(table.get(0).unwrap(), Value::extern_ref(7));
        table.grow(3, None).unwrap();
        for idx in 1..4 {
            assert_eq!(table.get(idx).unwrap(), Value::extern_ref(7));
        }
        table.grow(1, Some(Value::extern_ref(9))).unwrap();
        assert_eq!(table.get(4).unwrap(), Value::extern_ref(9));
    }

    #[test]
    fn test_table_grow_failure() {
        let table = funcref_table(10, Some(20));
        assert_eq!(table.grow(11, None), Err(Trap::TableOutOfBounds.into()));
        assert_eq!(table.size(), 10);
    }

    #[test]
    fn test_table_type_validation() {
        let table = funcref_table(10, Some(20));
        assert!(matches!(table.set(0, Value::I32(42)), Err(RuntimeError::TypeMismatch { .. })));
        assert!(matches!(
            table.grow(1, Some(Value::extern_ref(1))),
            Err(RuntimeError::TypeMismatch { .. })
        ));
        assert_eq!(table.size(), 10);
    }

    #[test]
    fn init_is_all_or_nothing() {
        let table = Table::new(TableType::new(RefType::EXTERNREF, Limit::new(3, None))).unwrap();
        let items = vec![Value::extern_ref(1), Value::extern_ref(2)];
        assert_eq!(table.init(2, &items), Err(RuntimeError::ElementSegmentDoesNotFit));
        assert!(table.get(2).unwrap().is_null());
        table.init(1, &items).unwrap();
        assert_eq!(table.get(2).unwrap(), Value::extern_ref(2));
    }
}
