//! Owning and borrowed handles to runtime instances
//!
//! Runtime objects (functions, tables, memories, globals, tags) are shared
//! between the module that allocated them, importing modules and running
//! code, so the storage is reference counted. Ownership is still explicit at
//! the API surface:
//!
//! - [`InstanceHandle`] is what a constructor returns. It is not `Clone`; moving
//!   it into a [`ModuleInstance`](super::ModuleInstance) with one of the `add_*`
//!   methods transfers ownership exactly once.
//! - [`InstanceRef`] is what lookups return. Its lifetime is tied to the module
//!   (or store, or calling frame) it was found through.

use std::fmt;
use std::marker::PhantomData;
use std::ops::Deref;
use std::sync::Arc;

use super::function::Function;
use super::global::Global;
use super::memory::Memory;
use super::table::Table;
use super::tag::Tag;

/// Uniquely owned runtime instance that has not been added to a module yet
pub struct InstanceHandle<T> {
    inner: Arc<T>,
}

impl<T> InstanceHandle<T> {
    pub(crate) fn from_arc(inner: Arc<T>) -> Self {
        InstanceHandle { inner }
    }

    pub(crate) fn into_arc(self) -> Arc<T> {
        self.inner
    }

    pub(crate) fn arc(&self) -> &Arc<T> {
        &self.inner
    }

    /// Borrow this instance for as long as the handle lives
    pub fn view(&self) -> InstanceRef<'_, T> {
        InstanceRef::new(Arc::clone(&self.inner))
    }
}

impl<T> Deref for InstanceHandle<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.inner
    }
}

impl<T: fmt::Debug> fmt::Debug for InstanceHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.inner.fmt(f)
    }
}

/// Borrowed view of an instance owned elsewhere
pub struct InstanceRef<'a, T> {
    inner: Arc<T>,
    _owner: PhantomData<&'a T>,
}

impl<'a, T> InstanceRef<'a, T> {
    pub(crate) fn new(inner: Arc<T>) -> Self {
        InstanceRef {
            inner,
            _owner: PhantomData,
        }
    }

    pub(crate) fn arc(&self) -> &Arc<T> {
        &self.inner
    }

    /// Whether two views refer to the same underlying instance
    pub fn same(&self, other: &T) -> bool {
        std::ptr::eq(Arc::as_ptr(&self.inner), other)
    }
}

impl<T> Clone for InstanceRef<'_, T> {
    fn clone(&self) -> Self {
        InstanceRef::new(Arc::clone(&self.inner))
    }
}

impl<T> Deref for InstanceRef<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.inner
    }
}

impl<T: fmt::Debug> fmt::Debug for InstanceRef<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.inner.fmt(f)
    }
}

pub type FunctionInstance = InstanceHandle<Function>;
pub type TableInstance = InstanceHandle<Table>;
pub type MemoryInstance = InstanceHandle<Memory>;
pub type GlobalInstance = InstanceHandle<Global>;
pub type TagInstance = InstanceHandle<Tag>;

pub type FunctionRef<'a> = InstanceRef<'a, Function>;
pub type TableRef<'a> = InstanceRef<'a, Table>;
pub type MemoryRef<'a> = InstanceRef<'a, Memory>;
pub type GlobalRef<'a> = InstanceRef<'a, Global>;
pub type TagRef<'a> = InstanceRef<'a, Tag>;
