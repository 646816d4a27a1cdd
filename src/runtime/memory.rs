//! WebAssembly linear memory implementation
//!
//! Memory layout:
//! - Page size: 64KiB (65,536 bytes)
//! - Address space: 32-bit (at most 65,536 pages)
//! - Every access is bounds-checked; an out-of-bounds access traps
//!
//! The byte buffer sits behind a lock so a memory exported by one module and
//! imported by others can be shared across threads. The lock only makes each
//! individual access atomic; guest-level ordering between threads is the
//! guest's business.

use std::fmt;
use std::sync::Arc;

use byteorder::{ByteOrder, LittleEndian};
use parking_lot::RwLock;

use super::instance::MemoryInstance;
use super::{RuntimeError, Trap};
use crate::ast::types::MemoryType;

/// WebAssembly page size in bytes (64KiB)
pub const PAGE_SIZE: usize = 65536;

/// Maximum number of pages for 32-bit addressing
pub const MAX_PAGES: u64 = 65536;

pub struct Memory {
    ty: MemoryType,
    /// Hard page cap: the declared max, the engine cap, whichever is lower
    page_cap: u64,
    data: RwLock<Vec<u8>>,
}

impl Memory {
    /// Allocate a zero-filled memory of `ty.limit.min` pages
    pub fn new(ty: MemoryType) -> Result<MemoryInstance, RuntimeError> {
        Self::with_page_cap(ty, MAX_PAGES)
    }

    /// Like [`Memory::new`] with an additional engine-wide page cap
    pub fn with_page_cap(ty: MemoryType, cap: u64) -> Result<MemoryInstance, RuntimeError> {
        let limit = ty.limit;
        let cap = limit.max().unwrap_or(MAX_PAGES).min(cap).min(MAX_PAGES);
        if limit.has_max && limit.min > limit.max {
            return Err(RuntimeError::Malformed(format!(
                "memory minimum {} exceeds maximum {}",
                limit.min, limit.max
            )));
        }
        if limit.min > cap {
            return Err(Trap::MemoryOutOfBounds.into());
        }
        let bytes = limit.min as usize * PAGE_SIZE;
        let mut data = Vec::new();
        data.try_reserve_exact(bytes)
            .map_err(|_| RuntimeError::from(Trap::MemoryOutOfBounds))?;
        data.resize(bytes, 0);
        Ok(MemoryInstance::from_arc(Arc::new(Memory {
            ty,
            page_cap: cap,
            data: RwLock::new(data),
        })))
    }

    /// The declared type; `limit.min` is the size at allocation
    pub fn ty(&self) -> &MemoryType {
        &self.ty
    }

    /// Current size in pages
    pub fn page_size(&self) -> u64 {
        (self.data.read().len() / PAGE_SIZE) as u64
    }

    pub fn byte_len(&self) -> usize {
        self.data.read().len()
    }

    /// Grow by `delta` pages and return the previous size in pages
    ///
    /// Growth beyond the declared maximum (or the 32-bit page cap when there is
    /// none) fails with `MemoryOutOfBounds` and leaves the size unchanged. The
    /// buffer may move: any slice obtained earlier through
    /// [`Memory::with_data`] is necessarily gone by now.
    pub fn grow_page(&self, delta: u64) -> Result<u64, RuntimeError> {
        let mut data = self.data.write();
        let current = (data.len() / PAGE_SIZE) as u64;
        let new_pages = current
            .checked_add(delta)
            .filter(|pages| *pages <= self.page_cap)
            .ok_or(Trap::MemoryOutOfBounds)?;
        let new_bytes = new_pages as usize * PAGE_SIZE;
        let additional = new_bytes - data.len();
        data.try_reserve_exact(additional)
            .map_err(|_| RuntimeError::from(Trap::MemoryOutOfBounds))?;
        data.resize(new_bytes, 0);
        Ok(current)
    }

    /// Validate an access of `size` bytes at `addr` against a buffer of `len`
    #[inline]
    fn check_bounds(len: usize, addr: u64, size: usize) -> Result<usize, RuntimeError> {
        let start = usize::try_from(addr).map_err(|_| Trap::MemoryOutOfBounds)?;
        let end = start.checked_add(size).ok_or(Trap::MemoryOutOfBounds)?;
        if end > len {
            return Err(Trap::MemoryOutOfBounds.into());
        }
        Ok(start)
    }

    /// Copy `len` bytes starting at `offset` out of the memory
    pub fn get_data(&self, offset: u64, len: usize) -> Result<Vec<u8>, RuntimeError> {
        let data = self.data.read();
        let start = Self::check_bounds(data.len(), offset, len)?;
        Ok(data[start..start + len].to_vec())
    }

    /// Copy `bytes` into the memory at `offset`
    pub fn set_data(&self, bytes: &[u8], offset: u64) -> Result<(), RuntimeError> {
        let mut data = self.data.write();
        let start = Self::check_bounds(data.len(), offset, bytes.len())?;
        data[start..start + bytes.len()].copy_from_slice(bytes);
        Ok(())
    }

    /// Run `f` over the whole buffer while holding a read lock
    pub fn with_data<R>(&self, f: impl FnOnce(&[u8]) -> R) -> R {
        f(&self.data.read())
    }

    /// Run `f` over the whole buffer while holding a write lock
    pub fn with_data_mut<R>(&self, f: impl FnOnce(&mut [u8]) -> R) -> R {
        f(&mut self.data.write())
    }

    fn read_with<const N: usize, T>(&self, addr: u64, decode: impl FnOnce(&[u8]) -> T) -> Result<T, RuntimeError> {
        let data = self.data.read();
        let start = Self::check_bounds(data.len(), addr, N)?;
        Ok(decode(&data[start..start + N]))
    }

    fn write_with<const N: usize>(&self, addr: u64, encode: impl FnOnce(&mut [u8])) -> Result<(), RuntimeError> {
        let mut data = self.data.write();
        let start = Self::check_bounds(data.len(), addr, N)?;
        encode(&mut data[start..start + N]);
        Ok(())
    }

    pub fn read_u8(&self, addr: u64) -> Result<u8, RuntimeError> {
        self.read_with::<1, _>(addr, |b| b[0])
    }

    pub fn read_u16(&self, addr: u64) -> Result<u16, RuntimeError> {
        self.read_with::<2, _>(addr, LittleEndian::read_u16)
    }

    pub fn read_u32(&self, addr: u64) -> Result<u32, RuntimeError> {
        self.read_with::<4, _>(addr, LittleEndian::read_u32)
    }

    pub fn read_u64(&self, addr: u64) -> Result<u64, RuntimeError> {
        self.read_with::<8, _>(addr, LittleEndian::read_u64)
    }

    pub fn read_f32(&self, addr: u64) -> Result<f32, RuntimeError> {
        self.read_with::<4, _>(addr, LittleEndian::read_f32)
    }

    pub fn read_f64(&self, addr: u64) -> Result<f64, RuntimeError> {
        self.read_with::<8, _>(addr, LittleEndian::read_f64)
    }

    pub fn write_u8(&self, addr: u64, value: u8) -> Result<(), RuntimeError> {
        self.write_with::<1>(addr, |b| b[0] = value)
    }

    pub fn write_u16(&self, addr: u64, value: u16) -> Result<(), RuntimeError> {
        self.write_with::<2>(addr, |b| LittleEndian::write_u16(b, value))
    }

    pub fn write_u32(&self, addr: u64, value: u32) -> Result<(), RuntimeError> {
        self.write_with::<4>(addr, |b| LittleEndian::write_u32(b, value))
    }

    pub fn write_u64(&self, addr: u64, value: u64) -> Result<(), RuntimeError> {
        self.write_with::<8>(addr, |b| LittleEndian::write_u64(b, value))
    }

    pub fn write_f32(&self, addr: u64, value: f32) -> Result<(), RuntimeError> {
        self.write_with::<4>(addr, |b| LittleEndian::write_f32(b, value))
    }

    pub fn write_f64(&self, addr: u64, value: f64) -> Result<(), RuntimeError> {
        self.write_with::<8>(addr, |b| LittleEndian::write_f64(b, value))
    }
}

impl fmt::Debug for Memory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Memory")
            .field("ty", &self.ty)
            .field("pages", &self.page_size())
            .field("page_cap", &self.page_cap)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::types::Limit;
    use rand::Rng;

    fn memory(min: u64, max: Option<u64>) -> MemoryInstance {
        Memory::new(MemoryType::new(Limit::new(min, max))).unwrap()
    }

    #[test]
    fn new_memory_is_zeroed() {
        let mem = memory(1, None);
        assert_eq!(mem.page_size(), 1);
        assert_eq!(mem.byte_len(), PAGE_SIZE);
        assert!(mem.with_data(|d| d.iter().all(|b| *b == 0)));
    }

    #[test]
    fn test_read_write_little_endian() {
        let mem = memory(1, Some(1));
        mem.write_u32(0, 0x1234_5678).unwrap();
        assert_eq!(mem.get_data(0, 4).unwrap(), vec![0x78, 0x56, 0x34, 0x12]);
        assert_eq!(mem.read_u16(0).unwrap(), 0x5678);
        mem.write_f64(8, 1.5).unwrap();
        assert_eq!(mem.read_f64(8).unwrap(), 1.5);
        mem.write_u64(16, u64::MAX - 1).unwrap();
        assert_eq!(mem.read_u64(16).unwrap(), u64::MAX - 1);
    }

    #[test]
    fn test_out_of_bounds_access() {
        let mem = memory(1, None);
        let last = PAGE_SIZE as u64 - 4;
        assert!(mem.write_u32(last, 1).is_ok());
        assert_eq!(mem.read_u32(last + 1), Err(Trap::MemoryOutOfBounds.into()));
        assert_eq!(mem.read_u8(u64::MAX), Err(Trap::MemoryOutOfBounds.into()));
        assert_eq!(mem.set_data(&[1, 2], PAGE_SIZE as u64 - 1), Err(Trap::MemoryOutOfBounds.into()));
    }

    #[test]
    fn grow_within_max() {
        let mem = memory(1, Some(3));
        assert_eq!(mem.grow_page(2).unwrap(), 1);
        assert_eq!(mem.page_size(), 3);
        assert_eq!(mem.grow_page(1), Err(Trap::MemoryOutOfBounds.into()));
        assert_eq!(mem.page_size(), 3);
        assert_eq!(mem.grow_page(0).unwrap(), 3);
    }

    #[test]
    fn grow_keeps_contents_and_zeroes_new_pages() {
        let mem = memory(1, None);
        mem.write_u8(10, 0xaa).unwrap();
        mem.grow_page(1).unwrap();
        assert_eq!(mem.read_u8(10).unwrap(), 0xaa);
        assert_eq!(mem.read_u8(PAGE_SIZE as u64 + 10).unwrap(), 0);
    }

    #[test]
    fn randomized_growth_bound() {
        let mut rng = rand::thread_rng();
        for _ in 0..16 {
            let min = rng.gen_range(0..4u64);
            let max = min + rng.gen_range(0..4u64);
            let mem = memory(min, Some(max));
            let delta = rng.gen_range(0..6u64);
            let result = mem.grow_page(delta);
            if min + delta <= max {
                assert_eq!(result, Ok(min));
                assert_eq!(mem.page_size(), min + delta);
            } else {
                assert!(result.is_err());
                assert_eq!(mem.page_size(), min);
            }
        }
    }

    #[test]
    fn engine_cap_applies_below_declared_max() {
        let mem = Memory::with_page_cap(MemoryType::new(Limit::new(1, Some(10))), 2).unwrap();
        assert!(mem.grow_page(1).is_ok());
        assert!(mem.grow_page(1).is_err());
        assert!(Memory::with_page_cap(MemoryType::new(Limit::new(3, None)), 2).is_err());
    }
}
