//! Execution statistics: instruction counting, cost metering and timing
//!
//! One `Statistics` object may be attached to several executors through an
//! `Arc`; all counters are updated atomically.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::{Mutex, RwLock};

/// Number of entries in a cost table, one per (possibly prefixed) opcode
pub const COST_TABLE_SIZE: usize = 1 << 16;

#[derive(Debug, Default)]
struct Timers {
    wasm: Duration,
    host: Duration,
    wasm_started: Option<Instant>,
    host_started: Option<Instant>,
}

#[derive(Debug)]
pub struct Statistics {
    cost_table: RwLock<Vec<u64>>,
    instr_count: AtomicU64,
    cost_limit: AtomicU64,
    cost_sum: AtomicU64,
    timers: Mutex<Timers>,
}

impl Default for Statistics {
    fn default() -> Self {
        Statistics {
            cost_table: RwLock::new(vec![1; COST_TABLE_SIZE]),
            instr_count: AtomicU64::new(0),
            cost_limit: AtomicU64::new(u64::MAX),
            cost_sum: AtomicU64::new(0),
            timers: Mutex::new(Timers::default()),
        }
    }
}

impl Statistics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite the leading entries of the cost table; the rest stay at 1
    pub fn set_cost_table(&self, costs: &[u64]) {
        let mut table = self.cost_table.write();
        table.iter_mut().for_each(|cost| *cost = 1);
        let len = costs.len().min(COST_TABLE_SIZE);
        table[..len].copy_from_slice(&costs[..len]);
    }

    pub(crate) fn instr_cost(&self, opcode: u16) -> u64 {
        self.cost_table.read()[opcode as usize]
    }

    pub fn set_cost_limit(&self, limit: u64) {
        self.cost_limit.store(limit, Ordering::SeqCst);
    }

    pub fn cost_limit(&self) -> u64 {
        self.cost_limit.load(Ordering::SeqCst)
    }

    /// Add `cost` to the running total
    ///
    /// Returns `false`, leaving the total untouched, when the new total would
    /// exceed the limit.
    pub fn add_cost(&self, cost: u64) -> bool {
        let limit = self.cost_limit();
        let result = self.cost_sum.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |sum| {
            sum.checked_add(cost).filter(|total| *total <= limit)
        });
        if result.is_err() {
            tracing::warn!(limit, cost, "cost limit exceeded");
        }
        result.is_ok()
    }

    /// Subtract `cost` from the running total, saturating at zero
    pub fn sub_cost(&self, cost: u64) {
        let _ = self
            .cost_sum
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |sum| Some(sum.saturating_sub(cost)));
    }

    pub fn total_cost(&self) -> u64 {
        self.cost_sum.load(Ordering::SeqCst)
    }

    pub fn inc_instr_count(&self) {
        self.instr_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn instr_count(&self) -> u64 {
        self.instr_count.load(Ordering::Relaxed)
    }

    /// Instructions per second of wasm execution time; zero before any timing
    pub fn instr_per_second(&self) -> f64 {
        let secs = self.wasm_exec_time().as_secs_f64();
        if secs == 0.0 {
            0.0
        } else {
            self.instr_count() as f64 / secs
        }
    }

    pub fn start_wasm(&self) {
        self.timers.lock().wasm_started.get_or_insert_with(Instant::now);
    }

    pub fn stop_wasm(&self) {
        let mut timers = self.timers.lock();
        if let Some(started) = timers.wasm_started.take() {
            timers.wasm += started.elapsed();
        }
    }

    pub fn start_host(&self) {
        self.timers.lock().host_started.get_or_insert_with(Instant::now);
    }

    pub fn stop_host(&self) {
        let mut timers = self.timers.lock();
        if let Some(started) = timers.host_started.take() {
            timers.host += started.elapsed();
        }
    }

    pub fn wasm_exec_time(&self) -> Duration {
        self.timers.lock().wasm
    }

    pub fn host_exec_time(&self) -> Duration {
        self.timers.lock().host
    }

    pub fn total_exec_time(&self) -> Duration {
        let timers = self.timers.lock();
        timers.wasm + timers.host
    }

    /// Reset counters, the cost total and timers; the cost table and limit are kept
    pub fn clear(&self) {
        self.instr_count.store(0, Ordering::SeqCst);
        self.cost_sum.store(0, Ordering::SeqCst);
        *self.timers.lock() = Timers::default();
    }

    pub fn dump(&self) {
        tracing::info!(
            instructions = self.instr_count(),
            instr_per_second = self.instr_per_second(),
            total_cost = self.total_cost(),
            cost_limit = self.cost_limit(),
            wasm_time_us = self.wasm_exec_time().as_micros() as u64,
            host_time_us = self.host_exec_time().as_micros() as u64,
            "execution statistics"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn cost_table_prefix_overrides_defaults() {
        let stats = Statistics::new();
        stats.set_cost_table(&[5, 6, 7]);
        assert_eq!(stats.instr_cost(0), 5);
        assert_eq!(stats.instr_cost(2), 7);
        assert_eq!(stats.instr_cost(3), 1);
        assert_eq!(stats.instr_cost(0xfc10), 1);
        stats.set_cost_table(&[9]);
        assert_eq!(stats.instr_cost(1), 1);
    }

    #[test]
    fn add_cost_stops_at_limit() {
        let stats = Statistics::new();
        stats.set_cost_limit(10);
        assert!(stats.add_cost(6));
        assert!(stats.add_cost(4));
        assert!(!stats.add_cost(1));
        assert_eq!(stats.total_cost(), 10);
        stats.sub_cost(3);
        assert!(stats.add_cost(2));
        assert_eq!(stats.total_cost(), 9);
    }

    #[test]
    fn add_cost_does_not_wrap() {
        let stats = Statistics::new();
        assert!(stats.add_cost(u64::MAX));
        assert!(!stats.add_cost(1));
        assert_eq!(stats.total_cost(), u64::MAX);
    }

    #[test]
    fn clear_keeps_table_and_limit() {
        let stats = Statistics::new();
        stats.set_cost_table(&[3]);
        stats.set_cost_limit(100);
        stats.inc_instr_count();
        stats.add_cost(50);
        stats.clear();
        assert_eq!(stats.instr_count(), 0);
        assert_eq!(stats.total_cost(), 0);
        assert_eq!(stats.cost_limit(), 100);
        assert_eq!(stats.instr_cost(0), 3);
    }

    #[test]
    fn timers_accumulate() {
        let stats = Statistics::new();
        stats.start_wasm();
        std::thread::sleep(Duration::from_millis(2));
        stats.stop_wasm();
        stats.start_host();
        stats.stop_host();
        assert!(stats.wasm_exec_time() >= Duration::from_millis(2));
        assert_eq!(stats.total_exec_time(), stats.wasm_exec_time() + stats.host_exec_time());
        stats.inc_instr_count();
        assert!(stats.instr_per_second() > 0.0);
    }

    #[test]
    fn concurrent_cost_never_exceeds_limit() {
        let stats = Arc::new(Statistics::new());
        stats.set_cost_limit(1000);
        let workers: Vec<_> = (0..4)
            .map(|_| {
                let stats = Arc::clone(&stats);
                std::thread::spawn(move || (0..500).filter(|_| stats.add_cost(1)).count())
            })
            .collect();
        let accepted: usize = workers.into_iter().map(|w| w.join().unwrap()).sum();
        assert_eq!(accepted, 1000);
        assert_eq!(stats.total_cost(), 1000);
    }
}
