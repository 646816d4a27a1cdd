//! Engine configuration
//!
//! ```json
//! {
//!   "interruptible": true,
//!   "max_call_depth": 512,
//!   "statistics": { "time_measuring": false }
//! }
//! ```
//!
//! Every field is optional; missing fields take their defaults and unknown
//! fields are rejected.

use std::path::Path;

use serde::{Deserialize, Serialize};

use super::memory::MAX_PAGES;
use super::RuntimeError;

/// Native stack the interpreter may use for one invocation
pub const DEFAULT_MAX_WASM_STACK: usize = 8 * 1024 * 1024;

/// Smallest accepted `max_wasm_stack`
const MIN_WASM_STACK: usize = 64 * 1024;

/// Which counters an attached [`Statistics`](super::Statistics) object collects
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StatisticsConfig {
    pub instruction_counting: bool,
    pub cost_measuring: bool,
    pub time_measuring: bool,
}

impl Default for StatisticsConfig {
    fn default() -> Self {
        StatisticsConfig {
            instruction_counting: true,
            cost_measuring: true,
            time_measuring: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Configure {
    /// Also poll the cancellation flag before entering compiled code;
    /// interpreted code is always interruptible
    pub interruptible: bool,
    pub max_call_depth: usize,
    /// Bytes of native stack the interpreter may grow by before trapping with
    /// `CallStackExhausted`; invocations run on workers with twice this
    pub max_wasm_stack: usize,
    /// Upper bound on any memory's page count, below the declared maximum
    pub max_memory_pages: u64,
    pub statistics: StatisticsConfig,
}

impl Default for Configure {
    fn default() -> Self {
        Configure {
            interruptible: false,
            max_call_depth: 1024,
            max_wasm_stack: DEFAULT_MAX_WASM_STACK,
            max_memory_pages: MAX_PAGES,
            statistics: StatisticsConfig::default(),
        }
    }
}

impl Configure {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json_str(json: &str) -> Result<Self, RuntimeError> {
        let config: Configure = serde_json::from_str(json).map_err(|e| RuntimeError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: &Path) -> Result<Self, RuntimeError> {
        let json = std::fs::read_to_string(path).map_err(|e| RuntimeError::Config(format!("{}: {e}", path.display())))?;
        Self::from_json_str(&json)
    }

    pub fn to_json(&self) -> Result<String, RuntimeError> {
        serde_json::to_string_pretty(self).map_err(|e| RuntimeError::Config(e.to_string()))
    }

    fn validate(&self) -> Result<(), RuntimeError> {
        if self.max_call_depth == 0 {
            return Err(RuntimeError::Config("max_call_depth must be positive".to_string()));
        }
        if self.max_wasm_stack < MIN_WASM_STACK {
            return Err(RuntimeError::Config(format!(
                "max_wasm_stack must be at least {MIN_WASM_STACK} bytes"
            )));
        }
        if self.max_memory_pages > MAX_PAGES {
            return Err(RuntimeError::Config(format!(
                "max_memory_pages {} exceeds {MAX_PAGES}",
                self.max_memory_pages
            )));
        }
        Ok(())
    }

    pub fn with_interruptible(mut self, interruptible: bool) -> Self {
        self.interruptible = interruptible;
        self
    }

    pub fn with_max_call_depth(mut self, depth: usize) -> Self {
        self.max_call_depth = depth;
        self
    }

    pub fn with_max_wasm_stack(mut self, bytes: usize) -> Self {
        self.max_wasm_stack = bytes;
        self
    }

    /// Stack size of the threads invocations run on
    pub(crate) fn worker_stack_size(&self) -> usize {
        self.max_wasm_stack.saturating_mul(2)
    }

    pub fn with_max_memory_pages(mut self, pages: u64) -> Self {
        self.max_memory_pages = pages;
        self
    }

    pub fn with_statistics(mut self, statistics: StatisticsConfig) -> Self {
        self.statistics = statistics;
        self
    }
}
