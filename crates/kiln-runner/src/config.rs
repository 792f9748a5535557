//! Executor limits.

use std::time::Duration;

use kiln_codegen::types::{DEFAULT_GAS_LIMIT, MAX_MEMORY_PAGES};
use serde::{Deserialize, Serialize};

/// Default wall-clock budget for one execution.
pub const DEFAULT_DEADLINE: Duration = Duration::from_secs(5);

/// Resource limits applied to every execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Wall-clock budget, checked by `rt.deadline` and bounding `time.sleep`.
    pub deadline: Duration,
    /// Interpreter fuel; `None` disables fuel metering.
    pub fuel: Option<u64>,
    /// Gas ticks allowed (function entries plus loop iterations).
    pub gas_limit: u32,
    /// Linear-memory cap in 64 KiB pages.
    pub max_memory_pages: u32,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            deadline: DEFAULT_DEADLINE,
            fuel: None,
            gas_limit: DEFAULT_GAS_LIMIT,
            max_memory_pages: MAX_MEMORY_PAGES as u32,
        }
    }
}

impl ExecutorConfig {
    pub fn deadline_ms(&self) -> u64 {
        self.deadline.as_millis() as u64
    }

    pub fn max_memory_bytes(&self) -> usize {
        self.max_memory_pages as usize * 65_536
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ExecutorConfig::default();
        assert_eq!(config.deadline_ms(), 5_000);
        assert_eq!(config.fuel, None);
        assert_eq!(config.gas_limit, DEFAULT_GAS_LIMIT);
        assert_eq!(config.max_memory_bytes(), 256 * 1024 * 1024);
    }
}
