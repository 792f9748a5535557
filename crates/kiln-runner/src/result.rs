//! The structured verdict of one run.

use serde::{Deserialize, Serialize};

/// What the caller gets back, serialized as
/// `{"timeTaken", "output", "isSuccess", "memory"}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionResult {
    /// Milliseconds spent executing; `-1` when the run failed.
    pub time_taken: i64,
    /// Captured standard output, or the failure message.
    pub output: String,
    pub is_success: bool,
    /// Resident memory growth in MiB, when it could be sampled.
    pub memory: Option<f64>,
}

impl ExecutionResult {
    pub fn success(output: String, time_taken: i64) -> Self {
        Self {
            time_taken,
            output,
            is_success: true,
            memory: None,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            time_taken: -1,
            output: message.into(),
            is_success: false,
            memory: Some(-1.0),
        }
    }

    pub fn with_memory(mut self, memory: Option<f64>) -> Self {
        self.memory = memory;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serializes_camel_case() {
        let json = serde_json::to_value(ExecutionResult::success("hi".into(), 3)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "timeTaken": 3,
                "output": "hi",
                "isSuccess": true,
                "memory": null,
            })
        );
    }

    #[test]
    fn test_failure_shape() {
        let result = ExecutionResult::failure("No entry point found.");
        assert!(!result.is_success);
        assert_eq!(result.time_taken, -1);
        assert_eq!(result.memory, Some(-1.0));
        assert_eq!(result.output, "No entry point found.");
    }
}
