//! Rolling operation timings for diagnostics.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use crate::models::{Operation, OperationTimings};

#[derive(Debug, Default, Clone, Copy)]
struct OpStats {
    count: u64,
    total_ms: u64,
    min_ms: u64,
    max_ms: u64,
}

/// Records per-operation durations.  Process-wide; guarded internally.
#[derive(Default)]
pub struct StatsRecorder {
    inner: Mutex<HashMap<Operation, OpStats>>,
}

impl StatsRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, operation: Operation, elapsed: Duration) {
        let ms = elapsed.as_millis() as u64;
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let entry = inner.entry(operation).or_default();
        entry.count += 1;
        entry.total_ms += ms;
        entry.max_ms = entry.max_ms.max(ms);
        entry.min_ms = if entry.count == 1 {
            ms
        } else {
            entry.min_ms.min(ms)
        };
    }

    pub fn snapshot(&self) -> Vec<OperationTimings> {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let mut timings: Vec<OperationTimings> = inner
            .iter()
            .map(|(operation, s)| OperationTimings {
                operation: *operation,
                count: s.count,
                min_ms: s.min_ms,
                max_ms: s.max_ms,
                mean_ms: if s.count == 0 {
                    0.0
                } else {
                    s.total_ms as f64 / s.count as f64
                },
            })
            .collect();
        timings.sort_by_key(|t| t.operation);
        timings
    }
}
