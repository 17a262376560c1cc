//! Append-only record of faults seen across transfers
//!
//! Cloning an [`ErrorAccumulator`] shares the same underlying list, so
//! concurrent transfers can record into one place for the final report.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// A recorded fault and when it happened relative to accumulator creation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedError {
    pub elapsed: Duration,
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct ErrorAccumulator {
    started: Instant,
    errors: Arc<Mutex<Vec<RecordedError>>>,
}

impl ErrorAccumulator {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            errors: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Record an error
    pub fn add(&self, error: &impl std::fmt::Display) {
        let entry = RecordedError {
            elapsed: self.started.elapsed(),
            message: error.to_string(),
        };
        // A poisoned lock still holds valid entries
        let mut errors = self.errors.lock().unwrap_or_else(|e| e.into_inner());
        errors.push(entry);
    }

    /// Snapshot of everything recorded so far, oldest first
    pub fn errors(&self) -> Vec<RecordedError> {
        self.errors
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn is_empty(&self) -> bool {
        self.errors
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .is_empty()
    }

    /// One-line summary suitable for a final error message
    pub fn summary(&self) -> String {
        let errors = self.errors();
        if errors.is_empty() {
            return String::new();
        }
        let parts: Vec<String> = errors
            .iter()
            .map(|e| format!("{} ({:.2}s elapsed)", e.message, e.elapsed.as_secs_f64()))
            .collect();
        parts.join("; ")
    }
}

impl Default for ErrorAccumulator {
    fn default() -> Self {
        Self::new()
    }
}
