//! Progress hooks for the acquisition loop.
//!
//! The loop reports one unit per sampling point. Rendering is left to the
//! caller: the CLI draws an `indicatif` bar on a terminal and falls back to
//! [`LogProgress`] when output is redirected, while tests pass
//! [`null_progress`].

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Receives progress updates from a long-running operation.
pub trait ProgressCallback: Send + Sync {
    /// Total units of work, once known.
    fn set_total(&self, total: u64);

    /// Absolute position.
    fn set_position(&self, pos: u64);

    /// Advances by `delta` units.
    fn inc(&self, delta: u64);

    /// Replaces the status message.
    fn set_message(&self, msg: String);

    /// Marks the work as complete.
    fn finish(&self, msg: String);
}

/// Ignores every update.
pub struct NullProgress;

impl ProgressCallback for NullProgress {
    fn set_total(&self, _total: u64) {}
    fn set_position(&self, _pos: u64) {}
    fn inc(&self, _delta: u64) {}
    fn set_message(&self, _msg: String) {}
    fn finish(&self, _msg: String) {}
}

/// Shared [`NullProgress`].
#[must_use]
pub fn null_progress() -> Arc<dyn ProgressCallback> {
    Arc::new(NullProgress)
}

/// Logs a line at `info` every `every` units.
pub struct LogProgress {
    label: String,
    every: u64,
    total: AtomicU64,
    position: AtomicU64,
}

impl LogProgress {
    /// Creates a reporter that logs every `every` units (at least 1).
    #[must_use]
    pub fn new(label: &str, every: u64) -> Arc<dyn ProgressCallback> {
        Arc::new(Self::with_interval(label, every))
    }

    fn with_interval(label: &str, every: u64) -> Self {
        Self {
            label: label.to_string(),
            every: every.max(1),
            total: AtomicU64::new(0),
            position: AtomicU64::new(0),
        }
    }

    fn position(&self) -> u64 {
        self.position.load(Ordering::Relaxed)
    }
}

impl ProgressCallback for LogProgress {
    fn set_total(&self, total: u64) {
        self.total.store(total, Ordering::Relaxed);
        log::info!("{}: {total} to process", self.label);
    }

    fn set_position(&self, pos: u64) {
        self.position.store(pos, Ordering::Relaxed);
    }

    fn inc(&self, delta: u64) {
        let before = self.position.fetch_add(delta, Ordering::Relaxed);
        let after = before + delta;
        if after / self.every > before / self.every {
            log::info!(
                "{}: {after}/{}",
                self.label,
                self.total.load(Ordering::Relaxed)
            );
        }
    }

    fn set_message(&self, _msg: String) {}

    fn finish(&self, msg: String) {
        log::info!("{}: {msg}", self.label);
    }
}
