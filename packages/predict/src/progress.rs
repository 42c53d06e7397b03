//! Progress reporting for batch prediction.
//!
//! [`ProgressCallback`] keeps the prediction pipeline independent of how
//! progress is rendered. The CLI supplies an `indicatif` bar; library
//! callers and tests pass nothing and get [`NullProgress`].

use std::sync::Arc;

/// Receives progress updates from a running batch.
pub trait ProgressCallback: Send + Sync {
    /// Sets the total number of rows (enables percentage/ETA).
    fn set_total(&self, total: u64);

    /// Advances progress by `delta` rows.
    fn inc(&self, delta: u64);

    /// Updates the message shown next to the indicator.
    fn set_message(&self, msg: String);

    /// Marks the batch complete with a final message.
    fn finish(&self, msg: String);

    /// Marks the batch complete and removes the indicator.
    fn finish_and_clear(&self);
}

/// Ignores every update.
pub struct NullProgress;

impl ProgressCallback for NullProgress {
    fn set_total(&self, _total: u64) {}
    fn inc(&self, _delta: u64) {}
    fn set_message(&self, _msg: String) {}
    fn finish(&self, _msg: String) {}
    fn finish_and_clear(&self) {}
}

/// Returns a shared [`NullProgress`].
#[must_use]
pub fn null_progress() -> Arc<dyn ProgressCallback> {
    Arc::new(NullProgress)
}
