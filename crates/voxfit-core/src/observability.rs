// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

/// Callback for per-subject progress and scalar telemetry during a sweep.
pub trait FitObserver {
    /// Called after subject `index` (0-based) of `total` finished fitting.
    fn on_subject_done(&self, subject: u32, index: usize, total: usize, mean_correlation: f64);

    fn record_scalar(&self, key: &'static str, value: f64);
}

/// Observer that discards every event.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct NoopObserver;

impl FitObserver for NoopObserver {
    fn on_subject_done(&self, _subject: u32, _index: usize, _total: usize, _mean: f64) {}

    fn record_scalar(&self, _key: &'static str, _value: f64) {}
}

/// Observer that forwards events to `tracing` under a configuration label.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TracingObserver {
    label: String,
}

impl TracingObserver {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }
}

impl FitObserver for TracingObserver {
    fn on_subject_done(&self, subject: u32, index: usize, total: usize, mean_correlation: f64) {
        tracing::info!(
            config = %self.label,
            subject,
            progress = format_args!("{}/{}", index + 1, total),
            mean_correlation,
            "subject done"
        );
    }

    fn record_scalar(&self, key: &'static str, value: f64) {
        tracing::debug!(config = %self.label, key, value, "scalar");
    }
}
