//! Compilation run metrics.
//!
//! [`crate::compile`] times each stage with `Instant` and returns the
//! durations next to the database. Nothing here affects the output.

use std::time::{Duration, Instant};

use crate::extractor::ExtractStats;

// --- Metrics -----------------------------------------------------------------

#[derive(Debug, Default, Clone)]
pub struct CompileMetrics {
    /// Total elapsed time for [`crate::compile`].
    pub total: Duration,
    pub extract: StageMetrics,
    pub transform: StageMetrics,
    pub estimate: StageMetrics,
    pub assemble: StageMetrics,
    /// Record counts reported by the extractor.
    pub source: ExtractStats,
}

/// Timing for a single stage.
#[derive(Debug, Default, Clone, Copy)]
pub struct StageMetrics {
    pub duration: Duration,
    /// Entities the stage handed to the next one.
    pub produced: usize,
}

impl CompileMetrics {
    /// Stages in pipeline order, for reporting.
    pub fn stages(&self) -> [(&'static str, StageMetrics); 4] {
        [
            ("extract", self.extract),
            ("transform", self.transform),
            ("estimate", self.estimate),
            ("assemble", self.assemble),
        ]
    }
}

/// Run `f` and record its duration.
pub(crate) fn timed<T>(f: impl FnOnce() -> T) -> (T, Duration) {
    let start = Instant::now();
    let out = f();
    (out, start.elapsed())
}
