use std::collections::HashMap;

/// Cross-cutting logger for pipeline orchestration events.
///
/// Decouples the use case from specific output mechanisms (log crate,
/// test capture) so callers can observe pipeline behavior without
/// changing the orchestration code.
pub trait PipelineLogger: Send {
    /// Record how long a named pipeline stage took for one request.
    fn timing(&mut self, stage: &str, duration_ms: f64);

    /// Log a human-readable status message.
    fn info(&mut self, message: &str);

    /// Emit a lifetime summary of accumulated timings. Default: no-op.
    fn summary(&self) {}
}

/// Silent logger that discards all events.
pub struct NullPipelineLogger;

impl PipelineLogger for NullPipelineLogger {
    fn timing(&mut self, _stage: &str, _duration_ms: f64) {}
    fn info(&mut self, _message: &str) {}
}

/// Logger that emits per-stage timings through the `log` crate and keeps
/// bounded running aggregates for a shutdown summary.
///
/// The use case lives for the whole process, so per-call samples are
/// folded into (count, total) pairs instead of being kept individually.
pub struct LogPipelineLogger {
    timings: HashMap<String, (u64, f64)>,
}

impl LogPipelineLogger {
    pub fn new() -> Self {
        Self {
            timings: HashMap::new(),
        }
    }

    /// Average duration recorded for a stage, if any.
    pub fn average_for(&self, stage: &str) -> Option<f64> {
        self.timings
            .get(stage)
            .map(|&(count, total_ms)| total_ms / count as f64)
    }

    /// Returns the formatted summary string, or `None` if no data recorded.
    pub fn summary_string(&self) -> Option<String> {
        if self.timings.is_empty() {
            return None;
        }

        let mut lines = vec!["Pipeline summary:".to_string()];
        let mut stages: Vec<_> = self.timings.keys().collect();
        stages.sort();
        for stage in stages {
            let (count, total_ms) = self.timings[stage];
            let avg_ms = total_ms / count as f64;
            lines.push(format!("  {stage:8}: avg {avg_ms:6.1}ms  ({count} calls)"));
        }

        Some(lines.join("\n"))
    }
}

impl Default for LogPipelineLogger {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineLogger for LogPipelineLogger {
    fn timing(&mut self, stage: &str, duration_ms: f64) {
        let entry = self.timings.entry(stage.to_string()).or_insert((0, 0.0));
        entry.0 += 1;
        entry.1 += duration_ms;
        log::debug!("{stage}: {duration_ms:.1}ms");
    }

    fn info(&mut self, message: &str) {
        log::info!("{message}");
    }

    fn summary(&self) {
        if let Some(text) = self.summary_string() {
            log::info!("\n{text}");
        }
    }
}
