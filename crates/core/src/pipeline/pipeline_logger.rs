use std::collections::HashMap;
use std::time::Instant;

use crate::index::domain::span::SpanTable;

/// Cross-cutting logger for indexing progress.
///
/// Keeps the indexing use cases free of any particular output mechanism:
/// the CLI logs through the `log` crate, tests discard everything.
pub trait PipelineLogger {
    /// A transcript segment has been consumed. `end_time` is its end in
    /// seconds of source audio.
    fn segment(&mut self, index: usize, end_time: f64);

    /// A batch of `batch` spans was committed to `table`; `total` spans
    /// have been written to it so far.
    fn flushed(&mut self, table: SpanTable, batch: usize, total: usize);

    /// Record how long a named stage took.
    fn timing(&mut self, stage: &str, duration_ms: f64);

    /// Log a human-readable status message.
    fn info(&mut self, message: &str);

    /// Emit an end-of-run summary. Default: no-op.
    fn summary(&self) {}
}

/// Silent logger that discards all events.
pub struct NullPipelineLogger;

impl PipelineLogger for NullPipelineLogger {
    fn segment(&mut self, _index: usize, _end_time: f64) {}
    fn flushed(&mut self, _table: SpanTable, _batch: usize, _total: usize) {}
    fn timing(&mut self, _stage: &str, _duration_ms: f64) {}
    fn info(&mut self, _message: &str) {}
}

/// CLI-oriented logger: reports flushes and periodic segment progress,
/// tracks per-stage timing and prints a summary at the end.
///
/// Segment progress is throttled to every `throttle_segments` segments.
pub struct StdoutPipelineLogger {
    throttle_segments: usize,
    timings: HashMap<String, Vec<f64>>,
    written: HashMap<SpanTable, usize>,
    flushes: HashMap<SpanTable, usize>,
    segments: usize,
    audio_seconds: f64,
    start_time: Instant,
}

impl StdoutPipelineLogger {
    pub fn new(throttle_segments: usize) -> Self {
        Self {
            throttle_segments: throttle_segments.max(1),
            timings: HashMap::new(),
            written: HashMap::new(),
            flushes: HashMap::new(),
            segments: 0,
            audio_seconds: 0.0,
            start_time: Instant::now(),
        }
    }

    /// Returns the formatted summary, or `None` if nothing was recorded.
    pub fn summary_string(&self) -> Option<String> {
        if self.segments == 0 && self.written.is_empty() && self.timings.is_empty() {
            return None;
        }

        let elapsed = self.start_time.elapsed().as_secs_f64();
        let mut lines = vec![format!(
            "Indexing summary ({} segments, {:.1}s of audio, {elapsed:.1}s total):",
            self.segments, self.audio_seconds
        )];

        for table in SpanTable::ALL {
            let written = self.written.get(table).copied().unwrap_or(0);
            let flushes = self.flushes.get(table).copied().unwrap_or(0);
            lines.push(format!("  {table:8}: {written} spans in {flushes} flushes"));
        }

        let mut stages: Vec<_> = self.timings.keys().collect();
        stages.sort();
        for stage in stages {
            let durations = &self.timings[stage];
            let total_ms: f64 = durations.iter().sum();
            let avg_ms = total_ms / durations.len().max(1) as f64;
            lines.push(format!(
                "  {stage:14}: avg {avg_ms:7.1}ms  total {total_ms:8.0}ms"
            ));
        }

        if elapsed > 0.0 && self.audio_seconds > 0.0 {
            lines.push(format!(
                "  Speed: {:.1}x realtime",
                self.audio_seconds / elapsed
            ));
        }

        Some(lines.join("\n"))
    }

}

impl Default for StdoutPipelineLogger {
    fn default() -> Self {
        Self::new(50)
    }
}

impl PipelineLogger for StdoutPipelineLogger {
    fn segment(&mut self, index: usize, end_time: f64) {
        self.segments = index + 1;
        self.audio_seconds = self.audio_seconds.max(end_time);
        if self.segments % self.throttle_segments == 0 {
            log::info!(
                "Processed {} segments ({})",
                self.segments,
                crate::shared::timestamp::format_timestamp(end_time)
            );
        }
    }

    fn flushed(&mut self, table: SpanTable, batch: usize, total: usize) {
        self.written.insert(table, total);
        *self.flushes.entry(table).or_default() += 1;
        log::info!("Committed {batch} {table} ({total} indexed)");
    }

    fn timing(&mut self, stage: &str, duration_ms: f64) {
        self.timings
            .entry(stage.to_string())
            .or_default()
            .push(duration_ms);
    }

    fn info(&mut self, message: &str) {
        log::info!("{message}");
    }

    fn summary(&self) {
        if let Some(text) = self.summary_string() {
            log::info!("\n\n{text}");
        }
    }
}
