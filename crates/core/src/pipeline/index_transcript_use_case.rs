use std::time::Instant;

use crate::audio::domain::transcript::TranscriptSegment;
use crate::index::domain::ngram_generator;
use crate::index::domain::normalizer::normalize;
use crate::index::domain::span::{Span, SpanTable};
use crate::index::domain::span_buffer::SpanBuffer;
use crate::index::domain::span_repository::{SpanSink, StoreError};
use crate::shared::constants::{
    DEFAULT_FLUSH_THRESHOLD, DEFAULT_INDEX_MIN_CONFIDENCE, DEFAULT_NGRAM_SIZES,
};

use super::pipeline_logger::PipelineLogger;

#[derive(Clone, Debug, PartialEq)]
pub struct IndexingConfig {
    /// Spans buffered per table before they are committed.
    pub flush_threshold: usize,
    /// Words below this confidence are not indexed at all.
    pub min_confidence: f64,
    /// Phrase lengths to generate. Sizes below 2 are ignored.
    pub ngram_sizes: Vec<usize>,
}

impl Default for IndexingConfig {
    fn default() -> Self {
        Self {
            flush_threshold: DEFAULT_FLUSH_THRESHOLD,
            min_confidence: DEFAULT_INDEX_MIN_CONFIDENCE,
            ngram_sizes: DEFAULT_NGRAM_SIZES.to_vec(),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct IndexingStats {
    pub segments: usize,
    pub skipped_segments: usize,
    pub tokens: usize,
    pub ngrams: usize,
    pub token_flushes: usize,
    pub ngram_flushes: usize,
}

/// Streams transcript segments into the span store.
///
/// Tokens and n-grams are buffered separately and each buffer is committed
/// whenever it reaches the flush threshold, plus once more at the end for
/// whatever is left. A storage fault stops the run; batches committed
/// before it stay in the store.
pub struct IndexTranscriptUseCase {
    config: IndexingConfig,
    logger: Box<dyn PipelineLogger>,
}

impl IndexTranscriptUseCase {
    pub fn new(config: IndexingConfig, logger: Box<dyn PipelineLogger>) -> Self {
        Self { config, logger }
    }

    pub fn logger(&self) -> &dyn PipelineLogger {
        self.logger.as_ref()
    }

    pub fn logger_mut(&mut self) -> &mut dyn PipelineLogger {
        self.logger.as_mut()
    }

    pub fn run(
        &mut self,
        segments: impl IntoIterator<Item = TranscriptSegment>,
        sink: &mut dyn SpanSink,
    ) -> Result<IndexingStats, StoreError> {
        let mut tokens = TableWriter::new(SpanTable::Tokens, self.config.flush_threshold);
        let mut ngrams = TableWriter::new(SpanTable::Ngrams, self.config.flush_threshold);
        let mut stats = IndexingStats::default();
        let mut segment_tokens: Vec<Span> = Vec::new();

        for (index, segment) in segments.into_iter().enumerate() {
            stats.segments += 1;
            self.logger.segment(index, segment.end_time);
            if segment.is_empty() {
                stats.skipped_segments += 1;
                continue;
            }

            for word in &segment.words {
                if word.confidence < self.config.min_confidence {
                    continue;
                }
                let text = normalize(&word.word);
                if text.is_empty() {
                    continue;
                }
                let span = Span::new(text, word.start_time, word.end_time, word.confidence);
                segment_tokens.push(span.clone());
                tokens.buffer.append(span);
                stats.tokens += 1;

                if tokens.buffer.is_full() {
                    tokens.flush(sink, self.logger.as_mut())?;
                }
            }

            for &n in &self.config.ngram_sizes {
                if n < 2 || segment_tokens.len() < n {
                    continue;
                }
                let generated = ngram_generator::generate(&segment_tokens, n);
                stats.ngrams += generated.len();
                ngrams.buffer.extend(generated);
            }
            if ngrams.buffer.is_full() {
                ngrams.flush(sink, self.logger.as_mut())?;
            }

            segment_tokens.clear();
        }

        tokens.flush(sink, self.logger.as_mut())?;
        ngrams.flush(sink, self.logger.as_mut())?;

        stats.token_flushes = tokens.flushes;
        stats.ngram_flushes = ngrams.flushes;
        Ok(stats)
    }
}

/// A buffer plus the bookkeeping for the table it drains into.
struct TableWriter {
    table: SpanTable,
    buffer: SpanBuffer,
    flushes: usize,
    written: usize,
}

impl TableWriter {
    fn new(table: SpanTable, threshold: usize) -> Self {
        Self {
            table,
            buffer: SpanBuffer::new(threshold),
            flushes: 0,
            written: 0,
        }
    }

    /// Commit everything buffered. Does nothing when the buffer is empty.
    fn flush(
        &mut self,
        sink: &mut dyn SpanSink,
        logger: &mut dyn PipelineLogger,
    ) -> Result<(), StoreError> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        let batch = self.buffer.drain();
        let started = Instant::now();
        sink.append_many(self.table, &batch)?;
        logger.timing(
            match self.table {
                SpanTable::Tokens => "flush_tokens",
                SpanTable::Ngrams => "flush_ngrams",
            },
            started.elapsed().as_secs_f64() * 1000.0,
        );
        self.flushes += 1;
        self.written += batch.len();
        logger.flushed(self.table, batch.len(), self.written);
        Ok(())
    }
}
