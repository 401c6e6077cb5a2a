use std::path::PathBuf;

use thiserror::Error;

use super::span::{Span, SpanTable};

type Source = Box<dyn std::error::Error + Send + Sync>;

/// A storage fault. Batches committed before the fault stay durable.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("failed to open span store at {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: Source,
    },
    #[error("failed to write {count} {table} to the span store: {source}")]
    Write {
        table: SpanTable,
        count: usize,
        #[source]
        source: Source,
    },
    #[error("failed to read {table} from the span store: {source}")]
    Read {
        table: SpanTable,
        #[source]
        source: Source,
    },
}

/// Write side of the span store. Only the indexing pipeline uses it.
pub trait SpanSink {
    /// Append `spans` to `table` and commit. On error nothing from this call
    /// is guaranteed to be stored.
    fn append_many(&mut self, table: SpanTable, spans: &[Span]) -> Result<(), StoreError>;
}

/// Read side of the span store.
pub trait SpanSource {
    /// Spans whose text equals `text` exactly and whose confidence is at
    /// least `min_confidence`, ordered by ascending start time.
    fn lookup(
        &self,
        table: SpanTable,
        text: &str,
        min_confidence: f64,
    ) -> Result<Vec<Span>, StoreError>;
}
