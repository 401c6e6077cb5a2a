use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::index::domain::normalizer::normalize_query;
use crate::index::domain::span::{Span, SpanTable};
use crate::index::domain::span_repository::{SpanSource, StoreError};
use crate::index::infrastructure::sqlite_span_store::SqliteSpanStore;

#[derive(Error, Debug)]
pub enum SearchError {
    #[error("index not found: {0}")]
    StoreMissing(PathBuf),
    #[error(transparent)]
    Storage(#[from] StoreError),
}

/// Tables tried for a single word, in order. The first with a match wins.
const WORD_PLAN: &[SpanTable] = &[SpanTable::Tokens, SpanTable::Ngrams];
/// Phrases only ever live in the n-gram table.
const PHRASE_PLAN: &[SpanTable] = &[SpanTable::Ngrams];

/// Occurrences of `query` ordered by start time.
///
/// A query with more than one word after normalization is a phrase and goes
/// to [`search_phrase`]; anything else goes to [`search_word`]. An empty
/// query finds nothing.
pub fn search(
    source: &dyn SpanSource,
    query: &str,
    min_confidence: f64,
    first_only: bool,
) -> Result<Vec<Span>, StoreError> {
    let normalized = normalize_query(query);
    let mut hits = if normalized.contains(' ') {
        search_phrase(source, &normalized, min_confidence)?
    } else {
        search_word(source, &normalized, min_confidence)?
    };
    if first_only {
        hits.truncate(1);
    }
    Ok(hits)
}

/// Token table first, n-gram table only when the token lookup is empty.
pub fn search_word(
    source: &dyn SpanSource,
    word: &str,
    min_confidence: f64,
) -> Result<Vec<Span>, StoreError> {
    first_match(source, WORD_PLAN, word, min_confidence)
}

pub fn search_phrase(
    source: &dyn SpanSource,
    phrase: &str,
    min_confidence: f64,
) -> Result<Vec<Span>, StoreError> {
    first_match(source, PHRASE_PLAN, phrase, min_confidence)
}

fn first_match(
    source: &dyn SpanSource,
    plan: &[SpanTable],
    raw: &str,
    min_confidence: f64,
) -> Result<Vec<Span>, StoreError> {
    let normalized = normalize_query(raw);
    if normalized.is_empty() {
        return Ok(Vec::new());
    }
    for &table in plan {
        let hits = source.lookup(table, &normalized, min_confidence)?;
        if !hits.is_empty() {
            return Ok(hits);
        }
    }
    Ok(Vec::new())
}

pub struct SearchSpansUseCase {
    source: Box<dyn SpanSource>,
    min_confidence: f64,
    first_only: bool,
}

impl SearchSpansUseCase {
    pub fn new(source: Box<dyn SpanSource>, min_confidence: f64, first_only: bool) -> Self {
        Self {
            source,
            min_confidence,
            first_only,
        }
    }

    /// Open an existing index read-only. A missing file is reported as
    /// `StoreMissing` rather than creating an empty index.
    pub fn open(db_path: &Path, min_confidence: f64, first_only: bool) -> Result<Self, SearchError> {
        if !db_path.exists() {
            return Err(SearchError::StoreMissing(db_path.to_path_buf()));
        }
        let store = SqliteSpanStore::open_read_only(db_path)?;
        Ok(Self::new(Box::new(store), min_confidence, first_only))
    }

    pub fn run(&self, query: &str) -> Result<Vec<Span>, SearchError> {
        let hits = search(
            self.source.as_ref(),
            query,
            self.min_confidence,
            self.first_only,
        )?;
        log::debug!("query {query:?}: {} hit(s)", hits.len());
        Ok(hits)
    }
}
