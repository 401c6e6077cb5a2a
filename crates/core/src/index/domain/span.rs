/// A time-located piece of normalized text: a single token or a
/// space-joined n-gram.
#[derive(Clone, Debug, PartialEq)]
pub struct Span {
    pub text: String,
    pub start_time: f64,
    pub end_time: f64,
    pub confidence: f64,
}

impl Span {
    pub fn new(text: impl Into<String>, start_time: f64, end_time: f64, confidence: f64) -> Self {
        Self {
            text: text.into(),
            start_time,
            end_time,
            confidence,
        }
    }

    pub fn duration(&self) -> f64 {
        self.end_time - self.start_time
    }
}

/// The two logical collections a span can live in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpanTable {
    Tokens,
    Ngrams,
}

impl SpanTable {
    pub const ALL: &[SpanTable] = &[SpanTable::Tokens, SpanTable::Ngrams];

    pub fn table_name(self) -> &'static str {
        match self {
            SpanTable::Tokens => "word_index",
            SpanTable::Ngrams => "ngram_index",
        }
    }

    pub(crate) fn index_name(self) -> &'static str {
        match self {
            SpanTable::Tokens => "ix_word_text",
            SpanTable::Ngrams => "ix_ngram_text",
        }
    }
}

impl std::fmt::Display for SpanTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SpanTable::Tokens => f.pad("tokens"),
            SpanTable::Ngrams => f.pad("n-grams"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_duration() {
        let span = Span::new("hola", 1.0, 1.4, 0.9);
        assert_relative_eq!(span.duration(), 0.4, epsilon = 1e-9);
    }

    #[test]
    fn test_table_names_are_distinct() {
        assert_ne!(
            SpanTable::Tokens.table_name(),
            SpanTable::Ngrams.table_name()
        );
        assert_ne!(
            SpanTable::Tokens.index_name(),
            SpanTable::Ngrams.index_name()
        );
    }
}
