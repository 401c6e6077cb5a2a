/// A word as reported by the recognizer, before normalization.
#[derive(Clone, Debug, PartialEq)]
pub struct TranscriptWord {
    pub word: String,
    pub start_time: f64,
    pub end_time: f64,
    pub confidence: f64,
}

/// A run of words the recognizer delimited as one stretch of speech.
///
/// Segments bound n-gram generation: no phrase is built across two of them.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TranscriptSegment {
    pub start_time: f64,
    pub end_time: f64,
    pub words: Vec<TranscriptWord>,
}

impl TranscriptSegment {
    /// Build a segment whose bounds cover its words.
    pub fn from_words(words: Vec<TranscriptWord>) -> Self {
        let start_time = words.first().map_or(0.0, |w| w.start_time);
        let end_time = words.last().map_or(0.0, |w| w.end_time);
        Self {
            start_time,
            end_time,
            words,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }
}
