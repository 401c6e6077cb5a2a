use super::transcript::TranscriptWord;

/// One decoder token with its timing, as whisper reports it.
///
/// Whisper tokens are byte-level BPE pieces, so a token may hold only part
/// of a multi-byte character. `bytes` is kept raw and decoded per word.
#[derive(Clone, Debug, PartialEq)]
pub struct RecognizedToken {
    pub bytes: Vec<u8>,
    pub start_time: f64,
    pub end_time: f64,
    pub probability: f64,
}

/// Merge sub-word tokens into words.
///
/// A token with a leading space opens a new word; anything else is glued to
/// the word in progress. Control tokens (`[_BEG_]`, `<|endoftext|>`) and
/// tokens whose end precedes their start are dropped.
pub fn assemble_words(tokens: impl IntoIterator<Item = RecognizedToken>) -> Vec<TranscriptWord> {
    let mut words = Vec::new();
    let mut pending: Vec<RecognizedToken> = Vec::new();

    for token in tokens {
        if is_control_token(&token.bytes) || token.end_time < token.start_time {
            continue;
        }
        if token.bytes.first() == Some(&b' ') && !pending.is_empty() {
            words.extend(finish_word(&pending));
            pending.clear();
        }
        pending.push(token);
    }
    words.extend(finish_word(&pending));

    words
}

fn is_control_token(bytes: &[u8]) -> bool {
    let start = bytes
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(bytes.len());
    let trimmed = &bytes[start..];
    trimmed.starts_with(b"[_") || trimmed.starts_with(b"<|")
}

fn finish_word(tokens: &[RecognizedToken]) -> Option<TranscriptWord> {
    let first = tokens.first()?;
    let last = tokens.last()?;
    let bytes: Vec<u8> = tokens.iter().flat_map(|t| t.bytes.iter().copied()).collect();
    let text = String::from_utf8_lossy(&bytes);
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    let confidence = tokens.iter().map(|t| t.probability).sum::<f64>() / tokens.len() as f64;
    Some(TranscriptWord {
        word: text.to_string(),
        start_time: first.start_time,
        end_time: last.end_time,
        confidence,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn tok(text: &str, start: f64, end: f64, probability: f64) -> RecognizedToken {
        raw(text.as_bytes(), start, end, probability)
    }

    fn raw(bytes: &[u8], start: f64, end: f64, probability: f64) -> RecognizedToken {
        RecognizedToken {
            bytes: bytes.to_vec(),
            start_time: start,
            end_time: end,
            probability,
        }
    }

    #[test]
    fn test_sub_word_tokens_merge() {
        let words = assemble_words(vec![tok(" hol", 0.0, 0.2, 0.8), tok("a", 0.2, 0.4, 0.6)]);
        assert_eq!(words.len(), 1);
        assert_eq!(words[0].word, "hola");
        assert_relative_eq!(words[0].start_time, 0.0);
        assert_relative_eq!(words[0].end_time, 0.4);
        assert_relative_eq!(words[0].confidence, 0.7, epsilon = 1e-6);
    }

    #[test]
    fn test_leading_space_starts_new_word() {
        let words = assemble_words(vec![
            tok(" buenos", 0.0, 0.5, 0.9),
            tok(" días", 0.5, 1.0, 0.9),
            tok(",", 1.0, 1.0, 0.5),
        ]);
        let texts: Vec<_> = words.iter().map(|w| w.word.as_str()).collect();
        assert_eq!(texts, vec!["buenos", "días,"]);
    }

    #[test]
    fn test_control_tokens_are_skipped() {
        let words = assemble_words(vec![
            tok("[_BEG_]", 0.0, 0.0, 1.0),
            tok(" hola", 0.0, 0.4, 0.9),
            tok("<|endoftext|>", 0.4, 0.4, 1.0),
        ]);
        assert_eq!(words.len(), 1);
        assert_eq!(words[0].word, "hola");
        assert_relative_eq!(words[0].confidence, 0.9);
    }

    #[test]
    fn test_inverted_timestamps_are_skipped() {
        let words = assemble_words(vec![tok(" mal", 2.0, 1.0, 0.9), tok(" bien", 2.0, 2.5, 0.9)]);
        assert_eq!(words.len(), 1);
        assert_eq!(words[0].word, "bien");
    }

    #[test]
    fn test_first_token_without_space_starts_word() {
        let words = assemble_words(vec![tok("Hola", 0.0, 0.3, 0.9), tok(" mundo", 0.3, 0.8, 0.9)]);
        assert_eq!(words.len(), 2);
        assert_eq!(words[0].word, "Hola");
    }

    #[test]
    fn test_whitespace_only_word_is_dropped() {
        let words = assemble_words(vec![tok("  ", 0.0, 0.1, 0.9)]);
        assert!(words.is_empty());
    }

    #[test]
    fn test_character_split_across_tokens_is_rejoined() {
        // "í" is 0xC3 0xAD; each half alone is not valid UTF-8
        let words = assemble_words(vec![
            raw(&[b' ', b'd', 0xC3], 0.0, 0.2, 0.8),
            raw(&[0xAD, b'a', b's'], 0.2, 0.5, 0.6),
        ]);
        assert_eq!(words.len(), 1);
        assert_eq!(words[0].word, "días");
        assert_relative_eq!(words[0].end_time, 0.5);
        assert_relative_eq!(words[0].confidence, 0.7, epsilon = 1e-9);
    }

    #[test]
    fn test_dangling_partial_character_is_replaced() {
        let words = assemble_words(vec![raw(&[b' ', b'n', b'o', 0xC3], 0.0, 0.3, 0.9)]);
        assert_eq!(words[0].word, "no\u{FFFD}");
    }

    #[test]
    fn test_no_tokens() {
        assert!(assemble_words(Vec::new()).is_empty());
    }
}
