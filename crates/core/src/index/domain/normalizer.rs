use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Canonical form used for every stored span and every lookup key.
///
/// Lowercases, strips accents (NFD decomposition with combining marks
/// removed, plus a few Latin letters that have no decomposition), then trims
/// whitespace and punctuation from both ends. Interior characters are kept,
/// so `"l'homme"` stays `"l'homme"` while `"¿Qué?"` becomes `"que"`.
pub fn normalize(raw: &str) -> String {
    let mut folded = String::with_capacity(raw.len());
    for c in raw.to_lowercase().nfd() {
        if is_combining_mark(c) {
            continue;
        }
        match transliterate(c) {
            Some(replacement) => folded.push_str(replacement),
            None => folded.push(c),
        }
    }
    folded
        .trim_matches(|c: char| c.is_whitespace() || is_edge_punctuation(c))
        .to_string()
}

/// Normalize a free-form query: each whitespace-separated word is
/// normalized on its own and the survivors are joined with single spaces,
/// matching how n-gram text is built from individually normalized tokens.
pub fn normalize_query(raw: &str) -> String {
    raw.split_whitespace()
        .map(normalize)
        .filter(|word| !word.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn transliterate(c: char) -> Option<&'static str> {
    match c {
        'ß' => Some("ss"),
        'æ' => Some("ae"),
        'œ' => Some("oe"),
        'ø' => Some("o"),
        'ł' => Some("l"),
        'đ' => Some("d"),
        'ı' => Some("i"),
        'þ' => Some("th"),
        _ => None,
    }
}

fn is_edge_punctuation(c: char) -> bool {
    c.is_ascii_punctuation()
        || matches!(
            c,
            '¿' | '¡' | '«' | '»' | '…' | '“' | '”' | '‘' | '’' | '–' | '—'
        )
}
