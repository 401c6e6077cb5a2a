use super::span::Span;

/// Builds every contiguous `n`-token span from `tokens`.
///
/// `tokens` must come from a single transcript segment, ordered by time, so
/// an n-gram never straddles a segment boundary. Each n-gram starts where its
/// first token starts, ends where its last token ends, and carries the mean
/// confidence of its tokens.
pub fn generate(tokens: &[Span], n: usize) -> Vec<Span> {
    if n == 0 || tokens.len() < n {
        return Vec::new();
    }

    tokens
        .windows(n)
        .map(|window| {
            let text = window
                .iter()
                .map(|t| t.text.as_str())
                .collect::<Vec<_>>()
                .join(" ");
            let confidence = window.iter().map(|t| t.confidence).sum::<f64>() / n as f64;
            Span {
                text,
                start_time: window[0].start_time,
                end_time: window[n - 1].end_time,
                confidence,
            }
        })
        .collect()
}
