use super::span::Span;

/// Ordered accumulator of spans awaiting a bulk write.
///
/// The buffer never writes anything itself: callers check [`is_full`] after
/// appending and [`drain`] it into a store.
///
/// [`is_full`]: SpanBuffer::is_full
/// [`drain`]: SpanBuffer::drain
#[derive(Debug)]
pub struct SpanBuffer {
    spans: Vec<Span>,
    threshold: usize,
}

impl SpanBuffer {
    /// A threshold of 0 behaves like 1.
    pub fn new(threshold: usize) -> Self {
        let threshold = threshold.max(1);
        Self {
            spans: Vec::with_capacity(threshold.min(8192)),
            threshold,
        }
    }

    pub fn append(&mut self, span: Span) {
        self.spans.push(span);
    }

    pub fn extend(&mut self, spans: impl IntoIterator<Item = Span>) {
        self.spans.extend(spans);
    }

    pub fn is_full(&self) -> bool {
        self.spans.len() >= self.threshold
    }

    /// Take every pending span, leaving the buffer empty.
    pub fn drain(&mut self) -> Vec<Span> {
        std::mem::take(&mut self.spans)
    }

    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }
}
