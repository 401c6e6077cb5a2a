pub mod ngram_generator;
pub mod normalizer;
pub mod span;
pub mod span_buffer;
pub mod span_repository;
