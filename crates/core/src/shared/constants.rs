pub const WHISPER_SAMPLE_RATE: u32 = 16000;
pub const WHISPER_MODEL_BASE_URL: &str =
    "https://huggingface.co/ggerganov/whisper.cpp/resolve/main";
pub const WHISPER_MODEL_SIZES: &[&str] = &[
    "tiny", "base", "small", "medium", "large", "large-v2", "large-v3",
];

pub const DEFAULT_MODEL_SIZE: &str = "small";
pub const DEFAULT_LANGUAGE: &str = "es";

pub const DEFAULT_DB_PATH: &str = "index.db";
pub const DEFAULT_AUDIO_PATH: &str = "audio_16k.wav";

/// Spans buffered per table before a commit.
pub const DEFAULT_FLUSH_THRESHOLD: usize = 5000;
pub const DEFAULT_NGRAM_SIZES: &[usize] = &[2, 3];

pub const DEFAULT_INDEX_MIN_CONFIDENCE: f64 = 0.0;
pub const DEFAULT_SEARCH_MIN_CONFIDENCE: f64 = 0.5;

/// Seconds of context added on each side of a generated clip.
pub const DEFAULT_CLIP_MARGIN: u32 = 8;

/// Upper bound on CPU worker threads picked automatically.
pub const MAX_AUTO_CPU_WORKERS: usize = 8;
pub const GPU_WORKERS: usize = 4;
