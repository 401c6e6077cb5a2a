use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use vidsearch_core::shared::constants::{
    DEFAULT_CLIP_MARGIN, DEFAULT_FLUSH_THRESHOLD, DEFAULT_INDEX_MIN_CONFIDENCE, DEFAULT_LANGUAGE,
    DEFAULT_MODEL_SIZE, DEFAULT_SEARCH_MIN_CONFIDENCE,
};

/// Persisted defaults. Any flag given on the command line wins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub model: String,
    pub language: String,
    pub flush_threshold: usize,
    pub index_min_confidence: f64,
    pub search_min_confidence: f64,
    pub clip_margin: u32,
    /// Directory searched for model files before downloading.
    pub models_dir: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL_SIZE.to_string(),
            language: DEFAULT_LANGUAGE.to_string(),
            flush_threshold: DEFAULT_FLUSH_THRESHOLD,
            index_min_confidence: DEFAULT_INDEX_MIN_CONFIDENCE,
            search_min_confidence: DEFAULT_SEARCH_MIN_CONFIDENCE,
            clip_margin: DEFAULT_CLIP_MARGIN,
            models_dir: None,
        }
    }
}

impl Settings {
    fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("VidSearch").join("settings.json"))
    }

    pub fn load() -> Self {
        Self::config_path()
            .map(|path| Self::load_from(&path))
            .unwrap_or_default()
    }

    /// Unreadable or malformed files fall back to defaults.
    pub fn load_from(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(json) => serde_json::from_str(&json).unwrap_or_else(|e| {
                log::warn!("ignoring {}: {e}", path.display());
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }
}
