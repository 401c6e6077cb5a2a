use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::audio::domain::audio_track::AudioTrack;

/// The audio track could not be decoded.
#[derive(Error, Debug)]
#[error("failed to extract audio from {path}: {message}")]
pub struct AudioExtractError {
    pub path: PathBuf,
    pub message: String,
}

impl AudioExtractError {
    pub fn new(path: &Path, message: impl std::fmt::Display) -> Self {
        Self {
            path: path.to_path_buf(),
            message: message.to_string(),
        }
    }
}

/// Domain interface for decoding the audio of a video file.
pub trait AudioReader {
    /// Decode the audio track to mono PCM at `target_sample_rate`.
    /// Returns `None` if the file has no audio track.
    fn read_audio(
        &self,
        path: &Path,
        target_sample_rate: u32,
    ) -> Result<Option<AudioTrack>, AudioExtractError>;
}
