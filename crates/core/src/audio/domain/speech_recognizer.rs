use thiserror::Error;

use super::audio_track::AudioTrack;
use super::transcript::TranscriptSegment;

#[derive(Error, Debug)]
pub enum RecognizerError {
    #[error("speech model not found at: {0}")]
    ModelNotFound(std::path::PathBuf),
    #[error("failed to load speech model: {0}")]
    Load(String),
    #[error("speech recognition failed: {0}")]
    Inference(String),
}

/// Forward-only stream of transcript segments, consumed once.
pub type SegmentStream = Box<dyn Iterator<Item = TranscriptSegment>>;

/// Domain interface for speech-to-text transcription.
///
/// Implementations run inference on audio and hand back segments lazily, so
/// the indexing pipeline can start writing before every segment has been
/// turned into words.
pub trait SpeechRecognizer {
    fn transcribe(&self, audio: &AudioTrack) -> Result<SegmentStream, RecognizerError>;
}
