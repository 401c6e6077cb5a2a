use std::path::{Path, PathBuf};
use std::time::Instant;

use thiserror::Error;

use crate::audio::domain::speech_recognizer::{RecognizerError, SpeechRecognizer};
use crate::audio::infrastructure::wav_file::{read_wav, write_wav, WavError};
use crate::index::domain::span_repository::{SpanSink, StoreError};
use crate::shared::constants::WHISPER_SAMPLE_RATE;
use crate::video::domain::audio_reader::{AudioExtractError, AudioReader};

use super::index_transcript_use_case::{IndexTranscriptUseCase, IndexingConfig, IndexingStats};
use super::pipeline_logger::PipelineLogger;

#[derive(Error, Debug)]
pub enum IndexVideoError {
    #[error("video not found: {0}")]
    InputMissing(PathBuf),
    #[error("no audio track in {0}")]
    NoAudioTrack(PathBuf),
    #[error(transparent)]
    AudioExtraction(#[from] AudioExtractError),
    #[error(transparent)]
    Wav(#[from] WavError),
    #[error(transparent)]
    Transcription(#[from] RecognizerError),
    #[error(transparent)]
    Storage(#[from] StoreError),
}

/// Video in, span store out: decode the audio, stage it as a WAV file,
/// transcribe it and stream the segments through the indexing pipeline.
pub struct IndexVideoUseCase {
    reader: Box<dyn AudioReader>,
    recognizer: Box<dyn SpeechRecognizer>,
    indexer: IndexTranscriptUseCase,
}

impl IndexVideoUseCase {
    pub fn new(
        reader: Box<dyn AudioReader>,
        recognizer: Box<dyn SpeechRecognizer>,
        config: IndexingConfig,
        logger: Box<dyn PipelineLogger>,
    ) -> Self {
        Self {
            reader,
            recognizer,
            indexer: IndexTranscriptUseCase::new(config, logger),
        }
    }

    pub fn logger(&self) -> &dyn PipelineLogger {
        self.indexer.logger()
    }

    /// `open_store` is only called once the audio has been transcribed, so
    /// a bad input never touches the store. The staged WAV at `audio_path`
    /// is removed afterwards unless `keep_audio` is set, whether or not
    /// indexing succeeded.
    pub fn run<S: SpanSink>(
        &mut self,
        video_path: &Path,
        audio_path: &Path,
        keep_audio: bool,
        open_store: impl FnOnce() -> Result<S, StoreError>,
    ) -> Result<(IndexingStats, S), IndexVideoError> {
        if !video_path.exists() {
            return Err(IndexVideoError::InputMissing(video_path.to_path_buf()));
        }

        let result = self.index_staged(video_path, audio_path, open_store);

        if !keep_audio && audio_path.exists() {
            if let Err(e) = std::fs::remove_file(audio_path) {
                log::warn!("could not remove {}: {e}", audio_path.display());
            }
        }
        result
    }

    fn index_staged<S: SpanSink>(
        &mut self,
        video_path: &Path,
        audio_path: &Path,
        open_store: impl FnOnce() -> Result<S, StoreError>,
    ) -> Result<(IndexingStats, S), IndexVideoError> {
        // 1. Decode and stage the audio
        let started = Instant::now();
        let track = self
            .reader
            .read_audio(video_path, WHISPER_SAMPLE_RATE)?
            .ok_or_else(|| IndexVideoError::NoAudioTrack(video_path.to_path_buf()))?;
        write_wav(audio_path, &track)?;
        self.timing("extract_audio", started);
        self.indexer.logger_mut().info(&format!(
            "audio ready: {} ({:.1}s)",
            audio_path.display(),
            track.duration()
        ));

        // 2. Transcribe what was staged
        let started = Instant::now();
        let staged = read_wav(audio_path)?;
        let segments = self.recognizer.transcribe(&staged)?;
        self.timing("transcribe", started);

        // 3. Index
        let started = Instant::now();
        let mut store = open_store()?;
        let stats = self.indexer.run(segments, &mut store)?;
        self.timing("index", started);

        Ok((stats, store))
    }

    fn timing(&mut self, stage: &str, started: Instant) {
        self.indexer
            .logger_mut()
            .timing(stage, started.elapsed().as_secs_f64() * 1000.0);
    }
}
