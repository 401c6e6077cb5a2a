use std::path::{Path, PathBuf};

use whisper_rs::{FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters, WhisperState};

use crate::audio::domain::audio_track::AudioTrack;
use crate::audio::domain::speech_recognizer::{RecognizerError, SegmentStream, SpeechRecognizer};
use crate::audio::domain::transcript::TranscriptSegment;
use crate::audio::domain::word_assembler::{assemble_words, RecognizedToken};

#[derive(Clone, Debug)]
pub struct WhisperOptions {
    /// ISO 639-1 code, or "auto" to let whisper detect it.
    pub language: String,
    pub threads: usize,
    pub use_gpu: bool,
}

impl Default for WhisperOptions {
    fn default() -> Self {
        Self {
            language: "es".to_string(),
            threads: 1,
            use_gpu: false,
        }
    }
}

/// Speech recognizer using whisper.cpp via whisper-rs.
///
/// Inference runs over the whole track up front; words are pulled out of
/// the decoder state one segment at a time as the stream is consumed.
#[derive(Debug)]
pub struct WhisperRecognizer {
    model_path: PathBuf,
    options: WhisperOptions,
}

impl WhisperRecognizer {
    pub fn new(model_path: &Path, options: WhisperOptions) -> Result<Self, RecognizerError> {
        if !model_path.exists() {
            return Err(RecognizerError::ModelNotFound(model_path.to_path_buf()));
        }
        Ok(Self {
            model_path: model_path.to_path_buf(),
            options,
        })
    }
}

impl SpeechRecognizer for WhisperRecognizer {
    fn transcribe(&self, audio: &AudioTrack) -> Result<SegmentStream, RecognizerError> {
        let model = self
            .model_path
            .to_str()
            .ok_or_else(|| RecognizerError::Load("model path is not valid UTF-8".to_string()))?;

        let mut ctx_params = WhisperContextParameters::default();
        ctx_params.use_gpu(self.options.use_gpu);
        let ctx = WhisperContext::new_with_params(model, ctx_params)
            .map_err(|e| RecognizerError::Load(e.to_string()))?;

        let mut state = ctx
            .create_state()
            .map_err(|e| RecognizerError::Load(format!("failed to create state: {e}")))?;

        let language = match self.options.language.as_str() {
            "auto" | "" => None,
            code => Some(code),
        };

        let mut params = FullParams::new(SamplingStrategy::Greedy { best_of: 1 });
        params.set_language(language);
        params.set_translate(false);
        params.set_token_timestamps(true);
        params.set_print_special(false);
        params.set_print_progress(false);
        params.set_print_realtime(false);
        params.set_print_timestamps(false);
        params.set_n_threads(self.options.threads.max(1) as i32);

        log::info!(
            "Transcribing {:.1}s of audio with {} ({} threads, gpu: {})",
            audio.duration(),
            self.model_path.display(),
            self.options.threads.max(1),
            self.options.use_gpu
        );
        state
            .full(params, audio.samples())
            .map_err(|e| RecognizerError::Inference(e.to_string()))?;

        let total = state.full_n_segments();
        log::debug!("Whisper produced {total} segments");
        Ok(Box::new(WhisperSegments {
            state,
            next: 0,
            total,
        }))
    }
}

/// Lazily converts decoded whisper segments into transcript segments.
struct WhisperSegments {
    state: WhisperState,
    next: i32,
    total: i32,
}

impl Iterator for WhisperSegments {
    type Item = TranscriptSegment;

    fn next(&mut self) -> Option<TranscriptSegment> {
        while self.next < self.total {
            let seg_idx = self.next;
            self.next += 1;

            let segment = match self.state.get_segment(seg_idx) {
                Some(s) => s,
                None => continue,
            };

            let mut tokens = Vec::new();
            for tok_idx in 0..segment.n_tokens() {
                let token = match segment.get_token(tok_idx) {
                    Some(t) => t,
                    None => continue,
                };
                // Raw bytes: a token may end in the middle of a character
                let bytes = match token.to_bytes() {
                    Ok(b) => b.to_vec(),
                    Err(_) => continue,
                };
                // Token timestamps are in centiseconds
                let data = token.token_data();
                tokens.push(RecognizedToken {
                    bytes,
                    start_time: data.t0 as f64 / 100.0,
                    end_time: data.t1 as f64 / 100.0,
                    probability: f64::from(token.token_probability()),
                });
            }

            return Some(TranscriptSegment::from_words(assemble_words(tokens)));
        }
        None
    }
}
