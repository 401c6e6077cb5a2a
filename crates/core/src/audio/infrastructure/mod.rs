pub mod wav_file;
pub mod whisper_recognizer;
