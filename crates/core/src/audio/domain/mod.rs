pub mod audio_track;
pub mod speech_recognizer;
pub mod transcript;
pub mod word_assembler;
