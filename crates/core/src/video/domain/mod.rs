pub mod audio_reader;
