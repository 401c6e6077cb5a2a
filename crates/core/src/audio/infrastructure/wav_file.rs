use std::path::{Path, PathBuf};

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use thiserror::Error;

use crate::audio::domain::audio_track::AudioTrack;

#[derive(Error, Debug)]
pub enum WavError {
    #[error("failed to write WAV file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: hound::Error,
    },
    #[error("failed to read WAV file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: hound::Error,
    },
}

/// Write `track` as 16-bit mono PCM.
pub fn write_wav(path: &Path, track: &AudioTrack) -> Result<(), WavError> {
    let write_err = |e: hound::Error| WavError::Write {
        path: path.to_path_buf(),
        source: e,
    };
    let spec = WavSpec {
        channels: 1,
        sample_rate: track.sample_rate(),
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };
    let mut writer = WavWriter::create(path, spec).map_err(write_err)?;
    for &sample in track.samples() {
        let pcm = (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
        writer.write_sample(pcm).map_err(write_err)?;
    }
    writer.finalize().map_err(write_err)
}

/// Read a WAV file into a mono track, averaging channels if needed.
pub fn read_wav(path: &Path) -> Result<AudioTrack, WavError> {
    let read_err = |e: hound::Error| WavError::Read {
        path: path.to_path_buf(),
        source: e,
    };
    let mut reader = WavReader::open(path).map_err(read_err)?;
    let spec = reader.spec();

    let interleaved: Vec<f32> = match spec.sample_format {
        SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<Result<_, _>>()
            .map_err(read_err)?,
        SampleFormat::Int => {
            let scale = (1i64 << (spec.bits_per_sample.saturating_sub(1))) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<Result<_, _>>()
                .map_err(read_err)?
        }
    };

    let channels = spec.channels.max(1) as usize;
    let samples = if channels == 1 {
        interleaved
    } else {
        interleaved
            .chunks_exact(channels)
            .map(|frame| frame.iter().sum::<f32>() / channels as f32)
            .collect()
    };

    Ok(AudioTrack::new(samples, spec.sample_rate))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use tempfile::TempDir;

    #[test]
    fn test_written_file_reads_back_close_to_original() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("audio_16k.wav");
        let track = AudioTrack::new(vec![0.0, 0.5, -0.5, 0.25], 16000);

        write_wav(&path, &track).unwrap();
        let read = read_wav(&path).unwrap();

        assert_eq!(read.sample_rate(), 16000);
        assert_eq!(read.samples().len(), 4);
        for (a, b) in read.samples().iter().zip(track.samples()) {
            assert_relative_eq!(*a, *b, epsilon = 1e-3);
        }
    }

    #[test]
    fn test_out_of_range_samples_are_clamped() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("loud.wav");
        write_wav(&path, &AudioTrack::new(vec![2.0, -2.0], 16000)).unwrap();
        let read = read_wav(&path).unwrap();
        assert!(read.samples().iter().all(|s| (-1.0..=1.0).contains(s)));
    }

    #[test]
    fn test_stereo_is_downmixed() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("stereo.wav");
        let spec = WavSpec {
            channels: 2,
            sample_rate: 8000,
            bits_per_sample: 32,
            sample_format: SampleFormat::Float,
        };
        let mut writer = WavWriter::create(&path, spec).unwrap();
        for s in [0.2f32, 0.4, -0.2, -0.4] {
            writer.write_sample(s).unwrap();
        }
        writer.finalize().unwrap();

        let read = read_wav(&path).unwrap();
        assert_eq!(read.samples().len(), 2);
        assert_relative_eq!(read.samples()[0], 0.3, epsilon = 1e-6);
        assert_relative_eq!(read.samples()[1], -0.3, epsilon = 1e-6);
    }

    #[test]
    fn test_read_missing_file_fails() {
        let dir = TempDir::new().unwrap();
        let result = read_wav(&dir.path().join("missing.wav"));
        assert!(matches!(result, Err(WavError::Read { .. })));
    }
}
