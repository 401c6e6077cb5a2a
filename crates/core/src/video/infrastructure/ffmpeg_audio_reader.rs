use std::path::Path;

use ffmpeg_next::format::sample::Type as SampleLayout;
use ffmpeg_next::format::Sample;
use ffmpeg_next::software::resampling;
use ffmpeg_next::util::frame::audio::Audio;
use ffmpeg_next::{ChannelLayout, media};

use crate::audio::domain::audio_track::AudioTrack;
use crate::video::domain::audio_reader::{AudioExtractError, AudioReader};

/// Decodes the best audio stream of a video with ffmpeg-next and resamples
/// it to mono f32.
pub struct FfmpegAudioReader;

impl AudioReader for FfmpegAudioReader {
    fn read_audio(
        &self,
        path: &Path,
        target_sample_rate: u32,
    ) -> Result<Option<AudioTrack>, AudioExtractError> {
        decode_mono(path, target_sample_rate).map_err(|e| AudioExtractError::new(path, e))
    }
}

fn decode_mono(path: &Path, target_sample_rate: u32) -> Result<Option<AudioTrack>, ffmpeg_next::Error> {
    ffmpeg_next::init()?;

    let mut ictx = ffmpeg_next::format::input(path)?;
    let (stream_index, parameters) = match ictx.streams().best(media::Type::Audio) {
        Some(stream) => (stream.index(), stream.parameters()),
        None => return Ok(None),
    };

    let mut decoder = ffmpeg_next::codec::context::Context::from_parameters(parameters)?
        .decoder()
        .audio()?;
    log::debug!(
        "Decoding audio stream #{stream_index}: {} Hz, {} channels",
        decoder.rate(),
        decoder.channels()
    );

    let mut resampler = resampling::Context::get(
        decoder.format(),
        decoder.channel_layout(),
        decoder.rate(),
        Sample::F32(SampleLayout::Planar),
        ChannelLayout::MONO,
        target_sample_rate,
    )?;

    let mut samples: Vec<f32> = Vec::new();
    let mut decoded = Audio::empty();
    let mut resampled = Audio::empty();

    for (stream, packet) in ictx.packets() {
        if stream.index() != stream_index {
            continue;
        }
        decoder.send_packet(&packet)?;
        while decoder.receive_frame(&mut decoded).is_ok() {
            resampler.run(&decoded, &mut resampled)?;
            append_mono_samples(&resampled, &mut samples);
        }
    }

    decoder.send_eof()?;
    while decoder.receive_frame(&mut decoded).is_ok() {
        resampler.run(&decoded, &mut resampled)?;
        append_mono_samples(&resampled, &mut samples);
    }

    // The resampler may still hold a tail of buffered samples
    if let Ok(Some(delay)) = resampler.flush(&mut resampled) {
        if delay.output > 0 {
            append_mono_samples(&resampled, &mut samples);
        }
    }

    Ok(Some(AudioTrack::new(samples, target_sample_rate)))
}

/// Copy the samples of a planar mono f32 frame.
fn append_mono_samples(frame: &Audio, out: &mut Vec<f32>) {
    let count = frame.samples();
    if count == 0 {
        return;
    }
    let data = frame.data(0);
    let floats = unsafe { std::slice::from_raw_parts(data.as_ptr() as *const f32, count) };
    out.extend_from_slice(floats);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_audio_nonexistent_file() {
        let path = if cfg!(windows) {
            Path::new("Z:\\nonexistent\\file.mp4")
        } else {
            Path::new("/nonexistent/file.mp4")
        };
        let err = FfmpegAudioReader.read_audio(path, 16000).unwrap_err();
        assert_eq!(err.path, path);
    }

    #[test]
    fn test_read_audio_rejects_non_media_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.mp4");
        std::fs::write(&path, b"definitely not a video").unwrap();
        assert!(FfmpegAudioReader.read_audio(&path, 16000).is_err());
    }
}
