/// Decoded mono PCM audio, samples normalized to [-1.0, 1.0].
#[derive(Clone, Debug, PartialEq)]
pub struct AudioTrack {
    samples: Vec<f32>,
    sample_rate: u32,
}

impl AudioTrack {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Length in seconds.
    pub fn duration(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_duration() {
        let track = AudioTrack::new(vec![0.0; 48000], 16000);
        assert_relative_eq!(track.duration(), 3.0);
    }

    #[test]
    fn test_zero_sample_rate_has_no_duration() {
        let track = AudioTrack::new(vec![0.0; 10], 0);
        assert_relative_eq!(track.duration(), 0.0);
    }
}
