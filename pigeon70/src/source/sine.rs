use std::f32::consts::TAU;

use crate::source::SignalGenerator;

#[inline]
fn step_from_frequency_and_sample_rate(frequency: f32, sample_rate: f32) -> f32 {
    (TAU * frequency / sample_rate).rem_euclid(TAU)
}

/// Real sinusoid starting at phase 0.
#[derive(Clone, Copy, Debug)]
pub struct SineWave {
    phase: f32,
    step: f32,
}

impl SineWave {
    pub fn new(frequency: f32, sample_rate: f32) -> Self {
        Self {
            phase: 0.0,
            step: step_from_frequency_and_sample_rate(frequency, sample_rate),
        }
    }
}

impl SignalGenerator for SineWave {
    type Sample = f32;

    fn next(&mut self) -> Self::Sample {
        let output = self.phase.sin();
        self.phase += self.step;
        if self.phase > TAU {
            self.phase -= TAU;
        }
        output
    }
}

#[inline]
pub fn sine(frequency: f32, sample_rate: f32) -> SineWave {
    SineWave::new(frequency, sample_rate)
}

/// Synthesizes `round(duration * sample_rate)` samples of
/// `sin(2π · frequency · t)` with `t = i / sample_rate`.
pub fn tone(frequency: f32, duration: f32, sample_rate: f32) -> Result<Vec<f32>, ToneError> {
    if !(sample_rate.is_finite() && sample_rate > 0.0) {
        return Err(ToneError::InvalidSampleRate(sample_rate));
    }
    if !(duration.is_finite() && duration > 0.0) {
        return Err(ToneError::NonPositiveDuration(duration));
    }

    let num_samples = (duration * sample_rate).round() as usize;
    let mut samples = Vec::with_capacity(num_samples);
    sine(frequency, sample_rate).fill(&mut samples, num_samples);
    Ok(samples)
}

#[derive(Clone, Copy, Debug, PartialEq, thiserror::Error)]
pub enum ToneError {
    #[error("tone duration must be positive: {0}")]
    NonPositiveDuration(f32),
    #[error("invalid sample rate: {0}")]
    InvalidSampleRate(f32),
}

#[cfg(test)]
mod tests {
    use std::f32::consts::TAU;

    use approx::assert_abs_diff_eq;

    use crate::source::{
        ToneError,
        tone,
    };

    #[test]
    fn tone_length_is_rounded() {
        assert_eq!(tone(1000.0, 0.3, 44100.0).unwrap().len(), 13230);
        assert_eq!(tone(1000.0, 0.01, 44100.0).unwrap().len(), 441);
        // 12.63 samples
        assert_eq!(tone(1000.0, 0.275 / 960.0, 44100.0).unwrap().len(), 13);
        // 0.4 samples
        assert_eq!(tone(1000.0, 1e-5, 44100.0).unwrap().len(), 0);
    }

    #[test]
    fn tone_matches_sine_formula() {
        let frequency = 1234.0;
        let sample_rate = 44100.0;
        let samples = tone(frequency, 0.05, sample_rate).unwrap();

        assert_eq!(samples[0], 0.0);
        for (i, sample) in samples.iter().enumerate() {
            let t = i as f32 / sample_rate;
            assert_abs_diff_eq!(*sample, (TAU * frequency * t).sin(), epsilon = 1e-3);
        }
    }

    #[test]
    fn tone_rejects_bad_arguments() {
        assert_eq!(
            tone(1000.0, 0.0, 44100.0),
            Err(ToneError::NonPositiveDuration(0.0))
        );
        assert_eq!(
            tone(1000.0, -0.1, 44100.0),
            Err(ToneError::NonPositiveDuration(-0.1))
        );
        assert_eq!(
            tone(1000.0, 0.1, 0.0),
            Err(ToneError::InvalidSampleRate(0.0))
        );
    }
}
