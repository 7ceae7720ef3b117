use std::ops::Deref;

use crate::util::lerp;

/// Mono sample buffer with its sample rate.
///
/// Samples are nominally in `[-1.0, 1.0]`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Waveform {
    samples: Vec<f32>,
    sample_rate: f32,
}

impl Waveform {
    #[inline]
    pub fn new(samples: Vec<f32>, sample_rate: f32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    pub fn from_pcm16(samples: &[i16], sample_rate: f32) -> Self {
        Self::new(samples.iter().copied().map(pcm16_to_sample).collect(), sample_rate)
    }

    #[inline]
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    #[inline]
    pub fn into_samples(self) -> Vec<f32> {
        self.samples
    }

    #[inline]
    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    /// Length in seconds.
    #[inline]
    pub fn duration(&self) -> f32 {
        self.samples.len() as f32 / self.sample_rate
    }

    pub fn peak(&self) -> f32 {
        self.samples
            .iter()
            .fold(0.0f32, |peak, sample| peak.max(sample.abs()))
    }

    /// Scales the waveform so that its peak magnitude equals `amplitude`.
    ///
    /// A silent waveform is left untouched and `false` is returned.
    pub fn normalize(&mut self, amplitude: f32) -> bool {
        let peak = self.peak();
        if peak > 0.0 {
            let scale = amplitude / peak;
            for sample in &mut self.samples {
                *sample *= scale;
            }
            true
        }
        else {
            false
        }
    }

    pub fn to_pcm16(&self) -> Vec<i16> {
        self.samples.iter().copied().map(sample_to_pcm16).collect()
    }

    /// Converts the waveform to `sample_rate` by linear interpolation.
    ///
    /// The duration is kept, rounded down to whole output samples.
    pub fn resample(&self, sample_rate: f32) -> Waveform {
        let ratio = f64::from(self.sample_rate) / f64::from(sample_rate);
        if self.samples.is_empty() || !ratio.is_finite() || ratio <= 0.0 {
            return Waveform::new(vec![], sample_rate);
        }

        let last = self.samples.len() - 1;
        let len = (self.samples.len() as f64 / ratio).floor() as usize;
        let samples = (0..len)
            .map(|i| {
                let position = i as f64 * ratio;
                let index = (position.floor() as usize).min(last);
                let t = (position - index as f64) as f32;
                lerp(
                    t,
                    self.samples[index],
                    self.samples[(index + 1).min(last)],
                )
            })
            .collect();

        Waveform::new(samples, sample_rate)
    }

    /// Keeps at most the first `len` samples.
    pub fn truncate(&mut self, len: usize) {
        self.samples.truncate(len);
    }
}

impl Deref for Waveform {
    type Target = [f32];

    #[inline]
    fn deref(&self) -> &Self::Target {
        &self.samples
    }
}

impl AsRef<[f32]> for Waveform {
    #[inline]
    fn as_ref(&self) -> &[f32] {
        &self.samples
    }
}

/// `round(sample * 32767)`, saturating.
#[inline]
pub fn sample_to_pcm16(sample: f32) -> i16 {
    (sample * i16::MAX as f32)
        .round()
        .clamp(-(i16::MAX as f32), i16::MAX as f32) as i16
}

#[inline]
pub fn pcm16_to_sample(sample: i16) -> f32 {
    (sample as f32 / i16::MAX as f32).max(-1.0)
}
