//! Dominant frequency estimation.

use std::{
    collections::HashMap,
    f32::consts::PI,
    ops::RangeInclusive,
    str::FromStr,
};

use num_complex::Complex;
use rustfft::FftPlanner;

use crate::util::FrequencyBand;

/// Estimates the dominant frequency of short sample segments.
///
/// The segment is windowed, transformed with a DFT of the same length and the
/// bin with the largest magnitude inside the requested band wins. The
/// resolution is therefore `sample_rate / segment.len()`.
///
/// FFT plans and window coefficients are cached per segment length, so a
/// detector should be reused for segments of recurring lengths.
#[derive(derive_more::Debug)]
pub struct FrequencyDetector {
    sample_rate: f32,
    window: Window,
    #[debug(skip)]
    planner: FftPlanner<f32>,
    #[debug(skip)]
    window_coefficients: HashMap<usize, Vec<f32>>,
    #[debug(skip)]
    buffer: Vec<Complex<f32>>,
    #[debug(skip)]
    scratch: Vec<Complex<f32>>,
}

impl FrequencyDetector {
    pub fn new(sample_rate: f32) -> Self {
        Self {
            sample_rate,
            window: Window::Hann,
            planner: FftPlanner::new(),
            window_coefficients: HashMap::new(),
            buffer: vec![],
            scratch: vec![],
        }
    }

    pub fn with_window(mut self, window: Window) -> Self {
        if window != self.window {
            self.window = window;
            self.window_coefficients.clear();
        }
        self
    }

    #[inline]
    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    /// Returns the frequency of the strongest bin in `band`.
    ///
    /// If no bin falls into `band`, `band.low` is returned.
    ///
    /// # Panics
    ///
    /// Panics if `segment` is empty.
    pub fn detect(&mut self, segment: &[f32], band: FrequencyBand) -> f32 {
        assert!(
            !segment.is_empty(),
            "Can't detect frequency of an empty segment"
        );

        let size = segment.len();
        let Some(bins) = band_bins(size, self.sample_rate, band)
        else {
            return band.low;
        };

        let window = self.window;
        let coefficients = self
            .window_coefficients
            .entry(size)
            .or_insert_with(|| window.to_vec(size));

        self.buffer.clear();
        self.buffer.extend(
            segment
                .iter()
                .zip(coefficients.iter())
                .map(|(sample, coefficient)| Complex::new(sample * coefficient, 0.0)),
        );

        let fft = self.planner.plan_fft_forward(size);
        self.scratch
            .resize(fft.get_inplace_scratch_len(), Default::default());
        fft.process_with_scratch(&mut self.buffer, &mut self.scratch);

        let first = *bins.start();
        let (peak, _) = bins.fold((first, -1.0f32), |(best, best_magnitude), bin| {
            let magnitude = self.buffer[bin].norm_sqr();
            if magnitude > best_magnitude {
                (bin, magnitude)
            }
            else {
                (best, best_magnitude)
            }
        });

        bin_frequency(peak, size, self.sample_rate)
    }
}

/// One-shot version of [`FrequencyDetector::detect`] with a Hann window.
pub fn detect_frequency(segment: &[f32], sample_rate: f32, band: FrequencyBand) -> f32 {
    FrequencyDetector::new(sample_rate).detect(segment, band)
}

#[inline]
pub fn bin_frequency(bin: usize, size: usize, sample_rate: f32) -> f32 {
    bin as f32 * sample_rate / size as f32
}

/// DFT bins of a `size`-point transform whose frequency lies in `band`.
///
/// Only the non-negative half of the spectrum (`0..=size/2`) is considered.
pub fn band_bins(size: usize, sample_rate: f32, band: FrequencyBand) -> Option<RangeInclusive<usize>> {
    // absorbs rounding when a band edge sits exactly on a bin
    const EPSILON: f32 = 1e-4;

    if size == 0 {
        return None;
    }

    let bin_width = sample_rate / size as f32;
    let first = (band.low / bin_width - EPSILON).ceil().max(0.0) as usize;
    let last = (band.high / bin_width + EPSILON).floor();
    if last < 0.0 {
        return None;
    }
    let last = (last as usize).min(size / 2);

    (first <= last).then(|| first..=last)
}

/// Power of `segment` at `frequency`, normalized by the segment length.
///
/// Single-bin Goertzel filter over a rectangular window. A full-scale sine at
/// `frequency` spanning the whole segment yields about `0.25`.
pub fn tone_power(segment: &[f32], frequency: f32, sample_rate: f32) -> f32 {
    if segment.is_empty() {
        return 0.0;
    }

    let coefficient = 2.0 * (std::f64::consts::TAU * f64::from(frequency) / f64::from(sample_rate)).cos();
    let mut s = [0.0f64; 2];
    for sample in segment {
        let s0 = f64::from(*sample) + coefficient * s[0] - s[1];
        s[1] = s[0];
        s[0] = s0;
    }

    let power = s[0] * s[0] + s[1] * s[1] - coefficient * s[0] * s[1];
    let n = segment.len() as f64;
    (power / (n * n)) as f32
}

/// Share of the segment's energy that sits at `frequency`.
///
/// About `0.5` for a pure tone at `frequency`, close to 0 for noise or other
/// tones. A silent segment yields 0.
pub fn tone_dominance(segment: &[f32], frequency: f32, sample_rate: f32) -> f32 {
    let energy = segment
        .iter()
        .map(|sample| sample * sample)
        .sum::<f32>()
        / segment.len().max(1) as f32;

    if energy > 0.0 {
        tone_power(segment, frequency, sample_rate) / energy
    }
    else {
        0.0
    }
}

fn hann_window(n: usize) -> impl Iterator<Item = f32> {
    let n_f32 = n as f32;
    (0..=n).map(move |i| (PI * i as f32 / n_f32).sin().powi(2))
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Window {
    Boxcar,
    #[default]
    Hann,
}

impl FromStr for Window {
    type Err = UnknownWindow;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "boxcar" | "rectangular" => Ok(Self::Boxcar),
            "hann" | "hanning" => Ok(Self::Hann),
            _ => Err(UnknownWindow(s.to_owned())),
        }
    }
}

impl Window {
    pub fn to_vec(&self, size: usize) -> Vec<f32> {
        match self {
            // a single-point hann window would be 0/0
            Window::Hann if size > 1 => hann_window(size - 1).collect(),
            _ => std::iter::repeat_n(1.0, size).collect(),
        }
    }
}

#[derive(Clone, Debug, thiserror::Error)]
#[error("No such window: {0}")]
pub struct UnknownWindow(pub String);

#[cfg(test)]
mod tests {
    use crate::{
        detect::{
            FrequencyDetector,
            Window,
            band_bins,
            detect_frequency,
            tone_dominance,
            tone_power,
        },
        source::tone,
        util::FrequencyBand,
    };

    const SAMPLE_RATE: f32 = 44100.0;
    const WIDE: FrequencyBand = FrequencyBand::new(1000.0, 2500.0);

    #[test]
    fn detects_tone_on_bin() {
        // 441 samples give 100 Hz bins
        let samples = tone(1900.0, 0.01, SAMPLE_RATE).unwrap();
        assert_eq!(samples.len(), 441);
        assert_eq!(detect_frequency(&samples, SAMPLE_RATE, WIDE), 1900.0);
    }

    #[test]
    fn detects_nearest_bin_for_off_bin_tone() {
        let samples = tone(1730.0, 0.01, SAMPLE_RATE).unwrap();
        assert_eq!(detect_frequency(&samples, SAMPLE_RATE, WIDE), 1700.0);

        let samples = tone(1770.0, 0.01, SAMPLE_RATE).unwrap();
        assert_eq!(detect_frequency(&samples, SAMPLE_RATE, WIDE), 1800.0);
    }

    #[test]
    fn ignores_energy_outside_of_band() {
        let mut samples = tone(1200.0, 0.01, SAMPLE_RATE).unwrap();
        let weak = tone(2000.0, 0.01, SAMPLE_RATE).unwrap();
        for (sample, weak) in samples.iter_mut().zip(&weak) {
            *sample += 0.1 * weak;
        }

        assert_eq!(detect_frequency(&samples, SAMPLE_RATE, WIDE), 1200.0);
        assert_eq!(
            detect_frequency(&samples, SAMPLE_RATE, FrequencyBand::new(1500.0, 2300.0)),
            2000.0
        );
    }

    #[test]
    fn falls_back_to_band_low_without_bins() {
        // 13 samples give ~3392 Hz bins, none of which lie in the pixel band
        let samples = tone(2000.0, 13.0 / SAMPLE_RATE, SAMPLE_RATE).unwrap();
        assert_eq!(samples.len(), 13);
        let band = FrequencyBand::new(1500.0, 2300.0);
        assert_eq!(detect_frequency(&samples, SAMPLE_RATE, band), 1500.0);
    }

    #[test]
    fn silence_yields_lowest_bin_in_band() {
        let samples = vec![0.0; 441];
        assert_eq!(detect_frequency(&samples, SAMPLE_RATE, WIDE), 1000.0);
    }

    #[test]
    fn reuses_detector_across_lengths() {
        let mut detector = FrequencyDetector::new(SAMPLE_RATE).with_window(Window::Boxcar);
        let short = tone(1200.0, 0.01, SAMPLE_RATE).unwrap();
        let long = tone(1900.0, 0.3, SAMPLE_RATE).unwrap();
        for _ in 0..3 {
            assert_eq!(detector.detect(&short, WIDE), 1200.0);
            assert!((detector.detect(&long, WIDE) - 1900.0).abs() < 3.4);
        }
    }

    #[test]
    #[should_panic]
    fn empty_segment_panics() {
        detect_frequency(&[], SAMPLE_RATE, WIDE);
    }

    #[test]
    fn band_bins_are_clipped_to_nyquist() {
        assert_eq!(
            band_bins(10, 100.0, FrequencyBand::new(20.0, 1000.0)),
            Some(2..=5)
        );
        assert_eq!(band_bins(882, 44100.0, FrequencyBand::new(1500.0, 2300.0)), Some(30..=46));
        assert_eq!(band_bins(13, 44100.0, FrequencyBand::new(1500.0, 2300.0)), None);
        assert_eq!(band_bins(0, 44100.0, FrequencyBand::new(1500.0, 2300.0)), None);
    }

    #[test]
    fn hann_window_shape() {
        let window = Window::Hann.to_vec(5);
        assert_eq!(window.len(), 5);
        assert!(window[0].abs() < 1e-6);
        assert!((window[2] - 1.0).abs() < 1e-6);
        assert_eq!(Window::Hann.to_vec(1), vec![1.0]);
        assert_eq!("hanning".parse::<Window>().unwrap(), Window::Hann);
        assert!("kaiser".parse::<Window>().is_err());
    }

    #[test]
    fn tone_power_peaks_on_aligned_tone() {
        let sync = tone(1200.0, 0.01, SAMPLE_RATE).unwrap();
        let separator = tone(1500.0, 0.01, SAMPLE_RATE).unwrap();
        assert!((tone_power(&sync, 1200.0, SAMPLE_RATE) - 0.25).abs() < 1e-3);
        assert!(tone_power(&separator, 1200.0, SAMPLE_RATE) < 1e-6);

        let mut samples = vec![0.0; 100];
        samples.extend(&sync);
        samples.extend(&separator);

        let best = (0..=200)
            .max_by(|a, b| {
                tone_power(&samples[*a..][..441], 1200.0, SAMPLE_RATE)
                    .total_cmp(&tone_power(&samples[*b..][..441], 1200.0, SAMPLE_RATE))
            })
            .unwrap();
        assert!(best.abs_diff(100) <= 2, "peak at {best}");
        assert_eq!(tone_power(&[], 1200.0, SAMPLE_RATE), 0.0);
    }

    #[test]
    fn tone_dominance_separates_tone_from_silence_and_other_tones() {
        let vis = tone(1900.0, 0.3, SAMPLE_RATE).unwrap();
        assert!((tone_dominance(&vis, 1900.0, SAMPLE_RATE) - 0.5).abs() < 0.01);
        assert!(tone_dominance(&vis[..441], 1200.0, SAMPLE_RATE) < 0.01);
        assert_eq!(tone_dominance(&[0.0; 441], 1900.0, SAMPLE_RATE), 0.0);

        // a quarter of the window carries the tone, the rest is silent
        let mut samples = vec![0.0; 3 * 441];
        samples.extend(&vis[..441]);
        let dominance = tone_dominance(&samples, 1900.0, SAMPLE_RATE);
        assert!((dominance - 0.125).abs() < 0.01, "{dominance}");
    }
}
