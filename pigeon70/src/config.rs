//! Protocol timing and frequency configuration.
//!
//! Encoder and decoder must agree on every value in here. A [`ProtocolConfig`]
//! is therefore the wire contract of a transmission.

use crate::{
    detect::band_bins,
    util::{
        FrequencyBand,
        lerp,
        unlerp,
    },
};

#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(default)
)]
pub struct ProtocolConfig {
    pub width: usize,
    pub height: usize,
    pub sample_rate: f32,

    pub vis_tone: f32,
    pub vis_time: f32,
    pub sync_tone: f32,
    pub sync_time: f32,
    pub separator_tone: f32,
    pub separator_time: f32,

    /// Duration of a single channel of a single pixel.
    pub pixel_time: f32,
    /// Intensities 0..=255 are mapped linearly onto this band.
    pub pixel_band: FrequencyBand,

    /// Band in which VIS and sync markers are searched for.
    pub marker_band: FrequencyBand,

    /// Peak amplitude of the normalized waveform.
    pub amplitude: f32,

    pub vis_search_limit: f32,
    pub vis_search_step: f32,
    pub vis_tolerance: f32,

    pub sync_search_window: f32,
    pub sync_search_step: f32,
    pub sync_tolerance: f32,
}

impl ProtocolConfig {
    /// Number of pixel slots in one line (RGB for each column).
    pub const SLOTS_PER_LINE: usize = 320 * 3;

    pub const PIGEON70: Self = Self {
        width: 320,
        height: 240,
        sample_rate: 44100.0,
        vis_tone: 1900.0,
        vis_time: 300e-3,
        sync_tone: 1200.0,
        sync_time: 10e-3,
        separator_tone: 1500.0,
        separator_time: 10e-3,
        // 295 ms line budget minus sync and separator, spread over 960 slots.
        pixel_time: (295e-3 - 20e-3) / Self::SLOTS_PER_LINE as f32,
        pixel_band: FrequencyBand::new(1500.0, 2300.0),
        marker_band: FrequencyBand::new(1000.0, 2500.0),
        amplitude: 0.8,
        vis_search_limit: 2.0,
        vis_search_step: 10e-3,
        vis_tolerance: 50.0,
        sync_search_window: 300e-3,
        sync_search_step: 1e-3,
        sync_tolerance: 100.0,
    };

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.width == 0 || self.height == 0 {
            return Err(ConfigError::ZeroDimension {
                width: self.width,
                height: self.height,
            });
        }

        if !(self.sample_rate.is_finite() && self.sample_rate > 0.0) {
            return Err(ConfigError::InvalidSampleRate(self.sample_rate));
        }

        for (name, value) in [
            ("vis_time", self.vis_time),
            ("sync_time", self.sync_time),
            ("separator_time", self.separator_time),
            ("pixel_time", self.pixel_time),
            ("vis_search_limit", self.vis_search_limit),
            ("vis_search_step", self.vis_search_step),
            ("sync_search_window", self.sync_search_window),
            ("sync_search_step", self.sync_search_step),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(ConfigError::NonPositiveDuration { name, value });
            }
            if self.samples(value) == 0 {
                return Err(ConfigError::ShorterThanSample { name, value });
            }
        }

        for (name, value) in [
            ("vis_tone", self.vis_tone),
            ("sync_tone", self.sync_tone),
            ("separator_tone", self.separator_tone),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(ConfigError::NonPositiveFrequency { name, value });
            }
        }

        for (name, band) in [
            ("pixel_band", self.pixel_band),
            ("marker_band", self.marker_band),
        ] {
            if !(band.low.is_finite() && band.high.is_finite() && band.low > 0.0)
                || !(band.bandwidth() > 0.0)
            {
                return Err(ConfigError::InvalidBand { name, band });
            }
        }

        if !(self.amplitude > 0.0 && self.amplitude <= 1.0) {
            return Err(ConfigError::InvalidAmplitude(self.amplitude));
        }

        for (name, value) in [
            ("vis_tolerance", self.vis_tolerance),
            ("sync_tolerance", self.sync_tolerance),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(ConfigError::NonPositiveTolerance { name, value });
            }
        }

        Ok(())
    }

    /// Converts a duration into a whole number of samples.
    ///
    /// Every segment of the waveform is rounded with this, on both sides.
    #[inline]
    pub fn samples(&self, duration: f32) -> usize {
        (duration * self.sample_rate).round().max(0.0) as usize
    }

    #[inline]
    pub fn vis_len(&self) -> usize {
        self.samples(self.vis_time)
    }

    #[inline]
    pub fn sync_len(&self) -> usize {
        self.samples(self.sync_time)
    }

    #[inline]
    pub fn separator_len(&self) -> usize {
        self.samples(self.separator_time)
    }

    #[inline]
    pub fn pixel_len(&self) -> usize {
        self.samples(self.pixel_time)
    }

    #[inline]
    pub fn slots_per_line(&self) -> usize {
        self.width * 3
    }

    pub fn line_len(&self) -> usize {
        self.sync_len() + self.separator_len() + self.slots_per_line() * self.pixel_len()
    }

    /// Exact number of samples the encoder produces.
    pub fn waveform_len(&self) -> usize {
        self.vis_len() + self.height * self.line_len()
    }

    /// Transmission time in seconds.
    pub fn duration(&self) -> f32 {
        self.waveform_len() as f32 / self.sample_rate
    }

    #[inline]
    pub fn pixel_to_frequency(&self, value: u8) -> f32 {
        lerp(
            value as f32 / 255.0,
            self.pixel_band.low,
            self.pixel_band.high,
        )
    }

    /// Inverse of [`pixel_to_frequency`](Self::pixel_to_frequency). Frequencies
    /// outside of the pixel band saturate.
    #[inline]
    pub fn frequency_to_pixel(&self, frequency: f32) -> u8 {
        let t = unlerp(frequency, self.pixel_band.low, self.pixel_band.high);
        (t * 255.0).round().clamp(0.0, 255.0) as u8
    }

    pub fn pixel_resolution(&self) -> PixelResolution {
        let samples = self.pixel_len();
        let bin_width = self.sample_rate / samples as f32;
        let bins_in_band = band_bins(samples, self.sample_rate, self.pixel_band)
            .map_or(0, |bins| bins.count());

        PixelResolution {
            samples,
            bin_width,
            bins_in_band,
            levels: bins_in_band.min(256),
        }
    }
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self::PIGEON70
    }
}

/// How finely a single pixel slot can be resolved in frequency.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PixelResolution {
    pub samples: usize,
    /// Width of one DFT bin in Hz.
    pub bin_width: f32,
    pub bins_in_band: usize,
    /// Distinguishable intensity levels.
    pub levels: usize,
}

impl PixelResolution {
    #[inline]
    pub fn is_marginal(&self) -> bool {
        self.levels < 256
    }
}

#[derive(Clone, Copy, Debug, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("image dimensions must be non-zero: {width}x{height}")]
    ZeroDimension { width: usize, height: usize },
    #[error("invalid sample rate: {0}")]
    InvalidSampleRate(f32),
    #[error("{name} must be positive: {value}")]
    NonPositiveDuration { name: &'static str, value: f32 },
    #[error("{name} is shorter than one sample: {value}")]
    ShorterThanSample { name: &'static str, value: f32 },
    #[error("{name} must be positive: {value}")]
    NonPositiveFrequency { name: &'static str, value: f32 },
    #[error("invalid {name}: {band:?}")]
    InvalidBand {
        name: &'static str,
        band: FrequencyBand,
    },
    #[error("amplitude must be in (0, 1]: {0}")]
    InvalidAmplitude(f32),
    #[error("{name} must be positive: {value}")]
    NonPositiveTolerance { name: &'static str, value: f32 },
}

#[cfg(test)]
mod tests {
    use crate::{
        config::{
            ConfigError,
            ProtocolConfig,
        },
        util::FrequencyBand,
    };

    #[test]
    fn pigeon70_is_valid() {
        ProtocolConfig::PIGEON70.validate().unwrap();
    }

    #[test]
    fn pigeon70_segment_lengths() {
        let config = ProtocolConfig::PIGEON70;
        assert_eq!(config.vis_len(), 13230);
        assert_eq!(config.sync_len(), 441);
        assert_eq!(config.separator_len(), 441);
        assert_eq!(config.pixel_len(), 13);
        assert_eq!(config.line_len(), 441 + 441 + 960 * 13);
        assert_eq!(config.waveform_len(), 13230 + 240 * config.line_len());
    }

    #[test]
    fn pixel_mapping_round_trips() {
        let config = ProtocolConfig::PIGEON70;
        for value in 0..=255u8 {
            assert_eq!(
                config.frequency_to_pixel(config.pixel_to_frequency(value)),
                value
            );
        }
    }

    #[test]
    fn pixel_mapping_endpoints() {
        let config = ProtocolConfig::PIGEON70;
        assert_eq!(config.pixel_to_frequency(0), 1500.0);
        assert_eq!(config.pixel_to_frequency(255), 2300.0);
    }

    #[test]
    fn frequency_to_pixel_clamps() {
        let config = ProtocolConfig::PIGEON70;
        for frequency in [0.0, 1000.0, 1499.9, 1500.0] {
            assert_eq!(config.frequency_to_pixel(frequency), 0);
        }
        for frequency in [2300.0, 2300.1, 2500.0, 20000.0] {
            assert_eq!(config.frequency_to_pixel(frequency), 255);
        }
    }

    #[test]
    fn pigeon70_pixel_resolution_is_marginal() {
        let resolution = ProtocolConfig::PIGEON70.pixel_resolution();
        assert_eq!(resolution.samples, 13);
        assert_eq!(resolution.bins_in_band, 0);
        assert!(resolution.is_marginal());
    }

    #[test]
    fn long_pixel_tones_resolve_more_levels() {
        let config = ProtocolConfig {
            pixel_time: 20e-3,
            ..ProtocolConfig::PIGEON70
        };
        let resolution = config.pixel_resolution();
        assert_eq!(resolution.samples, 882);
        assert_eq!(resolution.bin_width, 50.0);
        // 1500, 1550, ..., 2300
        assert_eq!(resolution.bins_in_band, 17);
        assert!(resolution.is_marginal());
    }

    #[test]
    fn rejects_inverted_band() {
        let config = ProtocolConfig {
            pixel_band: FrequencyBand::new(2300.0, 1500.0),
            ..ProtocolConfig::PIGEON70
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidBand {
                name: "pixel_band",
                ..
            })
        ));
    }

    #[test]
    fn rejects_non_positive_duration() {
        let config = ProtocolConfig {
            sync_time: 0.0,
            ..ProtocolConfig::PIGEON70
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::NonPositiveDuration {
                name: "sync_time",
                ..
            })
        ));

        let config = ProtocolConfig {
            pixel_time: -1.0,
            ..ProtocolConfig::PIGEON70
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_sub_sample_duration() {
        let config = ProtocolConfig {
            pixel_time: 1e-6,
            ..ProtocolConfig::PIGEON70
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ShorterThanSample { .. })
        ));
    }

    #[test]
    fn rejects_bad_sample_rate_and_dimensions() {
        let config = ProtocolConfig {
            sample_rate: 0.0,
            ..ProtocolConfig::PIGEON70
        };
        assert_eq!(config.validate(), Err(ConfigError::InvalidSampleRate(0.0)));

        let config = ProtocolConfig {
            width: 0,
            ..ProtocolConfig::PIGEON70
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ZeroDimension { .. })
        ));
    }
}
