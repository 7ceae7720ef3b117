//! Blind decoder.
//!
//! Decoding never fails. The decoder first searches for the VIS tone to find
//! the start of the transmission, then re-synchronizes on the sync tone of
//! every line before sampling the pixel slots. Lost synchronization or a
//! truncated recording only degrade the decoded image.

use std::{
    borrow::Cow,
    ops::Range,
};

use image::RgbImage;

use crate::{
    config::{
        ConfigError,
        ProtocolConfig,
    },
    detect::{
        FrequencyDetector,
        Window,
        tone_dominance,
        tone_power,
    },
    frame::{
        Channel,
        FrameBufferMut,
    },
    progress::{
        CancellationToken,
        Progress,
    },
    util::is_tone,
    waveform::Waveform,
};

#[derive(Clone, Copy, Debug)]
pub struct Decoder {
    config: ProtocolConfig,
    window: Window,
}

impl Decoder {
    pub fn new(config: ProtocolConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let resolution = config.pixel_resolution();
        if resolution.is_marginal() {
            tracing::warn!(
                pixel_samples = resolution.samples,
                bin_width = resolution.bin_width,
                levels = resolution.levels,
                "pixel tones are too short to resolve all 256 intensity levels"
            );
        }

        Ok(Self {
            config,
            window: Window::default(),
        })
    }

    pub fn with_window(mut self, window: Window) -> Self {
        self.window = window;
        self
    }

    #[inline]
    pub fn config(&self) -> &ProtocolConfig {
        &self.config
    }

    pub fn decode(&self, waveform: &Waveform) -> RgbImage {
        self.decode_with(waveform, &mut (), &CancellationToken::new())
            .image
    }

    pub fn decode_with<P>(
        &self,
        waveform: &Waveform,
        progress: &mut P,
        cancel: &CancellationToken,
    ) -> Decoded
    where
        P: Progress,
    {
        let mut image = RgbImage::new(0, 0);
        let report = self.decode_into(waveform, &mut image, progress, cancel);
        Decoded { image, report }
    }

    /// Decodes into `frame_buffer`, which is resized to the protocol
    /// dimensions first. Channels that can't be decoded stay 0.
    pub fn decode_into<F, P>(
        &self,
        waveform: &Waveform,
        frame_buffer: &mut F,
        progress: &mut P,
        cancel: &CancellationToken,
    ) -> DecodeReport
    where
        F: FrameBufferMut,
        P: Progress,
    {
        let config = &self.config;
        let waveform = self.resampled(waveform);

        frame_buffer.set_size(config.width, config.height);

        let samples = waveform.samples();
        let mut detector = FrequencyDetector::new(config.sample_rate).with_window(self.window);
        let mut report = DecodeReport::default();

        progress.report(0.0, "Searching for VIS tone");

        let anchor = match self.find_vis(samples, &mut detector) {
            Some(position) => {
                let seconds = position as f32 / config.sample_rate;
                tracing::debug!(position, seconds, "found VIS tone");
                progress.report(0.0, &format!("VIS tone found at {seconds:.2} s"));
                report.anchor = Anchor::Found(position);
                position
            }
            None => {
                tracing::warn!("VIS tone not found, signal may be misaligned");
                progress.report(0.0, "No VIS tone found, starting from the beginning");
                report.anchor = Anchor::Fallback;
                0
            }
        };

        let mut cursor = anchor + config.vis_len();

        for y in 0..config.height {
            if cancel.is_cancelled() {
                tracing::debug!(y, "decoding cancelled");
                report.cancelled = true;
                break;
            }

            progress.report(
                y as f32 / config.height as f32,
                &format!("Decoding line {}/{}", y + 1, config.height),
            );

            match self.find_sync(samples, cursor, &mut detector) {
                Some(position) => {
                    tracing::trace!(y, position, drift = position as isize - cursor as isize, "sync");
                    cursor = position;
                    report.lines_synced += 1;
                }
                None => {
                    tracing::warn!(y, cursor, "sync pulse not found");
                    report.lines_without_sync.push(y);
                }
            }

            // the separator isn't verified, it's assumed to follow the sync tone.
            cursor += config.sync_len() + config.separator_len();

            if let Err(BufferExhausted) =
                self.decode_line(samples, &mut cursor, y, frame_buffer, &mut detector)
            {
                tracing::warn!(y, cursor, "buffer exhausted");
                report.truncated = true;
                break;
            }

            report.lines_decoded += 1;
        }

        if !report.cancelled {
            progress.report(1.0, "Decoding complete");
        }

        report
    }

    /// Converts `waveform` to the protocol sample rate if it was recorded at
    /// another one.
    pub(crate) fn resampled<'a>(&self, waveform: &'a Waveform) -> Cow<'a, Waveform> {
        let expected = self.config.sample_rate;
        let actual = waveform.sample_rate();

        if (actual - expected).abs() > 0.5 {
            tracing::warn!(expected, actual, "sample rate mismatch, resampling");
            Cow::Owned(waveform.resample(expected))
        }
        else {
            Cow::Borrowed(waveform)
        }
    }

    /// Start of the VIS tone within the search limit.
    pub(crate) fn find_vis(
        &self,
        samples: &[f32],
        detector: &mut FrequencyDetector,
    ) -> Option<usize> {
        let config = &self.config;
        let step = config.samples(config.vis_search_step);
        let window = config.vis_len();

        let search = MarkerSearch {
            tone: config.vis_tone,
            tolerance: config.vis_tolerance,
            window,
            step,
        };
        let hit = search.find(
            samples,
            0..config.samples(config.vis_search_limit),
            config,
            detector,
        )?;

        // a window passes once a fraction of it carries the tone, so the onset
        // lies up to one window after the hit.
        Some(search.strongest_onset(
            samples,
            hit.saturating_sub(step)..hit + window + step,
            step,
            config.sample_rate,
        ))
    }

    /// Start of the sync tone within the sync search window after `cursor`.
    pub(crate) fn find_sync(
        &self,
        samples: &[f32],
        cursor: usize,
        detector: &mut FrequencyDetector,
    ) -> Option<usize> {
        let config = &self.config;
        let window = config.sync_len();

        let search = MarkerSearch {
            tone: config.sync_tone,
            tolerance: config.sync_tolerance,
            window,
            step: config.samples(config.sync_search_step),
        };
        let hit = search.find(
            samples,
            cursor..cursor + config.samples(config.sync_search_window),
            config,
            detector,
        )?;

        // also look back half a window, in case the cursor is already past
        // the onset.
        Some(search.strongest_onset(
            samples,
            hit.saturating_sub(window / 2)..hit + window,
            search.step,
            config.sample_rate,
        ))
    }

    fn decode_line<F>(
        &self,
        samples: &[f32],
        cursor: &mut usize,
        y: usize,
        frame_buffer: &mut F,
        detector: &mut FrequencyDetector,
    ) -> Result<(), BufferExhausted>
    where
        F: FrameBufferMut,
    {
        let config = &self.config;
        let pixel_len = config.pixel_len();

        for x in 0..config.width {
            for channel in Channel::ALL {
                let segment = samples
                    .get(*cursor..*cursor + pixel_len)
                    .ok_or(BufferExhausted)?;
                let frequency = detector.detect(segment, config.pixel_band);
                frame_buffer.set_channel(x, y, channel, config.frequency_to_pixel(frequency));
                *cursor += pixel_len;
            }
        }

        Ok(())
    }
}

/// Decodes `waveform` with a [`ProtocolConfig`].
pub fn decode(waveform: &Waveform, config: &ProtocolConfig) -> Result<RgbImage, ConfigError> {
    Ok(Decoder::new(*config)?.decode(waveform))
}

#[derive(Clone, Debug)]
pub struct Decoded {
    pub image: RgbImage,
    pub report: DecodeReport,
}

/// How well a decode went.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DecodeReport {
    pub anchor: Anchor,
    /// Lines whose pixel slots were all sampled.
    pub lines_decoded: usize,
    pub lines_synced: usize,
    pub lines_without_sync: Vec<usize>,
    /// The waveform ended before the last pixel slot.
    pub truncated: bool,
    pub cancelled: bool,
}

impl DecodeReport {
    #[inline]
    pub fn is_complete(&self) -> bool {
        !self.truncated && !self.cancelled
    }
}

/// Start of the VIS tone.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Anchor {
    Found(usize),
    /// No VIS tone was found and decoding started at sample 0.
    #[default]
    Fallback,
}

#[derive(Clone, Copy, Debug)]
struct BufferExhausted;

/// A window only counts as carrying a marker tone if at least this share of
/// its energy is at the tone. See [`tone_dominance`].
const MIN_DOMINANCE: f32 = 0.1;

/// Positions whose tone power is within this factor of the strongest are
/// treated as equally strong. The earliest of them is the onset.
const ONSET_TIE: f32 = 1e-6;

/// Sliding search for a marker tone.
#[derive(Clone, Copy, Debug)]
struct MarkerSearch {
    tone: f32,
    tolerance: f32,
    window: usize,
    step: usize,
}

impl MarkerSearch {
    /// Returns the first window start in `positions` that carries the tone.
    fn find(
        &self,
        samples: &[f32],
        positions: Range<usize>,
        config: &ProtocolConfig,
        detector: &mut FrequencyDetector,
    ) -> Option<usize> {
        positions
            .step_by(self.step.max(1))
            .take_while(|position| position + self.window <= samples.len())
            .find(|&position| {
                let segment = &samples[position..][..self.window];
                tone_dominance(segment, self.tone, config.sample_rate) >= MIN_DOMINANCE
                    && is_tone(
                        detector.detect(segment, config.marker_band),
                        self.tone,
                        self.tolerance,
                    )
            })
    }

    /// Returns the window start in `positions` with the most power at the
    /// tone. Positions are scanned every `step` samples first, then sample by
    /// sample around the best of them.
    ///
    /// `positions` must contain at least one window that fits into `samples`.
    fn strongest_onset(
        &self,
        samples: &[f32],
        positions: Range<usize>,
        step: usize,
        sample_rate: f32,
    ) -> usize {
        let last = samples.len().saturating_sub(self.window);
        let positions = positions.start.min(last)..positions.end.min(last + 1);
        let power = |position: usize| {
            tone_power(&samples[position..][..self.window], self.tone, sample_rate)
        };

        let coarse = strongest(positions.clone().step_by(step.max(1)), &power)
            .unwrap_or(positions.start);
        let fine = coarse.saturating_sub(step).max(positions.start)
            ..(coarse + step + 1).min(positions.end);
        strongest(fine, &power).unwrap_or(coarse)
    }
}

/// Earliest position whose power is within [`ONSET_TIE`] of the maximum.
fn strongest(
    positions: impl Iterator<Item = usize>,
    power: impl Fn(usize) -> f32,
) -> Option<usize> {
    let powers = positions
        .map(|position| (position, power(position)))
        .collect::<Vec<_>>();
    let max = powers.iter().map(|(_, power)| *power).reduce(f32::max)?;
    powers
        .iter()
        .find(|(_, power)| *power >= max * (1.0 - ONSET_TIE))
        .map(|(position, _)| *position)
}
