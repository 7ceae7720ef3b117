//! Diagnostics for recordings that don't decode.

use crate::{
    decoder::Decoder,
    detect::FrequencyDetector,
    util::is_tone,
    waveform::Waveform,
};

/// How close a segment's dominant frequency must be to a marker tone to be
/// labeled as that marker.
pub const MARKER_TOLERANCE: f32 = 50.0;

/// What the decoder sees in a waveform.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Analysis {
    /// Sample rate the analysis ran at, which is the protocol's.
    pub sample_rate: f32,
    pub num_samples: usize,
    pub vis: Option<usize>,
    /// Consecutive sync tones following the VIS tone.
    pub syncs: Vec<usize>,
    pub segments: Vec<Segment>,
}

impl Analysis {
    #[inline]
    pub fn duration(&self) -> f32 {
        self.num_samples as f32 / self.sample_rate
    }
}

/// Dominant frequency of an equally sized slice of the waveform.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Segment {
    pub start: usize,
    pub len: usize,
    pub frequency: f32,
    pub marker: Option<Marker>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, derive_more::Display)]
pub enum Marker {
    #[display("VIS")]
    Vis,
    #[display("SYNC")]
    Sync,
    #[display("SEP")]
    Separator,
}

impl Decoder {
    /// Looks for the VIS tone and counts the sync tones after it, then splits
    /// the waveform into `num_segments` slices and reports their dominant
    /// frequencies.
    ///
    /// Sync tones are counted until the first search comes up empty. Without
    /// a VIS tone the count starts at sample 0.
    pub fn analyze(&self, waveform: &Waveform, num_segments: usize) -> Analysis {
        let config = self.config();
        let waveform = self.resampled(waveform);
        let samples = waveform.samples();
        let mut detector = FrequencyDetector::new(config.sample_rate);

        let vis = self.find_vis(samples, &mut detector);
        tracing::debug!(?vis, "analyzing");

        let mut syncs = vec![];
        let mut cursor = vis.map_or(0, |position| position + config.vis_len());
        while let Some(position) = self.find_sync(samples, cursor, &mut detector) {
            syncs.push(position);
            cursor = position + config.sync_len();
        }

        let segment_len = samples.len() / num_segments.max(1);
        let segments = if num_segments == 0 || segment_len == 0 {
            vec![]
        }
        else {
            samples
                .chunks_exact(segment_len)
                .take(num_segments)
                .enumerate()
                .map(|(i, segment)| {
                    let frequency = detector.detect(segment, config.marker_band);
                    let marker = [
                        (Marker::Vis, config.vis_tone),
                        (Marker::Sync, config.sync_tone),
                        (Marker::Separator, config.separator_tone),
                    ]
                    .into_iter()
                    .find(|(_, tone)| is_tone(frequency, *tone, MARKER_TOLERANCE))
                    .map(|(marker, _)| marker);

                    Segment {
                        start: i * segment_len,
                        len: segment_len,
                        frequency,
                        marker,
                    }
                })
                .collect()
        };

        Analysis {
            sample_rate: config.sample_rate,
            num_samples: samples.len(),
            vis,
            syncs,
            segments,
        }
    }
}
