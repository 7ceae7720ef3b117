//! Transmits RGB images as audio.
//!
//! Every color channel of every pixel is sent as a short sine tone whose
//! frequency encodes the intensity. Lines are framed by sync and separator
//! tones, and the whole frame is preceded by a VIS tone. See
//! [`ProtocolConfig`] for the timing.

pub mod analysis;
#[cfg(feature = "audio")]
pub mod audio;
pub mod config;
pub mod decoder;
pub mod detect;
pub mod encoder;
pub mod frame;
pub mod progress;
pub mod sink;
pub mod source;
pub mod state;
pub mod util;
pub mod waveform;

pub use crate::{
    config::{
        ConfigError,
        ProtocolConfig,
    },
    decoder::{
        DecodeReport,
        Decoded,
        Decoder,
        decode,
    },
    encoder::{
        EncodeError,
        Encoder,
        encode,
    },
    progress::{
        CancellationToken,
        Progress,
    },
    util::FrequencyBand,
    waveform::Waveform,
};
