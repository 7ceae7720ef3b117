//! Playback and capture through the default audio devices.
//!
//! Both functions block until done.

use std::{
    sync::Arc,
    time::{
        Duration,
        Instant,
    },
};

use cpal::{
    FromSample,
    SampleFormat,
    SizedSample,
    traits::{
        DeviceTrait,
        HostTrait,
        StreamTrait,
    },
};
use parking_lot::Mutex;

use crate::{
    progress::CancellationToken,
    waveform::Waveform,
};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("could not open audio output")]
    Stream(#[from] rodio::StreamError),
    #[error("no audio input device available")]
    NoInputDevice,
    #[error("could not query input configurations")]
    SupportedConfigs(#[from] cpal::SupportedStreamConfigsError),
    #[error("could not query default input configuration")]
    DefaultConfig(#[from] cpal::DefaultStreamConfigError),
    #[error("could not build input stream")]
    BuildStream(#[from] cpal::BuildStreamError),
    #[error("could not start input stream")]
    PlayStream(#[from] cpal::PlayStreamError),
    #[error("unsupported input sample format: {0}")]
    UnsupportedSampleFormat(SampleFormat),
}

/// Plays `waveform` on the default output device.
pub fn play(waveform: &Waveform) -> Result<(), Error> {
    let stream = rodio::OutputStreamBuilder::open_default_stream()?;
    let sink = rodio::Sink::connect_new(stream.mixer());

    tracing::debug!(duration = waveform.duration(), "playing");

    sink.append(rodio::buffer::SamplesBuffer::new(
        1,
        waveform.sample_rate() as u32,
        waveform.samples().to_vec(),
    ));
    sink.sleep_until_end();

    Ok(())
}

/// Records mono audio from the default input device.
///
/// Multi-channel input is mixed down. If the device can't capture at
/// `sample_rate`, its default rate is used and the returned waveform carries
/// that rate instead. Recording stops early when `cancel` is triggered.
pub fn record(
    duration: Duration,
    sample_rate: f32,
    cancel: &CancellationToken,
) -> Result<Waveform, Error> {
    let host = cpal::default_host();
    let device = host.default_input_device().ok_or(Error::NoInputDevice)?;

    let requested = cpal::SampleRate(sample_rate as u32);
    let supported = device.supported_input_configs()?.find(|config| {
        matches!(
            config.sample_format(),
            SampleFormat::F32 | SampleFormat::I16 | SampleFormat::U16
        )
            && config.min_sample_rate() <= requested
            && requested <= config.max_sample_rate()
    });
    let supported = match supported {
        Some(config) => config.with_sample_rate(requested),
        None => {
            let config = device.default_input_config()?;
            tracing::warn!(
                requested = sample_rate,
                actual = config.sample_rate().0,
                "input device doesn't support the requested sample rate"
            );
            config
        }
    };

    tracing::debug!(
        device = device.name().unwrap_or_else(|_| "unknown".to_owned()),
        sample_rate = supported.sample_rate().0,
        channels = supported.channels(),
        format = %supported.sample_format(),
        "recording"
    );

    let sample_format = supported.sample_format();
    let config: cpal::StreamConfig = supported.into();
    let buffer = Arc::new(Mutex::new(Vec::<f32>::new()));

    let stream = match sample_format {
        SampleFormat::F32 => build_input_stream::<f32>(&device, &config, buffer.clone())?,
        SampleFormat::I16 => build_input_stream::<i16>(&device, &config, buffer.clone())?,
        SampleFormat::U16 => build_input_stream::<u16>(&device, &config, buffer.clone())?,
        sample_format => return Err(Error::UnsupportedSampleFormat(sample_format)),
    };
    stream.play()?;

    let deadline = Instant::now() + duration;
    while !cancel.is_cancelled() {
        let now = Instant::now();
        if now >= deadline {
            break;
        }
        std::thread::sleep((deadline - now).min(Duration::from_millis(50)));
    }
    drop(stream);

    let samples = std::mem::take(&mut *buffer.lock());
    Ok(Waveform::new(samples, config.sample_rate.0 as f32))
}

fn build_input_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    buffer: Arc<Mutex<Vec<f32>>>,
) -> Result<cpal::Stream, Error>
where
    T: SizedSample,
    f32: FromSample<T>,
{
    let channels = usize::from(config.channels.max(1));

    let stream = device.build_input_stream(
        config,
        move |data: &[T], _: &cpal::InputCallbackInfo| {
            let mut buffer = buffer.lock();
            buffer.extend(data.chunks(channels).map(|frame| {
                frame.iter().map(|sample| sample.to_sample::<f32>()).sum::<f32>()
                    / frame.len() as f32
            }));
        },
        |error| tracing::error!(%error, "audio input stream error"),
        None,
    )?;

    Ok(stream)
}
