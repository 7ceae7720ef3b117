use std::{
    fs::File,
    io::BufReader,
    path::Path,
};

use crate::waveform::Waveform;

#[derive(Debug, thiserror::Error)]
#[error("wav source error")]
pub enum Error {
    Hound(#[from] hound::Error),
    UnexpectedChannelCount {
        channels: u16,
        expected: u16,
    },
    UnsupportedFormat {
        sample_format: hound::SampleFormat,
        bits_per_sample: u16,
    },
}

/// Reads mono WAV files into a [`Waveform`].
///
/// Integer samples of 8 to 32 bits and 32 bit float samples are supported.
#[derive(derive_more::Debug)]
pub struct WavSource<R> {
    #[debug(skip)]
    inner: hound::WavReader<R>,
    spec: hound::WavSpec,
}

impl<R> WavSource<R>
where
    R: std::io::Read,
{
    pub fn new(inner: hound::WavReader<R>) -> Result<Self, Error> {
        let spec = inner.spec();
        check_spec(&spec)?;
        Ok(Self { inner, spec })
    }

    #[inline]
    pub fn from_reader(reader: R) -> Result<Self, Error> {
        Self::new(hound::WavReader::new(reader)?)
    }

    #[inline]
    pub fn sample_rate(&self) -> f32 {
        self.spec.sample_rate as f32
    }

    /// Number of samples left in the file.
    #[inline]
    pub fn len(&self) -> usize {
        self.inner.len() as usize
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn read_waveform(mut self) -> Result<Waveform, Error> {
        let sample_rate = self.sample_rate();

        let samples = match self.spec.sample_format {
            hound::SampleFormat::Float => {
                self.inner
                    .samples::<f32>()
                    .collect::<Result<Vec<f32>, _>>()?
            }
            hound::SampleFormat::Int => {
                let scale = 1.0 / (1i64 << (self.spec.bits_per_sample - 1)) as f32;
                self.inner
                    .samples::<i32>()
                    .map(|sample| sample.map(|sample| sample as f32 * scale))
                    .collect::<Result<Vec<f32>, _>>()?
            }
        };

        tracing::debug!(
            num_samples = samples.len(),
            sample_rate,
            "read wav file"
        );

        Ok(Waveform::new(samples, sample_rate))
    }
}

impl WavSource<BufReader<File>> {
    #[inline]
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, Error> {
        Self::new(hound::WavReader::open(path)?)
    }
}

pub fn read_wav(path: impl AsRef<Path>) -> Result<Waveform, Error> {
    WavSource::from_path(path)?.read_waveform()
}

fn check_spec(spec: &hound::WavSpec) -> Result<(), Error> {
    if spec.channels != 1 {
        return Err(Error::UnexpectedChannelCount {
            channels: spec.channels,
            expected: 1,
        });
    }

    match (spec.sample_format, spec.bits_per_sample) {
        (hound::SampleFormat::Int, 8..=32) | (hound::SampleFormat::Float, 32) => Ok(()),
        (sample_format, bits_per_sample) => {
            Err(Error::UnsupportedFormat {
                sample_format,
                bits_per_sample,
            })
        }
    }
}
