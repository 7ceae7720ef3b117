use std::{
    fs::File,
    io::{
        BufWriter,
        Seek,
        Write,
    },
    path::Path,
};

use crate::waveform::{
    Waveform,
    sample_to_pcm16,
};

#[derive(Debug, thiserror::Error)]
#[error("wav sink error")]
pub enum Error {
    Hound(#[from] hound::Error),
    Closed,
}

/// Writes samples as 16 bit mono PCM.
#[derive(derive_more::Debug)]
pub struct WavSink<W>
where
    W: Write + Seek,
{
    #[debug(skip)]
    inner: Option<hound::WavWriter<W>>,
}

impl<W> WavSink<W>
where
    W: Write + Seek,
{
    #[inline]
    pub fn new(inner: hound::WavWriter<W>) -> Self {
        Self { inner: Some(inner) }
    }

    #[inline]
    pub fn from_writer(writer: W, sample_rate: f32) -> Result<Self, Error> {
        Ok(Self::new(hound::WavWriter::new(writer, spec(sample_rate))?))
    }

    #[inline]
    fn writer_mut(&mut self) -> Result<&mut hound::WavWriter<W>, Error> {
        self.inner.as_mut().ok_or(Error::Closed)
    }

    pub fn write_samples(&mut self, samples: &[f32]) -> Result<(), Error> {
        let writer = self.writer_mut()?;
        for sample in samples {
            writer.write_sample(sample_to_pcm16(*sample))?;
        }
        Ok(())
    }

    pub fn close(&mut self) -> Result<(), Error> {
        if let Some(writer) = self.inner.take() {
            writer.finalize()?;
        }
        Ok(())
    }
}

impl WavSink<BufWriter<File>> {
    #[inline]
    pub fn from_path(path: impl AsRef<Path>, sample_rate: f32) -> Result<Self, Error> {
        Ok(Self::new(hound::WavWriter::create(path, spec(sample_rate))?))
    }
}

fn spec(sample_rate: f32) -> hound::WavSpec {
    hound::WavSpec {
        channels: 1,
        sample_rate: sample_rate.round() as u32,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    }
}

pub fn write_wav(path: impl AsRef<Path>, waveform: &Waveform) -> Result<(), Error> {
    let path = path.as_ref();
    tracing::debug!(path = %path.display(), num_samples = waveform.len(), "writing wav file");
    let mut sink = WavSink::from_path(path, waveform.sample_rate())?;
    sink.write_samples(waveform)?;
    sink.close()
}
