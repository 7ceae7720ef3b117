use crate::{
    config::{
        ConfigError,
        ProtocolConfig,
    },
    frame::FrameBuffer,
    progress::Progress,
    source::{
        SignalGenerator,
        sine,
    },
    state::{
        LineState,
        State,
    },
    waveform::Waveform,
};

#[derive(Clone, Copy, Debug)]
pub struct Encoder {
    config: ProtocolConfig,
}

impl Encoder {
    pub fn new(config: ProtocolConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config })
    }

    #[inline]
    pub fn config(&self) -> &ProtocolConfig {
        &self.config
    }

    #[inline]
    pub fn encode<F>(&self, frame_buffer: &F) -> Result<Waveform, EncodeError>
    where
        F: FrameBuffer,
    {
        self.encode_with_progress(frame_buffer, &mut ())
    }

    pub fn encode_with_progress<F, P>(
        &self,
        frame_buffer: &F,
        progress: &mut P,
    ) -> Result<Waveform, EncodeError>
    where
        F: FrameBuffer,
        P: Progress,
    {
        let expected = (self.config.width, self.config.height);
        let actual = (frame_buffer.width(), frame_buffer.height());
        if actual != expected {
            return Err(EncodeError::InvalidImageDimensions { expected, actual });
        }

        let mut samples = Vec::with_capacity(self.config.waveform_len());
        let mut state = State::default();

        progress.report(0.0, "Generating VIS tone");

        loop {
            if let State::Line {
                y,
                line_state: LineState::Sync,
            } = state
            {
                progress.report(
                    y as f32 / self.config.height as f32,
                    &format!("Encoding line {}/{}", y + 1, self.config.height),
                );
            }

            let pulse = Pulse::from_state(&state, &self.config, frame_buffer);
            let num_samples = self.config.samples(pulse.duration);
            sine(pulse.frequency, self.config.sample_rate).fill(&mut samples, num_samples);

            match state.next(&self.config) {
                Some(next_state) => state = next_state,
                None => break,
            }
        }

        let mut waveform = Waveform::new(samples, self.config.sample_rate);
        if !waveform.normalize(self.config.amplitude) {
            tracing::warn!("encoded waveform is silent");
        }

        tracing::debug!(
            num_samples = waveform.len(),
            duration = waveform.duration(),
            "encoded frame"
        );
        progress.report(1.0, "Encoding complete");

        Ok(waveform)
    }
}

/// Encodes `frame_buffer` with a [`ProtocolConfig`].
pub fn encode<F>(frame_buffer: &F, config: &ProtocolConfig) -> Result<Waveform, EncodeError>
where
    F: FrameBuffer,
{
    Encoder::new(*config)?.encode(frame_buffer)
}

#[derive(Clone, Copy, Debug, PartialEq, thiserror::Error)]
pub enum EncodeError {
    #[error("invalid image dimensions: expected {expected:?}, got {actual:?}")]
    InvalidImageDimensions {
        expected: (usize, usize),
        actual: (usize, usize),
    },
    #[error("invalid protocol configuration")]
    Config(#[from] ConfigError),
}

#[derive(Clone, Copy, Debug, PartialEq)]
struct Pulse {
    frequency: f32,
    duration: f32,
}

impl Pulse {
    #[inline]
    fn new(frequency: f32, duration: f32) -> Self {
        Self {
            frequency,
            duration,
        }
    }

    fn from_state<F>(state: &State, config: &ProtocolConfig, frame_buffer: &F) -> Self
    where
        F: FrameBuffer,
    {
        match state {
            State::Vis => Pulse::new(config.vis_tone, config.vis_time),
            State::Line { y, line_state } => {
                match line_state {
                    LineState::Sync => Pulse::new(config.sync_tone, config.sync_time),
                    LineState::Separator => {
                        Pulse::new(config.separator_tone, config.separator_time)
                    }
                    LineState::Scan { x, channel } => {
                        let value = frame_buffer.channel(*x, *y, *channel);
                        Pulse::new(config.pixel_to_frequency(value), config.pixel_time)
                    }
                }
            }
        }
    }
}
