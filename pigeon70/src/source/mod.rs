pub mod file;
mod sine;

pub use sine::{
    SineWave,
    ToneError,
    sine,
    tone,
};

pub trait SignalGenerator {
    type Sample;

    fn next(&mut self) -> Self::Sample;

    /// Appends the next `num_samples` samples to `buffer`.
    #[inline]
    fn fill(&mut self, buffer: &mut Vec<Self::Sample>, num_samples: usize) {
        buffer.reserve(num_samples);
        for _ in 0..num_samples {
            buffer.push(self.next());
        }
    }
}
