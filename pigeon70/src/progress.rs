use std::sync::{
    Arc,
    atomic::{
        AtomicBool,
        Ordering,
    },
};

/// Receives progress updates from the encoder and decoder.
///
/// `fraction` is in `[0.0, 1.0]`.
pub trait Progress {
    fn report(&mut self, fraction: f32, status: &str);
}

impl Progress for () {
    #[inline]
    fn report(&mut self, _fraction: f32, _status: &str) {}
}

impl<F> Progress for F
where
    F: FnMut(f32, &str),
{
    #[inline]
    fn report(&mut self, fraction: f32, status: &str) {
        self(fraction, status)
    }
}

/// Cooperative cancellation flag, shared between clones.
#[derive(Clone, Debug, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }
}
