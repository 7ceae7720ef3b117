#[inline(always)]
pub fn lerp(t: f32, a: f32, b: f32) -> f32 {
    (1.0 - t) * a + t * b
}

#[inline(always)]
pub fn unlerp(x: f32, a: f32, b: f32) -> f32 {
    (x - a) / (b - a)
}

/// Closed frequency interval in Hz.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FrequencyBand {
    pub low: f32,
    pub high: f32,
}

impl FrequencyBand {
    #[inline]
    pub const fn new(low: f32, high: f32) -> Self {
        Self { low, high }
    }

    #[inline(always)]
    pub fn bandwidth(&self) -> f32 {
        self.high - self.low
    }
}

#[inline]
pub fn is_tone(frequency: f32, tone: f32, tolerance: f32) -> bool {
    (frequency - tone).abs() < tolerance
}
