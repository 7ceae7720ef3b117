use image::{
    Rgb,
    RgbImage,
};

/// Color channel of a pixel, in transmission order.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Channel {
    #[default]
    Red,
    Green,
    Blue,
}

impl Channel {
    pub const ALL: [Self; 3] = [Self::Red, Self::Green, Self::Blue];

    pub fn next(self) -> Option<Self> {
        match self {
            Channel::Red => Some(Self::Green),
            Channel::Green => Some(Self::Blue),
            Channel::Blue => None,
        }
    }

    #[inline]
    pub fn index(self) -> usize {
        match self {
            Channel::Red => 0,
            Channel::Green => 1,
            Channel::Blue => 2,
        }
    }
}

pub trait FrameBuffer {
    fn width(&self) -> usize;
    fn height(&self) -> usize;
    fn channel(&self, x: usize, y: usize, channel: Channel) -> u8;
}

impl<F> FrameBuffer for &F
where
    F: FrameBuffer,
{
    #[inline]
    fn width(&self) -> usize {
        (&**self).width()
    }

    #[inline]
    fn height(&self) -> usize {
        (&**self).height()
    }

    #[inline]
    fn channel(&self, x: usize, y: usize, channel: Channel) -> u8 {
        (&**self).channel(x, y, channel)
    }
}

impl FrameBuffer for RgbImage {
    #[inline]
    fn width(&self) -> usize {
        RgbImage::width(self) as usize
    }

    #[inline]
    fn height(&self) -> usize {
        RgbImage::height(self) as usize
    }

    #[inline]
    fn channel(&self, x: usize, y: usize, channel: Channel) -> u8 {
        self.get_pixel(x as u32, y as u32).0[channel.index()]
    }
}

pub trait FrameBufferMut {
    /// Resizes the frame buffer and resets every channel to 0.
    fn set_size(&mut self, width: usize, height: usize);
    fn set_channel(&mut self, x: usize, y: usize, channel: Channel, value: u8);
}

impl<F> FrameBufferMut for &mut F
where
    F: FrameBufferMut,
{
    fn set_size(&mut self, width: usize, height: usize) {
        (&mut **self).set_size(width, height);
    }

    fn set_channel(&mut self, x: usize, y: usize, channel: Channel, value: u8) {
        (&mut **self).set_channel(x, y, channel, value);
    }
}

impl FrameBufferMut for RgbImage {
    fn set_size(&mut self, width: usize, height: usize) {
        *self = RgbImage::new(width as u32, height as u32);
    }

    fn set_channel(&mut self, x: usize, y: usize, channel: Channel, value: u8) {
        self.get_pixel_mut(x as u32, y as u32).0[channel.index()] = value;
    }
}

/// Gradient test image. Red rises from left to right, green from top to
/// bottom and blue along the diagonal.
pub fn test_pattern(width: usize, height: usize) -> RgbImage {
    let scale = |value: usize, total: usize| (value * 255 / total.max(1)) as u8;

    RgbImage::from_fn(width as u32, height as u32, |x, y| {
        let (x, y) = (x as usize, y as usize);
        Rgb([
            scale(x, width),
            scale(y, height),
            scale(x + y, width + height),
        ])
    })
}

/// Mean absolute difference over all channels of two frames.
///
/// Returns `None` if the dimensions differ.
pub fn mean_absolute_error<A, B>(a: &A, b: &B) -> Option<f32>
where
    A: FrameBuffer,
    B: FrameBuffer,
{
    if (a.width(), a.height()) != (b.width(), b.height()) {
        return None;
    }

    let mut total = 0u64;
    for y in 0..a.height() {
        for x in 0..a.width() {
            for channel in Channel::ALL {
                total += u64::from(a.channel(x, y, channel).abs_diff(b.channel(x, y, channel)));
            }
        }
    }

    let count = a.width() * a.height() * Channel::ALL.len();
    Some(if count == 0 {
        0.0
    }
    else {
        total as f32 / count as f32
    })
}
