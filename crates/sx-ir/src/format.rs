//! Sample formats and the device output format.

/// Maximum number of interleaved channels handled anywhere in the mixer.
pub const MAX_CHANNELS: u16 = 8;

/// Sample rate used when no device dictates one (headless sessions).
pub const DEFAULT_SAMPLE_RATE: u32 = 44100;

/// Numeric format of a single interleaved sample.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum SampleFormat {
    /// Unsigned 8-bit, offset binary (128 is silence).
    U8,
    /// Signed 16-bit.
    #[default]
    S16,
    /// 32-bit float in [-1, 1]. This is the mixing format.
    F32,
}

impl SampleFormat {
    /// Map a bit depth to a format: 8 -> U8, 16 -> S16, anything else -> F32.
    pub fn from_bits(bits: u32) -> Self {
        match bits {
            8 => SampleFormat::U8,
            16 => SampleFormat::S16,
            _ => SampleFormat::F32,
        }
    }

    /// Bit depth of one sample.
    pub fn bits(self) -> u32 {
        self.bytes_per_sample() as u32 * 8
    }

    /// Size of one sample in bytes.
    pub const fn bytes_per_sample(self) -> usize {
        match self {
            SampleFormat::U8 => 1,
            SampleFormat::S16 => 2,
            SampleFormat::F32 => 4,
        }
    }

    /// Size of one frame of `channels` samples in bytes.
    pub const fn bytes_per_frame(self, channels: u16) -> usize {
        self.bytes_per_sample() * channels as usize
    }

    /// Decode the sample starting at `bytes[0]` to f32.
    ///
    /// `bytes` must hold at least `bytes_per_sample()` bytes in native
    /// byte order.
    #[inline]
    pub fn decode(self, bytes: &[u8]) -> f32 {
        match self {
            SampleFormat::U8 => (bytes[0] as f32 - 128.0) / 128.0,
            SampleFormat::S16 => i16::from_ne_bytes([bytes[0], bytes[1]]) as f32 / 32768.0,
            SampleFormat::F32 => f32::from_ne_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
        }
    }
}

/// Format of the block the mixer renders: always interleaved f32.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DeviceFormat {
    pub channels: u16,
    pub sample_rate: u32,
}

impl DeviceFormat {
    pub fn new(channels: u16, sample_rate: u32) -> Self {
        Self { channels, sample_rate }
    }

    /// Number of f32 samples in a block of `frames` frames.
    pub fn samples(&self, frames: usize) -> usize {
        frames * self.channels as usize
    }
}

impl Default for DeviceFormat {
    fn default() -> Self {
        Self::new(2, DEFAULT_SAMPLE_RATE)
    }
}
