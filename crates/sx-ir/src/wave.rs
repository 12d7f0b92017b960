//! Decoded audio waves.

use crate::format::SampleFormat;
use crate::sample_data::SampleData;

/// Decoded audio, immutable once produced.
///
/// A wave is built once by a decoder, consumed once to build a sound and
/// then dropped. An empty wave (no frames) is the failure value of every
/// decode entry point.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Wave {
    /// Number of frames (samples per channel).
    pub frame_count: u32,
    /// Frequency in Hz.
    pub sample_rate: u32,
    /// Bit depth of one sample: 8, 16 or 32.
    pub sample_size: u32,
    /// Number of interleaved channels.
    pub channels: u16,
    /// Interleaved sample storage.
    pub data: SampleData,
}

impl Wave {
    /// Build a wave from interleaved samples.
    ///
    /// Trailing samples that do not fill a whole frame are ignored in
    /// `frame_count`.
    pub fn new(data: SampleData, sample_rate: u32, channels: u16) -> Self {
        let frame_count = if channels == 0 {
            0
        } else {
            (data.len() / channels as usize) as u32
        };
        Self {
            frame_count,
            sample_rate,
            sample_size: data.format().bits(),
            channels,
            data,
        }
    }

    /// Returns true if the wave carries no playable frames.
    pub fn is_empty(&self) -> bool {
        self.frame_count == 0 || self.channels == 0 || self.data.is_empty()
    }

    pub fn format(&self) -> SampleFormat {
        self.data.format()
    }

    /// Duration in seconds.
    pub fn duration_secs(&self) -> f32 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frame_count as f32 / self.sample_rate as f32
    }
}
