//! Engine error type.

use thiserror::Error;

/// Errors raised while building or reconfiguring engine objects.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum EngineError {
    /// Channel count is zero or above `MAX_CHANNELS`.
    #[error("invalid channel count: {0}")]
    InvalidChannels(u16),
    /// Sample rate of zero.
    #[error("invalid sample rate: {0}")]
    InvalidSampleRate(u32),
    /// Pitch must be finite and positive.
    #[error("invalid pitch: {0}")]
    InvalidPitch(f32),
    /// Sample type does not match the buffer's storage format.
    #[error("sample size {got} bytes does not match buffer format ({expected} bytes)")]
    FormatMismatch { expected: usize, got: usize },
    /// Operation requires a streaming buffer.
    #[error("buffer is not a stream")]
    NotStreaming,
    /// Neither sub-buffer has been consumed yet.
    #[error("no sub-buffer available for update")]
    SubBufferBusy,
}
