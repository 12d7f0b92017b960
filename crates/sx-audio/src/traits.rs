//! Audio output trait and error types.

use thiserror::Error;

/// Error type for audio operations.
#[derive(Debug, Error)]
pub enum AudioError {
    /// Failed to initialize audio device
    #[error("device init error: {0}")]
    DeviceInit(String),
    /// Failed to create audio stream
    #[error("stream create error: {0}")]
    StreamCreate(String),
    /// Playback error
    #[error("playback error: {0}")]
    Playback(String),
    /// No audio device available
    #[error("no audio device available")]
    NoDevice,
}

/// Trait for audio output backends.
///
/// Backends pull audio through a render callback handed over when they are
/// opened; this trait only covers what callers query and control afterwards.
pub trait AudioOutput {
    /// Sample rate the device actually runs at.
    fn sample_rate(&self) -> u32;

    /// Number of interleaved output channels.
    fn channels(&self) -> u16;

    /// Start (or resume) playback.
    fn start(&mut self) -> Result<(), AudioError>;

    /// Pause playback. The render callback stops being driven.
    fn stop(&mut self) -> Result<(), AudioError>;
}
