//! Session error type.

use sx_audio::AudioError;
use sx_engine::EngineError;
use sx_formats::FormatError;
use thiserror::Error;

/// Errors raised by session setup and the fallible loading paths.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Audio(#[from] AudioError),
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error(transparent)]
    Format(#[from] FormatError),
    /// The session was closed.
    #[error("session is not ready")]
    NotReady,
    /// A wave with no frames was handed in.
    #[error("wave has no audio data")]
    EmptyWave,
}
