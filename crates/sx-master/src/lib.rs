//! Audio session controller for the sfxmix mixer.
//!
//! An [`AudioSession`] owns the playback device, the lock shared with the
//! device callback and the mixer behind it. Every public operation goes
//! through a session value, or a [`SessionHandle`] cloned from it, instead
//! of process-wide state.

mod config;
mod error;
mod handle;
mod session;
mod wave;

pub use config::SessionConfig;
pub use error::SessionError;
pub use handle::{AudioStream, BufferHandle, Sound};
pub use session::{AudioSession, Renderer, SessionHandle};
pub use wave::{load_wave, load_wave_from_memory};

// Re-export common types so callers don't need the lower crates directly.
pub use sx_audio::{ring_source, DeviceConfig, OutputFormat, RingProducer, RingSource};
pub use sx_engine::{FillSource, Processor, ProcessorId};
pub use sx_formats::{write_wav, FileType, FormatError};
pub use sx_ir::{BufferKey, DeviceFormat, SampleData, SampleFormat, SamplesMut, Wave};
