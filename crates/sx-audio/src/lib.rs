//! Audio output backends for the sfxmix mixer.
//!
//! `CpalOutput` drives a render callback from the default playback device.
//! `RingSource` feeds a streaming buffer from another thread.

mod config;
mod cpal_backend;
mod ring_source;
mod traits;

pub use config::{DeviceConfig, OutputFormat};
pub use cpal_backend::{CpalOutput, MAX_DEVICE_FRAMES};
pub use ring_source::{ring_source, RingProducer, RingSource};
pub use traits::{AudioError, AudioOutput};
