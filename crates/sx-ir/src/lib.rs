//! Core data types for the sfxmix mixer.
//!
//! This crate defines the plain data shared by every other crate: sample
//! formats, typed sample storage, decoded waves and the device format the
//! mixer renders into. Decoders emit these types and the engine consumes
//! them.
//!
//! Designed to be `no_std` compatible with the `alloc` crate.

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

mod format;
mod sample_data;
mod wave;

pub use format::{DeviceFormat, SampleFormat, DEFAULT_SAMPLE_RATE, MAX_CHANNELS};
pub use sample_data::{SampleData, SamplesMut};
pub use wave::Wave;

slotmap::new_key_type! {
    /// Stable handle of an audio buffer tracked by the mixer.
    pub struct BufferKey;
}
