//! Real-time mixing engine for sfxmix.
//!
//! Owns the per-buffer conversion pipeline, the double-buffered read
//! protocol, processor chains, the buffer registry and the device
//! callback that mixes every active buffer into one output block.

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

mod buffer;
mod converter;
mod error;
mod mixer;
mod processor;
mod registry;

pub use buffer::{AudioBuffer, BufferUsage, FillSource};
pub use converter::{convert_frames, Converter, ConverterConfig};
pub use error::EngineError;
pub use mixer::{pan_gains, Mixer, INPUT_SCRATCH_BYTES, MIX_CHUNK_FRAMES};
pub use processor::{Processor, ProcessorChain, ProcessorId};
pub use registry::Registry;
