//! Caller-side handles to tracked buffers.
//!
//! Handles are plain keys plus metadata. A default handle is the empty
//! result of a failed load; operations on it are logged no-ops.

use sx_ir::BufferKey;

/// Anything that names a tracked buffer.
pub trait BufferHandle {
    fn buffer_key(&self) -> Option<BufferKey>;
}

impl BufferHandle for BufferKey {
    fn buffer_key(&self) -> Option<BufferKey> {
        Some(*self)
    }
}

/// A fully loaded sound, converted to the device format.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Sound {
    pub(crate) key: Option<BufferKey>,
    /// Length in device frames.
    pub frame_count: u32,
}

impl Sound {
    /// True for the value returned by a failed load.
    pub fn is_empty(&self) -> bool {
        self.key.is_none()
    }
}

impl BufferHandle for Sound {
    fn buffer_key(&self) -> Option<BufferKey> {
        self.key
    }
}

/// A double-buffered stream fed by the caller.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AudioStream {
    pub(crate) key: Option<BufferKey>,
    pub sample_rate: u32,
    /// Bit depth of the samples passed to `update_stream`.
    pub sample_size: u32,
    pub channels: u16,
}

impl AudioStream {
    pub fn is_empty(&self) -> bool {
        self.key.is_none()
    }
}

impl BufferHandle for AudioStream {
    fn buffer_key(&self) -> Option<BufferKey> {
        self.key
    }
}
