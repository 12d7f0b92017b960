//! Typed interleaved sample storage.

use alloc::vec;
use alloc::vec::Vec;
use core::ops::Range;

use crate::format::SampleFormat;

/// Interleaved PCM samples in one of the supported formats.
#[derive(Clone, Debug, PartialEq)]
pub enum SampleData {
    U8(Vec<u8>),
    S16(Vec<i16>),
    F32(Vec<f32>),
}

impl Default for SampleData {
    fn default() -> Self {
        SampleData::S16(Vec::new())
    }
}

impl SampleData {
    /// Allocate `samples` silent samples of the given format.
    pub fn silent(format: SampleFormat, samples: usize) -> Self {
        match format {
            SampleFormat::U8 => SampleData::U8(vec![128; samples]),
            SampleFormat::S16 => SampleData::S16(vec![0; samples]),
            SampleFormat::F32 => SampleData::F32(vec![0.0; samples]),
        }
    }

    pub fn format(&self) -> SampleFormat {
        match self {
            SampleData::U8(_) => SampleFormat::U8,
            SampleData::S16(_) => SampleFormat::S16,
            SampleData::F32(_) => SampleFormat::F32,
        }
    }

    /// Number of samples (not frames).
    pub fn len(&self) -> usize {
        match self {
            SampleData::U8(v) => v.len(),
            SampleData::S16(v) => v.len(),
            SampleData::F32(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Raw native-endian bytes of the storage.
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            SampleData::U8(v) => v,
            SampleData::S16(v) => bytemuck::cast_slice(v),
            SampleData::F32(v) => bytemuck::cast_slice(v),
        }
    }

    /// Mutable raw bytes of the storage.
    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        match self {
            SampleData::U8(v) => v,
            SampleData::S16(v) => bytemuck::cast_slice_mut(v),
            SampleData::F32(v) => bytemuck::cast_slice_mut(v),
        }
    }

    /// Silence the samples in `range` (sample indices).
    pub fn silence(&mut self, range: Range<usize>) {
        match self {
            SampleData::U8(v) => v[range].fill(128),
            SampleData::S16(v) => v[range].fill(0),
            SampleData::F32(v) => v[range].fill(0.0),
        }
    }
}

/// Mutable typed view over a block of samples, handed to fill callbacks.
#[derive(Debug)]
pub enum SamplesMut<'a> {
    U8(&'a mut [u8]),
    S16(&'a mut [i16]),
    F32(&'a mut [f32]),
}

impl<'a> SamplesMut<'a> {
    /// View the first `samples` samples of an f32-aligned word block as `format`.
    ///
    /// Word storage keeps the 4-byte alignment every format needs, so the
    /// cast cannot fail. Panics if `words` is too short.
    pub fn from_words(format: SampleFormat, words: &'a mut [f32], samples: usize) -> Self {
        let bytes: &mut [u8] = bytemuck::cast_slice_mut(words);
        let bytes = &mut bytes[..samples * format.bytes_per_sample()];
        match format {
            SampleFormat::U8 => SamplesMut::U8(bytes),
            SampleFormat::S16 => SamplesMut::S16(bytemuck::cast_slice_mut(bytes)),
            SampleFormat::F32 => SamplesMut::F32(bytemuck::cast_slice_mut(bytes)),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            SamplesMut::U8(v) => v.len(),
            SamplesMut::S16(v) => v.len(),
            SamplesMut::F32(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Fill the view with silence.
    pub fn silence(&mut self) {
        match self {
            SamplesMut::U8(v) => v.fill(128),
            SamplesMut::S16(v) => v.fill(0),
            SamplesMut::F32(v) => v.fill(0.0),
        }
    }
}
