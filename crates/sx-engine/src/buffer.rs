//! Audio buffers: storage, playback state and the two-stage read protocol.

use alloc::boxed::Box;
use core::fmt;
use core::mem::size_of;
use sx_ir::{DeviceFormat, SampleData, SampleFormat, SamplesMut};

use crate::converter::{Converter, ConverterConfig};
use crate::error::EngineError;
use crate::processor::ProcessorChain;

/// How a buffer's storage is consumed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BufferUsage {
    /// One contiguous block read start to end, optionally looped.
    Static,
    /// Two equal halves refilled by a producer while the other is read.
    Stream,
}

/// Producer of frames in a buffer's internal format.
///
/// When installed on a buffer, the buffer's own storage is bypassed and
/// every read asks the source for exactly the requested number of frames.
pub trait FillSource: Send {
    fn fill(&mut self, out: SamplesMut<'_>, frames: usize);
}

impl<F> FillSource for F
where
    F: FnMut(SamplesMut<'_>, usize) + Send,
{
    fn fill(&mut self, out: SamplesMut<'_>, frames: usize) {
        self(out, frames)
    }
}

/// The unit of playback.
pub struct AudioBuffer {
    converter: Converter,
    fill: Option<Box<dyn FillSource>>,
    processors: ProcessorChain,
    device_rate: u32,
    volume: f32,
    pitch: f32,
    pan: f32,
    playing: bool,
    paused: bool,
    looping: bool,
    usage: BufferUsage,
    sub_processed: [bool; 2],
    size_in_frames: u32,
    frame_cursor_pos: u32,
    frames_processed: u64,
    data: SampleData,
}

impl AudioBuffer {
    /// Allocate a silent buffer of `size_in_frames` frames.
    ///
    /// Stream buffers are rounded down to an even size so both halves match.
    /// Both halves start out processed, so the first update succeeds.
    pub fn new(
        format: SampleFormat,
        channels: u16,
        sample_rate: u32,
        size_in_frames: u32,
        usage: BufferUsage,
        device: DeviceFormat,
    ) -> Result<Self, EngineError> {
        let size_in_frames = match usage {
            BufferUsage::Static => size_in_frames,
            BufferUsage::Stream => size_in_frames & !1,
        };
        let data = SampleData::silent(format, size_in_frames as usize * channels as usize);
        Self::with_data(data, channels, sample_rate, size_in_frames, usage, device)
    }

    /// Wrap already decoded samples. The frame count follows from the data.
    pub fn from_samples(
        data: SampleData,
        channels: u16,
        sample_rate: u32,
        usage: BufferUsage,
        device: DeviceFormat,
    ) -> Result<Self, EngineError> {
        let frames = if channels == 0 { 0 } else { data.len() / channels as usize };
        let frames = match usage {
            BufferUsage::Static => frames,
            BufferUsage::Stream => frames & !1,
        };
        Self::with_data(data, channels, sample_rate, frames as u32, usage, device)
    }

    fn with_data(
        data: SampleData,
        channels: u16,
        sample_rate: u32,
        size_in_frames: u32,
        usage: BufferUsage,
        device: DeviceFormat,
    ) -> Result<Self, EngineError> {
        let converter = Converter::new(ConverterConfig {
            format_in: data.format(),
            channels_in: channels,
            rate_in: sample_rate,
            channels_out: device.channels,
            rate_out: device.sample_rate,
        })?;

        Ok(Self {
            converter,
            fill: None,
            processors: ProcessorChain::new(),
            device_rate: device.sample_rate,
            volume: 1.0,
            pitch: 1.0,
            pan: 0.5,
            playing: false,
            paused: false,
            looping: false,
            usage,
            sub_processed: [true, true],
            size_in_frames,
            frame_cursor_pos: 0,
            frames_processed: 0,
            data,
        })
    }

    // Playback control

    pub fn play(&mut self) {
        self.playing = true;
        self.paused = false;
        self.frame_cursor_pos = 0;
        self.converter.reset();
    }

    /// Stop playback and rewind. Both halves become refillable again.
    pub fn stop(&mut self) {
        self.finish();
        self.converter.reset();
    }

    /// End of data: like `stop`, but the converter keeps the frames still
    /// in flight for this read.
    fn finish(&mut self) {
        self.playing = false;
        self.paused = false;
        self.frame_cursor_pos = 0;
        self.frames_processed = 0;
        self.sub_processed = [true, true];
    }

    /// Move the cursor back to the first frame without touching state flags.
    pub fn rewind(&mut self) {
        self.frame_cursor_pos = 0;
    }

    pub fn pause(&mut self) {
        self.paused = true;
    }

    pub fn resume(&mut self) {
        self.paused = false;
    }

    /// Playing and not paused.
    pub fn is_playing(&self) -> bool {
        self.playing && !self.paused
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn is_looping(&self) -> bool {
        self.looping
    }

    pub fn set_looping(&mut self, looping: bool) {
        self.looping = looping;
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    pub fn set_volume(&mut self, volume: f32) {
        self.volume = volume.clamp(0.0, 1.0);
    }

    pub fn pan(&self) -> f32 {
        self.pan
    }

    /// 0.0 is full left, 1.0 full right.
    pub fn set_pan(&mut self, pan: f32) {
        self.pan = pan.clamp(0.0, 1.0);
    }

    pub fn pitch(&self) -> f32 {
        self.pitch
    }

    /// Shift pitch by retuning the converter's output rate.
    ///
    /// The output rate is always derived from the device rate, so repeated
    /// calls do not compound.
    pub fn set_pitch(&mut self, pitch: f32) -> Result<(), EngineError> {
        if !pitch.is_finite() || pitch <= 0.0 {
            return Err(EngineError::InvalidPitch(pitch));
        }
        let rate_out = libm::roundf(self.device_rate as f32 / pitch).max(1.0) as u32;
        self.converter.set_rate(self.converter.rate_in(), rate_out)?;
        self.pitch = pitch;
        Ok(())
    }

    /// Install or clear the fill source, handing back the previous one.
    pub fn set_fill_source(&mut self, source: Option<Box<dyn FillSource>>) -> Option<Box<dyn FillSource>> {
        core::mem::replace(&mut self.fill, source)
    }

    pub fn has_fill_source(&self) -> bool {
        self.fill.is_some()
    }

    pub fn processors_mut(&mut self) -> &mut ProcessorChain {
        &mut self.processors
    }

    // Introspection

    pub fn usage(&self) -> BufferUsage {
        self.usage
    }

    pub fn format(&self) -> SampleFormat {
        self.data.format()
    }

    pub fn channels(&self) -> u16 {
        self.converter.channels_in()
    }

    pub fn sample_rate(&self) -> u32 {
        self.converter.rate_in()
    }

    /// Channel count of the frames produced by `read_mixing`.
    pub fn output_channels(&self) -> u16 {
        self.converter.channels_out()
    }

    pub fn size_in_frames(&self) -> u32 {
        self.size_in_frames
    }

    pub fn frame_cursor_pos(&self) -> u32 {
        self.frame_cursor_pos
    }

    /// Frames read from storage or the fill source since the last stop.
    pub fn frames_processed(&self) -> u64 {
        self.frames_processed
    }

    fn sub_buffer_frames(&self) -> usize {
        self.size_in_frames as usize / 2
    }

    // Streaming

    /// True if either half is waiting to be refilled.
    pub fn is_processed(&self) -> bool {
        self.sub_processed[0] || self.sub_processed[1]
    }

    /// Per-half processed flags.
    pub fn sub_buffers_processed(&self) -> [bool; 2] {
        self.sub_processed
    }

    /// Refill the first processed half with interleaved `samples`.
    ///
    /// At most one half worth of frames is copied; the rest of the half is
    /// silenced. If both halves are processed the cursor restarts at the
    /// first one. Returns the number of frames copied.
    pub fn update<T: bytemuck::Pod>(&mut self, samples: &[T]) -> Result<usize, EngineError> {
        if self.usage != BufferUsage::Stream {
            return Err(EngineError::NotStreaming);
        }
        let bps = self.format().bytes_per_sample();
        if size_of::<T>() != bps {
            return Err(EngineError::FormatMismatch { expected: bps, got: size_of::<T>() });
        }

        let sub = match self.sub_processed {
            [true, true] => {
                self.frame_cursor_pos = 0;
                0
            }
            [true, false] => 0,
            [false, true] => 1,
            [false, false] => return Err(EngineError::SubBufferBusy),
        };

        let channels = self.channels() as usize;
        let sub_frames = self.sub_buffer_frames();
        let frames = (samples.len() / channels).min(sub_frames);
        let frame_bytes = bps * channels;

        let start = sub * sub_frames;
        let src: &[u8] = bytemuck::cast_slice(samples);
        let dst = &mut self.data.as_bytes_mut()[start * frame_bytes..(start + frames) * frame_bytes];
        dst.copy_from_slice(&src[..frames * frame_bytes]);
        self.data
            .silence((start + frames) * channels..(start + sub_frames) * channels);

        self.sub_processed[sub] = false;
        Ok(frames)
    }

    // Reading

    /// Read up to `frame_count` frames in the buffer's own format into `scratch`.
    ///
    /// `scratch` is word storage reinterpreted as bytes; `frame_count` is
    /// clamped to what fits. Frames that could not be read are silenced and
    /// not counted. Reaching the end of a non-looping buffer stops it.
    pub fn read_internal(&mut self, scratch: &mut [f32], frame_count: usize) -> usize {
        let format = self.format();
        let channels = self.channels();
        let frame_bytes = format.bytes_per_frame(channels);
        let frame_count = frame_count.min(scratch.len() * size_of::<f32>() / frame_bytes);
        if frame_count == 0 {
            return 0;
        }

        if let Some(fill) = self.fill.as_mut() {
            let samples = frame_count * channels as usize;
            fill.fill(SamplesMut::from_words(format, scratch, samples), frame_count);
            self.frames_processed += frame_count as u64;
            return frame_count;
        }

        let read = match self.usage {
            BufferUsage::Static => self.read_static(scratch, frame_count, frame_bytes),
            BufferUsage::Stream => self.read_stream(scratch, frame_count, frame_bytes),
        };

        if read < frame_count {
            let samples = (frame_count - read) * channels as usize;
            let start = read * channels as usize;
            let mut rest = SamplesMut::from_words(format, scratch, start + samples);
            match &mut rest {
                SamplesMut::U8(s) => s[start..].fill(128),
                SamplesMut::S16(s) => s[start..].fill(0),
                SamplesMut::F32(s) => s[start..].fill(0.0),
            }
        }
        read
    }

    fn read_static(&mut self, scratch: &mut [f32], frame_count: usize, frame_bytes: usize) -> usize {
        let size = self.size_in_frames as usize;
        if size == 0 {
            return 0;
        }
        let out: &mut [u8] = bytemuck::cast_slice_mut(scratch);
        let mut read = 0;
        let mut ended = false;

        while read < frame_count {
            let cursor = self.frame_cursor_pos as usize;
            let remaining = size - cursor;
            let n = remaining.min(frame_count - read);

            out[read * frame_bytes..(read + n) * frame_bytes]
                .copy_from_slice(&self.data.as_bytes()[cursor * frame_bytes..(cursor + n) * frame_bytes]);
            read += n;
            self.frames_processed += n as u64;
            self.frame_cursor_pos = ((cursor + n) % size) as u32;

            if n == remaining && !self.looping {
                ended = true;
                break;
            }
        }

        if ended {
            self.finish();
        }
        read
    }

    fn read_stream(&mut self, scratch: &mut [f32], frame_count: usize, frame_bytes: usize) -> usize {
        let sub_frames = self.sub_buffer_frames();
        if sub_frames == 0 {
            return 0;
        }
        let size = sub_frames * 2;
        let out: &mut [u8] = bytemuck::cast_slice_mut(scratch);
        let mut read = 0;
        let mut ended = false;

        while read < frame_count {
            let cursor = self.frame_cursor_pos as usize;
            let sub = cursor / sub_frames;
            // Starved: the producer has not refilled this half yet.
            if self.sub_processed[sub] {
                break;
            }
            let remaining = (sub + 1) * sub_frames - cursor;
            let n = remaining.min(frame_count - read);

            out[read * frame_bytes..(read + n) * frame_bytes]
                .copy_from_slice(&self.data.as_bytes()[cursor * frame_bytes..(cursor + n) * frame_bytes]);
            read += n;
            self.frames_processed += n as u64;
            self.frame_cursor_pos = ((cursor + n) % size) as u32;

            if n == remaining {
                self.sub_processed[sub] = true;
                if !self.looping {
                    ended = true;
                    break;
                }
            }
        }

        if ended {
            self.finish();
        }
        read
    }

    /// Read up to `frame_count` frames in the mixing format into `out`.
    ///
    /// `input_scratch` bounds how many internal frames are read per step.
    /// Returns the number of frames written, which is short when the buffer
    /// ran out of data or stopped.
    pub fn read_mixing(&mut self, input_scratch: &mut [f32], out: &mut [f32], frame_count: usize) -> usize {
        if !self.is_playing() {
            return 0;
        }
        let out_ch = self.output_channels() as usize;
        let frame_count = frame_count.min(out.len() / out_ch);
        let scratch_frames = input_scratch.len() * size_of::<f32>() / self.converter.input_frame_bytes();

        let mut produced = 0;
        while produced < frame_count {
            let wanted = frame_count - produced;
            let needed = self.converter.required_input_frames(wanted).min(scratch_frames);

            let read = self.read_internal(input_scratch, needed);
            let input: &[u8] = bytemuck::cast_slice(input_scratch);
            let (consumed, made) =
                self.converter
                    .process(input, read, &mut out[produced * out_ch..], wanted);
            produced += made;

            if !self.playing {
                if consumed == read && produced < frame_count {
                    produced += self.converter.flush(&mut out[produced * out_ch..]);
                }
                break;
            }
            if read < needed || (consumed == 0 && made == 0) {
                break;
            }
        }
        produced
    }
}

impl fmt::Debug for AudioBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AudioBuffer")
            .field("usage", &self.usage)
            .field("format", &self.data.format())
            .field("channels", &self.channels())
            .field("size_in_frames", &self.size_in_frames)
            .field("frame_cursor_pos", &self.frame_cursor_pos)
            .field("playing", &self.playing)
            .field("paused", &self.paused)
            .field("looping", &self.looping)
            .field("fill", &self.fill.is_some())
            .finish()
    }
}
