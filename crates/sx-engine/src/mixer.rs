//! Mixing engine: pulls every playing buffer into one device block.
//!
//! `Mixer::render` is the device callback body. It never allocates: both
//! scratch blocks are sized once in `Mixer::new`.

use alloc::boxed::Box;
use alloc::vec;
use alloc::vec::Vec;
use sx_ir::{BufferKey, DeviceFormat, MAX_CHANNELS};

use crate::buffer::{AudioBuffer, BufferUsage};
use crate::error::EngineError;
use crate::processor::{Processor, ProcessorChain, ProcessorId};
use crate::registry::Registry;

/// Frames mixed per buffer per step.
pub const MIX_CHUNK_FRAMES: usize = 512;

/// Size of the block a buffer reads its own-format frames into.
pub const INPUT_SCRATCH_BYTES: usize = 4096;

/// Consecutive empty reads tolerated from a looping buffer per render.
const MAX_STALLED_READS: u32 = 2;

/// Owns the registry, the post-mix processor chain and the scratch blocks.
pub struct Mixer {
    format: DeviceFormat,
    registry: Registry,
    mixed: ProcessorChain,
    mix_scratch: Vec<f32>,
    input_scratch: Vec<f32>,
}

impl Mixer {
    pub fn new(format: DeviceFormat) -> Result<Self, EngineError> {
        if format.channels == 0 || format.channels > MAX_CHANNELS {
            return Err(EngineError::InvalidChannels(format.channels));
        }
        if format.sample_rate == 0 {
            return Err(EngineError::InvalidSampleRate(format.sample_rate));
        }
        Ok(Self {
            format,
            registry: Registry::new(),
            mixed: ProcessorChain::new(),
            mix_scratch: vec![0.0; format.samples(MIX_CHUNK_FRAMES)],
            input_scratch: vec![0.0; INPUT_SCRATCH_BYTES / 4],
        })
    }

    pub fn format(&self) -> DeviceFormat {
        self.format
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut Registry {
        &mut self.registry
    }

    pub fn track(&mut self, buffer: AudioBuffer) -> BufferKey {
        self.registry.track(buffer)
    }

    pub fn untrack(&mut self, key: BufferKey) -> Option<AudioBuffer> {
        self.registry.untrack(key)
    }

    pub fn buffer(&self, key: BufferKey) -> Option<&AudioBuffer> {
        self.registry.get(key)
    }

    pub fn buffer_mut(&mut self, key: BufferKey) -> Option<&mut AudioBuffer> {
        self.registry.get_mut(key)
    }

    /// Append a processor run on the whole mixed block.
    pub fn attach_mixed(&mut self, processor: Box<dyn Processor>) -> ProcessorId {
        self.mixed.attach(processor)
    }

    pub fn detach_mixed(&mut self, id: ProcessorId) -> Option<Box<dyn Processor>> {
        self.mixed.detach(id)
    }

    pub fn mixed_processors_mut(&mut self) -> &mut ProcessorChain {
        &mut self.mixed
    }

    /// Render one device block of interleaved f32 frames.
    ///
    /// The block is zeroed, every playing buffer is accumulated into it in
    /// registry order, then the mixed chain runs once over the result.
    pub fn render(&mut self, output: &mut [f32]) {
        output.fill(0.0);
        let channels = self.format.channels as usize;
        let frames = output.len() / channels;
        if frames == 0 {
            return;
        }
        let output = &mut output[..frames * channels];

        let Self { registry, mixed, mix_scratch, input_scratch, .. } = self;
        registry.for_each_mut(|_, buffer| {
            if buffer.is_playing() {
                mix_buffer(buffer, input_scratch, mix_scratch, output, channels);
            }
        });
        mixed.process(output, frames);
    }
}

/// Accumulate one buffer into `output` chunk by chunk.
fn mix_buffer(
    buffer: &mut AudioBuffer,
    input: &mut [f32],
    chunk: &mut [f32],
    output: &mut [f32],
    channels: usize,
) {
    let frames = output.len() / channels;
    let chunk_frames = chunk.len() / channels;
    let mut written = 0;
    let mut stalls = 0;

    while written < frames {
        let wanted = (frames - written).min(chunk_frames);
        let got = buffer.read_mixing(input, chunk, wanted);

        if got > 0 {
            let block = &mut chunk[..got * channels];
            buffer.processors_mut().process(block, got);
            mix_frames(
                &mut output[written * channels..],
                block,
                channels,
                buffer.volume(),
                buffer.pan(),
            );
            written += got;
            stalls = 0;
        } else {
            stalls += 1;
        }

        if got < wanted {
            // A starved stream keeps its place; the rest of the block stays silent.
            if buffer.usage() == BufferUsage::Stream && buffer.is_playing() {
                break;
            }
            if !buffer.is_looping() {
                buffer.stop();
                break;
            }
            if stalls >= MAX_STALLED_READS {
                break;
            }
            buffer.rewind();
        }
    }
}

/// Left/right gains for a stereo pan position.
///
/// Uses the S-curve `g(x) = 0.5 * x * (3 - x^2)`: left is `g(1 - pan)`,
/// right is `g(pan)`, both scaled by `volume`.
pub fn pan_gains(volume: f32, pan: f32) -> [f32; 2] {
    let curve = |x: f32| 0.5 * x * (3.0 - x * x);
    [volume * curve(1.0 - pan), volume * curve(pan)]
}

/// Add `input` frames onto `output`. Pan only applies to stereo.
fn mix_frames(output: &mut [f32], input: &[f32], channels: usize, volume: f32, pan: f32) {
    if channels == 2 {
        let [left, right] = pan_gains(volume, pan);
        for (out, frame) in output.chunks_exact_mut(2).zip(input.chunks_exact(2)) {
            out[0] += frame[0] * left;
            out[1] += frame[1] * right;
        }
    } else {
        for (out, sample) in output.iter_mut().zip(input) {
            *out += sample * volume;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sx_ir::{SampleData, SampleFormat};

    const MONO: DeviceFormat = DeviceFormat { channels: 1, sample_rate: 8000 };
    const STEREO: DeviceFormat = DeviceFormat { channels: 2, sample_rate: 8000 };

    fn constant(value: f32, frames: usize, device: DeviceFormat) -> AudioBuffer {
        let samples = vec![value; frames * device.channels as usize];
        AudioBuffer::from_samples(
            SampleData::F32(samples),
            device.channels,
            device.sample_rate,
            BufferUsage::Static,
            device,
        )
        .unwrap()
    }

    fn looping(value: f32, frames: usize, device: DeviceFormat) -> AudioBuffer {
        let mut buf = constant(value, frames, device);
        buf.set_looping(true);
        buf.play();
        buf
    }

    #[test]
    fn two_buffers_sum_linearly() {
        let mut mixer = Mixer::new(MONO).unwrap();
        mixer.track(looping(0.25, 64, MONO));
        mixer.track(looping(0.5, 64, MONO));
        let mut out = [0.0f32; 100];
        mixer.render(&mut out);
        assert!(out.iter().all(|s| (s - 0.75).abs() < 1e-6));
    }

    #[test]
    fn sum_is_not_clamped() {
        let mut mixer = Mixer::new(MONO).unwrap();
        mixer.track(looping(0.75, 8, MONO));
        mixer.track(looping(0.75, 8, MONO));
        let mut out = [0.0f32; 4];
        mixer.render(&mut out);
        assert!((out[0] - 1.5).abs() < 1e-6);
    }

    #[test]
    fn pan_law_extremes() {
        assert_eq!(pan_gains(1.0, 0.0), [1.0, 0.0]);
        assert_eq!(pan_gains(1.0, 1.0), [0.0, 1.0]);
        let [l, r] = pan_gains(0.5, 0.5);
        assert!((l - r).abs() < 1e-6);
        assert!((l - 0.34375).abs() < 1e-6);
    }

    #[test]
    fn hard_left_pan_silences_right() {
        let mut mixer = Mixer::new(STEREO).unwrap();
        let mut buf = looping(1.0, 16, STEREO);
        buf.set_pan(0.0);
        mixer.track(buf);
        let mut out = [0.0f32; 8];
        mixer.render(&mut out);
        for frame in out.chunks_exact(2) {
            assert!((frame[0] - 1.0).abs() < 1e-6);
            assert_eq!(frame[1], 0.0);
        }
    }

    #[test]
    fn volume_scales_mono_without_pan() {
        let mut mixer = Mixer::new(MONO).unwrap();
        let mut buf = looping(1.0, 16, MONO);
        buf.set_volume(0.5);
        buf.set_pan(0.0);
        mixer.track(buf);
        let mut out = [0.0f32; 4];
        mixer.render(&mut out);
        assert!(out.iter().all(|s| (s - 0.5).abs() < 1e-6));
    }

    #[test]
    fn paused_and_stopped_buffers_are_skipped() {
        let mut mixer = Mixer::new(MONO).unwrap();
        let mut paused = looping(1.0, 16, MONO);
        paused.pause();
        mixer.track(paused);
        mixer.track(constant(1.0, 16, MONO));
        let mut out = [1.0f32; 8];
        mixer.render(&mut out);
        assert_eq!(out, [0.0; 8]);
    }

    #[test]
    fn non_looping_buffer_ends_mid_block() {
        let mut mixer = Mixer::new(MONO).unwrap();
        let mut buf = constant(1.0, 5, MONO);
        buf.play();
        let key = mixer.track(buf);
        let mut out = [0.0f32; 8];
        mixer.render(&mut out);
        assert_eq!(out, [1.0, 1.0, 1.0, 1.0, 1.0, 0.0, 0.0, 0.0]);
        assert!(!mixer.buffer(key).unwrap().is_playing());
    }

    #[test]
    fn long_blocks_are_mixed_in_chunks() {
        let mut mixer = Mixer::new(STEREO).unwrap();
        let mut buf = looping(0.5, 300, STEREO);
        buf.set_pan(1.0);
        mixer.track(buf);
        let mut out = vec![0.0f32; STEREO.samples(MIX_CHUNK_FRAMES * 3 + 7)];
        mixer.render(&mut out);
        assert!(out.chunks_exact(2).all(|f| f[0] == 0.0 && (f[1] - 0.5).abs() < 1e-6));
    }

    #[test]
    fn starved_stream_stays_playing() {
        let mut mixer = Mixer::new(MONO).unwrap();
        let mut stream =
            AudioBuffer::new(SampleFormat::F32, 1, 8000, 8, BufferUsage::Stream, MONO).unwrap();
        stream.set_looping(true);
        stream.play();
        stream.update(&[0.5f32; 4]).unwrap();
        let key = mixer.track(stream);

        let mut out = [0.0f32; 8];
        mixer.render(&mut out);
        assert_eq!(out, [0.5, 0.5, 0.5, 0.5, 0.0, 0.0, 0.0, 0.0]);

        let stream = mixer.buffer_mut(key).unwrap();
        assert!(stream.is_playing());
        assert!(stream.update(&[0.25f32; 4]).is_ok());
    }

    #[test]
    fn one_shot_stream_ends_with_its_half() {
        let mut mixer = Mixer::new(MONO).unwrap();
        let mut stream =
            AudioBuffer::new(SampleFormat::F32, 1, 8000, 8, BufferUsage::Stream, MONO).unwrap();
        stream.update(&[0.5f32; 4]).unwrap();
        stream.update(&[0.25f32; 4]).unwrap();
        stream.play();
        let key = mixer.track(stream);

        let mut out = [0.0f32; 8];
        mixer.render(&mut out);
        assert_eq!(out, [0.5, 0.5, 0.5, 0.5, 0.0, 0.0, 0.0, 0.0]);
        assert!(!mixer.buffer(key).unwrap().is_playing());

        mixer.render(&mut out);
        assert_eq!(out, [0.0; 8]);
    }

    #[test]
    fn per_buffer_chain_runs_before_volume() {
        let mut mixer = Mixer::new(MONO).unwrap();
        let mut buf = looping(0.25, 8, MONO);
        buf.set_volume(0.5);
        buf.processors_mut()
            .attach(Box::new(|s: &mut [f32], _: usize| s.iter_mut().for_each(|x| *x *= 4.0)));
        mixer.track(buf);
        let mut out = [0.0f32; 4];
        mixer.render(&mut out);
        assert!(out.iter().all(|s| (s - 0.5).abs() < 1e-6));
    }

    #[test]
    fn mixed_chain_runs_once_after_all_buffers() {
        let mut mixer = Mixer::new(MONO).unwrap();
        mixer.track(looping(0.25, 8, MONO));
        mixer.track(looping(0.25, 8, MONO));
        let id = mixer.attach_mixed(Box::new(|s: &mut [f32], _: usize| {
            s.iter_mut().for_each(|x| *x = -*x)
        }));
        let mut out = [0.0f32; 4];
        mixer.render(&mut out);
        assert!(out.iter().all(|s| (s + 0.5).abs() < 1e-6));

        assert!(mixer.detach_mixed(id).is_some());
        mixer.render(&mut out);
        assert!(out.iter().all(|s| (s - 0.5).abs() < 1e-6));
    }

    #[test]
    fn untracked_buffer_is_not_mixed() {
        let mut mixer = Mixer::new(MONO).unwrap();
        let key = mixer.track(looping(1.0, 8, MONO));
        let buf = mixer.untrack(key);
        assert!(buf.is_some());
        let mut out = [1.0f32; 4];
        mixer.render(&mut out);
        assert_eq!(out, [0.0; 4]);
    }

    #[test]
    fn resampled_buffer_fills_block() {
        let mut mixer = Mixer::new(STEREO).unwrap();
        let mut buf = AudioBuffer::from_samples(
            SampleData::S16(vec![8192; 64]),
            1,
            4000,
            BufferUsage::Static,
            STEREO,
        )
        .unwrap();
        buf.set_looping(true);
        buf.set_pan(0.0);
        buf.play();
        mixer.track(buf);
        let mut out = [0.0f32; 200];
        mixer.render(&mut out);
        assert!(out.chunks_exact(2).all(|f| (f[0] - 0.25).abs() < 1e-6 && f[1] == 0.0));
    }

    #[test]
    fn invalid_format_is_rejected() {
        assert_eq!(
            Mixer::new(DeviceFormat::new(0, 8000)).err(),
            Some(EngineError::InvalidChannels(0))
        );
        assert_eq!(
            Mixer::new(DeviceFormat::new(2, 0)).err(),
            Some(EngineError::InvalidSampleRate(0))
        );
    }
}
