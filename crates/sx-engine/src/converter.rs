//! Sample format, channel and rate conversion into the mixing format.
//!
//! A `Converter` is created once per buffer and keeps its resampling state
//! for the buffer's lifetime. Output is always interleaved f32.

use alloc::vec;
use alloc::vec::Vec;
use arrayvec::ArrayVec;
use sx_ir::{SampleFormat, MAX_CHANNELS};

use crate::error::EngineError;

const FRAME_CAP: usize = MAX_CHANNELS as usize;

/// Fixed-point phase: 32 integer bits, 32 fractional bits.
const FRAC_BITS: u32 = 32;
const FRAC_ONE: u64 = 1 << FRAC_BITS;
const FRAC_MASK: u64 = FRAC_ONE - 1;

/// Input and output description for a converter.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ConverterConfig {
    pub format_in: SampleFormat,
    pub channels_in: u16,
    pub rate_in: u32,
    pub channels_out: u16,
    pub rate_out: u32,
}

/// Stateful converter from any input format to interleaved f32.
#[derive(Clone, Debug)]
pub struct Converter {
    format_in: SampleFormat,
    channels_in: u16,
    channels_out: u16,
    rate_in: u32,
    rate_out: u32,
    /// Input frames advanced per output frame.
    step: u64,
    /// Phase between `x0` and `x1`.
    frac: u64,
    /// Input frames to load before the next output frame.
    pending: u64,
    /// Set once the rates have ever differed; never cleared.
    resampling: bool,
    x0: ArrayVec<f32, FRAME_CAP>,
    x1: ArrayVec<f32, FRAME_CAP>,
}

impl Converter {
    pub fn new(config: ConverterConfig) -> Result<Self, EngineError> {
        validate_channels(config.channels_in)?;
        validate_channels(config.channels_out)?;
        validate_rate(config.rate_in)?;
        validate_rate(config.rate_out)?;

        let silent: ArrayVec<f32, FRAME_CAP> =
            core::iter::repeat(0.0).take(config.channels_out as usize).collect();
        let step = step_for(config.rate_in, config.rate_out);

        Ok(Self {
            format_in: config.format_in,
            channels_in: config.channels_in,
            channels_out: config.channels_out,
            rate_in: config.rate_in,
            rate_out: config.rate_out,
            step,
            frac: 0,
            pending: 2,
            resampling: step != FRAC_ONE,
            x0: silent.clone(),
            x1: silent,
        })
    }

    pub fn format_in(&self) -> SampleFormat {
        self.format_in
    }

    pub fn channels_in(&self) -> u16 {
        self.channels_in
    }

    pub fn channels_out(&self) -> u16 {
        self.channels_out
    }

    pub fn rate_in(&self) -> u32 {
        self.rate_in
    }

    pub fn rate_out(&self) -> u32 {
        self.rate_out
    }

    /// Bytes per input frame.
    pub fn input_frame_bytes(&self) -> usize {
        self.format_in.bytes_per_frame(self.channels_in)
    }

    /// Change the conversion ratio in place, keeping the interpolation state.
    pub fn set_rate(&mut self, rate_in: u32, rate_out: u32) -> Result<(), EngineError> {
        validate_rate(rate_in)?;
        validate_rate(rate_out)?;
        self.rate_in = rate_in;
        self.rate_out = rate_out;
        self.step = step_for(rate_in, rate_out);
        if !self.resampling && self.step != FRAC_ONE {
            self.resampling = true;
            self.frac = 0;
            self.pending = 2;
        }
        Ok(())
    }

    /// Forget the interpolation history so the next input starts a fresh phase.
    pub fn reset(&mut self) {
        self.frac = 0;
        self.pending = 2;
        self.x0.iter_mut().for_each(|s| *s = 0.0);
        self.x1.iter_mut().for_each(|s| *s = 0.0);
    }

    /// Emit the frame sitting exactly on the last input frame after the
    /// input has ended, then reset.
    ///
    /// `process` cannot produce it because it waits for the next frame to
    /// interpolate towards. Returns 1 if a frame was written.
    pub fn flush(&mut self, output: &mut [f32]) -> usize {
        let out_ch = self.channels_out as usize;
        if !self.resampling || self.pending != 1 || self.frac != 0 || output.len() < out_ch {
            return 0;
        }
        output[..out_ch].copy_from_slice(&self.x1);
        self.reset();
        1
    }

    /// Number of input frames consumed to produce exactly `output_frames`.
    pub fn required_input_frames(&self, output_frames: usize) -> usize {
        if output_frames == 0 {
            return 0;
        }
        if !self.resampling {
            return output_frames;
        }
        let advance = (self.frac + (output_frames as u64 - 1) * self.step) >> FRAC_BITS;
        (self.pending + advance) as usize
    }

    /// Number of output frames producible from `input_frames` in the current state.
    pub fn expected_output_frames(&self, input_frames: usize) -> usize {
        if !self.resampling {
            return input_frames;
        }
        let input = input_frames as u64;
        if input < self.pending {
            return 0;
        }
        let budget = ((input - self.pending + 1) << FRAC_BITS) - 1 - self.frac;
        (1 + budget / self.step) as usize
    }

    /// Convert up to `input_frames` frames from `input` into at most
    /// `output_frames` frames of `output`.
    ///
    /// Returns `(frames consumed, frames produced)`.
    pub fn process(
        &mut self,
        input: &[u8],
        input_frames: usize,
        output: &mut [f32],
        output_frames: usize,
    ) -> (usize, usize) {
        let in_frame = self.input_frame_bytes();
        let out_ch = self.channels_out as usize;

        if !self.resampling {
            let n = input_frames.min(output_frames);
            for i in 0..n {
                map_frame(
                    self.format_in,
                    self.channels_in,
                    &input[i * in_frame..(i + 1) * in_frame],
                    &mut output[i * out_ch..(i + 1) * out_ch],
                );
            }
            return (n, n);
        }

        let mut consumed = 0;
        let mut produced = 0;
        while produced < output_frames {
            while self.pending > 0 {
                if consumed == input_frames {
                    return (consumed, produced);
                }
                core::mem::swap(&mut self.x0, &mut self.x1);
                map_frame(
                    self.format_in,
                    self.channels_in,
                    &input[consumed * in_frame..(consumed + 1) * in_frame],
                    &mut self.x1,
                );
                consumed += 1;
                self.pending -= 1;
            }

            let t = (self.frac as f64 / FRAC_ONE as f64) as f32;
            let dst = &mut output[produced * out_ch..(produced + 1) * out_ch];
            for (c, out) in dst.iter_mut().enumerate() {
                let a = self.x0[c];
                *out = a + (self.x1[c] - a) * t;
            }
            produced += 1;

            let next = self.frac + self.step;
            self.pending = next >> FRAC_BITS;
            self.frac = next & FRAC_MASK;
        }
        (consumed, produced)
    }
}

/// Convert a whole block in one go with a fresh converter.
///
/// Used at load time so sounds are stored in the device format.
pub fn convert_frames(
    config: ConverterConfig,
    input: &[u8],
    input_frames: usize,
) -> Result<Vec<f32>, EngineError> {
    let mut converter = Converter::new(config)?;
    let input_frames = input_frames.min(input.len() / converter.input_frame_bytes());
    let frames = converter.expected_output_frames(input_frames);
    let channels = config.channels_out as usize;

    // One spare frame for the tail `flush` may emit.
    let mut output = vec![0.0; (frames + 1) * channels];
    let (consumed, mut produced) = converter.process(input, input_frames, &mut output, frames);
    if consumed == input_frames {
        produced += converter.flush(&mut output[produced * channels..]);
    }
    output.truncate(produced * channels);
    Ok(output)
}

fn validate_channels(channels: u16) -> Result<(), EngineError> {
    if channels == 0 || channels > MAX_CHANNELS {
        return Err(EngineError::InvalidChannels(channels));
    }
    Ok(())
}

fn validate_rate(rate: u32) -> Result<(), EngineError> {
    if rate == 0 {
        return Err(EngineError::InvalidSampleRate(rate));
    }
    Ok(())
}

fn step_for(rate_in: u32, rate_out: u32) -> u64 {
    ((rate_in as u64) << FRAC_BITS) / rate_out as u64
}

/// Decode one input frame and map its channels onto `out`.
fn map_frame(format: SampleFormat, channels_in: u16, frame: &[u8], out: &mut [f32]) {
    let bps = format.bytes_per_sample();
    let ch_in = channels_in as usize;
    let sample = |c: usize| format.decode(&frame[c * bps..]);

    if ch_in == out.len() {
        for (c, o) in out.iter_mut().enumerate() {
            *o = sample(c);
        }
    } else if ch_in == 1 {
        out.fill(sample(0));
    } else if out.len() == 1 {
        let sum: f32 = (0..ch_in).map(sample).sum();
        out[0] = sum / ch_in as f32;
    } else {
        for (c, o) in out.iter_mut().enumerate() {
            *o = if c < ch_in { sample(c) } else { 0.0 };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn f32_bytes(samples: &[f32]) -> Vec<u8> {
        samples.iter().flat_map(|s| s.to_ne_bytes()).collect()
    }

    fn config(channels_in: u16, rate_in: u32, channels_out: u16, rate_out: u32) -> ConverterConfig {
        ConverterConfig {
            format_in: SampleFormat::F32,
            channels_in,
            rate_in,
            channels_out,
            rate_out,
        }
    }

    #[test]
    fn same_rate_passes_frames_through() {
        let mut conv = Converter::new(config(2, 44100, 2, 44100)).unwrap();
        let input = f32_bytes(&[0.1, 0.2, 0.3, 0.4]);
        let mut out = [0.0; 4];
        assert_eq!(conv.required_input_frames(2), 2);
        assert_eq!(conv.process(&input, 2, &mut out, 2), (2, 2));
        assert_eq!(out, [0.1, 0.2, 0.3, 0.4]);
    }

    #[test]
    fn mono_duplicates_to_stereo() {
        let mut conv = Converter::new(config(1, 48000, 2, 48000)).unwrap();
        let input = f32_bytes(&[0.5, -0.25]);
        let mut out = [0.0; 4];
        conv.process(&input, 2, &mut out, 2);
        assert_eq!(out, [0.5, 0.5, -0.25, -0.25]);
    }

    #[test]
    fn stereo_averages_to_mono() {
        let mut conv = Converter::new(config(2, 48000, 1, 48000)).unwrap();
        let input = f32_bytes(&[1.0, 0.0]);
        let mut out = [0.0; 1];
        conv.process(&input, 1, &mut out, 1);
        assert!((out[0] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn s16_is_widened_to_float() {
        let cfg = ConverterConfig { format_in: SampleFormat::S16, ..config(1, 8000, 1, 8000) };
        let mut conv = Converter::new(cfg).unwrap();
        let input: Vec<u8> = [16384i16, -32768].iter().flat_map(|s| s.to_ne_bytes()).collect();
        let mut out = [0.0; 2];
        conv.process(&input, 2, &mut out, 2);
        assert!((out[0] - 0.5).abs() < 1e-6);
        assert!((out[1] - -1.0).abs() < 1e-6);
    }

    #[test]
    fn upsample_interpolates_midpoints() {
        let mut conv = Converter::new(config(1, 22050, 1, 44100)).unwrap();
        let input = f32_bytes(&[0.0, 1.0, 2.0, 3.0]);
        let mut out = [0.0; 8];
        let (consumed, produced) = conv.process(&input, 4, &mut out, 8);
        assert_eq!((consumed, produced), (4, 6));
        let expected = [0.0, 0.5, 1.0, 1.5, 2.0, 2.5];
        for (a, b) in out[..6].iter().zip(expected.iter()) {
            assert!((a - b).abs() < 1e-6, "{} vs {}", a, b);
        }
    }

    #[test]
    fn flush_emits_frame_on_last_input() {
        let mut conv = Converter::new(config(1, 16000, 1, 8000)).unwrap();
        let input = f32_bytes(&[1.0, 2.0, 3.0, 4.0, 5.0]);
        let mut out = [0.0; 4];
        assert_eq!(conv.process(&input, 5, &mut out, 4), (5, 2));
        assert_eq!(&out[..2], &[1.0, 3.0]);
        assert_eq!(conv.flush(&mut out[2..]), 1);
        assert_eq!(out[2], 5.0);
        // Reset after flushing: nothing more to emit.
        assert_eq!(conv.flush(&mut out[3..]), 0);
    }

    #[test]
    fn flush_is_empty_between_input_frames() {
        let mut conv = Converter::new(config(1, 16000, 1, 8000)).unwrap();
        let input = f32_bytes(&[1.0, 2.0, 3.0, 4.0]);
        let mut out = [0.0; 4];
        assert_eq!(conv.process(&input, 4, &mut out, 4), (4, 2));
        assert_eq!(conv.flush(&mut out[2..]), 0);
    }

    #[test]
    fn convert_frames_keeps_last_frame() {
        let out = convert_frames(config(1, 4000, 1, 8000), &f32_bytes(&[0.0, 1.0, 2.0]), 3).unwrap();
        assert_eq!(out, vec![0.0, 0.5, 1.0, 1.5, 2.0]);
    }

    #[test]
    fn reset_restarts_phase() {
        let mut conv = Converter::new(config(1, 16000, 1, 8000)).unwrap();
        let mut out = [0.0; 2];
        conv.process(&f32_bytes(&[9.0, 8.0, 7.0]), 3, &mut out, 2);
        conv.reset();
        assert_eq!(conv.process(&f32_bytes(&[1.0, 2.0, 3.0, 4.0]), 4, &mut out, 2), (4, 2));
        assert_eq!(out, [1.0, 3.0]);
    }

    #[test]
    fn downsample_skips_frames() {
        let mut conv = Converter::new(config(1, 88200, 1, 44100)).unwrap();
        assert_eq!(conv.required_input_frames(3), 6);
        let input = f32_bytes(&[0.0, 1.0, 2.0, 3.0, 4.0, 5.0]);
        let mut out = [0.0; 3];
        assert_eq!(conv.process(&input, 6, &mut out, 3), (6, 3));
        assert_eq!(out, [0.0, 2.0, 4.0]);
    }

    #[test]
    fn required_input_matches_consumption() {
        let mut conv = Converter::new(config(1, 44100, 1, 48000)).unwrap();
        let input = f32_bytes(&[0.25; 600]);
        let mut out = [0.0; 256];
        for _ in 0..3 {
            let need = conv.required_input_frames(256);
            let (consumed, produced) = conv.process(&input, need, &mut out, 256);
            assert_eq!(consumed, need);
            assert_eq!(produced, 256);
        }
    }

    #[test]
    fn expected_output_matches_process() {
        let cfg = config(1, 44100, 1, 48000);
        let conv = Converter::new(cfg).unwrap();
        let expected = conv.expected_output_frames(1000);
        let out = convert_frames(cfg, &f32_bytes(&[0.1; 1000]), 1000).unwrap();
        assert_eq!(out.len(), expected);
    }

    #[test]
    fn set_rate_switches_without_recreating() {
        let mut conv = Converter::new(config(1, 44100, 1, 44100)).unwrap();
        assert_eq!(conv.required_input_frames(10), 10);
        conv.set_rate(44100, 22050).unwrap();
        assert_eq!(conv.rate_out(), 22050);
        assert_eq!(conv.required_input_frames(10), 2 + 18);
    }

    #[test]
    fn invalid_configs_are_rejected() {
        assert_eq!(
            Converter::new(config(0, 44100, 2, 44100)).unwrap_err(),
            EngineError::InvalidChannels(0)
        );
        assert_eq!(
            Converter::new(config(1, 44100, 9, 44100)).unwrap_err(),
            EngineError::InvalidChannels(9)
        );
        assert_eq!(
            Converter::new(config(1, 0, 2, 44100)).unwrap_err(),
            EngineError::InvalidSampleRate(0)
        );
    }
}
