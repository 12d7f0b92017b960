//! CPAL-based audio output backend.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{BufferSize, Device, SampleRate, Stream, StreamConfig};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::config::{DeviceConfig, OutputFormat};
use crate::traits::{AudioError, AudioOutput};

/// Largest block rendered in one go for integer device formats.
pub const MAX_DEVICE_FRAMES: usize = 8192;

/// CPAL-based audio output.
///
/// Created in two steps like the device itself: `new` resolves the device
/// and its configuration, `build_stream` installs the render callback.
/// Playback begins with [`AudioOutput::start`]. The callback is called from the device thread with a
/// block of interleaved f32 samples to fill.
pub struct CpalOutput {
    device: Device,
    config: StreamConfig,
    format: OutputFormat,
    stream: Option<Stream>,
    running: Arc<AtomicBool>,
}

impl CpalOutput {
    /// Open the default output device with the requested configuration.
    pub fn new(config: &DeviceConfig) -> Result<Self, AudioError> {
        let host = cpal::default_host();
        let device = host.default_output_device().ok_or(AudioError::NoDevice)?;

        let default = device
            .default_output_config()
            .map_err(|e| AudioError::DeviceInit(e.to_string()))?;

        let mut stream_config: StreamConfig = default.into();
        stream_config.channels = config.channels;
        if config.sample_rate != 0 {
            stream_config.sample_rate = SampleRate(config.sample_rate);
        }
        if let Some(frames) = config.buffer_frames {
            stream_config.buffer_size = BufferSize::Fixed(frames);
        }

        Ok(Self {
            device,
            config: stream_config,
            format: config.format,
            stream: None,
            running: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Build the stream around `render`. It stays silent until started.
    pub fn build_stream<F>(&mut self, render: F) -> Result<(), AudioError>
    where
        F: FnMut(&mut [f32]) + Send + 'static,
    {
        let running = self.running.clone();
        let stream = match self.format {
            OutputFormat::F32 => build_f32(&self.device, &self.config, running, render)?,
            OutputFormat::S16 => build_s16(&self.device, &self.config, running, render)?,
        };
        self.stream = Some(stream);

        log::info!(
            "device: {} opened ({} Hz, {} channels, {:?})",
            self.device.name().unwrap_or_else(|_| "unknown".into()),
            self.config.sample_rate.0,
            self.config.channels,
            self.format,
        );
        Ok(())
    }

    pub fn format(&self) -> OutputFormat {
        self.format
    }

    /// Period size in frames if one was fixed.
    pub fn buffer_frames(&self) -> Option<u32> {
        match self.config.buffer_size {
            BufferSize::Fixed(frames) => Some(frames),
            BufferSize::Default => None,
        }
    }
}

fn build_f32<F>(
    device: &Device,
    config: &StreamConfig,
    running: Arc<AtomicBool>,
    mut render: F,
) -> Result<Stream, AudioError>
where
    F: FnMut(&mut [f32]) + Send + 'static,
{
    device
        .build_output_stream(
            config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                if !running.load(Ordering::Relaxed) {
                    data.fill(0.0);
                    return;
                }
                render(data);
            },
            |err| log::error!("device: stream error: {}", err),
            None,
        )
        .map_err(|e| AudioError::StreamCreate(e.to_string()))
}

fn build_s16<F>(
    device: &Device,
    config: &StreamConfig,
    running: Arc<AtomicBool>,
    mut render: F,
) -> Result<Stream, AudioError>
where
    F: FnMut(&mut [f32]) + Send + 'static,
{
    // Whole frames only, so each chunk starts on a frame boundary.
    let mut staging = vec![0.0f32; MAX_DEVICE_FRAMES * config.channels as usize];

    device
        .build_output_stream(
            config,
            move |data: &mut [i16], _: &cpal::OutputCallbackInfo| {
                if !running.load(Ordering::Relaxed) {
                    data.fill(0);
                    return;
                }
                for out in data.chunks_mut(staging.len()) {
                    let block = &mut staging[..out.len()];
                    render(block);
                    for (dst, src) in out.iter_mut().zip(block.iter()) {
                        *dst = (src.clamp(-1.0, 1.0) * 32767.0) as i16;
                    }
                }
            },
            |err| log::error!("device: stream error: {}", err),
            None,
        )
        .map_err(|e| AudioError::StreamCreate(e.to_string()))
}

impl AudioOutput for CpalOutput {
    fn sample_rate(&self) -> u32 {
        self.config.sample_rate.0
    }

    fn channels(&self) -> u16 {
        self.config.channels
    }

    fn start(&mut self) -> Result<(), AudioError> {
        self.running.store(true, Ordering::Relaxed);
        if let Some(ref stream) = self.stream {
            stream.play().map_err(|e| AudioError::Playback(e.to_string()))?;
        }
        Ok(())
    }

    fn stop(&mut self) -> Result<(), AudioError> {
        self.running.store(false, Ordering::Relaxed);
        if let Some(ref stream) = self.stream {
            stream.pause().map_err(|e| AudioError::Playback(e.to_string()))?;
        }
        Ok(())
    }
}
