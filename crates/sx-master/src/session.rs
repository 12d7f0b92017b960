//! The audio session: device, lock and mixer.
//!
//! [`AudioSession`] owns the playback device. Everything else lives in a
//! shared state reachable through [`SessionHandle`], which any thread may
//! clone and use while the device callback is mixing.

use parking_lot::Mutex;
use std::ops::Deref;
use std::path::Path;
use std::sync::Arc;
use sx_audio::{AudioOutput, CpalOutput};
use sx_engine::{
    convert_frames, AudioBuffer, BufferUsage, ConverterConfig, EngineError, FillSource, Mixer,
    Processor, ProcessorId,
};
use sx_ir::{BufferKey, DeviceFormat, SampleData, SampleFormat, Wave, DEFAULT_SAMPLE_RATE};

use crate::config::SessionConfig;
use crate::error::SessionError;
use crate::handle::{AudioStream, BufferHandle, Sound};
use crate::wave::{channel_label, load_wave, load_wave_from_memory};

/// State shared by the session, its handles and the device callback.
struct Shared {
    /// The one lock. `None` once the session is closed.
    mixer: Mutex<Option<Mixer>>,
    format: DeviceFormat,
    config: SessionConfig,
    /// Device period in frames when the backend fixed one.
    period_frames: Option<u32>,
    headless: bool,
}

fn render_locked(mixer: &Mutex<Option<Mixer>>, output: &mut [f32]) {
    let mut guard = mixer.lock();
    let Some(mixer) = guard.as_mut() else {
        output.fill(0.0);
        return;
    };
    #[cfg(feature = "alloc_check")]
    assert_no_alloc::assert_no_alloc(|| mixer.render(output));
    #[cfg(not(feature = "alloc_check"))]
    mixer.render(output);
}

/// Start a backend whose render callback is already installed.
fn start_output<O: AudioOutput>(output: &mut O) -> Result<(), SessionError> {
    output.start().map_err(|e| {
        log::error!("device: failed to start playback: {}", e);
        SessionError::from(e)
    })
}

/// Owner of the playback device.
///
/// All buffer state the device callback reads sits behind one lock, which
/// the callback holds for a whole render. Buffers are unlinked under that
/// lock and dropped after it is released. Buffer operations are reached
/// through [`SessionHandle`], either by deref or from a cloned handle on
/// another thread.
pub struct AudioSession {
    handle: SessionHandle,
    output: Option<CpalOutput>,
}

/// Cloneable, thread-safe access to a session's buffers.
///
/// Every operation on a closed session logs an error and does nothing.
#[derive(Clone)]
pub struct SessionHandle {
    shared: Arc<Shared>,
}

/// Cloneable handle that renders a headless session from any thread.
///
/// Renders silence once the session is closed.
#[derive(Clone)]
pub struct Renderer {
    shared: Arc<Shared>,
}

impl Renderer {
    /// Render one block of interleaved f32 frames in the device format.
    pub fn render(&self, output: &mut [f32]) {
        render_locked(&self.shared.mixer, output);
    }
}

impl AudioSession {
    /// Open the default playback device and start mixing.
    ///
    /// On failure everything acquired so far is released before returning.
    pub fn init(config: SessionConfig) -> Result<Self, SessionError> {
        match Self::open_device(config) {
            Ok(session) => {
                let format = session.format();
                log::info!(
                    "device: initialized successfully ({} Hz, {})",
                    format.sample_rate,
                    channel_label(format.channels),
                );
                Ok(session)
            }
            Err(e) => {
                log::error!("device: failed to initialize playback device: {}", e);
                Err(e)
            }
        }
    }

    fn open_device(config: SessionConfig) -> Result<Self, SessionError> {
        let mut output = CpalOutput::new(&config.device)?;
        let format = DeviceFormat::new(output.channels(), output.sample_rate());
        let shared = Arc::new(Shared {
            mixer: Mutex::new(Some(Mixer::new(format)?)),
            format,
            config,
            period_frames: output.buffer_frames(),
            headless: false,
        });

        let callback = shared.clone();
        output.build_stream(move |data: &mut [f32]| render_locked(&callback.mixer, data))?;
        start_output(&mut output)?;

        Ok(Self {
            handle: SessionHandle { shared },
            output: Some(output),
        })
    }

    /// A ready session without a device, driven by [`SessionHandle::render`].
    ///
    /// A sample rate of 0 picks `DEFAULT_SAMPLE_RATE`.
    pub fn headless(config: SessionConfig) -> Result<Self, SessionError> {
        let rate = match config.device.sample_rate {
            0 => DEFAULT_SAMPLE_RATE,
            rate => rate,
        };
        let format = DeviceFormat::new(config.device.channels, rate);
        let mixer = Mixer::new(format).map_err(|e| {
            log::error!("device: failed to initialize headless session: {}", e);
            e
        })?;
        log::info!(
            "device: headless session ready ({} Hz, {})",
            format.sample_rate,
            channel_label(format.channels),
        );
        let shared = Arc::new(Shared {
            mixer: Mutex::new(Some(mixer)),
            format,
            config,
            period_frames: None,
            headless: true,
        });
        Ok(Self {
            handle: SessionHandle { shared },
            output: None,
        })
    }

    /// Stop the device and release every buffer and the mixing scratch.
    ///
    /// Handles and renderers stay valid but go inert. Logs an error if
    /// already closed.
    pub fn close(&mut self) {
        if !self.is_ready() {
            log::error!("device: could not be closed, not currently initialized");
            return;
        }
        if let Some(mut output) = self.output.take() {
            if let Err(e) = output.stop() {
                log::warn!("device: failed to stop playback: {}", e);
            }
        }
        // Taken under the lock, dropped after it is released.
        let mixer = self.handle.shared.mixer.lock().take();
        drop(mixer);
        log::info!("device: closed successfully");
    }

    /// A handle for driving this session from other threads.
    pub fn handle(&self) -> SessionHandle {
        self.handle.clone()
    }
}

impl Deref for AudioSession {
    type Target = SessionHandle;

    fn deref(&self) -> &SessionHandle {
        &self.handle
    }
}

impl Drop for AudioSession {
    fn drop(&mut self) {
        if self.is_ready() {
            self.close();
        }
    }
}

impl SessionHandle {
    // --- State ---

    pub fn is_ready(&self) -> bool {
        self.shared.mixer.lock().is_some()
    }

    pub fn is_headless(&self) -> bool {
        self.shared.headless
    }

    /// Format every sound is converted to.
    pub fn format(&self) -> DeviceFormat {
        self.shared.format
    }

    pub fn config(&self) -> &SessionConfig {
        &self.shared.config
    }

    /// Number of buffers currently tracked. 0 once closed.
    pub fn buffer_count(&self) -> usize {
        self.shared.mixer.lock().as_ref().map_or(0, |m| m.registry().len())
    }

    fn check_ready(&self) -> Result<(), SessionError> {
        if self.is_ready() {
            Ok(())
        } else {
            Err(SessionError::NotReady)
        }
    }

    /// Run `f` on the mixer under the lock. Logs and returns `None` once closed.
    fn with_mixer<R>(&self, op: &str, f: impl FnOnce(&mut Mixer) -> R) -> Option<R> {
        let mut guard = self.shared.mixer.lock();
        match guard.as_mut() {
            Some(mixer) => Some(f(mixer)),
            None => {
                log::error!("device: {} on a closed session", op);
                None
            }
        }
    }

    fn track(&self, buffer: AudioBuffer) -> Result<BufferKey, SessionError> {
        let mut guard = self.shared.mixer.lock();
        match guard.as_mut() {
            Some(mixer) => Ok(mixer.track(buffer)),
            None => {
                drop(guard);
                drop(buffer);
                Err(SessionError::NotReady)
            }
        }
    }

    // --- Sounds ---

    /// Load a sound from a file. Returns an empty sound on failure.
    pub fn load_sound(&self, path: impl AsRef<Path>) -> Sound {
        let wave = load_wave(path);
        if wave.is_empty() {
            return Sound::default();
        }
        self.load_sound_from_wave(&wave)
    }

    /// Load a sound from file bytes tagged with an extension such as `".ogg"`.
    pub fn load_sound_from_memory(&self, file_type: &str, data: &[u8]) -> Sound {
        let wave = load_wave_from_memory(file_type, data);
        if wave.is_empty() {
            return Sound::default();
        }
        self.load_sound_from_wave(&wave)
    }

    /// Convert a wave to the device format and track it.
    pub fn load_sound_from_wave(&self, wave: &Wave) -> Sound {
        match self.try_load_sound(wave) {
            Ok(sound) => sound,
            Err(e) => {
                log::warn!("sound: failed to load sound: {}", e);
                Sound::default()
            }
        }
    }

    fn try_load_sound(&self, wave: &Wave) -> Result<Sound, SessionError> {
        self.check_ready()?;
        if wave.is_empty() {
            return Err(SessionError::EmptyWave);
        }

        let format = self.shared.format;
        let config = ConverterConfig {
            format_in: wave.format(),
            channels_in: wave.channels,
            rate_in: wave.sample_rate,
            channels_out: format.channels,
            rate_out: format.sample_rate,
        };
        // Converted outside the lock.
        let samples = convert_frames(config, wave.data.as_bytes(), wave.frame_count as usize)?;
        if samples.is_empty() {
            return Err(SessionError::EmptyWave);
        }

        let buffer = AudioBuffer::from_samples(
            SampleData::F32(samples),
            format.channels,
            format.sample_rate,
            BufferUsage::Static,
            format,
        )?;
        let frame_count = buffer.size_in_frames();
        let key = self.track(buffer)?;
        log::debug!("sound: tracked {} frames", frame_count);
        Ok(Sound { key: Some(key), frame_count })
    }

    /// Untrack a sound and free its storage.
    pub fn unload_sound(&self, sound: Sound) {
        self.unload(&sound, "sound");
    }

    fn unload(&self, handle: &dyn BufferHandle, subsystem: &str) {
        let Some(key) = handle.buffer_key() else {
            log::error!("{}: cannot unload an empty handle", subsystem);
            return;
        };
        // Unlinked under the lock, dropped after it is released.
        let Some(buffer) = self.with_mixer("unload", |m| m.untrack(key)) else {
            return;
        };
        if buffer.is_none() {
            log::warn!("{}: buffer already unloaded", subsystem);
        }
        drop(buffer);
    }

    /// Run `f` on the buffer behind `handle` under the lock.
    ///
    /// Logs and returns `None` for closed sessions and empty or stale handles.
    fn with_buffer<H, R, F>(&self, handle: &H, op: &str, f: F) -> Option<R>
    where
        H: BufferHandle + ?Sized,
        F: FnOnce(&mut AudioBuffer) -> R,
    {
        let Some(key) = handle.buffer_key() else {
            log::error!("sound: {} on an empty buffer", op);
            return None;
        };
        self.with_mixer(op, |mixer| match mixer.buffer_mut(key) {
            Some(buffer) => Some(f(buffer)),
            None => {
                log::error!("sound: {} on an unloaded buffer", op);
                None
            }
        })
        .flatten()
    }

    // --- Playback control ---

    /// Start from the first frame.
    pub fn play<H: BufferHandle + ?Sized>(&self, handle: &H) {
        self.with_buffer(handle, "play", |b| b.play());
    }

    pub fn stop<H: BufferHandle + ?Sized>(&self, handle: &H) {
        self.with_buffer(handle, "stop", |b| b.stop());
    }

    pub fn pause<H: BufferHandle + ?Sized>(&self, handle: &H) {
        self.with_buffer(handle, "pause", |b| b.pause());
    }

    pub fn resume<H: BufferHandle + ?Sized>(&self, handle: &H) {
        self.with_buffer(handle, "resume", |b| b.resume());
    }

    /// Playing and not paused. False for empty or unloaded handles.
    pub fn is_playing<H: BufferHandle + ?Sized>(&self, handle: &H) -> bool {
        self.with_buffer(handle, "is_playing", |b| b.is_playing())
            .unwrap_or(false)
    }

    pub fn set_volume<H: BufferHandle + ?Sized>(&self, handle: &H, volume: f32) {
        self.with_buffer(handle, "set_volume", |b| b.set_volume(volume));
    }

    pub fn set_pan<H: BufferHandle + ?Sized>(&self, handle: &H, pan: f32) {
        self.with_buffer(handle, "set_pan", |b| b.set_pan(pan));
    }

    pub fn set_pitch<H: BufferHandle + ?Sized>(&self, handle: &H, pitch: f32) {
        let result = self.with_buffer(handle, "set_pitch", |b| b.set_pitch(pitch));
        if let Some(Err(e)) = result {
            log::warn!("sound: {}", e);
        }
    }

    pub fn set_looping<H: BufferHandle + ?Sized>(&self, handle: &H, looping: bool) {
        self.with_buffer(handle, "set_looping", |b| b.set_looping(looping));
    }

    // --- Streams ---

    /// Create a looping double-buffered stream fed through `update_stream`.
    /// Returns an empty stream on failure.
    pub fn load_stream(&self, sample_rate: u32, sample_size: u32, channels: u16) -> AudioStream {
        match self.try_load_stream(sample_rate, sample_size, channels) {
            Ok(stream) => {
                log::info!(
                    "stream: initialized successfully ({} Hz, {} bit, {})",
                    sample_rate,
                    sample_size,
                    channel_label(channels),
                );
                stream
            }
            Err(e) => {
                log::warn!("stream: failed to create audio buffer: {}", e);
                AudioStream::default()
            }
        }
    }

    fn try_load_stream(
        &self,
        sample_rate: u32,
        sample_size: u32,
        channels: u16,
    ) -> Result<AudioStream, SessionError> {
        self.check_ready()?;
        let format = SampleFormat::from_bits(sample_size);
        let device = self.shared.format;
        let sub_frames = self
            .shared
            .config
            .sub_buffer_frames(device.sample_rate, self.shared.period_frames);

        let mut buffer = AudioBuffer::new(
            format,
            channels,
            sample_rate,
            sub_frames * 2,
            BufferUsage::Stream,
            device,
        )?;
        buffer.set_looping(true);
        let key = self.track(buffer)?;

        Ok(AudioStream {
            key: Some(key),
            sample_rate,
            sample_size: format.bits(),
            channels,
        })
    }

    /// Refill the first processed half of a stream.
    ///
    /// The sample type must match the stream's sample size. Logs a warning
    /// when neither half has been played yet.
    pub fn update_stream<T: bytemuck::Pod>(&self, stream: &AudioStream, samples: &[T]) {
        let result = self.with_buffer(stream, "update_stream", |b| b.update(samples));
        match result {
            Some(Err(EngineError::SubBufferBusy)) => {
                log::warn!("stream: buffer not available for updating");
            }
            Some(Err(e)) => log::warn!("stream: {}", e),
            _ => {}
        }
    }

    /// True if either half of the stream is waiting to be refilled.
    pub fn is_stream_processed(&self, stream: &AudioStream) -> bool {
        self.with_buffer(stream, "is_stream_processed", |b| b.is_processed())
            .unwrap_or(false)
    }

    /// Install (or clear) a producer that fills the stream on demand.
    pub fn set_stream_callback(&self, stream: &AudioStream, source: Option<Box<dyn FillSource>>) {
        // The previous source is dropped after the lock is released.
        let old = self
            .with_buffer(stream, "set_stream_callback", |b| b.set_fill_source(source))
            .flatten();
        drop(old);
    }

    pub fn unload_stream(&self, stream: AudioStream) {
        self.unload(&stream, "stream");
    }

    // --- Processors ---

    /// Append a processor to one buffer's chain.
    pub fn attach_processor<H: BufferHandle + ?Sized>(
        &self,
        handle: &H,
        processor: Box<dyn Processor>,
    ) -> Option<ProcessorId> {
        self.with_buffer(handle, "attach_processor", |b| b.processors_mut().attach(processor))
    }

    /// Remove a processor from one buffer's chain. Returns true if it was attached.
    pub fn detach_processor<H: BufferHandle + ?Sized>(&self, handle: &H, id: ProcessorId) -> bool {
        let removed = self
            .with_buffer(handle, "detach_processor", |b| b.processors_mut().detach(id))
            .flatten();
        removed.is_some()
    }

    /// Append a processor run on the final mix.
    pub fn attach_mixed_processor(&self, processor: Box<dyn Processor>) -> Option<ProcessorId> {
        self.with_mixer("attach_mixed_processor", |m| m.attach_mixed(processor))
    }

    pub fn detach_mixed_processor(&self, id: ProcessorId) -> bool {
        let removed = self
            .with_mixer("detach_mixed_processor", |m| m.detach_mixed(id))
            .flatten();
        removed.is_some()
    }

    // --- Offline rendering ---

    /// Render one block on a headless session.
    ///
    /// A closed session renders silence.
    pub fn render(&self, output: &mut [f32]) {
        if !self.shared.headless {
            log::error!("device: render needs a headless session");
            output.fill(0.0);
            return;
        }
        render_locked(&self.shared.mixer, output);
    }

    /// Render `frames` frames on a headless session into a new block.
    pub fn render_frames(&self, frames: usize) -> Vec<f32> {
        let mut out = vec![0.0; self.shared.format.samples(frames)];
        self.render(&mut out);
        out
    }

    /// Handle for rendering a headless session from another thread.
    ///
    /// `None` for device sessions and closed sessions.
    pub fn renderer(&self) -> Option<Renderer> {
        if !self.shared.headless || !self.is_ready() {
            return None;
        }
        Some(Renderer { shared: self.shared.clone() })
    }
}
