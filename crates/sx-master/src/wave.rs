//! Sentinel-returning wave loaders.

use std::path::Path;
use sx_formats::FileType;
use sx_ir::Wave;

/// Load and decode a file. Returns an empty wave on failure.
pub fn load_wave(path: impl AsRef<Path>) -> Wave {
    let path = path.as_ref();
    match sx_formats::load_wave(path) {
        Ok(wave) => {
            log_loaded(&path.display().to_string(), &wave);
            wave
        }
        Err(e) => {
            log::warn!("wave: [{}] failed to load wave data: {}", path.display(), e);
            Wave::default()
        }
    }
}

/// Decode in-memory file bytes tagged with an extension such as `".wav"`.
/// Returns an empty wave on failure.
pub fn load_wave_from_memory(file_type: &str, data: &[u8]) -> Wave {
    let decoded = FileType::from_extension(file_type).and_then(|t| sx_formats::decode(t, data));
    match decoded {
        Ok(wave) => {
            log_loaded("memory", &wave);
            wave
        }
        Err(e) => {
            log::warn!("wave: failed to load {} data from memory: {}", file_type, e);
            Wave::default()
        }
    }
}

fn log_loaded(source: &str, wave: &Wave) {
    log::info!(
        "wave: [{}] data loaded successfully ({} Hz, {} bit, {})",
        source,
        wave.sample_rate,
        wave.sample_size,
        channel_label(wave.channels),
    );
}

pub(crate) fn channel_label(channels: u16) -> String {
    match channels {
        1 => "Mono".into(),
        2 => "Stereo".into(),
        n => format!("{} channels", n),
    }
}
