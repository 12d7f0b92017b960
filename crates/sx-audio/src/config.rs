//! Device configuration.

/// Sample format written to the device.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    F32,
    S16,
}

/// Playback device request. Zero or `None` fields fall back to the
/// device's own defaults.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeviceConfig {
    /// Frames per second, 0 for the device default.
    pub sample_rate: u32,
    pub channels: u16,
    pub format: OutputFormat,
    /// Fixed period size in frames, if the host allows one.
    pub buffer_frames: Option<u32>,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            sample_rate: 0,
            channels: 2,
            format: OutputFormat::F32,
            buffer_frames: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_stereo_float_at_device_rate() {
        let config = DeviceConfig::default();
        assert_eq!(config.sample_rate, 0);
        assert_eq!(config.channels, 2);
        assert_eq!(config.format, OutputFormat::F32);
        assert!(config.buffer_frames.is_none());
    }
}
