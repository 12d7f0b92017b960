//! Session configuration.

use sx_audio::DeviceConfig;

/// Everything needed to bring up a session.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SessionConfig {
    pub device: DeviceConfig,
    /// Frames per stream sub-buffer. 0 picks a thirtieth of a second at the
    /// device rate. Never smaller than the device period.
    pub stream_buffer_frames: u32,
}

impl SessionConfig {
    /// Sub-buffer size for new streams at `device_rate`.
    pub(crate) fn sub_buffer_frames(&self, device_rate: u32, period_frames: Option<u32>) -> u32 {
        let frames = match self.stream_buffer_frames {
            0 => device_rate / 30,
            n => n,
        };
        frames.max(period_frames.unwrap_or(0)).max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_sub_buffer_is_a_thirtieth_second() {
        let config = SessionConfig::default();
        assert_eq!(config.sub_buffer_frames(48000, None), 1600);
    }

    #[test]
    fn sub_buffer_never_below_period() {
        let config = SessionConfig { stream_buffer_frames: 256, ..Default::default() };
        assert_eq!(config.sub_buffer_frames(48000, Some(1024)), 1024);
        assert_eq!(config.sub_buffer_frames(48000, Some(128)), 256);
    }
}
