//! File type tags derived from extensions.

use std::path::Path;

use crate::FormatError;

/// Container types the loader knows about.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FileType {
    Wav,
    Ogg,
    Flac,
    Mp3,
}

impl FileType {
    /// Match an extension including its dot (`".wav"`), ignoring ASCII case.
    pub fn from_extension(ext: &str) -> Result<Self, FormatError> {
        const KNOWN: [(&str, FileType); 4] = [
            (".wav", FileType::Wav),
            (".ogg", FileType::Ogg),
            (".flac", FileType::Flac),
            (".mp3", FileType::Mp3),
        ];
        KNOWN
            .iter()
            .find(|(known, _)| known.eq_ignore_ascii_case(ext))
            .map(|(_, file_type)| *file_type)
            .ok_or_else(|| FormatError::UnsupportedFormat(ext.to_string()))
    }

    /// Tag for a path's extension.
    pub fn from_path(path: &Path) -> Result<Self, FormatError> {
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or_default();
        Self::from_extension(&format!(".{}", ext))
    }

    /// Canonical extension, dot included.
    pub fn extension(self) -> &'static str {
        match self {
            FileType::Wav => ".wav",
            FileType::Ogg => ".ogg",
            FileType::Flac => ".flac",
            FileType::Mp3 => ".mp3",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_match_ignores_case() {
        assert_eq!(FileType::from_extension(".WAV").unwrap(), FileType::Wav);
        assert_eq!(FileType::from_extension(".Ogg").unwrap(), FileType::Ogg);
    }

    #[test]
    fn extension_needs_the_dot() {
        assert!(FileType::from_extension("wav").is_err());
    }

    #[test]
    fn unknown_extension_is_unsupported() {
        match FileType::from_path(Path::new("sound.xm")) {
            Err(FormatError::UnsupportedFormat(ext)) => assert_eq!(ext, ".xm"),
            other => panic!("expected UnsupportedFormat, got {:?}", other),
        }
        assert!(FileType::from_path(Path::new("noext")).is_err());
    }

    #[test]
    fn path_extension_is_used() {
        assert_eq!(FileType::from_path(Path::new("sfx/jump.mp3")).unwrap(), FileType::Mp3);
    }
}
