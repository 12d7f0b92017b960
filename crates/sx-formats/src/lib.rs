//! Audio file decoding for the sfxmix mixer.
//!
//! Turns file bytes into a [`Wave`]: WAV through `hound`, OGG/Vorbis through
//! `symphonia`. Both paths normalize to interleaved 16-bit samples. FLAC and
//! MP3 are recognized by extension but not decoded.

mod file_io;
mod file_type;
mod ogg_format;
mod wav_format;

pub use file_io::load_file_data;
pub use file_type::FileType;
pub use ogg_format::decode_ogg;
pub use wav_format::{decode_wav, wav_bytes, write_wav};

use std::path::Path;
use sx_ir::Wave;
use thiserror::Error;

/// Error type for decoding and file access.
#[derive(Debug, Error)]
pub enum FormatError {
    /// Extension or container not handled
    #[error("unsupported file format: {0}")]
    UnsupportedFormat(String),
    /// WAV container or sample error
    #[error("wav error: {0}")]
    Wav(#[from] hound::Error),
    /// OGG container or Vorbis codec error
    #[error("ogg error: {0}")]
    Ogg(#[from] symphonia::core::errors::Error),
    /// Decoded stream carried no frames
    #[error("no audio data")]
    Empty,
    /// I/O error
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

/// Decode in-memory file bytes of the given type.
pub fn decode(file_type: FileType, bytes: &[u8]) -> Result<Wave, FormatError> {
    let wave = match file_type {
        FileType::Wav => decode_wav(bytes)?,
        FileType::Ogg => decode_ogg(bytes)?,
        FileType::Flac | FileType::Mp3 => {
            return Err(FormatError::UnsupportedFormat(file_type.extension().into()))
        }
    };
    if wave.is_empty() {
        return Err(FormatError::Empty);
    }
    Ok(wave)
}

/// Read and decode a file, picking the decoder from its extension.
pub fn load_wave(path: &Path) -> Result<Wave, FormatError> {
    let file_type = FileType::from_path(path)?;
    let bytes = load_file_data(path)?;
    decode(file_type, &bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn declared_formats_are_unsupported() {
        for file_type in [FileType::Flac, FileType::Mp3] {
            match decode(file_type, b"fLaC") {
                Err(FormatError::UnsupportedFormat(ext)) => assert_eq!(ext, file_type.extension()),
                other => panic!("expected UnsupportedFormat, got {:?}", other),
            }
        }
    }

    #[test]
    fn garbage_wav_is_an_error() {
        assert!(matches!(decode(FileType::Wav, b"not a wav"), Err(FormatError::Wav(_))));
    }

    #[test]
    fn wav_round_trips_through_decode() {
        let bytes = wav_bytes(&[0.5, -0.5, 0.25, -0.25], 2, 22050).unwrap();
        let wave = decode(FileType::Wav, &bytes).unwrap();
        assert_eq!(wave.frame_count, 2);
        assert_eq!(wave.channels, 2);
        assert_eq!(wave.sample_rate, 22050);
    }

    #[test]
    fn empty_wav_is_rejected() {
        let bytes = wav_bytes(&[], 1, 8000).unwrap();
        assert!(matches!(decode(FileType::Wav, &bytes), Err(FormatError::Empty)));
    }
}
