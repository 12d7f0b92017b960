//! WAV decoding and encoding via hound.

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use std::io::{Cursor, Seek, Write};
use std::path::Path;
use sx_ir::{SampleData, Wave};

use crate::FormatError;

/// Decode WAV bytes into a 16-bit wave, whatever the source depth.
pub fn decode_wav(bytes: &[u8]) -> Result<Wave, FormatError> {
    let mut reader = WavReader::new(Cursor::new(bytes))?;
    let spec = reader.spec();

    let samples: Vec<i16> = match spec.sample_format {
        SampleFormat::Float => reader
            .samples::<f32>()
            .map(|s| s.map(float_to_i16))
            .collect::<Result<_, _>>()?,
        SampleFormat::Int => {
            let bits = spec.bits_per_sample;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| int_to_i16(v, bits)))
                .collect::<Result<_, _>>()?
        }
    };

    Ok(Wave::new(SampleData::S16(samples), spec.sample_rate, spec.channels))
}

fn float_to_i16(v: f32) -> i16 {
    (v.clamp(-1.0, 1.0) * i16::MAX as f32) as i16
}

fn int_to_i16(v: i32, bits: u16) -> i16 {
    if bits >= 16 {
        (v >> (bits - 16)) as i16
    } else {
        (v << (16 - bits)) as i16
    }
}

fn write_samples<W: Write + Seek>(
    writer: W,
    samples: &[f32],
    channels: u16,
    sample_rate: u32,
) -> Result<(), FormatError> {
    let spec = WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };
    let mut writer = WavWriter::new(writer, spec)?;
    for &sample in samples {
        writer.write_sample(float_to_i16(sample))?;
    }
    writer.finalize()?;
    Ok(())
}

/// Write interleaved f32 samples as a 16-bit PCM WAV file.
pub fn write_wav(path: &Path, samples: &[f32], channels: u16, sample_rate: u32) -> Result<(), FormatError> {
    let file = std::io::BufWriter::new(std::fs::File::create(path)?);
    write_samples(file, samples, channels, sample_rate)
}

/// Encode interleaved f32 samples as in-memory 16-bit PCM WAV bytes.
pub fn wav_bytes(samples: &[f32], channels: u16, sample_rate: u32) -> Result<Vec<u8>, FormatError> {
    let mut bytes = Vec::new();
    write_samples(Cursor::new(&mut bytes), samples, channels, sample_rate)?;
    Ok(bytes)
}
