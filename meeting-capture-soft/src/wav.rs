//! Streaming WAV encoding and decoding for the PCM recorder.
//!
//! A recording's length is unknown when its first slice is emitted, and
//! emitted bytes are never rewritten, so the header carries the
//! "unknown length" marker `0xFFFFFFFF` in both size fields. Readers treat
//! the data chunk as running to the end of the blob.

use thiserror::Error;

/// Size of the standard WAV RIFF header in bytes.
pub const WAV_HEADER_SIZE: usize = 44;

/// Size marker for a data chunk of unknown length.
pub const UNKNOWN_SIZE: u32 = u32::MAX;

const BITS_PER_SAMPLE: u16 = 16;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WavError {
    #[error("data too short for a WAV header ({0} bytes)")]
    Truncated(usize),

    #[error("missing {0} marker")]
    BadMagic(&'static str),

    #[error("unsupported WAV encoding: format {format}, {bits} bits")]
    Unsupported { format: u16, bits: u16 },
}

/// 16-bit PCM stream format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WavSpec {
    pub sample_rate: u32,
    pub channels: u16,
}

impl WavSpec {
    pub fn block_align(&self) -> u16 {
        self.channels * BITS_PER_SAMPLE / 8
    }

    pub fn byte_rate(&self) -> u32 {
        self.sample_rate * u32::from(self.block_align())
    }

    /// Frames covering `duration_ms`, rounded down.
    pub fn frames_for_ms(&self, duration_ms: u64) -> usize {
        (u64::from(self.sample_rate) * duration_ms / 1000) as usize
    }
}

/// 44-byte header. `data_size` of None writes the unknown-length marker.
pub fn header(spec: WavSpec, data_size: Option<u32>) -> [u8; WAV_HEADER_SIZE] {
    let (riff_size, data_size) = match data_size {
        Some(size) => (36 + size, size),
        None => (UNKNOWN_SIZE, UNKNOWN_SIZE),
    };

    let mut header = [0u8; WAV_HEADER_SIZE];
    header[0..4].copy_from_slice(b"RIFF");
    header[4..8].copy_from_slice(&riff_size.to_le_bytes());
    header[8..12].copy_from_slice(b"WAVE");

    header[12..16].copy_from_slice(b"fmt ");
    header[16..20].copy_from_slice(&16u32.to_le_bytes());
    header[20..22].copy_from_slice(&1u16.to_le_bytes());
    header[22..24].copy_from_slice(&spec.channels.to_le_bytes());
    header[24..28].copy_from_slice(&spec.sample_rate.to_le_bytes());
    header[28..32].copy_from_slice(&spec.byte_rate().to_le_bytes());
    header[32..34].copy_from_slice(&spec.block_align().to_le_bytes());
    header[34..36].copy_from_slice(&BITS_PER_SAMPLE.to_le_bytes());

    header[36..40].copy_from_slice(b"data");
    header[40..44].copy_from_slice(&data_size.to_le_bytes());
    header
}

/// Parse a header written by [`header`]. Sample data starts at [`WAV_HEADER_SIZE`].
pub fn parse_header(data: &[u8]) -> Result<WavSpec, WavError> {
    if data.len() < WAV_HEADER_SIZE {
        return Err(WavError::Truncated(data.len()));
    }
    if &data[0..4] != b"RIFF" {
        return Err(WavError::BadMagic("RIFF"));
    }
    if &data[8..12] != b"WAVE" {
        return Err(WavError::BadMagic("WAVE"));
    }
    if &data[36..40] != b"data" {
        return Err(WavError::BadMagic("data"));
    }

    let format = u16::from_le_bytes([data[20], data[21]]);
    let bits = u16::from_le_bytes([data[34], data[35]]);
    if format != 1 || bits != BITS_PER_SAMPLE {
        return Err(WavError::Unsupported { format, bits });
    }

    Ok(WavSpec {
        channels: u16::from_le_bytes([data[22], data[23]]),
        sample_rate: u32::from_le_bytes([data[24], data[25], data[26], data[27]]),
    })
}

/// Decode a whole blob to interleaved f32 samples.
pub fn decode(data: &[u8]) -> Result<(WavSpec, Vec<f32>), WavError> {
    let spec = parse_header(data)?;
    let samples = data[WAV_HEADER_SIZE..]
        .chunks_exact(2)
        .map(|pair| f32::from(i16::from_le_bytes([pair[0], pair[1]])) / f32::from(i16::MAX))
        .collect();
    Ok((spec, samples))
}
