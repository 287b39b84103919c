//! Conversion of raw PCM blocks into the canonical transport format
//! (16-bit signed, 48kHz, interleaved stereo, little-endian).

use crate::{
    constants::{FRAME_LENGTH_MS, SAMPLE_WIDTH, SAMPLING_RATE},
    error::FormatError,
    resample::ConversionState,
};
use byteorder::{ByteOrder, LittleEndian};

/// Layout of the raw samples read from a source.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SourceFormat {
    /// Samples per second, per channel
    pub sample_rate: u32,

    /// Bytes per sample, 1 to 4. One-byte samples are unsigned.
    pub sample_width: usize,

    /// Significant bits in each sample, the rest is container padding
    pub valid_bits: u16,

    pub channels: u16,
}

impl SourceFormat {
    pub fn new(sample_rate: u32, sample_width: usize, channels: u16) -> Result<Self, FormatError> {
        let format = Self {
            sample_rate,
            sample_width,
            valid_bits: (sample_width * 8) as u16,
            channels,
        };
        format.validate()?;

        Ok(format)
    }

    /// Narrow the significant bits, e.g. 24-bit audio in 4-byte samples.
    pub fn with_valid_bits(self, valid_bits: u16) -> Result<Self, FormatError> {
        let format = Self { valid_bits, ..self };
        format.validate()?;

        Ok(format)
    }

    pub fn validate(&self) -> Result<(), FormatError> {
        if self.sample_rate == 0 {
            return Err(FormatError::InvalidSampleRate(self.sample_rate));
        }
        if !(1..=4).contains(&self.sample_width) {
            return Err(FormatError::UnsupportedSampleWidth(self.sample_width));
        }
        if !(1..=2).contains(&self.channels) {
            return Err(FormatError::UnsupportedChannels(self.channels));
        }
        if self.valid_bits == 0 || self.valid_bits as usize > self.sample_width * 8 {
            return Err(FormatError::InvalidValidBits {
                valid_bits: self.valid_bits,
                sample_width: self.sample_width,
            });
        }

        Ok(())
    }

    /// Bytes per sample across all channels
    pub fn block_align(&self) -> usize {
        self.sample_width * self.channels as usize
    }

    /// Source samples (per channel) covering one 20ms frame.
    pub fn samples_per_frame(&self) -> usize {
        ((self.sample_rate as u64 * FRAME_LENGTH_MS as u64 / 1000) as usize).max(1)
    }

    /// Raw bytes covering one 20ms frame.
    pub fn bytes_per_frame(&self) -> usize {
        self.samples_per_frame() * self.block_align()
    }
}

/// Convert a block of raw samples to canonical format.
///
/// Steps that are already satisfied by `format` are skipped. `state` is only
/// touched when the source needs resampling. Trailing bytes that do not make
/// up a whole sample frame are dropped.
pub fn convert(
    samples: &[u8],
    format: &SourceFormat,
    state: &mut ConversionState,
) -> Result<Vec<u8>, FormatError> {
    format.validate()?;

    let whole = samples.len() - samples.len() % format.block_align();
    let samples = to_16_bit(&samples[..whole], format.sample_width, format.valid_bits);

    let samples = if format.sample_rate != SAMPLING_RATE {
        state.resample(&samples, format.sample_rate, SAMPLING_RATE, format.channels)?
    } else {
        samples
    };

    Ok(encode(samples, format.channels))
}

/// Drain the resampler at the end of a stream.
///
/// Returns canonical bytes for the tail the resampler was still holding, or
/// nothing when `format` needs no resampling.
pub fn finish(format: &SourceFormat, state: &mut ConversionState) -> Result<Vec<u8>, FormatError> {
    if format.sample_rate == SAMPLING_RATE {
        return Ok(Vec::new());
    }

    let samples = state.finish()?;

    Ok(encode(samples, format.channels))
}

fn encode(samples: Vec<i16>, channels: u16) -> Vec<u8> {
    let samples = if channels == 1 {
        to_stereo(&samples)
    } else {
        samples
    };

    let mut out = vec![0; samples.len() * SAMPLE_WIDTH];
    LittleEndian::write_i16_into(&samples, &mut out);
    out
}

/// Linear width conversion without dithering.
fn to_16_bit(bytes: &[u8], width: usize, valid_bits: u16) -> Vec<i16> {
    match (width, valid_bits) {
        // 8-bit wave data is unsigned, re-bias before widening
        (1, _) => bytes
            .iter()
            .map(|&b| (b.wrapping_sub(128) as i8 as i16) << 8)
            .collect(),
        (2, 16) => {
            let mut out = vec![0; bytes.len() / 2];
            LittleEndian::read_i16_into(bytes, &mut out);
            out
        }
        // Samples are right-justified in their container. Sign-extend from
        // the valid bits, then keep the most significant 16 of them.
        (w, bits) => {
            let bits = bits as u32;
            bytes
                .chunks_exact(w)
                .map(|sample| {
                    let raw = LittleEndian::read_int(sample, w);
                    let value = (raw << (64 - bits)) >> (64 - bits);
                    let value = if bits >= 16 {
                        value >> (bits - 16)
                    } else {
                        value << (16 - bits)
                    };
                    value as i16
                })
                .collect()
        }
    }
}

/// Duplicate a mono signal into both channels at unity gain.
fn to_stereo(samples: &[i16]) -> Vec<i16> {
    samples.iter().flat_map(|&s| [s, s]).collect()
}
