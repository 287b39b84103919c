//! Error types for the conversion and playback core.

use std::{io, path::PathBuf};
use thiserror::Error;

/// The source cannot be converted to the canonical format.
#[derive(Debug, Error)]
pub enum FormatError {
    #[error("unsupported channel count {0}, only mono and stereo sources are supported")]
    UnsupportedChannels(u16),

    #[error("unsupported sample width of {0} bytes")]
    UnsupportedSampleWidth(usize),

    #[error("floating point samples are not supported")]
    UnsupportedSampleFormat,

    #[error("invalid sample rate {0}")]
    InvalidSampleRate(u32),

    #[error("{valid_bits} valid bits do not fit in {sample_width}-byte samples")]
    InvalidValidBits { valid_bits: u16, sample_width: usize },

    #[error("malformed wave header: {0}")]
    MalformedHeader(String),

    /// Conversion state is bound to the first (rate, channels) pair it saw.
    #[error("resampler state was created for {expected_rate}Hz/{expected_channels}ch, got {rate}Hz/{channels}ch")]
    ResamplerMismatch {
        expected_rate: u32,
        expected_channels: u16,
        rate: u32,
        channels: u16,
    },

    #[error("could not set up resampler for {rate}Hz/{channels}ch")]
    ResamplerSetup {
        rate: u32,
        channels: u16,
        #[source]
        source: rubato::ResamplerConstructionError,
    },

    #[error("resampling failed")]
    Resample(#[from] rubato::ResampleError),
}

#[derive(Debug, Error)]
pub enum PlaybackError {
    #[error("could not open {}: {source}", path.display())]
    StreamOpen {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Format(#[from] FormatError),

    #[error("error while reading audio stream: {0}")]
    Read(#[source] io::Error),

    /// Failures from the voice transport are passed through as-is.
    #[error(transparent)]
    Transport(anyhow::Error),
}

impl From<hound::Error> for FormatError {
    fn from(e: hound::Error) -> Self {
        FormatError::MalformedHeader(e.to_string())
    }
}
