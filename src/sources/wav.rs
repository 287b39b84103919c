//! Frame source for linear PCM wave files.
//!
//! The header is parsed with hound, after which the sample bytes are read
//! raw from the underlying stream and run through [`convert`] one 20ms
//! block at a time.

use crate::{
    constants::FRAME_SIZE,
    convert::{convert, finish, SourceFormat},
    error::{FormatError, PlaybackError},
    resample::ConversionState,
    sources::{AudioStream, Frame},
};
use hound::{SampleFormat, WavReader};
use std::io::Read;

pub struct AudioFrameSource {
    /// `None` once released
    stream: Option<AudioStream>,
    format: SourceFormat,
    state: ConversionState,
    is_first_frame: bool,

    /// Converted bytes that did not fit in the previous frame
    carry: Vec<u8>,

    /// The stream returned less than a full block
    exhausted: bool,
}

impl AudioFrameSource {
    /// Parse a wave header from `stream` and take ownership of it.
    ///
    /// On error the stream is dropped (closed) before returning. A header
    /// that ends early is reported as malformed, not as a read failure.
    pub fn from_reader(stream: AudioStream) -> Result<Self, PlaybackError> {
        let reader = WavReader::new(stream).map_err(FormatError::from)?;

        let spec = reader.spec();
        if spec.sample_format != SampleFormat::Int {
            return Err(FormatError::UnsupportedSampleFormat.into());
        }

        // The container width, which may be wider than the valid bits
        let sample_width = reader.spec_ex().bytes_per_sample as usize;
        let format = SourceFormat::new(spec.sample_rate, sample_width, spec.channels)?
            .with_valid_bits(spec.bits_per_sample)?;
        let data_len = reader.len() as u64 * sample_width as u64;

        debug!(
            "Opened wave stream: {}Hz, {} bit, {} channel(s), {} bytes of samples",
            format.sample_rate, spec.bits_per_sample, format.channels, data_len
        );

        // Only the data chunk, trailing chunks are not audio
        let stream = reader.into_inner().take(data_len);

        Ok(Self::from_raw(Box::new(stream), format)?)
    }

    /// Wrap a stream of headerless samples in a known format.
    pub fn from_raw(stream: AudioStream, format: SourceFormat) -> Result<Self, FormatError> {
        format.validate()?;

        Ok(Self {
            stream: Some(stream),
            format,
            state: ConversionState::new(),
            is_first_frame: true,
            carry: Vec::new(),
            exhausted: false,
        })
    }

    pub fn format(&self) -> &SourceFormat {
        &self.format
    }

    pub fn is_released(&self) -> bool {
        self.stream.is_none()
    }

    /// Close the underlying stream. Safe to call more than once.
    pub fn release(&mut self) {
        if self.stream.take().is_some() {
            debug!("Released audio stream");
        }
        self.carry.clear();
    }

    /// Produce the next canonical frame.
    ///
    /// Returns `Ok(None)` exactly once when the stream is exhausted. The
    /// stream is released on end of stream and on any error, and is never
    /// read again afterwards.
    pub fn next_frame(&mut self) -> Result<Option<Frame>, PlaybackError> {
        if self.is_released() {
            return Ok(None);
        }

        let result = self.produce_frame();
        if !matches!(result, Ok(Some(_))) {
            self.release();
        }

        result
    }

    fn produce_frame(&mut self) -> Result<Option<Frame>, PlaybackError> {
        loop {
            if self.carry.len() < FRAME_SIZE && !self.exhausted {
                let block = self.read_block()?;
                let mut converted = convert(&block, &self.format, &mut self.state)?;
                if self.exhausted {
                    converted.extend(finish(&self.format, &mut self.state)?);
                }
                self.carry.extend_from_slice(&converted);
            }

            if self.carry.len() >= FRAME_SIZE {
                self.is_first_frame = false;
                let rest = self.carry.split_off(FRAME_SIZE);
                return Ok(Some(std::mem::replace(&mut self.carry, rest)));
            }

            // The resampler lags behind on the very first block, pad with
            // leading silence
            if self.is_first_frame {
                self.is_first_frame = false;
                let mut frame = vec![0; FRAME_SIZE - self.carry.len()];
                frame.append(&mut self.carry);
                return Ok(Some(frame));
            }

            if self.exhausted {
                if self.carry.is_empty() {
                    return Ok(None);
                }

                let mut frame = std::mem::take(&mut self.carry);
                frame.resize(FRAME_SIZE, 0);
                return Ok(Some(frame));
            }

            // Rate rounding left this block short mid-stream, top it up
            trace!("Short block of {} bytes, reading ahead", self.carry.len());
        }
    }

    /// Read up to one frame's worth of raw sample bytes.
    fn read_block(&mut self) -> Result<Vec<u8>, PlaybackError> {
        let wanted = self.format.bytes_per_frame();
        let mut block = Vec::with_capacity(wanted);

        if let Some(stream) = self.stream.as_mut() {
            stream
                .by_ref()
                .take(wanted as u64)
                .read_to_end(&mut block)
                .map_err(PlaybackError::Read)?;
        }

        if block.len() < wanted {
            self.exhausted = true;
        }

        Ok(block)
    }
}
