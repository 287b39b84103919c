//! Streaming sample rate conversion.
//!
//! Wraps a linear `rubato` resampler fed in fixed 20ms chunks. Input that
//! does not fill a chunk is held back until the next call, so a stream
//! converted block by block produces exactly the same output as the whole
//! stream converted at once.

use crate::{constants::FRAME_LENGTH_MS, error::FormatError};
use rubato::{FastFixedIn, PolynomialDegree, Resampler};

/// Resampler state for a single stream.
///
/// Starts out empty and is bound to the first (rate, channels) pair it is
/// used with. Never share one between streams.
#[derive(Default)]
pub struct ConversionState {
    resampler: Option<StreamResampler>,
}

impl ConversionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether any block has been resampled with this state yet.
    pub fn is_primed(&self) -> bool {
        self.resampler.is_some()
    }

    /// Resample interleaved 16-bit samples from `in_rate` to `out_rate`.
    pub(crate) fn resample(
        &mut self,
        samples: &[i16],
        in_rate: u32,
        out_rate: u32,
        channels: u16,
    ) -> Result<Vec<i16>, FormatError> {
        let resampler = match self.resampler {
            Some(ref mut resampler) => resampler,
            None => self
                .resampler
                .insert(StreamResampler::new(in_rate, out_rate, channels)?),
        };

        if resampler.in_rate != in_rate || resampler.channels != channels {
            return Err(FormatError::ResamplerMismatch {
                expected_rate: resampler.in_rate,
                expected_channels: resampler.channels,
                rate: in_rate,
                channels,
            });
        }

        resampler.process(samples)
    }

    /// Flush whatever the resampler still holds at the end of the stream.
    pub(crate) fn finish(&mut self) -> Result<Vec<i16>, FormatError> {
        match self.resampler.as_mut() {
            Some(resampler) => resampler.finish(),
            None => Ok(Vec::new()),
        }
    }
}

struct StreamResampler {
    in_rate: u32,
    channels: u16,
    ratio: f64,
    inner: FastFixedIn<f64>,

    /// Deinterleaved input that does not make up a whole chunk yet
    pending: Vec<Vec<f64>>,

    /// Interleaved output running ahead of the input seen so far
    ready: Vec<i16>,

    /// Leading output frames still to drop, the resampler's own delay
    skip: usize,

    /// How many frames the first chunk's output came up short. The frame
    /// source fills that gap with silence, so the tail is shortened by the
    /// same amount to keep the stream's length.
    lag: Option<usize>,

    frames_in: usize,
    frames_out: usize,
}

impl StreamResampler {
    fn new(in_rate: u32, out_rate: u32, channels: u16) -> Result<Self, FormatError> {
        let ratio = out_rate as f64 / in_rate as f64;
        let chunk_size = (in_rate as usize * FRAME_LENGTH_MS as usize / 1000).max(1);

        let inner = FastFixedIn::<f64>::new(
            ratio,
            1.0,
            PolynomialDegree::Linear,
            chunk_size,
            channels as usize,
        )
        .map_err(|source| FormatError::ResamplerSetup {
            rate: in_rate,
            channels,
            source,
        })?;

        debug!("Resampling {in_rate}Hz -> {out_rate}Hz in chunks of {chunk_size} frames");

        Ok(Self {
            in_rate,
            channels,
            ratio,
            skip: inner.output_delay(),
            inner,
            pending: vec![Vec::with_capacity(chunk_size); channels as usize],
            ready: Vec::new(),
            lag: None,
            frames_in: 0,
            frames_out: 0,
        })
    }

    fn process(&mut self, samples: &[i16]) -> Result<Vec<i16>, FormatError> {
        let channels = self.channels as usize;
        for frame in samples.chunks_exact(channels) {
            for (pending, &sample) in self.pending.iter_mut().zip(frame) {
                pending.push(sample as f64 / 32768.0);
            }
        }
        self.frames_in += samples.len() / channels;

        while self.pending_frames() >= self.inner.input_frames_next() {
            let needed = self.inner.input_frames_next();
            let chunk: Vec<Vec<f64>> = self
                .pending
                .iter_mut()
                .map(|pending| pending.drain(..needed).collect())
                .collect();

            let resampled = self.inner.process(&chunk, None)?;
            self.queue(&resampled);

            if self.lag.is_none() {
                let expected = (needed as f64 * self.ratio).round() as usize;
                self.lag = Some(expected.saturating_sub(self.ready_frames()));
            }
        }

        Ok(self.take(self.target()))
    }

    fn finish(&mut self) -> Result<Vec<i16>, FormatError> {
        let target = self.target();

        if self.pending_frames() > 0 {
            let resampled = self
                .inner
                .process_partial(Some(self.pending.as_slice()), None)?;
            self.pending.iter_mut().for_each(Vec::clear);
            self.queue(&resampled);
        }

        // Push silence through until the delayed tail has come out
        while self.frames_out + self.ready_frames() < target {
            let resampled = self.inner.process_partial(None::<&[Vec<f64>]>, None)?;
            if resampled.first().map_or(true, Vec::is_empty) {
                break;
            }
            self.queue(&resampled);
        }

        let out = self.take(target);
        self.ready.clear();

        Ok(out)
    }

    /// Output frames owed for the input seen so far.
    fn target(&self) -> usize {
        let total = (self.frames_in as f64 * self.ratio).round() as usize;
        total.saturating_sub(self.lag.unwrap_or(0))
    }

    fn pending_frames(&self) -> usize {
        self.pending.first().map_or(0, Vec::len)
    }

    fn ready_frames(&self) -> usize {
        self.ready.len() / self.channels as usize
    }

    /// Interleave resampled channels onto the ready queue, dropping the
    /// resampler's delay first.
    fn queue(&mut self, resampled: &[Vec<f64>]) {
        let frames = resampled.first().map_or(0, Vec::len);
        let skipped = self.skip.min(frames);
        self.skip -= skipped;

        for i in skipped..frames {
            for channel in resampled {
                self.ready.push(to_i16(channel[i]));
            }
        }
    }

    /// Hand out queued frames until `target` frames have gone out in total.
    fn take(&mut self, target: usize) -> Vec<i16> {
        let frames = self
            .ready_frames()
            .min(target.saturating_sub(self.frames_out));
        self.frames_out += frames;

        self.ready.drain(..frames * self.channels as usize).collect()
    }
}

fn to_i16(sample: f64) -> i16 {
    (sample * 32768.0).round().clamp(i16::MIN as f64, i16::MAX as f64) as i16
}
