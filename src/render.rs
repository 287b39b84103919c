//! Offline rendering of a source to a canonical wave file.
//!
//! Runs the same frame pipeline the voice transport pulls from, without a
//! voice connection.

use crate::{
    constants::{CHANNELS, SAMPLE_WIDTH, SAMPLING_RATE},
    convert::SourceFormat,
    sources::{wav::AudioFrameSource, FileOpener, StreamOpener},
};
use anyhow::Result;
use byteorder::{ByteOrder, LittleEndian};
use hound::{SampleFormat, WavSpec, WavWriter};
use std::{
    io::{Seek, Write},
    path::Path,
};

#[derive(Clone, Copy, Debug)]
pub struct RenderSummary {
    pub source: SourceFormat,
    pub frames: usize,
}

pub fn canonical_spec() -> WavSpec {
    WavSpec {
        channels: CHANNELS,
        sample_rate: SAMPLING_RATE,
        bits_per_sample: (SAMPLE_WIDTH * 8) as u16,
        sample_format: SampleFormat::Int,
    }
}

/// Convert `input` and write every frame to `output`.
pub fn render_file(input: &Path, output: &Path) -> Result<RenderSummary> {
    let stream = FileOpener.open(input)?;
    let mut source = AudioFrameSource::from_reader(stream)?;

    let mut writer = WavWriter::create(output, canonical_spec())?;
    let frames = render(&mut source, &mut writer)?;
    writer.finalize()?;

    info!(
        "Rendered {} frames from `{}` to `{}`",
        frames,
        input.display(),
        output.display()
    );

    Ok(RenderSummary {
        source: *source.format(),
        frames,
    })
}

/// Drain `source` into `writer`, returning the number of frames written.
pub fn render<W: Write + Seek>(
    source: &mut AudioFrameSource,
    writer: &mut WavWriter<W>,
) -> Result<usize> {
    let mut frames = 0;

    while let Some(frame) = source.next_frame()? {
        for sample in frame.chunks_exact(SAMPLE_WIDTH) {
            writer.write_sample(LittleEndian::read_i16(sample))?;
        }
        frames += 1;
    }

    Ok(frames)
}
