//! Audio sources feeding the voice transport.
//!
//! A source exclusively owns an opened byte stream and produces canonical
//! frames of `FRAME_SIZE` bytes on demand, one per 20ms transport tick.

pub mod wav;

use crate::error::PlaybackError;
use std::{
    fs::File,
    io::{BufReader, Read},
    path::Path,
};

/// One 20ms block of canonical PCM.
pub type Frame = Vec<u8>;

/// Byte stream owned by a frame source. Dropping it closes the underlying handle.
pub type AudioStream = Box<dyn Read + Send>;

/// Opens the stream behind a requested path.
pub trait StreamOpener: Send + Sync {
    fn open(&self, path: &Path) -> Result<AudioStream, PlaybackError>;
}

/// Opens files from the local filesystem.
#[derive(Clone, Copy, Debug, Default)]
pub struct FileOpener;

impl StreamOpener for FileOpener {
    fn open(&self, path: &Path) -> Result<AudioStream, PlaybackError> {
        let file = File::open(path).map_err(|source| PlaybackError::StreamOpen {
            path: path.to_path_buf(),
            source,
        })?;

        Ok(Box::new(BufReader::new(file)))
    }
}
