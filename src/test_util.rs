//! Fixtures shared by the unit tests

use hound::{SampleFormat, WavSpec, WavWriter};
use std::io::{Cursor, Read};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

/// Encode `samples` as an in-memory wave file.
pub fn wav_bytes(channels: u16, sample_rate: u32, bits: u16, samples: &[i32]) -> Vec<u8> {
    let spec = WavSpec {
        channels,
        sample_rate,
        bits_per_sample: bits,
        sample_format: SampleFormat::Int,
    };

    let mut buf = Vec::new();
    {
        let mut writer = WavWriter::new(Cursor::new(&mut buf), spec).unwrap();
        for &sample in samples {
            if bits == 8 {
                writer.write_sample(sample as i8).unwrap();
            } else {
                writer.write_sample(sample).unwrap();
            }
        }
        writer.finalize().unwrap();
    }
    buf
}

/// Reader that flags when it has been dropped.
pub struct TrackedReader {
    inner: Cursor<Vec<u8>>,
    closed: Arc<AtomicBool>,
}

impl TrackedReader {
    pub fn new(bytes: Vec<u8>) -> (Self, Arc<AtomicBool>) {
        let closed = Arc::new(AtomicBool::new(false));
        let reader = Self {
            inner: Cursor::new(bytes),
            closed: closed.clone(),
        };
        (reader, closed)
    }
}

impl Read for TrackedReader {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.inner.read(buf)
    }
}

impl Drop for TrackedReader {
    fn drop(&mut self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}
