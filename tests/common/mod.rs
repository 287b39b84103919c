//! Test infrastructure for wave-bot integration tests.
//!
//! Provides an in-memory voice transport and stream opener that record
//! everything they are asked to do, plus helpers for building wave fixtures.

#![allow(dead_code)]

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use hound::{SampleFormat, WavSpec, WavWriter};
use std::{
    collections::{HashMap, HashSet},
    io::{self, Cursor, Read},
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};
use tokio::sync::Notify;

pub use wave_bot::constants::{FRAME_SIZE, SAMPLES_PER_FRAME};
pub use wave_bot::error::{FormatError, PlaybackError};
pub use wave_bot::pool::SessionPool;
pub use wave_bot::session::{FrameFeed, SessionState};
pub use wave_bot::sources::{AudioStream, StreamOpener};
pub use wave_bot::transport::{ChannelId, GuildId, VoiceGateway, VoiceLink};

/// Shared, ordered record of transport and stream events.
#[derive(Clone, Default)]
pub struct EventLog(Arc<Mutex<Vec<String>>>);

impl EventLog {
    pub fn push(&self, event: impl Into<String>) {
        self.0.lock().unwrap().push(event.into());
    }

    pub fn events(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    /// Position of the first occurrence of `event`.
    pub fn position(&self, event: &str) -> Option<usize> {
        self.events().iter().position(|e| e == event)
    }

    pub fn count(&self, event: &str) -> usize {
        self.events().iter().filter(|e| *e == event).count()
    }
}

/// Voice transport stand-in.
///
/// Feeds handed to `play` are kept so tests can pull frames the way the
/// transport's audio thread would.
#[derive(Clone, Default)]
pub struct MockGateway {
    pub log: EventLog,
    feeds: Arc<Mutex<HashMap<GuildId, FrameFeed>>>,
    failing_connects: Arc<Mutex<HashSet<GuildId>>>,
    failing_play: Arc<Mutex<bool>>,
    connect_gate: Arc<Mutex<Option<Arc<Notify>>>>,
    play_gate: Arc<Mutex<Option<Arc<Notify>>>>,
}

impl MockGateway {
    pub fn with_log(log: EventLog) -> Self {
        Self {
            log,
            ..Default::default()
        }
    }

    pub fn fail_connect(&self, guild_id: GuildId) {
        self.failing_connects.lock().unwrap().insert(guild_id);
    }

    pub fn fail_play(&self, fail: bool) {
        *self.failing_play.lock().unwrap() = fail;
    }

    /// Make every following connect wait until the returned handle is notified.
    pub fn gate_connects(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.connect_gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    /// Make every following play wait until the returned handle is notified.
    pub fn gate_plays(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.play_gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    /// Feed most recently handed to the transport for `guild_id`.
    pub fn feed(&self, guild_id: GuildId) -> Option<FrameFeed> {
        self.feeds.lock().unwrap().get(&guild_id).cloned()
    }

    /// Pull every remaining frame from the guild's feed.
    pub fn drain(&self, guild_id: GuildId) -> Vec<Vec<u8>> {
        let Some(feed) = self.feed(guild_id) else {
            return Vec::new();
        };

        let mut frames = Vec::new();
        while let Some(frame) = feed.next_frame() {
            frames.push(frame);
        }
        frames
    }
}

#[async_trait]
impl VoiceGateway for MockGateway {
    async fn connect(&self, guild_id: GuildId, channel_id: ChannelId) -> Result<Box<dyn VoiceLink>> {
        let gate = self.connect_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        if self.failing_connects.lock().unwrap().contains(&guild_id) {
            self.log.push(format!("connect failed {guild_id}"));
            return Err(anyhow!("voice gateway unavailable for guild {guild_id}"));
        }

        self.log.push(format!("connect {guild_id} {channel_id}"));

        Ok(Box::new(MockLink {
            guild_id,
            channel_id,
            gateway: self.clone(),
        }))
    }
}

struct MockLink {
    guild_id: GuildId,
    channel_id: ChannelId,
    gateway: MockGateway,
}

#[async_trait]
impl VoiceLink for MockLink {
    fn channel_id(&self) -> ChannelId {
        self.channel_id
    }

    async fn play(&self, feed: FrameFeed) -> Result<()> {
        let gate = self.gateway.play_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        if *self.gateway.failing_play.lock().unwrap() {
            self.gateway.log.push(format!("play failed {}", self.guild_id));
            return Err(anyhow!("transport refused the track"));
        }

        self.gateway.log.push(format!("play {}", self.guild_id));
        self.gateway
            .feeds
            .lock()
            .unwrap()
            .insert(self.guild_id, feed);
        Ok(())
    }

    async fn halt(&self) {
        self.gateway.log.push(format!("halt {}", self.guild_id));
    }

    async fn disconnect(&self) -> Result<()> {
        self.gateway.log.push(format!("disconnect {}", self.guild_id));
        Ok(())
    }
}

/// In-memory file system that logs every open and close.
#[derive(Clone, Default)]
pub struct TrackingOpener {
    pub log: EventLog,
    files: Arc<Mutex<HashMap<PathBuf, FileContents>>>,
}

#[derive(Clone)]
enum FileContents {
    Bytes(Vec<u8>),

    /// Fails with an I/O error once `after` bytes have been read
    Broken { bytes: Vec<u8>, after: usize },
}

impl TrackingOpener {
    pub fn with_log(log: EventLog) -> Self {
        Self {
            log,
            ..Default::default()
        }
    }

    pub fn add_file(&self, path: impl Into<PathBuf>, bytes: Vec<u8>) {
        self.files
            .lock()
            .unwrap()
            .insert(path.into(), FileContents::Bytes(bytes));
    }

    /// File whose reads start failing after `after` bytes.
    pub fn add_broken_file(&self, path: impl Into<PathBuf>, bytes: Vec<u8>, after: usize) {
        self.files
            .lock()
            .unwrap()
            .insert(path.into(), FileContents::Broken { bytes, after });
    }

    /// Number of streams opened but not yet closed.
    pub fn open_count(&self) -> usize {
        let events = self.log.events();
        let opened = events.iter().filter(|e| e.starts_with("open ")).count();
        let closed = events.iter().filter(|e| e.starts_with("close ")).count();
        opened - closed
    }
}

impl StreamOpener for TrackingOpener {
    fn open(&self, path: &Path) -> Result<AudioStream, PlaybackError> {
        let contents = self.files.lock().unwrap().get(path).cloned();
        let Some(contents) = contents else {
            return Err(PlaybackError::StreamOpen {
                path: path.to_path_buf(),
                source: io::ErrorKind::NotFound.into(),
            });
        };

        let name = path.display().to_string();
        self.log.push(format!("open {name}"));

        let (bytes, fail_after) = match contents {
            FileContents::Bytes(bytes) => (bytes, None),
            FileContents::Broken { bytes, after } => (bytes, Some(after)),
        };

        Ok(Box::new(TrackedStream {
            name,
            inner: Cursor::new(bytes),
            fail_after,
            log: self.log.clone(),
        }))
    }
}

struct TrackedStream {
    name: String,
    inner: Cursor<Vec<u8>>,
    fail_after: Option<usize>,
    log: EventLog,
}

impl Read for TrackedStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if let Some(after) = self.fail_after {
            let pos = self.inner.position() as usize;
            if pos >= after {
                return Err(io::Error::other("device went away"));
            }
            let len = buf.len().min(after - pos);
            return self.inner.read(&mut buf[..len]);
        }

        self.inner.read(buf)
    }
}

impl Drop for TrackedStream {
    fn drop(&mut self) {
        self.log.push(format!("close {}", self.name));
    }
}

/// Gateway and opener sharing one event log, wired into a pool.
pub struct TestHarness {
    pub log: EventLog,
    pub gateway: MockGateway,
    pub opener: TrackingOpener,
    pub pool: Arc<SessionPool>,
}

pub const DEFAULT_ASSET: &str = "audio/default.wav";

impl TestHarness {
    pub fn new() -> Self {
        let log = EventLog::default();
        let gateway = MockGateway::with_log(log.clone());
        let opener = TrackingOpener::with_log(log.clone());
        let pool = Arc::new(SessionPool::with_opener(
            Arc::new(gateway.clone()),
            Arc::new(opener.clone()),
            PathBuf::from(DEFAULT_ASSET),
        ));

        opener.add_file(DEFAULT_ASSET, tone_wav(1, 22050, 16, 440.0, 0.5));

        Self {
            log,
            gateway,
            opener,
            pool,
        }
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

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

/// Sine tone at a quarter of full scale, same signal on every channel.
pub fn tone_wav(channels: u16, sample_rate: u32, bits: u16, freq: f64, secs: f64) -> Vec<u8> {
    let amplitude = (1i64 << (bits - 1)) as f64 / 4.0;
    let frames = (sample_rate as f64 * secs) as usize;

    let samples: Vec<i32> = (0..frames)
        .flat_map(|n| {
            let t = n as f64 / sample_rate as f64;
            let value = ((t * freq * std::f64::consts::TAU).sin() * amplitude) as i32;
            std::iter::repeat(value).take(channels as usize)
        })
        .collect();

    wav_bytes(channels, sample_rate, bits, &samples)
}

/// Decode a canonical frame into 16-bit samples.
pub fn samples_of(frame: &[u8]) -> Vec<i16> {
    frame
        .chunks_exact(2)
        .map(|b| i16::from_le_bytes([b[0], b[1]]))
        .collect()
}

/// Left channel of a run of canonical frames.
pub fn left_channel(frames: &[Vec<u8>]) -> Vec<i16> {
    frames
        .iter()
        .flat_map(|f| samples_of(f))
        .step_by(2)
        .collect()
}

/// Write `bytes` to a new file in `dir`.
pub fn write_fixture(dir: &tempfile::TempDir, name: &str, bytes: &[u8]) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, bytes).unwrap();
    path
}
