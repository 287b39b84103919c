//! Canonical audio parameters expected by the voice transport.
//!
//! These must match what the transport (songbird / Opus encoder) consumes:
//! one frame every 20ms of 16-bit signed, 48kHz, interleaved stereo PCM.

/// Duration of a single frame in milliseconds.
pub const FRAME_LENGTH_MS: u32 = 20;

/// Output sample rate (Discord native format).
pub const SAMPLING_RATE: u32 = 48000;

/// Stereo output.
pub const CHANNELS: u16 = 2;

/// Bytes per output sample (16-bit signed).
pub const SAMPLE_WIDTH: usize = 2;

/// Samples per channel in one frame (960 at 48kHz).
pub const SAMPLES_PER_FRAME: usize = (SAMPLING_RATE * FRAME_LENGTH_MS / 1000) as usize;

/// Size of one canonical frame in bytes.
pub const FRAME_SIZE: usize = SAMPLES_PER_FRAME * SAMPLE_WIDTH * CHANNELS as usize;

/// Asset played when no file is given.
pub const DEFAULT_AUDIO_PATH: &str = "audio/musicbox.wav";

/// Prefix for text commands.
pub const DEFAULT_COMMAND_PREFIX: &str = "wave!";
