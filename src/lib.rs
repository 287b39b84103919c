//! wave-bot library crate
//!
//! Converts PCM wave files into the 48kHz stereo 16-bit frames expected by
//! the voice transport, and manages one playback session per guild.
//! The main binary is in main.rs.

#[macro_use]
extern crate log;

pub mod command;
pub mod config;
pub mod constants;
pub mod convert;
pub mod error;
pub mod pool;
pub mod render;
pub mod resample;
pub mod session;
pub mod sources;
pub mod transport;

#[cfg(feature = "discord")]
pub mod discord;

#[cfg(test)]
mod test_util;
