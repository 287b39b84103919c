//! Text commands understood by the bot.

use std::path::PathBuf;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    /// Play a file, or the default asset when no path was given
    Play { path: Option<PathBuf> },

    /// Halt playback and leave the voice channel
    Stop,
}

impl Command {
    /// Reply sent back to the channel before the command runs.
    pub fn ack(&self) -> &'static str {
        match self {
            Command::Play { .. } => "Playing.",
            Command::Stop => "Stopping.",
        }
    }
}

/// Reply when `play` is used outside of a voice channel.
pub const JOIN_VOICE_FIRST: &str = "Join a voice channel first.";

/// Parse a chat message.
///
/// Anything starting with `<prefix>play` is a play command, with the path
/// being everything after the first space. `<prefix>stop` must match exactly.
pub fn parse(prefix: &str, text: &str) -> Option<Command> {
    let rest = text.strip_prefix(prefix)?;

    if rest.starts_with("play") {
        let path = text
            .split_once(' ')
            .map(|(_, path)| path.trim())
            .filter(|path| !path.is_empty())
            .map(PathBuf::from);

        return Some(Command::Play { path });
    }

    (rest == "stop").then_some(Command::Stop)
}
