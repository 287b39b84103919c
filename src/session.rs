//! Playback state for a single guild.

use crate::{
    error::PlaybackError,
    sources::{wav::AudioFrameSource, Frame, StreamOpener},
    transport::{ChannelId, GuildId, VoiceGateway, VoiceLink},
};
use std::{
    path::{Path, PathBuf},
    sync::{Arc, Mutex, MutexGuard},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    /// Connected, nothing attached
    Idle,

    /// Connected, a stream is attached and being pulled by the transport
    Playing,
}

/// Pull handle given to the transport.
///
/// Holds the currently attached source. The transport's audio thread calls
/// [`FrameFeed::next_frame`] once per tick, while the session can detach the
/// source at any time with [`FrameFeed::halt`]. The lock ensures the stream
/// is never read by two callers at once.
#[derive(Clone)]
pub struct FrameFeed {
    guild_id: GuildId,
    slot: Arc<Mutex<Option<AudioFrameSource>>>,
}

impl FrameFeed {
    pub fn new(guild_id: GuildId, source: AudioFrameSource) -> Self {
        Self {
            guild_id,
            slot: Arc::new(Mutex::new(Some(source))),
        }
    }

    /// Next frame for the transport, or `None` once nothing is attached.
    ///
    /// End of stream and read errors detach and release the source.
    pub fn next_frame(&self) -> Option<Frame> {
        let mut slot = self.lock_slot();
        let source = slot.as_mut()?;

        match source.next_frame() {
            Ok(Some(frame)) => Some(frame),
            Ok(None) => {
                info!("Guild {}: end of stream", self.guild_id);
                *slot = None;
                None
            }
            Err(e) => {
                error!("Guild {}: playback aborted: {e}", self.guild_id);
                source.release();
                *slot = None;
                None
            }
        }
    }

    /// Detach and release the source immediately. Returns whether one was attached.
    pub fn halt(&self) -> bool {
        match self.lock_slot().take() {
            Some(mut source) => {
                source.release();
                true
            }
            None => false,
        }
    }

    pub fn is_active(&self) -> bool {
        self.lock_slot().is_some()
    }

    /// A panic on the audio thread must not wedge stop/start, so poisoning is ignored.
    fn lock_slot(&self) -> MutexGuard<'_, Option<AudioFrameSource>> {
        match self.slot.lock() {
            Ok(l) => l,
            Err(e) => e.into_inner(),
        }
    }
}

pub struct PlaybackSession {
    guild_id: GuildId,
    link: Box<dyn VoiceLink>,
    feed: Option<FrameFeed>,
    opener: Arc<dyn StreamOpener>,
    default_path: PathBuf,
}

impl PlaybackSession {
    /// Connect to a voice channel, leaving the session Idle.
    pub async fn connect(
        gateway: &dyn VoiceGateway,
        guild_id: GuildId,
        channel_id: ChannelId,
        opener: Arc<dyn StreamOpener>,
        default_path: PathBuf,
    ) -> Result<Self, PlaybackError> {
        info!("Connecting to voice channel {channel_id} in guild {guild_id}");

        let link = gateway
            .connect(guild_id, channel_id)
            .await
            .map_err(PlaybackError::Transport)?;

        Ok(Self::new(guild_id, link, opener, default_path))
    }

    pub fn new(
        guild_id: GuildId,
        link: Box<dyn VoiceLink>,
        opener: Arc<dyn StreamOpener>,
        default_path: PathBuf,
    ) -> Self {
        Self {
            guild_id,
            link,
            feed: None,
            opener,
            default_path,
        }
    }

    pub fn guild_id(&self) -> GuildId {
        self.guild_id
    }

    pub fn channel_id(&self) -> ChannelId {
        self.link.channel_id()
    }

    pub fn state(&self) -> SessionState {
        match &self.feed {
            Some(feed) if feed.is_active() => SessionState::Playing,
            _ => SessionState::Idle,
        }
    }

    pub fn is_playing(&self) -> bool {
        self.state() == SessionState::Playing
    }

    /// Play `path`, or the default asset when `None`.
    ///
    /// Anything currently playing is halted first, without draining. If the
    /// new stream can't be opened the session is left Idle.
    pub async fn start(&mut self, path: Option<&Path>) -> Result<(), PlaybackError> {
        self.halt().await;

        let path = path.unwrap_or(self.default_path.as_path()).to_path_buf();
        info!("Guild {}: playing `{}`", self.guild_id, path.display());

        let stream = self.opener.open(&path)?;
        let source = AudioFrameSource::from_reader(stream)?;
        let feed = FrameFeed::new(self.guild_id, source);

        if let Err(e) = self.link.play(feed.clone()).await {
            feed.halt();
            return Err(PlaybackError::Transport(e));
        }

        self.feed = Some(feed);

        Ok(())
    }

    /// Detach the current stream, if any. Returns whether something was playing.
    pub async fn halt(&mut self) -> bool {
        let Some(feed) = self.feed.take() else {
            return false;
        };

        let was_playing = feed.halt();
        if was_playing {
            info!("Guild {}: halting current stream", self.guild_id);
            self.link.halt().await;
        }

        was_playing
    }

    /// Halt playback and disconnect from the voice channel.
    pub async fn stop(mut self) -> Result<(), PlaybackError> {
        self.halt().await;

        info!(
            "Disconnecting from voice channel {} in guild {}",
            self.link.channel_id(),
            self.guild_id
        );

        self.link
            .disconnect()
            .await
            .map_err(PlaybackError::Transport)
    }
}

impl Drop for PlaybackSession {
    fn drop(&mut self) {
        if let Some(feed) = self.feed.take() {
            feed.halt();
        }
    }
}
