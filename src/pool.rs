//! Guild id → playback session mapping.
//!
//! Every guild gets its own slot with an async lock, so play/stop requests
//! for one guild are serialized without blocking any other guild. The map
//! itself is only locked for short lookups and never across an await.

use crate::{
    config::PlaybackConfig,
    error::PlaybackError,
    session::{PlaybackSession, SessionState},
    sources::{FileOpener, StreamOpener},
    transport::{ChannelId, GuildId, VoiceGateway},
};
use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::{Arc, Mutex as StdMutex, MutexGuard},
};
use tokio::sync::Mutex;

/// `None` while a connect is in flight or after it failed.
type Slot = Arc<Mutex<Option<PlaybackSession>>>;

pub struct SessionPool {
    gateway: Arc<dyn VoiceGateway>,
    opener: Arc<dyn StreamOpener>,
    default_path: PathBuf,
    sessions: StdMutex<HashMap<GuildId, Slot>>,
}

impl SessionPool {
    /// Pool that plays files from disk.
    pub fn new(gateway: Arc<dyn VoiceGateway>, config: &PlaybackConfig) -> Self {
        Self::with_opener(
            gateway,
            Arc::new(FileOpener),
            config.default_audio_path.clone(),
        )
    }

    pub fn with_opener(
        gateway: Arc<dyn VoiceGateway>,
        opener: Arc<dyn StreamOpener>,
        default_path: PathBuf,
    ) -> Self {
        Self {
            gateway,
            opener,
            default_path,
            sessions: StdMutex::new(HashMap::new()),
        }
    }

    /// Play `path` (or the default asset) in `guild_id`, connecting to
    /// `channel_id` first if the guild has no session yet.
    ///
    /// A guild that is already connected stays in its current channel.
    pub async fn play(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
        path: Option<&Path>,
    ) -> Result<(), PlaybackError> {
        loop {
            let slot = self.slot(guild_id);
            let mut entry = slot.lock().await;

            // A concurrent stop removed this slot while we were waiting
            if !self.is_current(guild_id, &slot) {
                continue;
            }

            // Started in place, a cancelled start never moves the session
            // out of its slot
            if let Some(session) = entry.as_mut() {
                return session.start(path).await;
            }

            let connected = PlaybackSession::connect(
                self.gateway.as_ref(),
                guild_id,
                channel_id,
                self.opener.clone(),
                self.default_path.clone(),
            )
            .await;

            let session = match connected {
                Ok(session) => entry.insert(session),
                Err(e) => {
                    error!("Failed to connect to voice channel {channel_id}: {e}");
                    self.remove_if_current(guild_id, &slot);
                    return Err(e);
                }
            };

            return session.start(path).await;
        }
    }

    /// Halt playback and disconnect `guild_id`. No-op for unknown guilds.
    ///
    /// The entry is removed even if disconnecting fails.
    pub async fn stop(&self, guild_id: GuildId) -> Result<(), PlaybackError> {
        let Some(slot) = self.lookup(guild_id) else {
            debug!("Stop requested for guild {guild_id} without a session");
            return Ok(());
        };

        let mut entry = slot.lock().await;
        let session = entry.take();
        self.remove_if_current(guild_id, &slot);

        match session {
            Some(session) => session.stop().await,
            None => Ok(()),
        }
    }

    /// Stop every session.
    pub async fn shutdown(&self) {
        let guild_ids: Vec<GuildId> = self.lock_sessions().keys().copied().collect();

        for guild_id in guild_ids {
            if let Err(e) = self.stop(guild_id).await {
                warn!("Error while stopping guild {guild_id} during shutdown: {e}");
            }
        }
    }

    /// Current state of the guild's session, `None` when disconnected.
    pub async fn state(&self, guild_id: GuildId) -> Option<SessionState> {
        let slot = self.lookup(guild_id)?;
        let entry = slot.lock().await;
        entry.as_ref().map(PlaybackSession::state)
    }

    pub fn contains(&self, guild_id: GuildId) -> bool {
        self.lock_sessions().contains_key(&guild_id)
    }

    pub fn len(&self) -> usize {
        self.lock_sessions().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock_sessions().is_empty()
    }

    fn slot(&self, guild_id: GuildId) -> Slot {
        self.lock_sessions().entry(guild_id).or_default().clone()
    }

    fn lookup(&self, guild_id: GuildId) -> Option<Slot> {
        self.lock_sessions().get(&guild_id).cloned()
    }

    fn is_current(&self, guild_id: GuildId, slot: &Slot) -> bool {
        self.lock_sessions()
            .get(&guild_id)
            .is_some_and(|current| Arc::ptr_eq(current, slot))
    }

    fn remove_if_current(&self, guild_id: GuildId, slot: &Slot) {
        let mut sessions = self.lock_sessions();
        if sessions
            .get(&guild_id)
            .is_some_and(|current| Arc::ptr_eq(current, slot))
        {
            sessions.remove(&guild_id);
        }
    }

    fn lock_sessions(&self) -> MutexGuard<'_, HashMap<GuildId, Slot>> {
        match self.sessions.lock() {
            Ok(l) => l,
            Err(e) => e.into_inner(),
        }
    }
}
