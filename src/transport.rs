//! Seams to the external voice transport.
//!
//! The core never talks to Discord directly. A [`VoiceGateway`] connects to a
//! voice channel and hands back a [`VoiceLink`], which the transport then
//! drives by pulling frames from a [`FrameFeed`] once per 20ms tick.

use crate::session::FrameFeed;
use anyhow::Result;
use async_trait::async_trait;

pub type GuildId = u64;
pub type ChannelId = u64;

#[async_trait]
pub trait VoiceGateway: Send + Sync {
    /// Join `channel_id` in `guild_id`.
    async fn connect(&self, guild_id: GuildId, channel_id: ChannelId) -> Result<Box<dyn VoiceLink>>;
}

/// An established voice connection for one guild.
#[async_trait]
pub trait VoiceLink: Send + Sync {
    fn channel_id(&self) -> ChannelId;

    /// Start pulling frames from `feed`, replacing whatever was playing.
    async fn play(&self, feed: FrameFeed) -> Result<()>;

    /// Stop pulling frames and drop any queued audio.
    async fn halt(&self);

    async fn disconnect(&self) -> Result<()>;
}
