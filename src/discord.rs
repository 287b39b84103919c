//! Discord integration for the wave bot.
//!
//! This module provides:
//! - A songbird-backed implementation of the voice transport seam
//! - A pull-based songbird input reading canonical frames from a `FrameFeed`
//! - The text command handler (`wave!play [path]`, `wave!stop`)

use crate::{
    command::{self, Command, JOIN_VOICE_FIRST},
    config::Config,
    constants::{CHANNELS, SAMPLE_WIDTH, SAMPLING_RATE},
    pool::SessionPool,
    session::FrameFeed,
    transport::{ChannelId, GuildId, VoiceGateway, VoiceLink},
};
use anyhow::{Context as _, Result};
use async_trait::async_trait;
use byteorder::{ByteOrder, LittleEndian};
use poise::serenity_prelude as serenity;
use songbird::{
    input::{Input, RawAdapter},
    tracks::Track,
    Call, SerenityInit, Songbird,
};
use std::{
    io::{Read, Seek, SeekFrom},
    sync::Arc,
};
use symphonia::core::io::MediaSource;
use tokio::sync::Mutex;

/// Discord bot state shared across handlers
struct BotState {
    pool: Arc<SessionPool>,
    command_prefix: String,
}

type Data = Arc<BotState>;

// ============================================================================
// Voice Audio Source
// ============================================================================

/// Pull-based audio source reading frames from a `FrameFeed` on demand.
/// Songbird's audio thread calls Read::read(), which pulls the next 20ms
/// frame once the previous one has been consumed.
struct FeedAudioSource {
    feed: FrameFeed,
    /// Current frame as f32 bytes
    pending: Vec<u8>,
    position: usize,
    finished: bool,
}

impl FeedAudioSource {
    fn new(feed: FrameFeed) -> Self {
        Self {
            feed,
            pending: Vec::new(),
            position: 0,
            finished: false,
        }
    }
}

/// Convert a canonical i16 frame to f32 bytes for songbird's raw adapter
fn frame_to_f32_bytes(frame: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(frame.len() * 2);
    for sample in frame.chunks_exact(SAMPLE_WIDTH) {
        let sample = LittleEndian::read_i16(sample) as f32 / 32768.0;
        out.extend_from_slice(&sample.to_le_bytes());
    }
    out
}

impl Read for FeedAudioSource {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        if self.position >= self.pending.len() {
            if self.finished {
                return Ok(0);
            }

            match self.feed.next_frame() {
                Some(frame) => {
                    self.pending = frame_to_f32_bytes(&frame);
                    self.position = 0;
                }
                None => {
                    // End of stream, songbird ends the track on EOF
                    self.finished = true;
                    return Ok(0);
                }
            }
        }

        let n = buf.len().min(self.pending.len() - self.position);
        buf[..n].copy_from_slice(&self.pending[self.position..self.position + n]);
        self.position += n;

        Ok(n)
    }
}

impl Seek for FeedAudioSource {
    fn seek(&mut self, _pos: SeekFrom) -> std::io::Result<u64> {
        // Forward-only stream
        Ok(0)
    }
}

impl MediaSource for FeedAudioSource {
    fn is_seekable(&self) -> bool {
        false
    }

    fn byte_len(&self) -> Option<u64> {
        None
    }
}

/// Create a songbird Input pulling from the feed
fn create_voice_input(feed: FrameFeed) -> Input {
    let source = FeedAudioSource::new(feed);
    let adapter = RawAdapter::new(source, SAMPLING_RATE, CHANNELS as u32);

    adapter.into()
}

// ============================================================================
// Voice transport
// ============================================================================

pub struct SongbirdGateway {
    manager: Arc<Songbird>,
}

impl SongbirdGateway {
    pub fn new(manager: Arc<Songbird>) -> Self {
        Self { manager }
    }
}

#[async_trait]
impl VoiceGateway for SongbirdGateway {
    async fn connect(&self, guild_id: GuildId, channel_id: ChannelId) -> Result<Box<dyn VoiceLink>> {
        let call = self
            .manager
            .join(
                serenity::GuildId::new(guild_id),
                serenity::ChannelId::new(channel_id),
            )
            .await
            .with_context(|| format!("Failed to join voice channel {channel_id}"))?;

        Ok(Box::new(SongbirdLink {
            manager: self.manager.clone(),
            guild_id,
            channel_id,
            call,
        }))
    }
}

struct SongbirdLink {
    manager: Arc<Songbird>,
    guild_id: GuildId,
    channel_id: ChannelId,
    call: Arc<Mutex<Call>>,
}

#[async_trait]
impl VoiceLink for SongbirdLink {
    fn channel_id(&self) -> ChannelId {
        self.channel_id
    }

    async fn play(&self, feed: FrameFeed) -> Result<()> {
        let mut call = self.call.lock().await;
        let track = Track::new(create_voice_input(feed));
        call.play_only(track);

        Ok(())
    }

    async fn halt(&self) {
        self.call.lock().await.stop();
    }

    async fn disconnect(&self) -> Result<()> {
        self.manager
            .remove(serenity::GuildId::new(self.guild_id))
            .await
            .with_context(|| format!("Failed to leave voice channel {}", self.channel_id))
    }
}

// ============================================================================
// Bot
// ============================================================================

/// Run the Discord bot until ctrl-c, then disconnect every session.
pub async fn run(config: &Config, token: &str) -> Result<()> {
    let manager = Songbird::serenity();
    let gateway = Arc::new(SongbirdGateway::new(manager.clone()));
    let pool = Arc::new(SessionPool::new(gateway, &config.playback));

    let state = Arc::new(BotState {
        pool: pool.clone(),
        command_prefix: config.commands.command_prefix.clone(),
    });

    let framework = poise::Framework::builder()
        .options(poise::FrameworkOptions {
            event_handler: |ctx, event, _framework, data| Box::pin(event_handler(ctx, event, data)),
            ..Default::default()
        })
        .setup(move |_ctx, ready, _framework| {
            Box::pin(async move {
                info!("Logged in as {}", ready.user.name);
                Ok(state)
            })
        })
        .build();

    let intents = serenity::GatewayIntents::GUILDS
        | serenity::GatewayIntents::GUILD_MESSAGES
        | serenity::GatewayIntents::MESSAGE_CONTENT
        | serenity::GatewayIntents::GUILD_VOICE_STATES;

    let mut client = serenity::ClientBuilder::new(token, intents)
        .framework(framework)
        .register_songbird_with(manager)
        .await?;

    tokio::select! {
        result = client.start() => {
            if let Err(e) = result {
                error!("Discord client error: {:?}", e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutting down");
        }
    }

    pool.shutdown().await;

    Ok(())
}

/// Handle Discord events (text commands)
async fn event_handler(
    ctx: &serenity::Context,
    event: &serenity::FullEvent,
    data: &Data,
) -> Result<(), anyhow::Error> {
    let serenity::FullEvent::Message { new_message } = event else {
        return Ok(());
    };

    // Ignore bots and DMs
    if new_message.author.bot {
        return Ok(());
    }
    let Some(guild_id) = new_message.guild_id else {
        return Ok(());
    };

    let Some(command) = command::parse(&data.command_prefix, &new_message.content) else {
        return Ok(());
    };

    info!(
        "Command from {} in guild {}: {}",
        new_message.author.name, guild_id, new_message.content
    );

    match command {
        Command::Play { ref path } => {
            let voice_channel = ctx.cache.guild(guild_id).and_then(|guild| {
                guild
                    .voice_states
                    .get(&new_message.author.id)
                    .and_then(|state| state.channel_id)
            });

            let Some(channel_id) = voice_channel else {
                new_message.reply(ctx, JOIN_VOICE_FIRST).await?;
                return Ok(());
            };

            new_message.reply(ctx, command.ack()).await?;

            let result = data
                .pool
                .play(guild_id.get(), channel_id.get(), path.as_deref())
                .await;

            if let Err(e) = result {
                error!("Failed to play in guild {guild_id}: {e}");
                new_message
                    .reply(ctx, format!("Playback failed: {e}"))
                    .await?;
            }
        }
        Command::Stop => {
            new_message.reply(ctx, command.ack()).await?;

            if let Err(e) = data.pool.stop(guild_id.get()).await {
                error!("Failed to stop in guild {guild_id}: {e}");
            }
        }
    }

    Ok(())
}
