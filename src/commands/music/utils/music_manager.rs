use poise::serenity_prelude as serenity;
use serenity::client::Context;
use serenity::model::id::{ChannelId, GuildId, UserId};
use serenity::model::permissions::Permissions;
use serenity::prelude::Mutex as SerenityMutex;
use songbird::{Call, Songbird};
use std::sync::Arc;
use thiserror::Error;

use super::permissions::VoiceMember;

/// Errors that can occur during music operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MusicError {
    #[error("Not in a guild")]
    NotInGuild,

    #[error("Failed to join voice channel: {0}")]
    JoinError(String),

    #[error("Not connected to a voice channel")]
    NotConnected,

    #[error("Failed to get voice manager")]
    NoVoiceManager,

    #[error("User is not in a voice channel")]
    UserNotInVoiceChannel,

    #[error("You need to be in my current voice channel to use this command")]
    NotInBotChannel,

    #[error("Could not resolve track: {0}")]
    ResolutionError(String),

    #[error("No results found for: {0}")]
    NoResults(String),

    #[error("Voice transport error: {0}")]
    TransportError(String),

    #[error("Nothing is playing right now")]
    NothingPlaying,

    #[error("There is no active player right now")]
    NoPlayer,

    #[error("The queue needs at least {required} tracks to be shuffled (it has {len})")]
    QueueTooShort { len: usize, required: usize },

    #[error("You must have queued the current track or have the Manage Channels permission")]
    PermissionDenied,

    #[error("The player is shutting down")]
    PlayerExiting,
}

/// Coarse classes of failure, deciding how the player and the commands react.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Search or renew failed. The player cools down and moves on.
    Resolution,
    /// The voice connection is unusable. The current attempt is abandoned.
    Transport,
    /// Bad request from the user. Reported, no state change.
    UserInput,
    /// Requester check failed.
    Permission,
}

impl MusicError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            MusicError::ResolutionError(_) => ErrorCategory::Resolution,
            MusicError::JoinError(_)
            | MusicError::NotConnected
            | MusicError::NoVoiceManager
            | MusicError::TransportError(_) => ErrorCategory::Transport,
            MusicError::PermissionDenied => ErrorCategory::Permission,
            MusicError::NotInGuild
            | MusicError::UserNotInVoiceChannel
            | MusicError::NotInBotChannel
            | MusicError::NoResults(_)
            | MusicError::NothingPlaying
            | MusicError::NoPlayer
            | MusicError::QueueTooShort { .. }
            | MusicError::PlayerExiting => ErrorCategory::UserInput,
        }
    }
}

/// Result type for music operations
pub type MusicResult<T> = Result<T, MusicError>;

/// Everything the voice commands need to know about who is where, read from
/// the cache in one go.
#[derive(Debug, Clone)]
pub struct VoiceContext {
    pub actor: VoiceMember,
    pub actor_channel: Option<ChannelId>,
    pub bot_channel: Option<ChannelId>,
    /// Members (bots included) currently in the bot's voice channel.
    pub bot_channel_members: Vec<VoiceMember>,
}

/// Stateless helpers around Songbird and the serenity cache
pub struct MusicManager;

impl MusicManager {
    /// Get the Songbird voice client from the context
    pub async fn get_songbird(ctx: &Context) -> MusicResult<Arc<Songbird>> {
        songbird::get(ctx).await.ok_or(MusicError::NoVoiceManager)
    }

    /// Get the current voice channel call handle
    pub async fn get_call(
        ctx: &Context,
        guild_id: GuildId,
    ) -> MusicResult<Arc<SerenityMutex<Call>>> {
        let songbird = Self::get_songbird(ctx).await?;
        songbird.get(guild_id).ok_or(MusicError::NotConnected)
    }

    /// Whether the bot currently sits in a voice channel of this guild
    pub async fn is_connected(ctx: &Context, guild_id: GuildId) -> bool {
        match Self::get_call(ctx, guild_id).await {
            Ok(call) => call.lock().await.current_channel().is_some(),
            Err(_) => false,
        }
    }

    /// Join a voice channel
    pub async fn join_channel(
        ctx: &Context,
        guild_id: GuildId,
        channel_id: ChannelId,
    ) -> MusicResult<Arc<SerenityMutex<Call>>> {
        let songbird = Self::get_songbird(ctx).await?;

        songbird
            .join(guild_id, channel_id)
            .await
            .map_err(|e| MusicError::JoinError(e.to_string()))
    }

    /// Get the voice channel ID that the user is currently in
    pub fn get_user_voice_channel(
        ctx: &Context,
        guild_id: GuildId,
        user_id: UserId,
    ) -> MusicResult<ChannelId> {
        let guild = ctx.cache.guild(guild_id).ok_or(MusicError::NotInGuild)?;

        guild
            .voice_states
            .get(&user_id)
            .and_then(|state| state.channel_id)
            .ok_or(MusicError::UserNotInVoiceChannel)
    }

    /// Collects the actor's and the bot's voice placement plus the members of
    /// the bot's channel. The cache guard is released before returning.
    pub fn voice_context(
        ctx: &Context,
        guild_id: GuildId,
        actor_id: UserId,
    ) -> MusicResult<VoiceContext> {
        let bot_id = ctx.cache.current_user().id;
        let guild = ctx.cache.guild(guild_id).ok_or(MusicError::NotInGuild)?;

        let channel_of = |user_id: UserId| {
            guild
                .voice_states
                .get(&user_id)
                .and_then(|state| state.channel_id)
        };

        let describe = |user_id: UserId| -> VoiceMember {
            let member = guild.members.get(&user_id).or_else(|| {
                guild
                    .voice_states
                    .get(&user_id)
                    .and_then(|state| state.member.as_ref())
            });

            match member {
                Some(member) => VoiceMember {
                    user_id,
                    is_bot: member.user.bot,
                    can_manage_channels: guild
                        .member_permissions(member)
                        .contains(Permissions::MANAGE_CHANNELS),
                },
                None => VoiceMember {
                    user_id,
                    is_bot: false,
                    can_manage_channels: false,
                },
            }
        };

        let bot_channel = channel_of(bot_id);
        let bot_channel_members = match bot_channel {
            Some(channel_id) => guild
                .voice_states
                .values()
                .filter(|state| state.channel_id == Some(channel_id))
                .map(|state| describe(state.user_id))
                .collect(),
            None => Vec::new(),
        };

        Ok(VoiceContext {
            actor: describe(actor_id),
            actor_channel: channel_of(actor_id),
            bot_channel,
            bot_channel_members,
        })
    }
}
