//! Messages the player posts on its own, outside any command reply.

use chrono::{DateTime, Utc};
use poise::serenity_prelude as serenity;
use serenity::all::{CreateEmbed, CreateMessage};
use serenity::async_trait;
use serenity::http::Http;
use serenity::model::id::{ChannelId, GuildId};
use std::sync::Arc;
use tracing::warn;

use super::embedded_messages;
use super::music_manager::MusicError;
use super::music_player::TeardownReason;
use crate::commands::music::audio_sources::track_metadata::{RenewedTrack, TrackMetadata};

/// Player flags worth mentioning in a now-playing announcement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NowPlayingFlags {
    pub looping: bool,
    pub nightcore: bool,
}

/// Where the player reports progress and failures.
#[async_trait]
pub trait PlayerNotifier: Send + Sync {
    async fn now_playing(&self, track: &TrackMetadata, renewed: &RenewedTrack, flags: NowPlayingFlags);

    /// The queue ran dry; the player will leave at `disconnect_at` unless
    /// something new is queued.
    async fn queue_empty(&self, disconnect_at: DateTime<Utc>);

    async fn track_failed(&self, track: &TrackMetadata, error: &MusicError);

    /// The player tore itself down for a reason other than `/stop`.
    async fn player_closed(&self, reason: TeardownReason);
}

/// Posts embeds to the text channel the player was created from.
pub struct TextChannelNotifier {
    http: Arc<Http>,
    guild_id: GuildId,
    channel_id: ChannelId,
}

impl TextChannelNotifier {
    pub fn new(http: Arc<Http>, guild_id: GuildId, channel_id: ChannelId) -> Self {
        Self {
            http,
            guild_id,
            channel_id,
        }
    }

    async fn post(&self, embed: CreateEmbed) {
        let message = CreateMessage::new().embed(embed);

        if let Err(e) = self.channel_id.send_message(&*self.http, message).await {
            warn!(
                "Failed to post player message in channel {} for guild {}: {}",
                self.channel_id, self.guild_id, e
            );
        }
    }
}

#[async_trait]
impl PlayerNotifier for TextChannelNotifier {
    async fn now_playing(&self, track: &TrackMetadata, renewed: &RenewedTrack, flags: NowPlayingFlags) {
        self.post(embedded_messages::now_playing(track, renewed, flags))
            .await;
    }

    async fn queue_empty(&self, disconnect_at: DateTime<Utc>) {
        self.post(embedded_messages::queue_drained(disconnect_at))
            .await;
    }

    async fn track_failed(&self, track: &TrackMetadata, error: &MusicError) {
        self.post(embedded_messages::track_failed(track, error))
            .await;
    }

    async fn player_closed(&self, reason: TeardownReason) {
        if let Some(embed) = embedded_messages::player_closed(reason) {
            self.post(embed).await;
        }
    }
}
