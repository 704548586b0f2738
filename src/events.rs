use serenity::all::{Ready, VoiceState};
use serenity::async_trait;
use serenity::model::id::GuildId;
use serenity::prelude::*;
use std::sync::Arc;
use tracing::{debug, info};

use crate::commands::music::utils::music_player::TeardownReason;
use crate::commands::music::utils::player_registry::PlayerRegistry;

/// Tears a guild's player down when the bot is disconnected from voice.
pub struct VoiceStateHandler {
    pub players: Arc<PlayerRegistry>,
}

impl VoiceStateHandler {
    pub fn new(players: Arc<PlayerRegistry>) -> Self {
        Self { players }
    }

    /// Returns whether a live player was shut down.
    pub async fn handle_bot_disconnect(&self, guild_id: GuildId) -> bool {
        let Some(player) = self.players.get(guild_id) else {
            return false;
        };

        if player.is_exiting() {
            debug!("Player in guild {} is already shutting down", guild_id);
            return false;
        }

        player.shutdown(TeardownReason::VoiceDisconnected).await
    }
}

#[async_trait]
impl serenity::prelude::EventHandler for VoiceStateHandler {
    async fn ready(&self, _ctx: Context, ready: Ready) {
        info!("{} is connected", ready.user.name);
    }

    async fn voice_state_update(&self, ctx: Context, old: Option<VoiceState>, new: VoiceState) {
        if new.user_id != ctx.cache.current_user().id {
            return;
        }

        let Some(guild_id) = new.guild_id else {
            return;
        };

        match (old.and_then(|state| state.channel_id), new.channel_id) {
            (_, None) => {
                info!("Disconnected from voice in guild {}", guild_id);
                self.handle_bot_disconnect(guild_id).await;
            }
            (Some(before), Some(after)) if before != after => {
                debug!(
                    "Moved from channel {} to {} in guild {}",
                    before, after, guild_id
                );
            }
            _ => {}
        }
    }
}
