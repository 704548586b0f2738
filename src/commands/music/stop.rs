use super::*;
use crate::commands::music::utils::{
    music_manager::MusicManager, music_player::TeardownReason, permissions::may_stop,
};
use tracing::info;

/// Stop the player, clear the queue and leave the voice channel
#[poise::command(
    slash_command,
    prefix_command,
    guild_only,
    category = "Music",
    aliases("leave")
)]
pub async fn stop(ctx: Context<'_>) -> CommandResult {
    let guild_id = ctx.guild_id().ok_or_else(guild_only_error)?;

    let Some(player) = ctx.data().players.get(guild_id) else {
        return reply_error(ctx, MusicError::NoPlayer).await;
    };

    let voice = match MusicManager::voice_context(ctx.serenity_context(), guild_id, ctx.author().id)
    {
        Ok(voice) => voice,
        Err(err) => return reply_error(ctx, err).await,
    };

    if let Err(err) = may_stop(
        &voice.actor,
        voice.actor_channel,
        voice.bot_channel,
        &voice.bot_channel_members,
    ) {
        return reply_error(ctx, err).await;
    }

    if player.shutdown(TeardownReason::Stopped).await {
        info!("{} stopped the player in guild {}", ctx.author().name, guild_id);
    }

    reply(ctx, embedded_messages::stopped()).await
}
