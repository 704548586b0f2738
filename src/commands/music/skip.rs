use super::*;
use crate::commands::music::utils::{music_manager::MusicManager, permissions::may_skip};

/// Skip the currently playing song
#[poise::command(
    slash_command,
    prefix_command,
    guild_only,
    category = "Music",
    aliases("s")
)]
pub async fn skip(ctx: Context<'_>) -> CommandResult {
    let guild_id = ctx.guild_id().ok_or_else(guild_only_error)?;

    let player = ctx.data().players.get(guild_id);
    let snapshot = match &player {
        Some(player) => Some(player.snapshot().await),
        None => None,
    };

    let voice = match MusicManager::voice_context(ctx.serenity_context(), guild_id, ctx.author().id)
    {
        Ok(voice) => voice,
        Err(err) => return reply_error(ctx, err).await,
    };

    if !may_skip(&voice.actor, snapshot.as_ref(), &voice.bot_channel_members) {
        return reply_error(ctx, MusicError::PermissionDenied).await;
    }

    let Some(player) = player else {
        return reply_error(ctx, MusicError::NothingPlaying).await;
    };

    match player.skip().await {
        Ok(track) => reply(ctx, embedded_messages::skipped(&track)).await,
        Err(err) => reply_error(ctx, err).await,
    }
}
