use super::*;

/// Toggle repeating the current track
#[poise::command(
    slash_command,
    prefix_command,
    guild_only,
    category = "Music",
    aliases("loop")
)]
pub async fn repeat(ctx: Context<'_>) -> CommandResult {
    let guild_id = ctx.guild_id().ok_or_else(guild_only_error)?;

    let Some(player) = ctx.data().players.get(guild_id) else {
        return reply_error(ctx, MusicError::NothingPlaying).await;
    };

    match player.toggle_loop().await {
        Ok(enabled) => reply(ctx, embedded_messages::repeat_status(enabled)).await,
        Err(err) => reply_error(ctx, err).await,
    }
}
