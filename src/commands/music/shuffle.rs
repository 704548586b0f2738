use super::*;

/// Shuffle the upcoming tracks
#[poise::command(slash_command, prefix_command, guild_only, category = "Music")]
pub async fn shuffle(ctx: Context<'_>) -> CommandResult {
    let guild_id = ctx.guild_id().ok_or_else(guild_only_error)?;

    let Some(player) = ctx.data().players.get(guild_id) else {
        return reply_error(ctx, MusicError::NothingPlaying).await;
    };

    match player.shuffle().await {
        Ok(len) => reply(ctx, embedded_messages::shuffled(len)).await,
        Err(err) => reply_error(ctx, err).await,
    }
}
