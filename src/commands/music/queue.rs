use super::*;

/// Show the upcoming tracks
#[poise::command(
    slash_command,
    prefix_command,
    guild_only,
    category = "Music",
    aliases("q")
)]
pub async fn queue(ctx: Context<'_>) -> CommandResult {
    let guild_id = ctx.guild_id().ok_or_else(guild_only_error)?;

    let Some(player) = ctx.data().players.get(guild_id) else {
        return reply_error(ctx, MusicError::NoPlayer).await;
    };

    let snapshot = player.snapshot().await;
    reply(
        ctx,
        embedded_messages::queue_listing(&snapshot.queue, ctx.data().config.queue_page_size),
    )
    .await
}
