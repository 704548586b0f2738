use super::*;
use crate::commands::music::utils::playback::AudioFilter;

/// Toggle the nightcore effect (faster, higher pitched)
#[poise::command(
    slash_command,
    prefix_command,
    guild_only,
    category = "Music",
    aliases("nc")
)]
pub async fn nightcore(ctx: Context<'_>) -> CommandResult {
    let guild_id = ctx.guild_id().ok_or_else(guild_only_error)?;

    let Some(player) = ctx.data().players.get(guild_id) else {
        return reply_error(ctx, MusicError::NothingPlaying).await;
    };

    match player.toggle_effect(AudioFilter::Nightcore).await {
        Ok(enabled) => reply(
            ctx,
            embedded_messages::effect_status(AudioFilter::Nightcore, enabled),
        )
        .await,
        Err(err) => reply_error(ctx, err).await,
    }
}
