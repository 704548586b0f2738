use super::*;
use crate::commands::music::audio_sources::{TrackResolver, track_metadata::Requester};
use crate::commands::music::utils::{
    music_manager::MusicManager,
    music_player::TeardownReason,
    notifier::TextChannelNotifier,
    player_registry::PlayerBackend,
    songbird_session::SongbirdSession,
};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Play a song from YouTube, or queue it if something is already playing
#[poise::command(
    slash_command,
    prefix_command,
    guild_only,
    category = "Music",
    aliases("p")
)]
pub async fn play(
    ctx: Context<'_>,
    #[description = "URL or search query"]
    #[rest]
    query: String,
) -> CommandResult {
    info!("Received play command with query: {}", query);
    let guild_id = ctx.guild_id().ok_or_else(guild_only_error)?;
    let serenity_ctx = ctx.serenity_context();

    // The caller must be somewhere we can join
    let channel_id =
        match MusicManager::get_user_voice_channel(serenity_ctx, guild_id, ctx.author().id) {
            Ok(channel_id) => channel_id,
            Err(err) => return reply_error(ctx, err).await,
        };

    // Searching shells out to yt-dlp and can take a while
    ctx.defer().await?;

    let data = ctx.data();
    let tracks = match data.players.resolver().search(&query).await {
        Ok(tracks) if tracks.is_empty() => {
            return reply_error(ctx, MusicError::NoResults(query)).await;
        }
        Ok(tracks) => tracks,
        Err(err) => {
            error!("Search for '{}' failed: {}", query, err);
            return reply(ctx, embedded_messages::search_failed(&err)).await;
        }
    };

    let songbird = match MusicManager::get_songbird(serenity_ctx).await {
        Ok(songbird) => songbird,
        Err(err) => return reply_error(ctx, err).await,
    };

    let http = Arc::clone(&serenity_ctx.http);
    let text_channel = ctx.channel_id();
    let ffmpeg_path = data.config.ffmpeg_path.clone();
    let player = data.players.get_or_create(guild_id, || PlayerBackend {
        session: Arc::new(SongbirdSession::new(songbird, guild_id, ffmpeg_path)),
        notifier: Arc::new(TextChannelNotifier::new(http, guild_id, text_channel)),
    });

    let added = embedded_messages::added_to_queue(&tracks);
    let requester = Requester {
        id: ctx.author().id,
        name: ctx.author().name.clone(),
    };

    if let Err(err) = player.enqueue(tracks, requester).await {
        return reply_error(ctx, err).await;
    }
    // The tracks are queued now, so a failed reply must not stop playback
    if let Err(err) = ctx.send(added).await {
        warn!("Failed to confirm queued tracks in guild {}: {}", guild_id, err);
    }

    if !MusicManager::is_connected(serenity_ctx, guild_id).await {
        if let Err(err) = MusicManager::join_channel(serenity_ctx, guild_id, channel_id).await {
            error!("Failed to join voice channel {}: {}", channel_id, err);
            player.shutdown(TeardownReason::Stopped).await;
            return reply_error(ctx, err).await;
        }
        player.set_channel(channel_id).await;
    }

    let outcome = player.advance().await;
    debug!("advance() after /play in guild {}: {:?}", guild_id, outcome);

    Ok(())
}
