use chrono::{DateTime, Utc};
use poise::{CreateReply, serenity_prelude as serenity};
use serenity::all::CreateEmbed;

use super::{
    format_duration, music_manager::MusicError, music_player::TeardownReason,
    notifier::NowPlayingFlags, playback::AudioFilter,
};
use crate::commands::music::audio_sources::track_metadata::{RenewedTrack, TrackMetadata};

const SUCCESS: u32 = 0x00ff00;
const ERROR: u32 = 0xff0000;
const INFO: u32 = 0xbb0000;

/// Longest title shown in the queue listing before it is cut.
const QUEUE_TITLE_LIMIT: usize = 30;

/// Shortens `title` to 28 characters plus an ellipsis if it exceeds the
/// queue listing limit.
pub fn truncate_title(title: &str) -> String {
    if title.chars().count() > QUEUE_TITLE_LIMIT {
        let head: String = title.chars().take(QUEUE_TITLE_LIMIT - 2).collect();
        format!("{}...", head)
    } else {
        title.to_string()
    }
}

fn requester_mention(track: &TrackMetadata) -> String {
    match &track.requested_by {
        Some(requester) => format!("<@{}>", requester.id),
        None => "unknown".to_string(),
    }
}

/// Create an embed for when a track starts playing
pub fn now_playing(
    track: &TrackMetadata,
    renewed: &RenewedTrack,
    flags: NowPlayingFlags,
) -> CreateEmbed {
    let mut description = format!(
        "**Now playing:**\n[**{}**]({})\n\n**Duration:** `{}`",
        renewed.title,
        renewed.webpage_url,
        format_duration(renewed.duration)
    );

    if flags.looping {
        description.push_str(" **| Repeat:** `on`");
    }
    if flags.nightcore {
        description.push_str(" **| Nightcore:** `on`");
    }

    let mut embed = CreateEmbed::new()
        .title("🎵 Now Playing")
        .description(description)
        .field("Requested by", requester_mention(track), true)
        .field("Uploader", &track.uploader, true)
        .color(SUCCESS);

    if let Some(thumbnail) = renewed.thumbnail.as_ref().or(track.thumbnail.as_ref()) {
        embed = embed.thumbnail(thumbnail);
    }

    embed
}

/// Create an embed for when the queue runs dry
pub fn queue_drained(disconnect_at: DateTime<Utc>) -> CreateEmbed {
    CreateEmbed::new()
        .description(format!(
            "The queue is empty...\nI will shut the player down <t:{}:R> unless new tracks are added.",
            disconnect_at.timestamp()
        ))
        .color(INFO)
}

/// Create an embed for when a track could not be played
pub fn track_failed(track: &TrackMetadata, err: &MusicError) -> CreateEmbed {
    CreateEmbed::new()
        .title("❌ Error")
        .description(format!(
            "**Something went wrong while playing:\n[{}]({})** ```css\n{}\n```",
            track.title, track.url, err
        ))
        .color(ERROR)
}

/// Create an embed for when the player shut itself down. `/stop` replies on
/// its own, so it gets none.
pub fn player_closed(reason: TeardownReason) -> Option<CreateEmbed> {
    let description = match reason {
        TeardownReason::Stopped => return None,
        TeardownReason::VoiceDisconnected => {
            "**Shutting the player down after being disconnected from the channel.**"
        }
        TeardownReason::IdleTimeout => "**Left the voice channel after being idle.**",
        TeardownReason::TransportLost => "**Lost the voice connection, shutting the player down.**",
    };

    Some(
        CreateEmbed::new()
            .title("👋 Player Closed")
            .description(description)
            .color(INFO),
    )
}

/// Create a reply for a batch of tracks added by `/play`
pub fn added_to_queue(tracks: &[TrackMetadata]) -> CreateReply {
    let description = match tracks {
        [track] => format!("You added **{}** to the queue!", track.title),
        _ => format!("You added **{} tracks** to the queue!", tracks.len()),
    };

    CreateReply::default().embed(
        CreateEmbed::new()
            .title("🎵 Added to Queue")
            .description(description)
            .color(SUCCESS),
    )
}

/// Create a reply for a failed music command
pub fn music_error(err: &MusicError) -> CreateReply {
    CreateReply::default()
        .embed(
            CreateEmbed::new()
                .title("❌ Error")
                .description(err.to_string())
                .color(ERROR),
        )
        .ephemeral(true)
}

/// Create a reply for a search that failed outright
pub fn search_failed(err: &MusicError) -> CreateReply {
    CreateReply::default().embed(
        CreateEmbed::new()
            .title("❌ Error")
            .description(format!(
                "**Something went wrong while processing your search:**\n```css\n{}```",
                err
            ))
            .color(ERROR),
    )
}

/// Renders the first `page_size` queue entries, plus a count of the rest.
pub fn queue_description(queue: &[TrackMetadata], page_size: usize) -> String {
    let mut description = String::new();

    for (index, track) in queue.iter().take(page_size).enumerate() {
        description.push_str(&format!(
            "**{} | `{}` - ** [{}]({}) | {}\n",
            index + 1,
            format_duration(track.duration),
            truncate_title(&track.title),
            track.url,
            requester_mention(track)
        ));
    }

    if queue.len() > page_size {
        description.push_str(&format!(
            "\nAnd **{}** more track(s)",
            queue.len() - page_size
        ));
    }

    description
}

/// Create a reply listing the upcoming tracks
pub fn queue_listing(queue: &[TrackMetadata], page_size: usize) -> CreateReply {
    if queue.is_empty() {
        return CreateReply::default().embed(
            CreateEmbed::new()
                .title("📭 Queue")
                .description("There are no tracks in the queue right now.")
                .color(INFO),
        );
    }

    CreateReply::default().embed(
        CreateEmbed::new()
            .title(format!("📋 Queue - {} tracks", queue.len()))
            .description(queue_description(queue, page_size))
            .color(INFO),
    )
}

/// Create a reply for when a track is skipped
pub fn skipped(track: &TrackMetadata) -> CreateReply {
    CreateReply::default().embed(
        CreateEmbed::new()
            .title("⏭️ Skipped")
            .description(format!("Skipped [{}]({})", track.title, track.url))
            .color(SUCCESS),
    )
}

pub fn shuffled(len: usize) -> CreateReply {
    CreateReply::default().embed(
        CreateEmbed::new()
            .title("🔀 Shuffled")
            .description(format!("**You shuffled the {} tracks in the queue.**", len))
            .color(SUCCESS),
    )
}

pub fn repeat_status(enabled: bool) -> CreateReply {
    CreateReply::default().embed(
        CreateEmbed::new()
            .title(if enabled {
                "🔂 Repeat Enabled"
            } else {
                "➡️ Repeat Disabled"
            })
            .description(if enabled {
                "**Repeat enabled for the current track.**"
            } else {
                "**Repeat disabled.**"
            })
            .color(SUCCESS),
    )
}

pub fn effect_status(filter: AudioFilter, enabled: bool) -> CreateReply {
    CreateReply::default().embed(
        CreateEmbed::new()
            .title(format!("🎚️ {}", filter))
            .description(format!(
                "**{} effect {}.**",
                filter,
                if enabled { "enabled" } else { "disabled" }
            ))
            .color(SUCCESS),
    )
}

/// Create a reply for when `/stop` tore the player down
pub fn stopped() -> CreateReply {
    CreateReply::default().embed(
        CreateEmbed::new()
            .title("⏹️ Stopped")
            .description("You stopped the player")
            .color(SUCCESS),
    )
}
