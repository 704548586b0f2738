//! Sample tracks and ids shared by the player tests

use std::time::Duration;

use fake::Fake;
use fake::faker::internet::en::Username;
use fake::faker::name::en::Name;
use serenity::model::id::{ChannelId, GuildId, UserId};

use rusty_jukebox::commands::music::audio_sources::track_metadata::{Requester, TrackMetadata};

pub const GUILD_ID: u64 = 111_111_111;
pub const BOT_CHANNEL_ID: u64 = 222_222_222;
pub const OTHER_CHANNEL_ID: u64 = 333_333_333;
pub const LISTENER_ID: u64 = 444_444_444;

pub fn guild() -> GuildId {
    GuildId::new(GUILD_ID)
}

pub fn bot_channel() -> ChannelId {
    ChannelId::new(BOT_CHANNEL_ID)
}

pub fn other_channel() -> ChannelId {
    ChannelId::new(OTHER_CHANNEL_ID)
}

/// A queueable track whose URL is derived from `title`, so equal titles
/// mean equal tracks.
pub fn track(title: &str) -> TrackMetadata {
    let seconds: u64 = (60..600).fake();
    let uploader: String = Name().fake();
    let video_id: String = title
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .chain(std::iter::repeat('x'))
        .take(11)
        .collect();

    TrackMetadata::new(
        title,
        format!("https://www.youtube.com/watch?v={}", video_id),
        Duration::from_secs(seconds),
    )
    .with_uploader(uploader)
}

pub fn tracks(titles: &[&str]) -> Vec<TrackMetadata> {
    titles.iter().map(|title| track(title)).collect()
}

pub fn requester(id: u64) -> Requester {
    Requester {
        id: UserId::new(id),
        name: Username().fake(),
    }
}

pub fn listener() -> Requester {
    requester(LISTENER_ID)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracks_with_distinct_titles_have_distinct_urls() {
        assert_ne!(track("Alpha").url, track("Bravo").url);
        assert_eq!(track("Alpha").url, track("Alpha").url);
    }
}
