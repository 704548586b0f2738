use pretty_assertions::assert_eq;
use rstest::*;
use serenity::model::id::{ChannelId, UserId};

use rusty_jukebox::commands::music::utils::music_manager::MusicError;
use rusty_jukebox::commands::music::utils::music_player::{PlayerSnapshot, PlayerStatus};
use rusty_jukebox::commands::music::utils::permissions::{VoiceMember, may_skip, may_stop};
use rusty_jukebox::commands::music::utils::playback::FilterChain;

use crate::common::fixtures::{requester, track};

const REQUESTER: u64 = 1;
const STRANGER: u64 = 2;
const MODERATOR: u64 = 3;
const BOT: u64 = 4;

fn member(id: u64, can_manage_channels: bool) -> VoiceMember {
    VoiceMember {
        user_id: UserId::new(id),
        is_bot: false,
        can_manage_channels,
    }
}

fn bot() -> VoiceMember {
    VoiceMember {
        user_id: UserId::new(BOT),
        is_bot: true,
        can_manage_channels: true,
    }
}

#[fixture]
fn playing() -> PlayerSnapshot {
    PlayerSnapshot {
        status: PlayerStatus::Playing,
        queue: Vec::new(),
        current: Some(track("Current").requested_by(requester(REQUESTER))),
        channel_id: Some(ChannelId::new(10)),
        loop_enabled: false,
        filters: FilterChain::default(),
        suppress_next_announcement: false,
        idle_deadline: None,
    }
}

#[rstest]
fn anyone_may_skip_without_a_player() {
    let members = [member(MODERATOR, true)];
    assert!(may_skip(&member(STRANGER, false), None, &members));
}

#[rstest]
fn requester_may_skip_their_own_track(playing: PlayerSnapshot) {
    let members = [member(MODERATOR, true), member(REQUESTER, false)];
    assert!(may_skip(&member(REQUESTER, false), Some(&playing), &members));
}

#[rstest]
fn moderator_may_always_skip(playing: PlayerSnapshot) {
    let members = [member(MODERATOR, true)];
    assert!(may_skip(&member(MODERATOR, true), Some(&playing), &members));
}

#[rstest]
fn stranger_may_skip_when_no_moderator_listens(playing: PlayerSnapshot) {
    // The bot's own permissions don't count
    let members = [bot(), member(STRANGER, false)];
    assert!(may_skip(&member(STRANGER, false), Some(&playing), &members));
}

#[rstest]
fn stranger_is_denied_while_a_moderator_listens(playing: PlayerSnapshot) {
    let members = [member(MODERATOR, true), member(STRANGER, false)];
    assert!(!may_skip(&member(STRANGER, false), Some(&playing), &members));
}

#[rstest]
fn nothing_playing_with_moderator_present_is_denied(mut playing: PlayerSnapshot) {
    playing.status = PlayerStatus::Idle;
    playing.current = None;

    let members = [member(MODERATOR, true)];
    assert!(!may_skip(&member(STRANGER, false), Some(&playing), &members));
}

#[rstest]
#[case::bot_not_connected(Some(10), None, Err(MusicError::NotConnected))]
#[case::actor_not_in_voice(None, Some(10), Err(MusicError::NotInBotChannel))]
#[case::different_channels(Some(20), Some(10), Err(MusicError::NotInBotChannel))]
#[case::same_channel(Some(10), Some(10), Ok(()))]
fn stop_requires_sharing_the_bot_channel(
    #[case] actor_channel: Option<u64>,
    #[case] bot_channel: Option<u64>,
    #[case] expected: Result<(), MusicError>,
) {
    let actor = member(STRANGER, false);

    assert_eq!(
        may_stop(
            &actor,
            actor_channel.map(ChannelId::new),
            bot_channel.map(ChannelId::new),
            &[],
        ),
        expected
    );
}

#[rstest]
fn stop_needs_moderator_when_one_listens() {
    let channel = Some(ChannelId::new(10));
    let members = [member(MODERATOR, true), member(STRANGER, false)];

    assert_eq!(
        may_stop(&member(STRANGER, false), channel, channel, &members),
        Err(MusicError::PermissionDenied)
    );
    assert_eq!(
        may_stop(&member(MODERATOR, true), channel, channel, &members),
        Ok(())
    );
}

#[rstest]
fn anyone_in_the_channel_may_stop_without_moderators() {
    let channel = Some(ChannelId::new(10));
    let members = [bot(), member(STRANGER, false)];

    assert_eq!(
        may_stop(&member(STRANGER, false), channel, channel, &members),
        Ok(())
    );
}
