use std::time::Duration;

use assert_matches::assert_matches;
use chrono::Utc;
use pretty_assertions::assert_eq;

use rusty_jukebox::commands::music::utils::music_manager::MusicError;
use rusty_jukebox::commands::music::utils::music_player::{Advance, PlayerStatus, TeardownReason};
use rusty_jukebox::commands::music::utils::playback::FinishReason;
use rusty_jukebox::events::VoiceStateHandler;

use crate::common::fixtures::{guild, listener, tracks};
use crate::common::mocks::{FakeSession, Notice};
use crate::common::{Harness, advance_clock, eventually};

const IDLE_TIMEOUT: Duration = Duration::from_secs(180);

async fn torn_down(h: &Harness) {
    eventually("player torn down", || async move {
        h.player.is_exiting() && h.registry.get(guild()).is_none()
    })
    .await;
}

#[tokio::test(start_paused = true)]
async fn empty_queue_arms_the_idle_timer() {
    let h = Harness::new().await;

    assert_eq!(h.player.advance().await, Advance::IdleArmed);

    let snapshot = h.snapshot().await;
    assert_eq!(snapshot.status, PlayerStatus::Idle);
    let deadline = snapshot.idle_deadline.expect("idle timer armed");
    assert!(deadline > Utc::now() + chrono::Duration::seconds(170));
    assert_matches!(
        h.notifier.notices().as_slice(),
        [Notice::QueueEmpty { disconnect_at }] if *disconnect_at == deadline
    );
}

#[tokio::test(start_paused = true)]
async fn idle_timeout_tears_the_player_down() {
    let h = Harness::new().await;
    h.player.advance().await;

    advance_clock(IDLE_TIMEOUT - Duration::from_secs(1)).await;
    assert!(!h.player.is_exiting());

    advance_clock(Duration::from_secs(2)).await;
    torn_down(&h).await;

    assert_eq!(h.session.disconnects(), 1);
    assert_eq!(
        h.notifier.notices().last(),
        Some(&Notice::Closed(TeardownReason::IdleTimeout))
    );
    assert_eq!(h.snapshot().await.status, PlayerStatus::Exiting);
}

#[tokio::test(start_paused = true)]
async fn queueing_before_the_timeout_resumes_playback() {
    let h = Harness::new().await;
    h.player.enqueue(tracks(&["A"]), listener()).await.unwrap();
    h.player.advance().await;
    h.wait_for_status(PlayerStatus::Playing).await;

    h.session.finish(FinishReason::Ended);
    h.wait_for_status(PlayerStatus::Idle).await;
    assert!(h.snapshot().await.idle_deadline.is_some());

    advance_clock(Duration::from_secs(10)).await;
    h.player.enqueue(tracks(&["B"]), listener()).await.unwrap();
    assert_eq!(h.player.advance().await, Advance::Started);
    h.wait_for_status(PlayerStatus::Playing).await;
    assert_eq!(h.snapshot().await.idle_deadline, None);

    advance_clock(IDLE_TIMEOUT + Duration::from_secs(20)).await;

    assert!(!h.player.is_exiting());
    assert!(h.registry.get(guild()).is_some());
    assert_eq!(h.session.disconnects(), 0);
    assert_eq!(h.session.started_titles(), ["A", "B"]);
}

#[tokio::test(start_paused = true)]
async fn idle_timer_plays_tracks_nobody_advanced() {
    let h = Harness::new().await;
    assert_eq!(h.player.advance().await, Advance::IdleArmed);

    // Queued, but the command never got as far as advance()
    h.player.enqueue(tracks(&["A"]), listener()).await.unwrap();
    advance_clock(IDLE_TIMEOUT + Duration::from_secs(1)).await;
    h.wait_for_status(PlayerStatus::Playing).await;

    assert!(!h.player.is_exiting());
    assert_eq!(h.session.started_titles(), ["A"]);
    assert_eq!(h.session.disconnects(), 0);
    assert_eq!(h.player.advance().await, Advance::Busy);
}

#[tokio::test(start_paused = true)]
async fn stop_tears_down_once_and_freezes_the_player() {
    let h = Harness::new().await;
    h.player.enqueue(tracks(&["A", "B"]), listener()).await.unwrap();
    h.player.advance().await;
    h.wait_for_status(PlayerStatus::Playing).await;

    assert!(h.player.shutdown(TeardownReason::Stopped).await);
    assert!(!h.player.shutdown(TeardownReason::Stopped).await);
    torn_down(&h).await;

    assert_eq!(h.player.advance().await, Advance::Closed);
    assert_eq!(
        h.player.enqueue(tracks(&["C"]), listener()).await,
        Err(MusicError::PlayerExiting)
    );
    assert_eq!(h.player.skip().await, Err(MusicError::PlayerExiting));

    advance_clock(IDLE_TIMEOUT).await;
    let snapshot = h.snapshot().await;
    assert_eq!(snapshot.current, None);
    assert_eq!(h.queue_titles().await, ["B"]);
    assert_eq!(h.session.started_titles(), ["A"]);
    assert_eq!(h.session.disconnects(), 1);
    assert!(
        !h.notifier
            .notices()
            .iter()
            .any(|notice| matches!(notice, Notice::Closed(_)))
    );
}

#[tokio::test(start_paused = true)]
async fn stop_while_resolving_discards_the_stream() {
    let h = Harness::new().await;
    h.resolver.slow_down(Duration::from_secs(5));
    h.player.enqueue(tracks(&["A", "B"]), listener()).await.unwrap();
    h.player.advance().await;
    h.wait_for_status(PlayerStatus::Resolving).await;

    h.player.shutdown(TeardownReason::Stopped).await;
    advance_clock(Duration::from_secs(10)).await;

    assert!(h.session.started().is_empty());
    assert_eq!(h.resolver.renewed(), ["A"]);
    assert!(h.notifier.now_playing_titles().is_empty());
}

#[tokio::test(start_paused = true)]
async fn stop_during_cooldown_ends_the_loop() {
    let h = Harness::new().await;
    let queued = tracks(&["A", "B"]);
    h.resolver.fail_on(&queued[0]);
    h.player.enqueue(queued, listener()).await.unwrap();
    h.player.advance().await;
    h.wait_for_status(PlayerStatus::CoolingDown).await;

    h.player.shutdown(TeardownReason::Stopped).await;
    advance_clock(Duration::from_secs(10)).await;

    assert!(h.session.started().is_empty());
    assert_eq!(h.resolver.renewed(), ["A"]);
}

#[tokio::test(start_paused = true)]
async fn lost_voice_connection_shuts_the_player_down() {
    let h = Harness::with_session(FakeSession::disconnected()).await;
    h.player.enqueue(tracks(&["A", "B"]), listener()).await.unwrap();
    h.player.advance().await;

    torn_down(&h).await;

    assert_matches!(
        h.notifier.notices().as_slice(),
        [
            Notice::TrackFailed { title, error: MusicError::NotConnected },
            Notice::Closed(TeardownReason::TransportLost),
        ] if title == "A"
    );
}

#[tokio::test(start_paused = true)]
async fn bot_disconnect_closes_the_player_once() {
    let h = Harness::new().await;
    h.player.enqueue(tracks(&["A"]), listener()).await.unwrap();
    h.player.advance().await;
    h.wait_for_status(PlayerStatus::Playing).await;

    let handler = VoiceStateHandler::new(h.registry.clone());
    assert!(handler.handle_bot_disconnect(guild()).await);
    assert!(!handler.handle_bot_disconnect(guild()).await);

    torn_down(&h).await;
    assert_eq!(
        h.notifier.notices().last(),
        Some(&Notice::Closed(TeardownReason::VoiceDisconnected))
    );
}
