//! In-memory stand-ins for the resolver, the voice session and the text
//! channel, so the player can be driven without Discord or yt-dlp.

use std::collections::HashSet;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serenity::model::id::ChannelId;

use rusty_jukebox::commands::music::audio_sources::track_metadata::{RenewedTrack, TrackMetadata};
use rusty_jukebox::commands::music::audio_sources::{AudioSourceResult, TrackResolver};
use rusty_jukebox::commands::music::utils::music_manager::{MusicError, MusicResult};
use rusty_jukebox::commands::music::utils::music_player::TeardownReason;
use rusty_jukebox::commands::music::utils::notifier::{NowPlayingFlags, PlayerNotifier};
use rusty_jukebox::commands::music::utils::playback::{
    AttemptId, CompletionSignal, FilterChain, FinishReason, PlaybackHandle, PlaybackSession,
};

/// Resolver that renews every track unless its URL was marked as failing.
#[derive(Default)]
pub struct FakeResolver {
    failing: Mutex<HashSet<String>>,
    renewed: Mutex<Vec<String>>,
    delay: Mutex<Duration>,
}

impl FakeResolver {
    pub fn fail_on(&self, track: &TrackMetadata) {
        self.failing.lock().unwrap().insert(track.url.clone());
    }

    /// Makes every renewal take `delay` (virtual time under `start_paused`).
    pub fn slow_down(&self, delay: Duration) {
        *self.delay.lock().unwrap() = delay;
    }

    /// Titles passed to `renew`, in call order.
    pub fn renewed(&self) -> Vec<String> {
        self.renewed.lock().unwrap().clone()
    }
}

#[async_trait]
impl TrackResolver for FakeResolver {
    async fn search(&self, query: &str) -> AudioSourceResult<Vec<TrackMetadata>> {
        Err(MusicError::NoResults(query.to_string()))
    }

    async fn renew(&self, track: &TrackMetadata) -> AudioSourceResult<RenewedTrack> {
        self.renewed.lock().unwrap().push(track.title.clone());

        let delay = *self.delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        if self.failing.lock().unwrap().contains(&track.url) {
            return Err(MusicError::ResolutionError(format!(
                "{} is unavailable",
                track.url
            )));
        }

        Ok(RenewedTrack {
            stream_url: format!("{}&stream=1", track.url),
            title: track.title.clone(),
            webpage_url: track.url.clone(),
            duration: track.duration,
            thumbnail: None,
        })
    }
}

/// A stream the fake session was asked to play.
#[derive(Debug, Clone)]
pub struct Started {
    pub title: String,
    pub filters: FilterChain,
}

/// Voice session that never produces audio. Tests end streams by hand with
/// [`FakeSession::finish`].
pub struct FakeSession {
    channel: Mutex<Option<ChannelId>>,
    active: Mutex<Option<CompletionSignal>>,
    started: Mutex<Vec<Started>>,
    moves: Mutex<Vec<ChannelId>>,
    stops: AtomicUsize,
    disconnects: AtomicUsize,
    fail_next_start: AtomicBool,
    stop_lag: AtomicUsize,
}

impl FakeSession {
    pub fn connected_to(channel_id: ChannelId) -> Self {
        Self {
            channel: Mutex::new(Some(channel_id)),
            active: Mutex::new(None),
            started: Mutex::new(Vec::new()),
            moves: Mutex::new(Vec::new()),
            stops: AtomicUsize::new(0),
            disconnects: AtomicUsize::new(0),
            fail_next_start: AtomicBool::new(false),
            stop_lag: AtomicUsize::new(0),
        }
    }

    pub fn disconnected() -> Self {
        let session = Self::connected_to(ChannelId::new(1));
        *session.channel.lock().unwrap() = None;
        session
    }

    /// Makes the next `start` fail as if ffmpeg could not be spawned.
    pub fn fail_next_start(&self) {
        self.fail_next_start.store(true, Ordering::SeqCst);
    }

    /// Makes every `stop` yield `turns` times before it looks at the active
    /// stream, like a session that has to wait on its own lock first.
    pub fn lag_stops(&self, turns: usize) {
        self.stop_lag.store(turns, Ordering::SeqCst);
    }

    /// Simulates the stream running out (or failing) on its own.
    pub fn finish(&self, reason: FinishReason) -> bool {
        match self.active.lock().unwrap().take() {
            Some(signal) => signal.fire(reason),
            None => false,
        }
    }

    /// Simulates someone dragging the bot into another channel.
    pub fn drag_to(&self, channel_id: ChannelId) {
        *self.channel.lock().unwrap() = Some(channel_id);
    }

    pub fn started(&self) -> Vec<Started> {
        self.started.lock().unwrap().clone()
    }

    pub fn started_titles(&self) -> Vec<String> {
        self.started().into_iter().map(|s| s.title).collect()
    }

    pub fn moves(&self) -> Vec<ChannelId> {
        self.moves.lock().unwrap().clone()
    }

    pub fn disconnects(&self) -> usize {
        self.disconnects.load(Ordering::SeqCst)
    }

    pub fn stops(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PlaybackSession for FakeSession {
    async fn current_channel(&self) -> Option<ChannelId> {
        *self.channel.lock().unwrap()
    }

    async fn move_to(&self, channel_id: ChannelId) -> MusicResult<()> {
        self.moves.lock().unwrap().push(channel_id);
        *self.channel.lock().unwrap() = Some(channel_id);
        Ok(())
    }

    async fn start(
        &self,
        track: &RenewedTrack,
        filters: &FilterChain,
    ) -> MusicResult<PlaybackHandle> {
        if self.fail_next_start.swap(false, Ordering::SeqCst) {
            return Err(MusicError::TransportError(
                "failed to spawn ffmpeg".to_string(),
            ));
        }

        let (signal, handle) = PlaybackHandle::channel();
        *self.active.lock().unwrap() = Some(signal);
        self.started.lock().unwrap().push(Started {
            title: track.title.clone(),
            filters: filters.clone(),
        });
        Ok(handle)
    }

    async fn stop(&self, attempt: AttemptId) {
        self.stops.fetch_add(1, Ordering::SeqCst);
        for _ in 0..self.stop_lag.load(Ordering::SeqCst) {
            tokio::task::yield_now().await;
        }

        let signal = {
            let mut active = self.active.lock().unwrap();
            if active.as_ref().map(CompletionSignal::attempt) == Some(attempt) {
                active.take()
            } else {
                None
            }
        };
        if let Some(signal) = signal {
            signal.fire(FinishReason::Stopped);
        }
    }

    async fn disconnect(&self) {
        self.disconnects.fetch_add(1, Ordering::SeqCst);
        *self.channel.lock().unwrap() = None;
    }
}

/// Everything the player posted to its text channel.
#[derive(Debug, Clone, PartialEq)]
pub enum Notice {
    NowPlaying { title: String, flags: NowPlayingFlags },
    QueueEmpty { disconnect_at: DateTime<Utc> },
    TrackFailed { title: String, error: MusicError },
    Closed(TeardownReason),
}

#[derive(Default)]
pub struct RecordingNotifier {
    notices: Mutex<Vec<Notice>>,
}

impl RecordingNotifier {
    pub fn notices(&self) -> Vec<Notice> {
        self.notices.lock().unwrap().clone()
    }

    pub fn now_playing_titles(&self) -> Vec<String> {
        self.notices()
            .into_iter()
            .filter_map(|notice| match notice {
                Notice::NowPlaying { title, .. } => Some(title),
                _ => None,
            })
            .collect()
    }

    fn record(&self, notice: Notice) {
        self.notices.lock().unwrap().push(notice);
    }
}

#[async_trait]
impl PlayerNotifier for RecordingNotifier {
    async fn now_playing(
        &self,
        track: &TrackMetadata,
        _renewed: &RenewedTrack,
        flags: NowPlayingFlags,
    ) {
        self.record(Notice::NowPlaying {
            title: track.title.clone(),
            flags,
        });
    }

    async fn queue_empty(&self, disconnect_at: DateTime<Utc>) {
        self.record(Notice::QueueEmpty { disconnect_at });
    }

    async fn track_failed(&self, track: &TrackMetadata, error: &MusicError) {
        self.record(Notice::TrackFailed {
            title: track.title.clone(),
            error: error.clone(),
        });
    }

    async fn player_closed(&self, reason: TeardownReason) {
        self.record(Notice::Closed(reason));
    }
}
