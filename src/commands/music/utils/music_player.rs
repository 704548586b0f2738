//! One guild's playback session.
//!
//! A [`MusicPlayer`] owns the queue and drives a single play loop task:
//! pop → renew → start → wait for the completion signal → repeat. The loop
//! only exists while the player is `Resolving`, `Playing` or `CoolingDown`;
//! once the queue runs dry the player parks in `Idle` with an idle timer, and
//! `advance()` is the only way back out. `Exiting` is terminal.
//!
//! All fields live behind one lock that is never held across an await on the
//! resolver, the voice session or the notifier. Every suspension point in the
//! loop re-checks for `Exiting` when it wakes up.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use chrono::{DateTime, Utc};
use rand::seq::SliceRandom;
use serenity::model::id::{ChannelId, GuildId};
use tokio::sync::{Mutex, MutexGuard};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::music_manager::{MusicError, MusicResult};
use super::notifier::{NowPlayingFlags, PlayerNotifier};
use super::playback::{AttemptId, AudioFilter, FilterChain, FinishReason, PlaybackSession};
use super::player_registry::{PlayerBackend, PlayerRegistry};
use crate::commands::music::audio_sources::TrackResolver;
use crate::commands::music::audio_sources::track_metadata::{Requester, TrackMetadata};
use crate::config::PlayerConfig;

/// Shuffling fewer tracks than this is pointless.
pub const MIN_SHUFFLE_LEN: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerStatus {
    /// Nothing in flight. The idle timer may be armed.
    Idle,
    /// A track was popped and its stream URL is being renewed.
    Resolving,
    /// The stream is handed to the voice session.
    Playing,
    /// A track failed to resolve; `advance()` is ignored until the window ends.
    CoolingDown,
    /// Torn down. Nothing mutates the player any more.
    Exiting,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TeardownReason {
    IdleTimeout,
    Stopped,
    VoiceDisconnected,
    TransportLost,
}

/// What a call to [`MusicPlayer::advance`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advance {
    /// Popped the queue head and started the play loop.
    Started,
    /// A track is already resolving or playing.
    Busy,
    /// Inside the post-failure lock window.
    Locked,
    /// The queue is empty; the idle timer is (re)armed.
    IdleArmed,
    /// The player is exiting.
    Closed,
}

/// Point-in-time copy of a player's state for commands and tests.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerSnapshot {
    pub status: PlayerStatus,
    pub queue: Vec<TrackMetadata>,
    pub current: Option<TrackMetadata>,
    pub channel_id: Option<ChannelId>,
    pub loop_enabled: bool,
    pub filters: FilterChain,
    pub suppress_next_announcement: bool,
    pub idle_deadline: Option<DateTime<Utc>>,
}

struct IdleTimer {
    generation: u64,
    deadline: DateTime<Utc>,
    task: JoinHandle<()>,
}

enum PlayerState {
    Idle { idle_timer: Option<IdleTimer> },
    Resolving,
    Playing { attempt: AttemptId },
    CoolingDown,
    Exiting,
}

impl PlayerState {
    fn status(&self) -> PlayerStatus {
        match self {
            PlayerState::Idle { .. } => PlayerStatus::Idle,
            PlayerState::Resolving => PlayerStatus::Resolving,
            PlayerState::Playing { .. } => PlayerStatus::Playing,
            PlayerState::CoolingDown => PlayerStatus::CoolingDown,
            PlayerState::Exiting => PlayerStatus::Exiting,
        }
    }
}

struct PlayerInner {
    state: PlayerState,
    queue: VecDeque<TrackMetadata>,
    current: Option<TrackMetadata>,
    channel_id: Option<ChannelId>,
    loop_enabled: bool,
    filters: Vec<AudioFilter>,
    suppress_next_announcement: bool,
    /// Set by an effect toggle: re-queue the current track once it stops.
    restart_current: bool,
    timer_generation: u64,
}

impl PlayerInner {
    fn new() -> Self {
        Self {
            state: PlayerState::Idle { idle_timer: None },
            queue: VecDeque::new(),
            current: None,
            channel_id: None,
            loop_enabled: false,
            filters: Vec::new(),
            suppress_next_announcement: false,
            restart_current: false,
            timer_generation: 0,
        }
    }

    fn is_exiting(&self) -> bool {
        matches!(self.state, PlayerState::Exiting)
    }

    /// Pops the queue head into `current` and enters `Resolving`.
    fn begin_next(&mut self) -> Option<TrackMetadata> {
        let track = self.queue.pop_front()?;
        self.current = Some(track.clone());
        self.state = PlayerState::Resolving;
        Some(track)
    }

    fn disarm_idle_timer(&mut self) {
        if let PlayerState::Idle { idle_timer } = &mut self.state {
            if let Some(timer) = idle_timer.take() {
                timer.task.abort();
            }
        }
    }

    /// Enters `Exiting`. Returns the previous state, or `None` if some other
    /// caller got here first.
    fn mark_exiting(&mut self) -> Option<PlayerState> {
        if self.is_exiting() {
            return None;
        }

        self.loop_enabled = false;
        self.restart_current = false;
        self.current = None;
        Some(std::mem::replace(&mut self.state, PlayerState::Exiting))
    }

    fn filter_chain(&self) -> FilterChain {
        FilterChain::new(self.filters.iter().copied())
    }
}

enum Attempt {
    Finished(FinishReason),
    ResolveFailed(MusicError),
    TransportFailed(MusicError),
    Cancelled,
}

/// The per-guild playback state machine.
pub struct MusicPlayer {
    guild_id: GuildId,
    config: PlayerConfig,
    resolver: Arc<dyn TrackResolver>,
    session: Arc<dyn PlaybackSession>,
    notifier: Arc<dyn PlayerNotifier>,
    registry: Weak<PlayerRegistry>,
    /// Mirrors `PlayerState::Exiting` for lock-free checks.
    closed: AtomicBool,
    /// Cancels whatever the play loop is awaiting once the player exits.
    cancel: CancellationToken,
    inner: Mutex<PlayerInner>,
}

impl MusicPlayer {
    pub fn new(
        guild_id: GuildId,
        config: PlayerConfig,
        resolver: Arc<dyn TrackResolver>,
        backend: PlayerBackend,
        registry: Weak<PlayerRegistry>,
    ) -> Arc<Self> {
        Arc::new(Self {
            guild_id,
            config,
            resolver,
            session: backend.session,
            notifier: backend.notifier,
            registry,
            closed: AtomicBool::new(false),
            cancel: CancellationToken::new(),
            inner: Mutex::new(PlayerInner::new()),
        })
    }

    pub fn guild_id(&self) -> GuildId {
        self.guild_id
    }

    pub fn is_exiting(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub async fn snapshot(&self) -> PlayerSnapshot {
        let inner = self.inner.lock().await;

        PlayerSnapshot {
            status: inner.state.status(),
            queue: inner.queue.iter().cloned().collect(),
            current: inner.current.clone(),
            channel_id: inner.channel_id,
            loop_enabled: inner.loop_enabled,
            filters: inner.filter_chain(),
            suppress_next_announcement: inner.suppress_next_announcement,
            idle_deadline: match &inner.state {
                PlayerState::Idle {
                    idle_timer: Some(timer),
                } => Some(timer.deadline),
                _ => None,
            },
        }
    }

    /// Records the voice channel the bot was asked to join.
    pub async fn set_channel(&self, channel_id: ChannelId) {
        self.inner.lock().await.channel_id = Some(channel_id);
    }

    /// Appends a batch, stamped with its requester, to the queue. Does not
    /// start playback; call [`advance`](Self::advance) afterwards.
    ///
    /// Returns the new queue length.
    pub async fn enqueue(
        &self,
        tracks: Vec<TrackMetadata>,
        requester: Requester,
    ) -> MusicResult<usize> {
        let mut inner = self.inner.lock().await;
        if inner.is_exiting() {
            return Err(MusicError::PlayerExiting);
        }

        let added = tracks.len();
        inner.queue.extend(
            tracks
                .into_iter()
                .map(|track| track.requested_by(requester.clone())),
        );

        info!(
            "Queued {} track(s) for {} in guild {} (queue length {})",
            added,
            requester.name,
            self.guild_id,
            inner.queue.len()
        );
        Ok(inner.queue.len())
    }

    /// Moves an idle player forward: starts the play loop if the queue has
    /// something, otherwise (re)arms the idle timer. A no-op in every other
    /// state.
    pub async fn advance(self: &Arc<Self>) -> Advance {
        let mut inner = self.inner.lock().await;

        match &inner.state {
            PlayerState::Exiting => return Advance::Closed,
            PlayerState::CoolingDown => return Advance::Locked,
            PlayerState::Resolving | PlayerState::Playing { .. } => return Advance::Busy,
            PlayerState::Idle { .. } => {}
        }

        inner.disarm_idle_timer();

        match self.continue_or_idle(inner).await {
            Some(track) => {
                self.spawn_loop(track);
                Advance::Started
            }
            None => Advance::IdleArmed,
        }
    }

    /// Stops the current track without re-queueing it, and turns loop mode off.
    pub async fn skip(&self) -> MusicResult<TrackMetadata> {
        let (skipped, attempt) = {
            let mut inner = self.inner.lock().await;

            let attempt = match &inner.state {
                PlayerState::Exiting => return Err(MusicError::PlayerExiting),
                PlayerState::Playing { attempt } => *attempt,
                _ => return Err(MusicError::NothingPlaying),
            };

            let current = inner.current.clone().ok_or(MusicError::NothingPlaying)?;
            inner.loop_enabled = false;
            inner.restart_current = false;
            (current, attempt)
        };

        info!(
            "Skipping '{}' (attempt {}) in guild {}",
            skipped.title, attempt, self.guild_id
        );
        self.session.stop(attempt).await;
        Ok(skipped)
    }

    /// Randomly permutes the upcoming tracks. Returns the queue length.
    pub async fn shuffle(&self) -> MusicResult<usize> {
        let mut inner = self.inner.lock().await;
        if inner.is_exiting() {
            return Err(MusicError::PlayerExiting);
        }

        let len = inner.queue.len();
        if len < MIN_SHUFFLE_LEN {
            return Err(MusicError::QueueTooShort {
                len,
                required: MIN_SHUFFLE_LEN,
            });
        }

        inner.queue.make_contiguous().shuffle(&mut rand::rng());
        debug!("Shuffled {} tracks in guild {}", len, self.guild_id);
        Ok(len)
    }

    /// Flips loop mode. Takes effect when the current track next completes.
    pub async fn toggle_loop(&self) -> MusicResult<bool> {
        let mut inner = self.inner.lock().await;
        if inner.is_exiting() {
            return Err(MusicError::PlayerExiting);
        }

        inner.loop_enabled = !inner.loop_enabled;
        info!(
            "Loop mode {} in guild {}",
            if inner.loop_enabled { "enabled" } else { "disabled" },
            self.guild_id
        );
        Ok(inner.loop_enabled)
    }

    /// Flips an audio filter. If a track is playing it is restarted from the
    /// top with the new filter chain, without a second announcement.
    pub async fn toggle_effect(&self, filter: AudioFilter) -> MusicResult<bool> {
        let (enabled, restart) = {
            let mut inner = self.inner.lock().await;
            if inner.is_exiting() {
                return Err(MusicError::PlayerExiting);
            }

            let enabled = match inner.filters.iter().position(|f| *f == filter) {
                Some(index) => {
                    inner.filters.remove(index);
                    false
                }
                None => {
                    inner.filters.push(filter);
                    true
                }
            };

            let restart = match inner.state {
                PlayerState::Playing { attempt } if inner.current.is_some() => Some(attempt),
                _ => None,
            };
            if restart.is_some() {
                inner.restart_current = true;
                inner.suppress_next_announcement = true;
            }

            (enabled, restart)
        };

        info!(
            "{} {} in guild {}",
            filter,
            if enabled { "enabled" } else { "disabled" },
            self.guild_id
        );

        if let Some(attempt) = restart {
            self.session.stop(attempt).await;
        }

        Ok(enabled)
    }

    /// Tears the player down: leaves the registry, stops playback and leaves
    /// the voice channel. Only the first caller does the work; later calls
    /// return `false`.
    pub async fn shutdown(&self, reason: TeardownReason) -> bool {
        let previous = {
            let mut inner = self.inner.lock().await;
            match self.begin_teardown(&mut inner) {
                Some(previous) => previous,
                None => return false,
            }
        };

        let attempt = match previous {
            PlayerState::Idle {
                idle_timer: Some(timer),
            } => {
                timer.task.abort();
                None
            }
            PlayerState::Playing { attempt } => Some(attempt),
            _ => None,
        };

        self.finish_teardown(reason, attempt).await;
        true
    }

    fn begin_teardown(&self, inner: &mut PlayerInner) -> Option<PlayerState> {
        let previous = inner.mark_exiting()?;
        self.closed.store(true, Ordering::Release);
        Some(previous)
    }

    async fn finish_teardown(&self, reason: TeardownReason, attempt: Option<AttemptId>) {
        self.cancel.cancel();

        if let Some(registry) = self.registry.upgrade() {
            registry.remove(self.guild_id, self);
        }

        if let Some(attempt) = attempt {
            self.session.stop(attempt).await;
        }
        self.session.disconnect().await;

        if reason != TeardownReason::Stopped {
            self.notifier.player_closed(reason).await;
        }

        info!(
            "Player for guild {} torn down ({:?})",
            self.guild_id, reason
        );
    }

    /// Pops the next track (entering `Resolving`) or, if there is none, parks
    /// the player in `Idle` with a fresh idle timer and posts the notice.
    async fn continue_or_idle(
        self: &Arc<Self>,
        mut inner: MutexGuard<'_, PlayerInner>,
    ) -> Option<TrackMetadata> {
        if let Some(track) = inner.begin_next() {
            return Some(track);
        }

        let deadline = self.arm_idle_timer(&mut inner);
        drop(inner);

        info!(
            "Queue empty in guild {}, disconnecting at {} unless something is queued",
            self.guild_id, deadline
        );
        self.notifier.queue_empty(deadline).await;
        None
    }

    fn arm_idle_timer(self: &Arc<Self>, inner: &mut PlayerInner) -> DateTime<Utc> {
        inner.disarm_idle_timer();
        inner.timer_generation += 1;

        let generation = inner.timer_generation;
        let timeout = self.config.idle_timeout;
        let deadline = Utc::now()
            + chrono::Duration::from_std(timeout).unwrap_or_else(|_| chrono::Duration::zero());

        let player = Arc::downgrade(self);
        let task = tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            if let Some(player) = player.upgrade() {
                player.on_idle_timeout(generation).await;
            }
        });

        inner.state = PlayerState::Idle {
            idle_timer: Some(IdleTimer {
                generation,
                deadline,
                task,
            }),
        };
        deadline
    }

    async fn on_idle_timeout(self: &Arc<Self>, generation: u64) {
        {
            let mut inner = self.inner.lock().await;

            let current_timer = matches!(
                &inner.state,
                PlayerState::Idle { idle_timer: Some(timer) } if timer.generation == generation
            );
            if !current_timer {
                debug!("Stale idle timer fired in guild {}", self.guild_id);
                return;
            }

            // Detach our own handle so neither branch below aborts us
            if let PlayerState::Idle { idle_timer } = &mut inner.state {
                idle_timer.take();
            }

            if !inner.queue.is_empty() {
                // Tracks were queued but nobody advanced the player
                warn!(
                    "Idle timer fired in guild {} with {} track(s) pending, resuming playback",
                    self.guild_id,
                    inner.queue.len()
                );
                drop(inner);
                self.advance().await;
                return;
            }

            if self.begin_teardown(&mut inner).is_none() {
                return;
            }
        }

        info!("Idle timeout reached in guild {}", self.guild_id);
        self.finish_teardown(TeardownReason::IdleTimeout, None).await;
    }

    fn spawn_loop(self: &Arc<Self>, first: TrackMetadata) {
        let player = Arc::clone(self);
        tokio::spawn(async move { player.run(first).await });
    }

    async fn run(self: Arc<Self>, first: TrackMetadata) {
        let mut next = Some(first);

        while let Some(track) = next.take() {
            next = match self.attempt(&track).await {
                Attempt::Finished(reason) => self.after_playback(&track, reason).await,
                Attempt::ResolveFailed(error) => self.after_resolve_failure(&track, error).await,
                Attempt::TransportFailed(error) => self.after_transport_failure(&track, error).await,
                Attempt::Cancelled => None,
            };
        }

        debug!("Play loop for guild {} finished", self.guild_id);
    }

    /// One Resolving → Playing → completion pass for `track`.
    async fn attempt(&self, track: &TrackMetadata) -> Attempt {
        debug!("Resolving '{}' in guild {}", track.title, self.guild_id);

        let renewed = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Attempt::Cancelled,
            result = self.resolver.renew(track) => result,
        };

        let renewed = match renewed {
            Ok(renewed) => renewed,
            Err(error) => return Attempt::ResolveFailed(error),
        };

        // Resolution can take seconds; the player may have been stopped meanwhile
        if self.is_exiting() {
            debug!(
                "Discarding resolved stream for '{}', guild {} is exiting",
                track.title, self.guild_id
            );
            return Attempt::Cancelled;
        }

        let Some(channel_id) = self.session.current_channel().await else {
            return Attempt::TransportFailed(MusicError::NotConnected);
        };

        let (filters, moved) = {
            let mut inner = self.inner.lock().await;
            if inner.is_exiting() {
                return Attempt::Cancelled;
            }

            let moved = inner.channel_id != Some(channel_id);
            inner.channel_id = Some(channel_id);
            (inner.filter_chain(), moved)
        };

        if moved {
            debug!(
                "Bot is now in channel {} in guild {}, re-attaching",
                channel_id, self.guild_id
            );
            if let Err(error) = self.session.move_to(channel_id).await {
                return Attempt::TransportFailed(error);
            }
        }

        let handle = match self.session.start(&renewed, &filters).await {
            Ok(handle) => handle,
            Err(error) => return Attempt::TransportFailed(error),
        };

        let announcement = {
            let mut inner = self.inner.lock().await;
            if inner.is_exiting() {
                drop(inner);
                self.session.stop(handle.attempt()).await;
                return Attempt::Cancelled;
            }

            inner.state = PlayerState::Playing {
                attempt: handle.attempt(),
            };
            if std::mem::take(&mut inner.suppress_next_announcement) {
                None
            } else {
                Some(NowPlayingFlags {
                    looping: inner.loop_enabled,
                    nightcore: inner.filters.contains(&AudioFilter::Nightcore),
                })
            }
        };

        info!("Now playing '{}' in guild {}", track.title, self.guild_id);
        if let Some(flags) = announcement {
            self.notifier.now_playing(track, &renewed, flags).await;
        }

        let reason = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Attempt::Cancelled,
            reason = handle.finished() => reason,
        };

        Attempt::Finished(reason)
    }

    async fn after_playback(
        self: &Arc<Self>,
        track: &TrackMetadata,
        reason: FinishReason,
    ) -> Option<TrackMetadata> {
        let mut inner = self.inner.lock().await;
        if inner.is_exiting() {
            return None;
        }

        match &reason {
            FinishReason::Errored(e) => warn!(
                "Playback of '{}' in guild {} ended with an error: {}",
                track.title, self.guild_id, e
            ),
            other => debug!(
                "Playback of '{}' in guild {} finished: {:?}",
                track.title, self.guild_id, other
            ),
        }

        let finished = inner.current.take();
        let restart = std::mem::take(&mut inner.restart_current);
        if inner.loop_enabled || restart {
            if let Some(finished) = finished {
                inner.queue.push_front(finished);
                inner.suppress_next_announcement = true;
            }
        }

        inner.state = PlayerState::Idle { idle_timer: None };
        self.continue_or_idle(inner).await
    }

    async fn after_resolve_failure(
        self: &Arc<Self>,
        track: &TrackMetadata,
        error: MusicError,
    ) -> Option<TrackMetadata> {
        error!(
            "Failed to resolve '{}' in guild {}: {}",
            track.title, self.guild_id, error
        );

        {
            let mut inner = self.inner.lock().await;
            if inner.is_exiting() {
                return None;
            }
            inner.current = None;
            inner.restart_current = false;
            inner.suppress_next_announcement = false;
            inner.state = PlayerState::CoolingDown;
        }

        self.notifier.track_failed(track, &error).await;

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return None,
            _ = tokio::time::sleep(self.config.failure_cooldown) => {}
        }

        let mut inner = self.inner.lock().await;
        if inner.is_exiting() {
            return None;
        }

        inner.state = PlayerState::Idle { idle_timer: None };
        self.continue_or_idle(inner).await
    }

    /// Abandons the attempt and moves on, unless the bot is not in voice at
    /// all, in which case there is nothing left to play into.
    async fn after_transport_failure(
        self: &Arc<Self>,
        track: &TrackMetadata,
        error: MusicError,
    ) -> Option<TrackMetadata> {
        warn!(
            "Voice transport failed while starting '{}' in guild {}: {}",
            track.title, self.guild_id, error
        );

        {
            let mut inner = self.inner.lock().await;
            if inner.is_exiting() {
                return None;
            }
            inner.current = None;
            inner.restart_current = false;
            inner.suppress_next_announcement = false;
        }

        self.notifier.track_failed(track, &error).await;

        if error == MusicError::NotConnected {
            self.shutdown(TeardownReason::TransportLost).await;
            return None;
        }

        let mut inner = self.inner.lock().await;
        if inner.is_exiting() {
            return None;
        }

        inner.state = PlayerState::Idle { idle_timer: None };
        self.continue_or_idle(inner).await
    }
}
