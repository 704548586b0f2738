//! The voice side of the player: a session that plays one stream at a time
//! and reports, exactly once per attempt, why it stopped.

use serenity::async_trait;
use serenity::model::id::ChannelId;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::oneshot;

use super::music_manager::MusicResult;
use crate::commands::music::audio_sources::track_metadata::RenewedTrack;

/// Why a playback attempt completed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FinishReason {
    /// The stream ran out.
    Ended,
    /// Someone called `PlaybackSession::stop` (skip, effect toggle, teardown).
    Stopped,
    /// The decoder or transport gave up mid-stream.
    Errored(String),
}

static NEXT_ATTEMPT: AtomicU64 = AtomicU64::new(1);

/// Identifies one playback attempt. Stopping by id means a stop that arrives
/// late cannot hit the attempt that replaced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AttemptId(u64);

impl AttemptId {
    fn next() -> Self {
        Self(NEXT_ATTEMPT.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for AttemptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Sending half of a playback attempt's completion signal. Cloneable so the
/// track-end event and an explicit stop can race; only the first one counts.
#[derive(Clone)]
pub struct CompletionSignal {
    attempt: AttemptId,
    sender: Arc<Mutex<Option<oneshot::Sender<FinishReason>>>>,
}

impl CompletionSignal {
    pub fn attempt(&self) -> AttemptId {
        self.attempt
    }

    /// Delivers `reason` if nobody has yet. Returns whether this call won.
    pub fn fire(&self, reason: FinishReason) -> bool {
        let sender = match self.sender.lock() {
            Ok(mut slot) => slot.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };

        match sender {
            Some(sender) => sender.send(reason).is_ok(),
            None => false,
        }
    }
}

/// Receiving half, held by the play loop for the duration of one attempt.
pub struct PlaybackHandle {
    attempt: AttemptId,
    finished: oneshot::Receiver<FinishReason>,
}

impl PlaybackHandle {
    /// A fresh signal/handle pair for a new attempt.
    pub fn channel() -> (CompletionSignal, PlaybackHandle) {
        let attempt = AttemptId::next();
        let (tx, rx) = oneshot::channel();
        (
            CompletionSignal {
                attempt,
                sender: Arc::new(Mutex::new(Some(tx))),
            },
            PlaybackHandle {
                attempt,
                finished: rx,
            },
        )
    }

    pub fn attempt(&self) -> AttemptId {
        self.attempt
    }

    /// Waits for the attempt to complete. A session that drops its signal
    /// without firing counts as stopped.
    pub async fn finished(self) -> FinishReason {
        self.finished.await.unwrap_or(FinishReason::Stopped)
    }
}

/// Audio effects that can be toggled on a player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AudioFilter {
    /// Sped up, pitched up.
    Nightcore,
}

impl AudioFilter {
    pub fn name(&self) -> &'static str {
        match self {
            AudioFilter::Nightcore => "Nightcore",
        }
    }

    /// The ffmpeg `-af` expression implementing this filter.
    pub fn ffmpeg_expr(&self) -> &'static str {
        match self {
            AudioFilter::Nightcore => "aresample=48000,asetrate=48000*1.25",
        }
    }
}

impl fmt::Display for AudioFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Ordered list of filters applied when a stream starts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterChain(Vec<AudioFilter>);

impl FilterChain {
    pub fn new(filters: impl IntoIterator<Item = AudioFilter>) -> Self {
        Self(filters.into_iter().collect())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, filter: AudioFilter) -> bool {
        self.0.contains(&filter)
    }

    pub fn filters(&self) -> &[AudioFilter] {
        &self.0
    }

    /// The value for ffmpeg's `-af`, or `None` when no filter is active.
    pub fn to_ffmpeg_arg(&self) -> Option<String> {
        if self.0.is_empty() {
            return None;
        }

        Some(
            self.0
                .iter()
                .map(AudioFilter::ffmpeg_expr)
                .collect::<Vec<_>>()
                .join(", "),
        )
    }
}

/// A connected voice channel that plays one stream at a time.
#[async_trait]
pub trait PlaybackSession: Send + Sync {
    /// The channel the bot is in right now, `None` if it is disconnected.
    async fn current_channel(&self) -> Option<ChannelId>;

    /// Re-attaches the session to `channel_id`, e.g. after the bot was dragged.
    async fn move_to(&self, channel_id: ChannelId) -> MusicResult<()>;

    /// Starts streaming. The returned handle completes when the stream ends,
    /// errors, or `stop` is called.
    async fn start(&self, track: &RenewedTrack, filters: &FilterChain)
    -> MusicResult<PlaybackHandle>;

    /// Forces `attempt` to complete with `FinishReason::Stopped`. Does
    /// nothing if a different attempt (or none) is active.
    async fn stop(&self, attempt: AttemptId);

    /// Leaves the voice channel.
    async fn disconnect(&self);
}
