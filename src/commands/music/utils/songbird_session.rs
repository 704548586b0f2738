//! [`PlaybackSession`] backed by a songbird call and an ffmpeg child process.

use serenity::async_trait;
use serenity::model::id::{ChannelId, GuildId};
use songbird::input::{ChildContainer, Input};
use songbird::tracks::TrackHandle;
use songbird::{Event, Songbird, TrackEvent};
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::event_handlers::TrackEndNotifier;
use super::music_manager::{MusicError, MusicResult};
use super::playback::{
    AttemptId, CompletionSignal, FilterChain, FinishReason, PlaybackHandle, PlaybackSession,
};
use crate::commands::music::audio_sources::track_metadata::RenewedTrack;

/// Arguments for an ffmpeg process that pulls `stream_url` and writes 48kHz
/// stereo PCM in a WAV container to stdout.
pub fn ffmpeg_args(stream_url: &str, filters: &FilterChain) -> Vec<String> {
    let mut args: Vec<String> = [
        "-hide_banner",
        "-loglevel",
        "error",
        "-nostdin",
        "-reconnect",
        "1",
        "-reconnect_streamed",
        "1",
        "-reconnect_delay_max",
        "5",
        "-i",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();

    args.push(stream_url.to_string());
    args.push("-vn".to_string());

    if let Some(chain) = filters.to_ffmpeg_arg() {
        args.push("-af".to_string());
        args.push(chain);
    }

    args.extend(
        [
            "-f", "wav", "-acodec", "pcm_s16le", "-ac", "2", "-ar", "48000", "pipe:1",
        ]
        .iter()
        .map(|s| s.to_string()),
    );

    args
}

pub struct SongbirdSession {
    manager: Arc<Songbird>,
    guild_id: GuildId,
    ffmpeg_path: PathBuf,
    active: Mutex<Option<(TrackHandle, CompletionSignal)>>,
}

impl SongbirdSession {
    pub fn new(manager: Arc<Songbird>, guild_id: GuildId, ffmpeg_path: PathBuf) -> Self {
        Self {
            manager,
            guild_id,
            ffmpeg_path,
            active: Mutex::new(None),
        }
    }

    fn spawn_ffmpeg(&self, track: &RenewedTrack, filters: &FilterChain) -> MusicResult<Input> {
        let child = std::process::Command::new(&self.ffmpeg_path)
            .args(ffmpeg_args(&track.stream_url, filters))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| MusicError::TransportError(format!("failed to spawn ffmpeg: {}", e)))?;

        Ok(ChildContainer::from(child).into())
    }
}

#[async_trait]
impl PlaybackSession for SongbirdSession {
    async fn current_channel(&self) -> Option<ChannelId> {
        let call = self.manager.get(self.guild_id)?;
        let channel = call.lock().await.current_channel()?;
        Some(ChannelId::new(channel.0.get()))
    }

    async fn move_to(&self, channel_id: ChannelId) -> MusicResult<()> {
        self.manager
            .join(self.guild_id, channel_id)
            .await
            .map(|_| ())
            .map_err(|e| MusicError::JoinError(e.to_string()))
    }

    async fn start(
        &self,
        track: &RenewedTrack,
        filters: &FilterChain,
    ) -> MusicResult<PlaybackHandle> {
        let call = self
            .manager
            .get(self.guild_id)
            .ok_or(MusicError::NotConnected)?;

        let input = self.spawn_ffmpeg(track, filters)?;
        let (signal, handle) = PlaybackHandle::channel();

        let track_handle = {
            let mut call = call.lock().await;
            call.stop();
            call.play_input(input)
        };

        for event in [TrackEvent::End, TrackEvent::Error] {
            track_handle
                .add_event(
                    Event::Track(event),
                    TrackEndNotifier {
                        guild_id: self.guild_id,
                        signal: signal.clone(),
                    },
                )
                .map_err(|e| MusicError::TransportError(e.to_string()))?;
        }

        info!(
            "Streaming '{}' in guild {} (filters: {:?})",
            track.title,
            self.guild_id,
            filters.filters()
        );

        *self.active.lock().await = Some((track_handle, signal));
        Ok(handle)
    }

    async fn stop(&self, attempt: AttemptId) {
        let mut active = self.active.lock().await;
        if !matches!(active.as_ref(), Some((_, signal)) if signal.attempt() == attempt) {
            debug!(
                "Attempt {} in guild {} is no longer active, not stopping",
                attempt, self.guild_id
            );
            return;
        }
        let Some((track_handle, signal)) = active.take() else {
            return;
        };
        drop(active);

        signal.fire(FinishReason::Stopped);
        if let Err(e) = track_handle.stop() {
            debug!("Track in guild {} was already gone: {}", self.guild_id, e);
        }
    }

    async fn disconnect(&self) {
        if self.manager.get(self.guild_id).is_none() {
            return;
        }

        if let Err(e) = self.manager.remove(self.guild_id).await {
            warn!("Failed to leave voice in guild {}: {}", self.guild_id, e);
        }
    }
}
