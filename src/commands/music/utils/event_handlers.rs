use poise::serenity_prelude as serenity;
use serenity::async_trait;
use serenity::model::id::GuildId;
use songbird::tracks::PlayMode;
use tracing::{debug, warn};

use super::playback::{CompletionSignal, FinishReason};

/// Turns songbird's end and error events for one track into its completion
/// signal. Registered on both events; whichever fires first wins.
pub struct TrackEndNotifier {
    pub guild_id: GuildId,
    pub signal: CompletionSignal,
}

#[async_trait]
impl songbird::EventHandler for TrackEndNotifier {
    async fn act(&self, ctx: &songbird::EventContext<'_>) -> Option<songbird::Event> {
        if let songbird::EventContext::Track(tracks) = ctx {
            let reason = match tracks.first().map(|(state, _)| &state.playing) {
                Some(PlayMode::Errored(e)) => FinishReason::Errored(format!("{:?}", e)),
                _ => FinishReason::Ended,
            };

            if let FinishReason::Errored(e) = &reason {
                warn!("Track errored in guild {}: {}", self.guild_id, e);
            }

            if self.signal.fire(reason) {
                debug!("Track completion delivered for guild {}", self.guild_id);
            }
        }

        None
    }
}
