use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use serenity::model::id::GuildId;
use std::sync::Arc;
use tracing::{debug, info};

use super::music_player::MusicPlayer;
use super::notifier::PlayerNotifier;
use super::playback::PlaybackSession;
use crate::commands::music::audio_sources::TrackResolver;
use crate::config::PlayerConfig;

/// The guild-specific collaborators of a new player.
pub struct PlayerBackend {
    pub session: Arc<dyn PlaybackSession>,
    pub notifier: Arc<dyn PlayerNotifier>,
}

/// At most one live player per guild.
///
/// Players remove themselves on teardown. Removal only succeeds for the exact
/// instance that is registered, so a player finishing its teardown late can't
/// evict its replacement.
pub struct PlayerRegistry {
    players: DashMap<GuildId, Arc<MusicPlayer>>,
    resolver: Arc<dyn TrackResolver>,
    config: PlayerConfig,
}

impl PlayerRegistry {
    pub fn new(resolver: Arc<dyn TrackResolver>, config: PlayerConfig) -> Arc<Self> {
        Arc::new(Self {
            players: DashMap::new(),
            resolver,
            config,
        })
    }

    pub fn resolver(&self) -> Arc<dyn TrackResolver> {
        Arc::clone(&self.resolver)
    }

    pub fn get(&self, guild_id: GuildId) -> Option<Arc<MusicPlayer>> {
        self.players
            .get(&guild_id)
            .map(|player| Arc::clone(player.value()))
    }

    /// Returns the guild's live player, creating one with `backend` if there
    /// is none or the registered one is already exiting.
    pub fn get_or_create<F>(self: &Arc<Self>, guild_id: GuildId, backend: F) -> Arc<MusicPlayer>
    where
        F: FnOnce() -> PlayerBackend,
    {
        match self.players.entry(guild_id) {
            Entry::Occupied(mut entry) => {
                if !entry.get().is_exiting() {
                    return Arc::clone(entry.get());
                }

                debug!("Replacing exiting player in guild {}", guild_id);
                let player = self.spawn_player(guild_id, backend());
                entry.insert(Arc::clone(&player));
                player
            }
            Entry::Vacant(entry) => {
                let player = self.spawn_player(guild_id, backend());
                entry.insert(Arc::clone(&player));
                player
            }
        }
    }

    fn spawn_player(self: &Arc<Self>, guild_id: GuildId, backend: PlayerBackend) -> Arc<MusicPlayer> {
        info!("Creating player for guild {}", guild_id);
        MusicPlayer::new(
            guild_id,
            self.config,
            Arc::clone(&self.resolver),
            backend,
            Arc::downgrade(self),
        )
    }

    /// Drops `player` from the registry if it is still the registered one.
    pub fn remove(&self, guild_id: GuildId, player: &MusicPlayer) -> bool {
        self.players
            .remove_if(&guild_id, |_, registered| {
                std::ptr::eq(Arc::as_ptr(registered), player)
            })
            .is_some()
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }
}
