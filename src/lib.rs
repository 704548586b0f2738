//! Per-guild music playback for a Discord bot.
//!
//! The interesting part lives in [`commands::music::utils::music_player`]: one
//! [`MusicPlayer`](commands::music::utils::music_player::MusicPlayer) per guild
//! drives a resolve → play → wait loop over its queue, and the
//! [`PlayerRegistry`](commands::music::utils::player_registry::PlayerRegistry)
//! hands them out to the slash commands.

use std::sync::Arc;

pub mod commands;
pub mod config;
pub mod events;

use commands::music::utils::player_registry::PlayerRegistry;
use config::Config;

pub type Error = Box<dyn std::error::Error + Send + Sync>;
pub type Context<'a> = poise::Context<'a, Data, Error>;
pub type CommandResult = Result<(), Error>;

/// User data, which is stored and accessible in all command invocations
pub struct Data {
    pub players: Arc<PlayerRegistry>,
    pub config: Config,
}
