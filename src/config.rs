//! Runtime configuration, read from the environment (and `.env` via `dotenv`).

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use humantime_serde::re::humantime;
use thiserror::Error;

const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(180);
const DEFAULT_FAILURE_COOLDOWN: Duration = Duration::from_secs(6);
const DEFAULT_QUEUE_PAGE_SIZE: usize = 20;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required environment variable {0}")]
    Missing(&'static str),

    #[error("Invalid duration in {var}: {source}")]
    InvalidDuration {
        var: &'static str,
        #[source]
        source: humantime::DurationError,
    },

    #[error("Invalid number in {var}: {value}")]
    InvalidNumber { var: &'static str, value: String },
}

/// Timings handed to every `MusicPlayer`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlayerConfig {
    /// How long an empty, silent player waits before tearing itself down.
    pub idle_timeout: Duration,
    /// Lock window entered after a track fails to resolve.
    pub failure_cooldown: Duration,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            failure_cooldown: DEFAULT_FAILURE_COOLDOWN,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub discord_token: String,
    pub player: PlayerConfig,
    pub ytdlp_path: PathBuf,
    pub ffmpeg_path: PathBuf,
    pub queue_page_size: usize,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup, so tests don't
    /// have to touch the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let discord_token = lookup("DISCORD_TOKEN")
            .filter(|token| !token.trim().is_empty())
            .ok_or(ConfigError::Missing("DISCORD_TOKEN"))?;

        let idle_timeout =
            parse_duration(&lookup, "PLAYER_IDLE_TIMEOUT")?.unwrap_or(DEFAULT_IDLE_TIMEOUT);
        let failure_cooldown = parse_duration(&lookup, "PLAYER_FAILURE_COOLDOWN")?
            .unwrap_or(DEFAULT_FAILURE_COOLDOWN);

        let queue_page_size = match lookup("QUEUE_PAGE_SIZE") {
            Some(value) => value
                .trim()
                .parse::<usize>()
                .ok()
                .filter(|size| *size > 0)
                .ok_or(ConfigError::InvalidNumber {
                    var: "QUEUE_PAGE_SIZE",
                    value,
                })?,
            None => DEFAULT_QUEUE_PAGE_SIZE,
        };

        Ok(Self {
            discord_token,
            player: PlayerConfig {
                idle_timeout,
                failure_cooldown,
            },
            ytdlp_path: lookup("YTDLP_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("yt-dlp")),
            ffmpeg_path: lookup("FFMPEG_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("ffmpeg")),
            queue_page_size,
        })
    }
}

fn parse_duration<F>(lookup: &F, var: &'static str) -> Result<Option<Duration>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(var)
        .map(|value| {
            humantime::parse_duration(value.trim())
                .map_err(|source| ConfigError::InvalidDuration { var, source })
        })
        .transpose()
}
