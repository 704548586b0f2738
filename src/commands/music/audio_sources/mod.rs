//! Turning user queries into queueable tracks, and queued tracks into
//! playable streams.
//!
//! The player only ever talks to a [`TrackResolver`]; the production
//! implementation is [`youtube::YtDlpResolver`], which shells out to `yt-dlp`.

/// Submodule defining the `TrackMetadata` struct used across audio sources.
pub mod track_metadata;
/// Submodule implementing the `TrackResolver` trait on top of `yt-dlp`.
pub mod youtube;

use crate::commands::music::utils::music_manager::MusicError;
use serenity::async_trait;
use track_metadata::{RenewedTrack, TrackMetadata};
use url::Url;

/// A specialized `Result` type for operations within the `audio_sources` module.
pub type AudioSourceResult<T> = Result<T, MusicError>;

/// The external search/extraction service.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TrackResolver: Send + Sync {
    /// Resolves a URL or free-text query into zero or more queueable tracks.
    ///
    /// Entries without a duration (live streams, unavailable videos) are
    /// dropped. An empty vector means "no results", not an error.
    async fn search(&self, query: &str) -> AudioSourceResult<Vec<TrackMetadata>>;

    /// Fetches a fresh, time-limited stream URL for a queued track.
    ///
    /// Stream URLs expire, so this runs right before every playback attempt.
    async fn renew(&self, track: &TrackMetadata) -> AudioSourceResult<RenewedTrack>;
}

/// A utility struct providing general helper functions related to audio sources.
pub struct AudioSource;

impl AudioSource {
    /// True for absolute http(s) URLs. Anything else is treated as search text.
    pub fn is_url(input: &str) -> bool {
        Url::parse(input).is_ok_and(|url| matches!(url.scheme(), "http" | "https"))
    }
}
