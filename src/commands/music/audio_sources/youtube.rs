//! Implements the `TrackResolver` trait on top of the `yt-dlp` command-line tool.

use std::path::PathBuf;
use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use serde::Deserialize;
use serenity::async_trait;
use tokio::process::Command;
use tracing::{debug, info, warn};

use super::track_metadata::{RenewedTrack, TrackMetadata};
use super::{AudioSource, AudioSourceResult, TrackResolver};
use crate::commands::music::utils::music_manager::MusicError;

/// Matches the `watch?v=<id>` prefix of a YouTube video URL, dropping any
/// playlist or timestamp parameters that follow.
static YOUTUBE_VIDEO_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(https?://)?(www\.)?youtube\.(com|nl)/watch\?v=([-\w]+)").unwrap()
});

const SEARCH_EXTRACTOR: &str = "YoutubeSearch";

/// The subset of `yt-dlp -J` output we care about.
#[derive(Debug, Default, Deserialize)]
struct YtDlpInfo {
    extractor_key: Option<String>,
    entries: Option<Vec<Option<YtDlpInfo>>>,
    title: Option<String>,
    webpage_url: Option<String>,
    url: Option<String>,
    id: Option<String>,
    uploader: Option<String>,
    duration: Option<f64>,
    thumbnail: Option<String>,
    #[serde(default)]
    formats: Vec<YtDlpFormat>,
}

#[derive(Debug, Default, Deserialize)]
struct YtDlpFormat {
    ext: Option<String>,
    url: Option<String>,
}

/// Resolver backed by a local `yt-dlp` binary.
pub struct YtDlpResolver {
    executable: PathBuf,
}

impl Default for YtDlpResolver {
    fn default() -> Self {
        Self::new("yt-dlp")
    }
}

#[async_trait]
impl TrackResolver for YtDlpResolver {
    async fn search(&self, query: &str) -> AudioSourceResult<Vec<TrackMetadata>> {
        let target = Self::search_target(query);
        info!("Searching for tracks: {}", target);

        let info = self
            .extract(&["--flat-playlist", "--no-playlist", &target])
            .await?;

        let tracks = tracks_from_info(info);
        debug!("Search for {} produced {} track(s)", target, tracks.len());
        Ok(tracks)
    }

    async fn renew(&self, track: &TrackMetadata) -> AudioSourceResult<RenewedTrack> {
        let url = Self::canonical_video_url(&track.url).unwrap_or(&track.url);
        debug!("Renewing stream URL for {}", url);

        let info = self
            .extract(&["--no-playlist", "-f", "bestaudio/best", url])
            .await?;

        renewed_from_info(info, track)
    }
}

impl YtDlpResolver {
    pub fn new(executable: impl Into<PathBuf>) -> Self {
        Self {
            executable: executable.into(),
        }
    }

    /// Returns the `watch?v=<id>` part of a YouTube URL, if it is one.
    pub fn canonical_video_url(url: &str) -> Option<&str> {
        YOUTUBE_VIDEO_REGEX.find(url).map(|m| m.as_str())
    }

    /// Builds the argument handed to `yt-dlp` for a user query: YouTube video
    /// URLs are canonicalised, other URLs pass through, and free text becomes
    /// a `ytsearch:` query.
    pub fn search_target(query: &str) -> String {
        let query = query.trim().trim_matches(|c| c == '<' || c == '>');

        if let Some(video) = Self::canonical_video_url(query) {
            video.to_string()
        } else if AudioSource::is_url(query) {
            query.to_string()
        } else {
            format!("ytsearch:{}", query)
        }
    }

    /// Runs `yt-dlp -J` with the given arguments and parses its JSON output.
    async fn extract(&self, args: &[&str]) -> AudioSourceResult<YtDlpInfo> {
        let output = Command::new(&self.executable)
            .args(["-J", "--no-warnings", "--quiet"])
            .args(args)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| MusicError::ResolutionError(format!("Failed to run yt-dlp: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let reason = stderr
                .lines()
                .rev()
                .find(|line| !line.trim().is_empty())
                .unwrap_or("yt-dlp exited with an error")
                .trim()
                .to_string();
            warn!("yt-dlp failed ({}): {}", output.status, reason);
            return Err(MusicError::ResolutionError(reason));
        }

        serde_json::from_slice(&output.stdout).map_err(|e| {
            MusicError::ResolutionError(format!("Failed to parse video metadata: {}", e))
        })
    }
}

/// Flattens a search/playlist/video result into queueable tracks.
fn tracks_from_info(mut info: YtDlpInfo) -> Vec<TrackMetadata> {
    let is_search = info.extractor_key.as_deref() == Some(SEARCH_EXTRACTOR);

    let entries: Vec<YtDlpInfo> = match info.entries.take() {
        Some(entries) => entries.into_iter().flatten().collect(),
        None => vec![info],
    };

    // Free-text searches only ever queue the best match
    let limit = if is_search { 1 } else { usize::MAX };

    entries
        .into_iter()
        .take(limit)
        .filter_map(track_from_entry)
        .collect()
}

fn track_from_entry(entry: YtDlpInfo) -> Option<TrackMetadata> {
    // yt-dlp reports nonsense for some live streams; anything that doesn't
    // fit a Duration is treated as unknown
    let duration = entry
        .duration
        .filter(|d| *d > 0.0)
        .and_then(|d| Duration::try_from_secs_f64(d).ok())?;

    let url = entry.webpage_url.or(entry.url).or(entry.id)?;
    let url = if AudioSource::is_url(&url) {
        url
    } else {
        format!("https://www.youtube.com/watch?v={}", url)
    };

    let mut track = TrackMetadata::new(
        entry.title.as_deref().unwrap_or("Unknown Title"),
        url,
        duration,
    )
    .with_uploader(entry.uploader.unwrap_or_else(|| "Unknown".to_string()));

    if let Some(thumbnail) = entry.thumbnail {
        track = track.with_thumbnail(thumbnail);
    }

    Some(track)
}

/// Picks a stream from a full extraction: the first m4a format, else the
/// first format listed, else the top-level URL.
fn renewed_from_info(info: YtDlpInfo, track: &TrackMetadata) -> AudioSourceResult<RenewedTrack> {
    let stream_url = info
        .formats
        .iter()
        .find(|f| f.ext.as_deref() == Some("m4a") && f.url.is_some())
        .or_else(|| info.formats.iter().find(|f| f.url.is_some()))
        .and_then(|f| f.url.clone())
        .or(info.url)
        .ok_or_else(|| {
            MusicError::ResolutionError(format!("No playable stream found for {}", track.title))
        })?;

    Ok(RenewedTrack {
        stream_url,
        title: info
            .title
            .as_deref()
            .map(super::track_metadata::sanitize_title)
            .unwrap_or_else(|| track.title.clone()),
        webpage_url: info.webpage_url.unwrap_or_else(|| track.url.clone()),
        duration: info
            .duration
            .and_then(|d| Duration::try_from_secs_f64(d).ok())
            .unwrap_or(track.duration),
        thumbnail: info.thumbnail.or_else(|| track.thumbnail.clone()),
    })
}
