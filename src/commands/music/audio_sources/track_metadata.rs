//! Defines the `TrackMetadata` struct, the queueable representation of a
//! track, together with the short-lived result of renewing it.

use serenity::model::id::UserId;
use std::time::Duration;

/// Who asked for a track. Used for the queue listing and the skip permission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requester {
    pub id: UserId,
    pub name: String,
}

/// Unified representation of metadata for a queued track.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackMetadata {
    /// The title of the track, already sanitized for embeds.
    pub title: String,
    /// Canonical webpage URL, used to renew the stream before playback.
    pub url: String,
    /// Channel or artist that uploaded the track.
    pub uploader: String,
    /// The duration of the track.
    pub duration: Duration,
    /// URL to a thumbnail image for the track, if available.
    pub thumbnail: Option<String>,
    /// The user who queued the track. Empty until the track is enqueued.
    pub requested_by: Option<Requester>,
}

impl TrackMetadata {
    pub fn new(title: impl AsRef<str>, url: impl Into<String>, duration: Duration) -> Self {
        Self {
            title: sanitize_title(title.as_ref()),
            url: url.into(),
            uploader: "Unknown".to_string(),
            duration,
            thumbnail: None,
            requested_by: None,
        }
    }

    pub fn with_uploader(mut self, uploader: impl Into<String>) -> Self {
        self.uploader = uploader.into();
        self
    }

    pub fn with_thumbnail(mut self, thumbnail: impl Into<String>) -> Self {
        self.thumbnail = Some(thumbnail.into());
        self
    }

    /// Stamps the track with the user who queued it.
    pub fn requested_by(mut self, requester: Requester) -> Self {
        self.requested_by = Some(requester);
        self
    }

    pub fn requester_id(&self) -> Option<UserId> {
        self.requested_by.as_ref().map(|r| r.id)
    }
}

/// A freshly renewed track, ready to be handed to the playback session.
#[derive(Debug, Clone, PartialEq)]
pub struct RenewedTrack {
    /// Direct media URL. Expires after a few hours.
    pub stream_url: String,
    pub title: String,
    pub webpage_url: String,
    pub duration: Duration,
    pub thumbnail: Option<String>,
}

/// Strips characters that break Discord markdown out of a title.
pub fn sanitize_title(text: &str) -> String {
    const REPLACEMENTS: [(&str, &str); 8] = [
        ("&quot;", "\""),
        ("&amp;", "&"),
        ("[", "【"),
        ("]", "】"),
        ("*", "\""),
        ("_", " "),
        ("{", "("),
        ("}", ")"),
    ];

    let mut title = text.to_string();
    for (from, to) in REPLACEMENTS {
        title = title.replace(from, to);
    }

    // "_" becomes a space, so collapse runs afterwards
    while title.contains("  ") {
        title = title.replace("  ", " ");
    }

    title
}
