//! Track metadata and playback locators

use std::fmt;

use serde::{Deserialize, Serialize};

const REMOTE_SCHEME: &str = "spotify:";
const DEFAULT_ACCENT: &str = "#1DB954";

/// Where a track can be played from, resolved once when the track is built
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Locator {
    /// A file path (or URL) the local player opens
    Local(String),
    /// A remote service URI, e.g. `spotify:track:<id>`
    Remote(String),
}

impl Locator {
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        if raw.starts_with(REMOTE_SCHEME) {
            Locator::Remote(raw.to_string())
        } else {
            Locator::Local(raw.to_string())
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Locator::Local(path) => path,
            Locator::Remote(uri) => uri,
        }
    }

    pub fn is_remote(&self) -> bool {
        matches!(self, Locator::Remote(_))
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An immutable playable item; identity is `id`
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(from = "TrackRecord", into = "TrackRecord")]
pub struct Track {
    pub id: String,
    pub title: String,
    pub artist: String,
    pub album: String,
    pub duration_seconds: f64,
    pub cover_url: String,
    pub locator: Locator,
    pub accent_color: String,
    pub fallback: Option<Locator>,
}

impl PartialEq for Track {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Track {
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        artist: impl Into<String>,
        album: impl Into<String>,
        duration_seconds: f64,
        locator: &str,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            artist: artist.into(),
            album: album.into(),
            duration_seconds: sanitize_duration(duration_seconds),
            cover_url: String::new(),
            locator: Locator::parse(locator),
            accent_color: DEFAULT_ACCENT.to_string(),
            fallback: None,
        }
    }

    pub fn with_cover(mut self, cover_url: impl Into<String>) -> Self {
        self.cover_url = cover_url.into();
        self
    }

    pub fn with_accent(mut self, accent_color: impl Into<String>) -> Self {
        self.accent_color = accent_color.into();
        self
    }

    pub fn with_fallback(mut self, fallback: &str) -> Self {
        self.fallback = Some(Locator::parse(fallback));
        self
    }

    pub fn is_remote(&self) -> bool {
        self.locator.is_remote()
    }

    /// Same track, addressed through its fallback locator
    pub fn fallback_variant(&self) -> Option<Track> {
        self.fallback.as_ref().map(|fallback| Track {
            locator: fallback.clone(),
            fallback: None,
            ..self.clone()
        })
    }

    /// Case-insensitive substring match over title, artist and album.
    /// `needle` must already be lowercase.
    pub fn matches(&self, needle: &str) -> bool {
        self.title.to_lowercase().contains(needle)
            || self.artist.to_lowercase().contains(needle)
            || self.album.to_lowercase().contains(needle)
    }
}

fn sanitize_duration(seconds: f64) -> f64 {
    if seconds.is_finite() && seconds > 0.0 {
        seconds
    } else {
        0.0
    }
}

/// On-disk shape of a track, shared with the browser player's storage format
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TrackRecord {
    id: String,
    title: String,
    #[serde(default)]
    artist: String,
    #[serde(default)]
    album: String,
    #[serde(default)]
    duration: f64,
    #[serde(default)]
    cover: String,
    url: String,
    #[serde(default)]
    color: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    fallback_url: Option<String>,
}

impl From<TrackRecord> for Track {
    fn from(record: TrackRecord) -> Self {
        let mut track = Track::new(
            record.id,
            record.title,
            record.artist,
            record.album,
            record.duration,
            &record.url,
        )
        .with_cover(record.cover);
        if !record.color.is_empty() {
            track = track.with_accent(record.color);
        }
        if let Some(fallback) = record.fallback_url.as_deref() {
            track = track.with_fallback(fallback);
        }
        track
    }
}

impl From<Track> for TrackRecord {
    fn from(track: Track) -> Self {
        Self {
            id: track.id,
            title: track.title,
            artist: track.artist,
            album: track.album,
            duration: track.duration_seconds,
            cover: track.cover_url,
            url: track.locator.as_str().to_string(),
            color: track.accent_color,
            fallback_url: track.fallback.map(|l| l.as_str().to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn locator_is_resolved_from_prefix() {
        assert_eq!(
            Locator::parse("spotify:track:4uLU6hMCjMI75M1A2tKUQC"),
            Locator::Remote("spotify:track:4uLU6hMCjMI75M1A2tKUQC".to_string())
        );
        assert_eq!(
            Locator::parse("assets/music/sample1.mp3"),
            Locator::Local("assets/music/sample1.mp3".to_string())
        );
    }

    #[test]
    fn fallback_variant_swaps_locator() {
        let track = Track::new("7", "Song", "Artist", "Album", 180.0, "spotify:track:abc")
            .with_fallback("previews/abc.mp3");

        let variant = track.fallback_variant().expect("fallback present");
        assert_eq!(variant.id, track.id);
        assert_eq!(variant.locator, Locator::Local("previews/abc.mp3".to_string()));
        assert!(variant.fallback.is_none());

        let plain = Track::new("8", "Other", "Artist", "Album", 10.0, "a.mp3");
        assert!(plain.fallback_variant().is_none());
    }

    #[test]
    fn negative_or_nan_duration_is_zero() {
        assert_eq!(Track::new("1", "t", "a", "b", -3.0, "x.mp3").duration_seconds, 0.0);
        assert_eq!(Track::new("1", "t", "a", "b", f64::NAN, "x.mp3").duration_seconds, 0.0);
    }

    #[test]
    fn serializes_with_browser_field_names() {
        let track = Track::new("1", "Blinding Lights", "The Weeknd", "After Hours", 201.0, "assets/music/sample1.mp3")
            .with_cover("assets/covers/blinding-lights.jpeg")
            .with_accent("#E13300");

        let json = serde_json::to_value(&track).unwrap();
        assert_eq!(json["url"], "assets/music/sample1.mp3");
        assert_eq!(json["color"], "#E13300");
        assert_eq!(json["duration"], 201.0);
        assert!(json.get("fallbackUrl").is_none());

        let back: Track = serde_json::from_value(json).unwrap();
        assert_eq!(back.locator, track.locator);
        assert_eq!(back.accent_color, "#E13300");
    }
}
