//! Offline stand-in for the Spotify Web API
//!
//! Serves canned search results and library content so the library views work
//! without an account. Playback requests are accepted and ignored; since no
//! Connect device ever reports ready, audio always comes from the local
//! backend, using each track's bundled sample as its fallback.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;

use crate::error::{PlayerError, Result};
use crate::model::{
    PlaylistSummary, RepeatMode, SearchAlbum, SearchArtist, SearchResults, SearchSource, SearchType, Track,
};

use super::RemoteService;

const PLACEHOLDER: &str = "https://via.placeholder.com/300?text=";

pub struct DemoService {
    music_dir: PathBuf,
    logged_out: AtomicBool,
}

impl DemoService {
    pub fn new(music_dir: &Path) -> Self {
        tracing::warn!("Using demo mode with simulated remote service");
        Self {
            music_dir: music_dir.to_path_buf(),
            logged_out: AtomicBool::new(false),
        }
    }

    fn sample(&self, n: usize) -> String {
        self.music_dir
            .join(format!("sample{n}.mp3"))
            .to_string_lossy()
            .into_owned()
    }

    fn track(&self, id: &str, title: &str, artist: &str, album: &str, seconds: f64, cover: &str, sample: usize) -> Track {
        Track::new(id, title, artist, album, seconds, &format!("spotify:track:{id}"))
            .with_cover(format!("{PLACEHOLDER}{cover}"))
            .with_fallback(&self.sample(sample))
    }

    fn check(&self) -> Result<()> {
        if self.logged_out.load(Ordering::Relaxed) {
            Err(PlayerError::Auth("demo session ended".into()))
        } else {
            Ok(())
        }
    }

    fn saved(&self) -> Vec<Track> {
        vec![
            self.track("saved_track_1", "Blinding Lights", "The Weeknd", "After Hours", 201.0, "Blinding+Lights", 1),
            self.track(
                "saved_track_2",
                "Bad Guy",
                "Billie Eilish",
                "When We All Fall Asleep, Where Do We Go?",
                194.0,
                "Bad+Guy",
                2,
            ),
            self.track("saved_track_3", "Shape of You", "Ed Sheeran", "÷ (Divide)", 234.0, "Shape+of+You", 3),
        ]
    }
}

#[async_trait]
impl RemoteService for DemoService {
    fn is_session_valid(&self) -> bool {
        !self.logged_out.load(Ordering::Relaxed)
    }

    async fn search(&self, query: &str, types: &[SearchType], limit: u32) -> Result<SearchResults> {
        self.check()?;
        let q = query.trim();
        let cover = q.replace(' ', "+");
        let limit = limit as usize;
        let mut results = SearchResults {
            source: SearchSource::Remote,
            ..Default::default()
        };

        if types.contains(&SearchType::Track) {
            results.tracks = vec![
                self.track("track_1", &format!("{q} Hit Song"), "Popular Artist", "Greatest Hits", 210.0, &cover, 1),
                self.track("track_2", &format!("The {q} Experience"), "Indie Band", "New Album", 180.0, &format!("{cover}+2"), 4),
                self.track("track_3", &format!("{q} Remix"), "DJ Producer", "Remixes", 240.0, &format!("{cover}+Remix"), 5),
            ];
            results.tracks.truncate(limit);
        }
        if types.contains(&SearchType::Artist) {
            results.artists.push(SearchArtist {
                id: "artist_1".into(),
                name: format!("The {q} Band"),
                image_url: format!("{PLACEHOLDER}{cover}+Artist"),
            });
        }
        if types.contains(&SearchType::Album) {
            results.albums.push(SearchAlbum {
                id: "album_1".into(),
                name: format!("The {q} Album"),
                artist: "Album Artist".into(),
                cover_url: format!("{PLACEHOLDER}{cover}+Album"),
            });
        }
        if types.contains(&SearchType::Playlist) {
            results.playlists.push(PlaylistSummary {
                id: "playlist_1".into(),
                name: format!("Top {q} Playlist"),
                description: String::new(),
                owner: "Playlist Creator".into(),
                total_tracks: 3,
            });
        }

        Ok(results)
    }

    async fn play(&self, device_id: &str, uri: Option<&str>) -> Result<()> {
        self.check()?;
        tracing::debug!(device_id, uri, "Demo play ignored");
        Ok(())
    }

    async fn pause(&self, _device_id: &str) -> Result<()> {
        self.check()
    }

    async fn seek(&self, _device_id: &str, _position_ms: u32) -> Result<()> {
        self.check()
    }

    async fn set_volume(&self, _device_id: &str, _percent: u8) -> Result<()> {
        self.check()
    }

    async fn set_shuffle(&self, _device_id: &str, _enabled: bool) -> Result<()> {
        self.check()
    }

    async fn set_repeat(&self, _device_id: &str, _mode: RepeatMode) -> Result<()> {
        self.check()
    }

    async fn saved_tracks(&self, limit: u32) -> Result<Vec<Track>> {
        self.check()?;
        let mut tracks = self.saved();
        tracks.truncate(limit as usize);
        Ok(tracks)
    }

    async fn user_playlists(&self, limit: u32) -> Result<Vec<PlaylistSummary>> {
        self.check()?;
        let mut playlists = vec![
            PlaylistSummary {
                id: "demo_playlist_1".into(),
                name: "My Favorite Songs".into(),
                description: "A demo playlist".into(),
                owner: "Demo User".into(),
                total_tracks: 3,
            },
            PlaylistSummary {
                id: "demo_playlist_2".into(),
                name: "Workout Mix".into(),
                description: "Energy boosting tracks".into(),
                owner: "Demo User".into(),
                total_tracks: 3,
            },
        ];
        playlists.truncate(limit as usize);
        Ok(playlists)
    }

    async fn playlist_tracks(&self, playlist_id: &str, limit: u32) -> Result<Vec<Track>> {
        self.check()?;
        let mut tracks = match playlist_id {
            "demo_playlist_1" | "playlist_1" => self.saved(),
            "demo_playlist_2" => {
                let mut tracks = self.saved();
                tracks.reverse();
                tracks
            }
            other => return Err(PlayerError::Remote(format!("unknown playlist {other}"))),
        };
        tracks.truncate(limit as usize);
        Ok(tracks)
    }

    async fn logout(&self) {
        self.logged_out.store(true, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn search_builds_results_from_query() {
        let demo = DemoService::new(Path::new("assets/music"));
        let results = demo.search("jazz", &SearchType::ALL, 20).await.unwrap();

        let titles: Vec<_> = results.tracks.iter().map(|t| t.title.as_str()).collect();
        assert_eq!(titles, vec!["jazz Hit Song", "The jazz Experience", "jazz Remix"]);
        assert_eq!(results.artists[0].name, "The jazz Band");
        assert_eq!(results.playlists[0].name, "Top jazz Playlist");
        assert_eq!(results.source, SearchSource::Remote);
    }

    #[tokio::test]
    async fn demo_tracks_fall_back_to_local_samples() {
        let demo = DemoService::new(Path::new("assets/music"));
        let saved = demo.saved_tracks(50).await.unwrap();

        assert_eq!(saved.len(), 3);
        assert!(saved[0].is_remote());
        let local = saved[0].fallback_variant().unwrap();
        assert!(!local.is_remote());
        assert!(local.locator.as_str().ends_with("sample1.mp3"));
    }

    #[tokio::test]
    async fn logout_invalidates_session() {
        let demo = DemoService::new(Path::new("assets/music"));
        demo.logout().await;

        assert!(!demo.is_session_valid());
        assert!(demo.search("x", &SearchType::ALL, 5).await.unwrap_err().is_auth());
    }

    #[tokio::test]
    async fn unknown_playlist_is_an_error() {
        let demo = DemoService::new(Path::new("assets/music"));
        assert!(demo.playlist_tracks("nope", 10).await.is_err());
        assert_eq!(demo.playlist_tracks("demo_playlist_2", 10).await.unwrap()[0].id, "saved_track_3");
    }
}
