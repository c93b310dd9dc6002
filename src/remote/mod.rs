//! Remote streaming service
//!
//! [`RemoteService`] is the seam between the player and the Spotify Web API.
//! [`SpotifyClient`] talks to the real service, [`DemoService`] serves canned
//! data when no account is available, and [`ConnectDevice`] runs the local
//! Spotify Connect receiver that remote playback is routed to.

mod connect;
mod demo;
mod spotify_client;

use async_trait::async_trait;

use crate::error::Result;
use crate::model::{PlaylistSummary, RepeatMode, SearchResults, SearchType, Track};

pub use connect::{ConnectDevice, ConnectSettings};
pub use demo::DemoService;
pub use spotify_client::SpotifyClient;

#[async_trait]
pub trait RemoteService: Send + Sync {
    /// Whether a usable access token is held
    fn is_session_valid(&self) -> bool;

    async fn search(&self, query: &str, types: &[SearchType], limit: u32) -> Result<SearchResults>;

    /// Start `uri` on `device`, or resume whatever is loaded when `uri` is `None`
    async fn play(&self, device_id: &str, uri: Option<&str>) -> Result<()>;
    async fn pause(&self, device_id: &str) -> Result<()>;
    async fn seek(&self, device_id: &str, position_ms: u32) -> Result<()>;
    async fn set_volume(&self, device_id: &str, percent: u8) -> Result<()>;
    async fn set_shuffle(&self, device_id: &str, enabled: bool) -> Result<()>;
    async fn set_repeat(&self, device_id: &str, mode: RepeatMode) -> Result<()>;

    async fn saved_tracks(&self, limit: u32) -> Result<Vec<Track>>;
    async fn user_playlists(&self, limit: u32) -> Result<Vec<PlaylistSummary>>;
    async fn playlist_tracks(&self, playlist_id: &str, limit: u32) -> Result<Vec<Track>>;

    /// Drop the session; later calls fail with `Auth`
    async fn logout(&self);
}
