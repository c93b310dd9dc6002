//! Spotify Web API client

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::{StreamExt, TryStreamExt};
use parking_lot::RwLock;
use rspotify::{
    model::{FullTrack, PlayableId, PlayableItem, PlaylistId, SearchResult, TrackId},
    prelude::*,
    AuthCodeSpotify, ClientError,
};

use crate::auth::{self, OAuthSettings};
use crate::error::{PlayerError, Result};
use crate::model::{
    PlaylistSummary, RepeatMode, SearchAlbum, SearchArtist, SearchResults, SearchSource, SearchType, Track,
};

use super::RemoteService;

/// Refresh when less than this many seconds of token lifetime remain
const REFRESH_MARGIN_SECS: i64 = 300;

/// Spotify API client with token refresh support
#[derive(Clone)]
pub struct SpotifyClient {
    client: Arc<AuthCodeSpotify>,
    oauth: OAuthSettings,
    refresh_token: Arc<RwLock<String>>,
    token_expires_at: Arc<RwLock<Option<DateTime<Utc>>>>,
    logged_out: Arc<AtomicBool>,
}

impl SpotifyClient {
    pub fn new(
        client: AuthCodeSpotify,
        oauth: OAuthSettings,
        refresh_token: String,
        expires_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            client: Arc::new(client),
            oauth,
            refresh_token: Arc::new(RwLock::new(refresh_token)),
            token_expires_at: Arc::new(RwLock::new(expires_at)),
            logged_out: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Shared handle for callers that need raw Web API access
    pub fn api(&self) -> Arc<AuthCodeSpotify> {
        self.client.clone()
    }

    pub fn token_needs_refresh(&self) -> bool {
        match *self.token_expires_at.read() {
            Some(exp) => (exp - Utc::now()).num_seconds() < REFRESH_MARGIN_SECS,
            None => false,
        }
    }

    pub async fn refresh_token_if_needed(&self) -> anyhow::Result<bool> {
        if self.logged_out.load(Ordering::Relaxed) || !self.token_needs_refresh() {
            return Ok(false);
        }

        let refresh_token = self.refresh_token.read().clone();
        tracing::info!("Token expiring soon, refreshing...");

        let refreshed = auth::refresh_access_token(&self.oauth, &refresh_token).await;
        crate::log_api_result!("refresh_token", refreshed);
        let (access_token, new_refresh_token, expires_at) = refreshed?;

        let token = auth::rspotify_token(access_token, expires_at);

        match self.client.token.lock().await {
            Ok(mut guard) => *guard = Some(token),
            Err(_) => anyhow::bail!("rspotify token lock poisoned"),
        }
        *self.refresh_token.write() = new_refresh_token;
        *self.token_expires_at.write() = Some(expires_at);

        tracing::info!("Token refreshed successfully");
        Ok(true)
    }

    /// Look up a Connect device id by its advertised name
    pub async fn find_device(&self, name: &str) -> Result<Option<String>> {
        self.ensure_session()?;
        let devices = self
            .client
            .device()
            .await
            .map_err(|e| classify(e.to_string(), PlayerError::Remote))?;
        let found = devices.into_iter().find(|d| d.name == name).and_then(|d| d.id);
        tracing::debug!(name, device_id = ?found, "Device lookup");
        Ok(found)
    }

    fn ensure_session(&self) -> Result<()> {
        if self.is_session_valid() {
            Ok(())
        } else {
            Err(PlayerError::Auth("no valid Spotify session".into()))
        }
    }
}

/// Map a Web API failure onto the player's error taxonomy
fn classify(message: String, otherwise: fn(String) -> PlayerError) -> PlayerError {
    let lower = message.to_lowercase();
    if message.contains("401") || lower.contains("unauthorized") {
        PlayerError::Auth(message)
    } else if message.contains("404") || lower.contains("no active device") {
        PlayerError::NotReady
    } else {
        otherwise(message)
    }
}

fn playback_error(operation: &str, err: ClientError) -> PlayerError {
    tracing::error!(operation, error = %err, "API request failed");
    classify(err.to_string(), PlayerError::Playback)
}

fn library_error(operation: &str, err: ClientError) -> PlayerError {
    tracing::error!(operation, error = %err, "API request failed");
    classify(err.to_string(), PlayerError::Remote)
}

fn track_from_full(track: &FullTrack) -> Option<Track> {
    let id = track.id.as_ref()?.id().to_string();
    let artists: Vec<&str> = track.artists.iter().map(|a| a.name.as_str()).collect();
    let mut converted = Track::new(
        id.clone(),
        track.name.clone(),
        artists.join(", "),
        track.album.name.clone(),
        track.duration.num_milliseconds() as f64 / 1000.0,
        &format!("spotify:track:{id}"),
    );
    if let Some(image) = track.album.images.first() {
        converted = converted.with_cover(image.url.clone());
    }
    if let Some(preview) = track.preview_url.as_deref() {
        converted = converted.with_fallback(preview);
    }
    Some(converted)
}

fn to_rspotify_search(kind: SearchType) -> rspotify::model::SearchType {
    match kind {
        SearchType::Track => rspotify::model::SearchType::Track,
        SearchType::Artist => rspotify::model::SearchType::Artist,
        SearchType::Album => rspotify::model::SearchType::Album,
        SearchType::Playlist => rspotify::model::SearchType::Playlist,
    }
}

fn track_id_from_uri(uri: &str) -> Result<TrackId<'static>> {
    let id = uri.rsplit(':').next().unwrap_or(uri);
    TrackId::from_id(id.to_string()).map_err(|e| PlayerError::load(uri, e.to_string()))
}

#[async_trait]
impl RemoteService for SpotifyClient {
    fn is_session_valid(&self) -> bool {
        if self.logged_out.load(Ordering::Relaxed) {
            return false;
        }
        match *self.token_expires_at.read() {
            Some(exp) => exp > Utc::now(),
            None => true,
        }
    }

    async fn search(&self, query: &str, types: &[SearchType], limit: u32) -> Result<SearchResults> {
        self.ensure_session()?;
        tracing::debug!(query, ?types, limit, "API: search");

        let requests = types.iter().map(|kind| {
            self.client
                .search(query, to_rspotify_search(*kind), None, None, Some(limit), None)
        });
        let responses = futures::future::join_all(requests).await;

        let mut results = SearchResults {
            source: SearchSource::Remote,
            ..Default::default()
        };
        let mut first_error = None;
        let mut any_ok = false;

        for response in responses {
            match response {
                Ok(SearchResult::Tracks(page)) => {
                    any_ok = true;
                    results.tracks.extend(page.items.iter().filter_map(track_from_full));
                }
                Ok(SearchResult::Albums(page)) => {
                    any_ok = true;
                    results.albums.extend(page.items.into_iter().map(|album| SearchAlbum {
                        id: album.id.as_ref().map(|id| id.id().to_string()).unwrap_or_default(),
                        artist: album.artists.first().map(|a| a.name.clone()).unwrap_or_default(),
                        cover_url: album.images.first().map(|i| i.url.clone()).unwrap_or_default(),
                        name: album.name,
                    }));
                }
                Ok(SearchResult::Artists(page)) => {
                    any_ok = true;
                    results.artists.extend(page.items.into_iter().map(|artist| SearchArtist {
                        id: artist.id.id().to_string(),
                        image_url: artist.images.first().map(|i| i.url.clone()).unwrap_or_default(),
                        name: artist.name,
                    }));
                }
                Ok(SearchResult::Playlists(page)) => {
                    any_ok = true;
                    results.playlists.extend(page.items.into_iter().map(|playlist| PlaylistSummary {
                        id: playlist.id.id().to_string(),
                        name: playlist.name,
                        description: String::new(),
                        owner: playlist
                            .owner
                            .display_name
                            .unwrap_or_else(|| playlist.owner.id.id().to_string()),
                        total_tracks: playlist.tracks.total,
                    }));
                }
                Ok(_) => any_ok = true,
                Err(e) => {
                    let err = library_error("search", e);
                    if first_error.is_none() || err.is_auth() {
                        first_error = Some(err);
                    }
                }
            }
        }

        match first_error {
            Some(err) if err.is_auth() || !any_ok => Err(err),
            _ => {
                tracing::info!(
                    query,
                    tracks = results.tracks.len(),
                    albums = results.albums.len(),
                    artists = results.artists.len(),
                    playlists = results.playlists.len(),
                    "Search completed"
                );
                Ok(results)
            }
        }
    }

    async fn play(&self, device_id: &str, uri: Option<&str>) -> Result<()> {
        self.ensure_session()?;
        tracing::debug!(device_id, uri, "API: play");
        let result = match uri {
            Some(uri) => {
                let id = track_id_from_uri(uri)?;
                self.client
                    .start_uris_playback([PlayableId::Track(id)], Some(device_id), None, None)
                    .await
            }
            None => self.client.resume_playback(Some(device_id), None).await,
        };
        crate::log_api_result!("play", result);
        result.map_err(|e| playback_error("play", e))
    }

    async fn pause(&self, device_id: &str) -> Result<()> {
        self.ensure_session()?;
        tracing::debug!(device_id, "API: pause_playback");
        self.client
            .pause_playback(Some(device_id))
            .await
            .map_err(|e| playback_error("pause", e))
    }

    async fn seek(&self, device_id: &str, position_ms: u32) -> Result<()> {
        self.ensure_session()?;
        tracing::debug!(device_id, position_ms, "API: seek_track");
        self.client
            .seek_track(chrono::Duration::milliseconds(i64::from(position_ms)), Some(device_id))
            .await
            .map_err(|e| playback_error("seek", e))
    }

    async fn set_volume(&self, device_id: &str, percent: u8) -> Result<()> {
        self.ensure_session()?;
        tracing::debug!(device_id, percent, "API: set_volume");
        self.client
            .volume(percent.min(100), Some(device_id))
            .await
            .map_err(|e| playback_error("set_volume", e))
    }

    async fn set_shuffle(&self, device_id: &str, enabled: bool) -> Result<()> {
        self.ensure_session()?;
        tracing::debug!(device_id, enabled, "API: set_shuffle");
        self.client
            .shuffle(enabled, Some(device_id))
            .await
            .map_err(|e| playback_error("set_shuffle", e))
    }

    async fn set_repeat(&self, device_id: &str, mode: RepeatMode) -> Result<()> {
        self.ensure_session()?;
        tracing::debug!(device_id, ?mode, "API: set_repeat");
        let state = match mode {
            RepeatMode::None => rspotify::model::RepeatState::Off,
            RepeatMode::All => rspotify::model::RepeatState::Context,
            RepeatMode::One => rspotify::model::RepeatState::Track,
        };
        self.client
            .repeat(state, Some(device_id))
            .await
            .map_err(|e| playback_error("set_repeat", e))
    }

    async fn saved_tracks(&self, limit: u32) -> Result<Vec<Track>> {
        self.ensure_session()?;
        let saved: Vec<_> = self
            .client
            .current_user_saved_tracks(None)
            .take(limit as usize)
            .try_collect()
            .await
            .map_err(|e| library_error("saved_tracks", e))?;

        let tracks: Vec<Track> = saved.iter().filter_map(|s| track_from_full(&s.track)).collect();
        tracing::info!(count = tracks.len(), "Loaded saved tracks");
        Ok(tracks)
    }

    async fn user_playlists(&self, limit: u32) -> Result<Vec<PlaylistSummary>> {
        self.ensure_session()?;
        let playlists: Vec<_> = self
            .client
            .current_user_playlists()
            .take(limit as usize)
            .try_collect()
            .await
            .map_err(|e| library_error("user_playlists", e))?;

        Ok(playlists
            .into_iter()
            .map(|playlist| PlaylistSummary {
                id: playlist.id.id().to_string(),
                name: playlist.name,
                description: String::new(),
                owner: playlist
                    .owner
                    .display_name
                    .unwrap_or_else(|| playlist.owner.id.id().to_string()),
                total_tracks: playlist.tracks.total,
            })
            .collect())
    }

    async fn playlist_tracks(&self, playlist_id: &str, limit: u32) -> Result<Vec<Track>> {
        self.ensure_session()?;
        let id = PlaylistId::from_id(playlist_id.to_string())
            .map_err(|e| PlayerError::Remote(format!("bad playlist id {playlist_id}: {e}")))?;

        let items: Vec<_> = self
            .client
            .playlist_items(id, None, None)
            .take(limit as usize)
            .try_collect()
            .await
            .map_err(|e| library_error("playlist_tracks", e))?;

        Ok(items
            .iter()
            .filter_map(|item| match &item.track {
                Some(PlayableItem::Track(track)) => track_from_full(track),
                _ => None,
            })
            .collect())
    }

    async fn logout(&self) {
        if self.logged_out.swap(true, Ordering::Relaxed) {
            return;
        }
        tracing::warn!("Logging out of Spotify session");
        if let Ok(mut guard) = self.client.token.lock().await {
            *guard = None;
        }
        auth::forget_refresh_token(&self.oauth);
    }
}
