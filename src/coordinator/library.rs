//! Search, playlist edits and remote library access

use std::sync::Arc;

use crate::error::{PlayerError, Result};
use crate::events::PlayerEvent;
use crate::model::{PlayState, PlaylistSummary, SearchResults, SearchType, Track};
use crate::remote::RemoteService;

use super::PlaybackCoordinator;

impl PlaybackCoordinator {
    /// Search the remote catalogue when signed in, otherwise (or when the
    /// remote search fails) the tracks in the current playlist
    pub async fn search(&self, query: &str) -> Result<SearchResults> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(SearchResults::local(Vec::new()));
        }

        if let Some(service) = self.signed_in_service() {
            match service.search(query, &SearchType::ALL, self.settings.search_limit).await {
                Ok(results) => return Ok(results),
                Err(e) if e.is_auth() => self.degrade_to_local(&e).await,
                Err(e) => tracing::warn!(query, error = %e, "Remote search failed, searching local playlist"),
            }
        }

        let matches = self.state.lock().playlist.search(query);
        tracing::debug!(query, count = matches.len(), "Local search");
        Ok(SearchResults::local(matches))
    }

    /// Replace the playlist; playback stops and the first track is selected
    pub async fn replace_playlist(&self, tracks: Vec<Track>) {
        let (was_playing, active) = {
            let mut state = self.state.lock();
            state.bump_generation();
            let was_playing = state.play_state == PlayState::Playing;
            state.playlist = tracks.clone().into();
            state.current_index = 0;
            state.play_state = PlayState::Stopped;
            state.loaded = None;
            state.announced = None;
            (was_playing, state.active)
        };
        tracing::info!(count = tracks.len(), "Playlist replaced");

        let mut events = Vec::new();
        if was_playing {
            if let Err(e) = self.backend(active).pause().await {
                tracing::debug!(error = %e, "Pausing before playlist swap failed");
            }
            events.push(PlayerEvent::PlayStateChanged(false));
        }
        events.push(PlayerEvent::PlaylistChanged(tracks));
        self.emit(events);
    }

    pub fn append_track(&self, track: Track) {
        let tracks = {
            let mut state = self.state.lock();
            state.playlist.append(track);
            state.playlist.tracks().to_vec()
        };
        self.emit(vec![PlayerEvent::PlaylistChanged(tracks)]);
    }

    /// Remove the track at `index`, keeping the current selection valid.
    /// Removing the current track stops playback; the next play starts the
    /// track that took its place.
    pub async fn remove_track(&self, index: usize) -> Result<Track> {
        let (removed, tracks, stopped_from) = {
            let mut state = self.state.lock();
            let removed = state.playlist.remove_at(index)?;
            let len = state.playlist.len();

            let mut stopped_from = None;
            if index < state.current_index {
                state.current_index -= 1;
            } else if index == state.current_index {
                state.bump_generation();
                if state.play_state == PlayState::Playing {
                    stopped_from = Some(state.active);
                }
                state.play_state = PlayState::Stopped;
                state.loaded = None;
                state.announced = None;
            }
            if state.current_index >= len {
                state.current_index = len.saturating_sub(1);
            }
            (removed, state.playlist.tracks().to_vec(), stopped_from)
        };
        tracing::debug!(index, track_id = %removed.id, "Track removed");

        let mut events = Vec::new();
        if let Some(active) = stopped_from {
            if let Err(e) = self.backend(active).pause().await {
                tracing::debug!(error = %e, "Pausing removed track failed");
            }
            events.push(PlayerEvent::PlayStateChanged(false));
        }
        events.push(PlayerEvent::PlaylistChanged(tracks));
        self.emit(events);
        Ok(removed)
    }

    pub async fn saved_tracks(&self) -> Result<Vec<Track>> {
        let service = self.require_service()?;
        let result = service.saved_tracks(self.settings.library_limit).await;
        self.check_auth(result).await
    }

    pub async fn user_playlists(&self) -> Result<Vec<PlaylistSummary>> {
        let service = self.require_service()?;
        let result = service.user_playlists(self.settings.library_limit).await;
        self.check_auth(result).await
    }

    pub async fn playlist_tracks(&self, playlist_id: &str) -> Result<Vec<Track>> {
        let service = self.require_service()?;
        let result = service.playlist_tracks(playlist_id, self.settings.library_limit).await;
        self.check_auth(result).await
    }

    fn signed_in_service(&self) -> Option<Arc<dyn RemoteService>> {
        self.service
            .as_ref()
            .filter(|service| service.is_session_valid())
            .cloned()
    }

    fn require_service(&self) -> Result<Arc<dyn RemoteService>> {
        self.signed_in_service()
            .ok_or_else(|| PlayerError::Auth("not signed in to a remote service".into()))
    }

    async fn check_auth<T>(&self, result: Result<T>) -> Result<T> {
        if let Err(e) = &result {
            if e.is_auth() {
                self.degrade_to_local(e).await;
            }
        }
        result
    }
}
