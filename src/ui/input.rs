//! Key event handling
//!
//! Coordinator operations run on spawned tasks so a slow remote request never
//! blocks drawing. The UI state lock is never held while calling into the
//! coordinator, since its listeners take the same lock.

use std::future::Future;
use std::sync::Arc;

use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use parking_lot::Mutex;

use crate::coordinator::PlaybackCoordinator;
use crate::error::PlayerError;
use crate::model::{PlaylistStore, PlaylistSummary, PlaylistUpdate, Track};

use super::{ContentView, RenameDraft, Section, SharedUiState, SidebarItem};

const VOLUME_STEP: f64 = 0.05;
const SEEK_STEP: f64 = 5.0;

#[derive(Clone)]
pub struct UiController {
    coordinator: PlaybackCoordinator,
    state: SharedUiState,
    store: Arc<Mutex<PlaylistStore>>,
}

impl UiController {
    pub fn new(coordinator: PlaybackCoordinator, state: SharedUiState, store: PlaylistStore) -> Self {
        Self {
            coordinator,
            state,
            store: Arc::new(Mutex::new(store)),
        }
    }

    pub fn should_quit(&self) -> bool {
        self.state.lock().should_quit
    }

    pub fn handle_key_event(&self, key: KeyEvent) {
        if key.kind != KeyEventKind::Press {
            return;
        }

        let (section, show_help, renaming) = {
            let state = self.state.lock();
            (state.section, state.show_help, state.rename.is_some())
        };

        if renaming {
            self.handle_rename_key(key);
            return;
        }

        if show_help {
            if matches!(key.code, KeyCode::Esc | KeyCode::Char('?')) {
                self.state.lock().show_help = false;
            }
            return;
        }

        if section == Section::Search {
            self.handle_search_key(key);
            return;
        }

        match key.code {
            KeyCode::Char('q') | KeyCode::Char('Q') => self.state.lock().should_quit = true,
            KeyCode::Char('?') => self.state.lock().show_help = true,
            KeyCode::Tab => {
                let mut state = self.state.lock();
                state.section = state.section.next();
            }
            KeyCode::Char('/') => self.state.lock().section = Section::Search,
            KeyCode::Esc => {
                let mut state = self.state.lock();
                state.notification = None;
                if state.content != ContentView::Queue {
                    state.content = ContentView::Queue;
                    state.selected = 0;
                }
            }
            KeyCode::Up => self.state.lock().move_selection(false),
            KeyCode::Down => self.state.lock().move_selection(true),
            KeyCode::Enter if section == Section::Sidebar => self.open_sidebar_item(),
            KeyCode::Char('e') | KeyCode::Char('E') if section == Section::Sidebar => self.start_rename(),
            KeyCode::Enter => self.play_selected(),
            KeyCode::Char(' ') => self.run("toggle_play", |c| async move { c.toggle_play().await }),
            KeyCode::Char('n') | KeyCode::Char('N') => self.run("next", |c| async move { c.next().await }),
            KeyCode::Char('p') | KeyCode::Char('P') => {
                self.run("previous", |c| async move { c.previous().await })
            }
            KeyCode::Char('s') | KeyCode::Char('S') => self.run("shuffle", |c| async move {
                c.toggle_shuffle().await;
                Ok(())
            }),
            KeyCode::Char('r') | KeyCode::Char('R') => self.run("repeat", |c| async move {
                c.toggle_repeat().await;
                Ok(())
            }),
            KeyCode::Char('+') | KeyCode::Char('=') => self.change_volume(VOLUME_STEP),
            KeyCode::Char('-') => self.change_volume(-VOLUME_STEP),
            KeyCode::Left => self.seek_by(-SEEK_STEP),
            KeyCode::Right => self.seek_by(SEEK_STEP),
            KeyCode::Char('a') | KeyCode::Char('A') => self.queue_selected(),
            KeyCode::Char('d') | KeyCode::Char('D') | KeyCode::Delete => self.remove_selected(),
            KeyCode::Char('w') | KeyCode::Char('W') => self.save_queue(),
            KeyCode::Char('x') | KeyCode::Char('X') => self.remove_from_saved_playlist(),
            _ => {}
        }
    }

    fn handle_search_key(&self, key: KeyEvent) {
        let mut state = self.state.lock();
        match key.code {
            KeyCode::Tab => state.section = state.section.next(),
            KeyCode::Esc => {
                state.search_query.clear();
                state.section = Section::Tracks;
            }
            KeyCode::Backspace => {
                state.search_query.pop();
            }
            KeyCode::Enter => {
                let query = state.search_query.trim().to_string();
                drop(state);
                if !query.is_empty() {
                    self.search(query);
                }
            }
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                state.should_quit = true;
            }
            KeyCode::Char(c) => state.search_query.push(c),
            _ => {}
        }
    }

    fn handle_rename_key(&self, key: KeyEvent) {
        let mut state = self.state.lock();
        match key.code {
            KeyCode::Esc => state.rename = None,
            KeyCode::Backspace => {
                if let Some(draft) = state.rename.as_mut() {
                    draft.name.pop();
                }
            }
            KeyCode::Enter => {
                let draft = state.rename.take();
                drop(state);
                if let Some(draft) = draft {
                    self.finish_rename(draft);
                }
            }
            KeyCode::Char(c) => {
                if let Some(draft) = state.rename.as_mut() {
                    draft.name.push(c);
                }
            }
            _ => {}
        }
    }

    /// Start editing the name of the selected local playlist
    fn start_rename(&self) {
        let mut state = self.state.lock();
        if let Some(SidebarItem::Local { id, name }) = state.sidebar.get(state.sidebar_selected).cloned() {
            state.rename = Some(RenameDraft { id, name });
        }
    }

    fn finish_rename(&self, draft: RenameDraft) {
        let result = rename_playlist(&mut self.store.lock(), &draft.id, &draft.name);
        match result {
            Ok(()) => {
                tracing::info!(id = %draft.id, name = %draft.name, "Renamed local playlist");
                self.refresh_sidebar(None);
                self.state.lock().notify(format!("Renamed to \"{}\"", draft.name.trim()));
            }
            Err(e) => {
                tracing::warn!(error = %e, "Renaming playlist failed");
                self.state.lock().notify_error(format!("Could not rename playlist: {}", e));
            }
        }
    }

    /// Spawn a coordinator operation. Playback failures reach the user
    /// through `onError`; only errors the coordinator does not announce are
    /// turned into notifications here.
    fn run<F, Fut>(&self, operation: &'static str, f: F)
    where
        F: FnOnce(PlaybackCoordinator) -> Fut,
        Fut: Future<Output = crate::error::Result<()>> + Send + 'static,
    {
        let task = f(self.coordinator.clone());
        let state = self.state.clone();
        tokio::spawn(async move {
            if let Err(e) = task.await {
                tracing::debug!(operation, error = %e, "Operation failed");
                if matches!(e, PlayerError::NotFound { .. } | PlayerError::NotReady) {
                    state.lock().notify_error(e.to_string());
                }
            }
        });
    }

    fn change_volume(&self, delta: f64) {
        let level = self.state.lock().volume + delta;
        self.run("set_volume", move |c| async move { c.set_volume(level).await });
    }

    fn seek_by(&self, delta: f64) {
        let target = {
            let state = self.state.lock();
            let target = (state.progress.current_time + delta).max(0.0);
            if state.progress.duration > 0.0 {
                target.min(state.progress.duration)
            } else {
                target
            }
        };
        self.run("seek", move |c| async move { c.seek(target).await });
    }

    fn play_selected(&self) {
        let (content, selected) = {
            let state = self.state.lock();
            (state.content.clone(), state.selected)
        };
        match content {
            ContentView::Queue => self.run("play", move |c| async move { c.play(Some(selected)).await }),
            ContentView::Search(results) => {
                let Some(track) = results.tracks.get(selected).cloned() else {
                    return;
                };
                self.run("play_result", move |c| async move {
                    let index = c.playlist().iter().position(|t| t.id == track.id);
                    let index = match index {
                        Some(index) => index,
                        None => {
                            c.append_track(track);
                            c.playlist().len() - 1
                        }
                    };
                    c.play(Some(index)).await
                });
            }
        }
    }

    fn queue_selected(&self) {
        let track = {
            let state = self.state.lock();
            match &state.content {
                ContentView::Search(_) => state.selected_track().cloned(),
                ContentView::Queue => None,
            }
        };
        if let Some(track) = track {
            let title = track.title.clone();
            self.coordinator.append_track(track);
            self.state.lock().notify(format!("Added \"{}\" to the queue", title));
        }
    }

    fn remove_selected(&self) {
        let selected = {
            let state = self.state.lock();
            if state.content != ContentView::Queue {
                return;
            }
            state.selected
        };
        self.run("remove_track", move |c| async move { c.remove_track(selected).await.map(|_| ()) });
    }

    fn search(&self, query: String) {
        let controller = self.clone();
        tokio::spawn(async move {
            match controller.coordinator.search(&query).await {
                Ok(results) => {
                    let mut state = controller.state.lock();
                    if results.is_empty() {
                        state.notify(format!("No results for \"{}\"", query));
                    }
                    state.content = ContentView::Search(results);
                    state.selected = 0;
                    state.section = Section::Tracks;
                }
                Err(e) => controller.state.lock().notify_error(format!("Search failed: {}", e)),
            }
        });
    }

    fn open_sidebar_item(&self) {
        let item = {
            let state = self.state.lock();
            state.sidebar.get(state.sidebar_selected).cloned()
        };
        let Some(item) = item else {
            return;
        };

        match item {
            SidebarItem::Queue => {
                let mut state = self.state.lock();
                state.content = ContentView::Queue;
                state.section = Section::Tracks;
            }
            SidebarItem::SavedTracks => {
                self.load_tracks("Liked Songs".to_string(), None, |c| async move { c.saved_tracks().await })
            }
            SidebarItem::Remote(summary) => {
                let id = summary.id.clone();
                self.load_tracks(summary.name, None, move |c| async move { c.playlist_tracks(&id).await });
            }
            SidebarItem::Local { id, name } => {
                let tracks = self.store.lock().get(&id).map(|p| p.track_list.clone());
                match tracks {
                    Some(tracks) => self.load_tracks(name, Some(id), move |_| async move { Ok(tracks) }),
                    None => self.state.lock().notify_error(format!("Playlist \"{}\" no longer exists", name)),
                }
            }
        }
    }

    /// Fetch a track list and make it the queue. `source` names the local
    /// playlist it came from.
    fn load_tracks<F, Fut>(&self, name: String, source: Option<String>, fetch: F)
    where
        F: FnOnce(PlaybackCoordinator) -> Fut,
        Fut: Future<Output = crate::error::Result<Vec<Track>>> + Send + 'static,
    {
        let task = fetch(self.coordinator.clone());
        let controller = self.clone();
        tokio::spawn(async move {
            match task.await {
                Ok(tracks) => {
                    let count = tracks.len();
                    controller.coordinator.replace_playlist(tracks).await;
                    let mut state = controller.state.lock();
                    state.content = ContentView::Queue;
                    state.selected = 0;
                    state.section = Section::Tracks;
                    state.queue_source = source;
                    state.notify(format!("Loaded {} ({} tracks)", name, count));
                }
                Err(e) => controller.state.lock().notify_error(format!("Could not load {}: {}", name, e)),
            }
        });
    }

    fn save_queue(&self) {
        let tracks = self.coordinator.playlist();
        if tracks.is_empty() {
            self.state.lock().notify_error("The queue is empty");
            return;
        }
        let name = format!("Queue {}", chrono::Local::now().format("%Y-%m-%d %H:%M"));

        let result = save_tracks(&mut self.store.lock(), &name, tracks);

        match result {
            Ok(id) => {
                tracing::info!(name = %name, "Saved queue as local playlist");
                self.refresh_sidebar(None);
                let mut state = self.state.lock();
                state.queue_source = Some(id);
                state.notify(format!("Saved \"{}\"", name));
            }
            Err(e) => {
                tracing::warn!(error = %e, "Saving queue failed");
                self.state.lock().notify_error(format!("Could not save playlist: {}", e));
            }
        }
    }

    /// Drop the selected queue entry from the local playlist the queue was
    /// loaded from, and from the queue
    fn remove_from_saved_playlist(&self) {
        let (source, track, selected) = {
            let state = self.state.lock();
            if state.content != ContentView::Queue {
                return;
            }
            (state.queue_source.clone(), state.selected_track().cloned(), state.selected)
        };
        let Some(track) = track else {
            return;
        };
        let Some(source) = source else {
            self.state.lock().notify_error("The queue was not loaded from a local playlist");
            return;
        };

        let result = remove_from_playlist(&mut self.store.lock(), &source, &track.id);
        match result {
            Ok(true) => {
                tracing::info!(playlist = %source, track_id = %track.id, "Removed track from local playlist");
                self.run("remove_track", move |c| async move { c.remove_track(selected).await.map(|_| ()) });
                self.state.lock().notify(format!("Removed \"{}\" from the playlist", track.title));
            }
            Ok(false) => self.state.lock().notify_error(format!("\"{}\" is not in that playlist", track.title)),
            Err(e) => {
                tracing::warn!(error = %e, "Removing track from playlist failed");
                self.state.lock().notify_error(format!("Could not update playlist: {}", e));
            }
        }
    }

    /// Rebuild the sidebar. `remote` replaces the remote playlists when given;
    /// otherwise the ones already shown are kept.
    fn refresh_sidebar(&self, remote: Option<Vec<PlaylistSummary>>) {
        let store = self.store.lock();
        let mut state = self.state.lock();
        let remote = remote.unwrap_or_else(|| {
            state
                .sidebar
                .iter()
                .filter_map(|item| match item {
                    SidebarItem::Remote(summary) => Some(summary.clone()),
                    _ => None,
                })
                .collect()
        });
        state.set_sidebar(remote, store.list());
    }

    /// Populate the sidebar with local playlists and, when signed in, the
    /// user's remote playlists
    pub async fn load_library(&self) {
        let remote = match self.coordinator.user_playlists().await {
            Ok(playlists) => playlists,
            Err(e) => {
                tracing::debug!(error = %e, "Remote playlists unavailable");
                Vec::new()
            }
        };
        self.refresh_sidebar(Some(remote));
    }
}

/// Store `tracks` as a new local playlist and return its id
fn save_tracks(store: &mut PlaylistStore, name: &str, tracks: Vec<Track>) -> anyhow::Result<String> {
    let id = store.create(name, "Saved from the queue", false)?.id.clone();
    for track in tracks {
        store.add_track(&id, track)?;
    }
    Ok(id)
}

/// Remove the first entry for `track_id` from a stored playlist; `false` when
/// the playlist does not contain it
fn remove_from_playlist(store: &mut PlaylistStore, id: &str, track_id: &str) -> anyhow::Result<bool> {
    let position = store
        .get(id)
        .and_then(|playlist| playlist.track_list.iter().position(|t| t.id == track_id));
    match position {
        Some(index) => store.remove_track(id, index),
        None => Ok(false),
    }
}

fn rename_playlist(store: &mut PlaylistStore, id: &str, name: &str) -> anyhow::Result<()> {
    let update = PlaylistUpdate {
        name: Some(name.to_string()),
        ..Default::default()
    };
    store.update(id, update)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track(id: &str) -> Track {
        Track::new(id, id, "Artist", "Album", 120.0, &format!("/music/{id}.mp3"))
    }

    #[test]
    fn saved_queue_can_be_renamed() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = PlaylistStore::open(dir.path());
        let id = save_tracks(&mut store, "Queue", vec![track("a"), track("b")]).unwrap();

        rename_playlist(&mut store, &id, "Evening mix").unwrap();
        assert!(rename_playlist(&mut store, &id, "  ").is_err());

        let store = PlaylistStore::open(dir.path());
        let playlist = store.get(&id).unwrap();
        assert_eq!(playlist.name, "Evening mix");
        assert_eq!(playlist.tracks, 2);
    }

    #[test]
    fn track_is_removed_from_its_saved_playlist() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = PlaylistStore::open(dir.path());
        let id = save_tracks(&mut store, "Queue", vec![track("a"), track("b"), track("c")]).unwrap();

        assert!(remove_from_playlist(&mut store, &id, "b").unwrap());
        assert!(!remove_from_playlist(&mut store, &id, "b").unwrap());

        let store = PlaylistStore::open(dir.path());
        let ids: Vec<_> = store.get(&id).unwrap().track_list.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "c"]);
    }

    #[test]
    fn renaming_unknown_playlist_fails() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = PlaylistStore::open(dir.path());
        assert!(rename_playlist(&mut store, "local_1", "Name").is_err());
    }
}
