//! Terminal UI
//!
//! The UI never reads playback state from the coordinator directly. Player
//! state in [`UiState`] is kept current by event-bus listeners installed with
//! [`UiState::attach`]; key presses are turned into coordinator operations by
//! [`UiController`].
//!
//! - `input`: key handling
//! - `view`: ratatui rendering
//! - `utils`: formatting helpers

mod input;
mod utils;
mod view;

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::events::{EventBus, EventKind, PlayerEvent};
use crate::model::{LocalPlaylist, PlaylistSummary, Progress, RepeatMode, SearchResults, Track};

pub use input::UiController;
pub use view::render;

/// Notifications disappear after this long
pub const NOTIFICATION_TTL: Duration = Duration::from_secs(5);

pub type SharedUiState = Arc<Mutex<UiState>>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Section {
    Search,
    Sidebar,
    Tracks,
}

impl Section {
    pub fn next(self) -> Self {
        match self {
            Section::Search => Section::Sidebar,
            Section::Sidebar => Section::Tracks,
            Section::Tracks => Section::Search,
        }
    }
}

/// Entry in the sidebar
#[derive(Clone, Debug, PartialEq)]
pub enum SidebarItem {
    Queue,
    SavedTracks,
    Remote(PlaylistSummary),
    Local { id: String, name: String },
}

impl SidebarItem {
    pub fn label(&self) -> String {
        match self {
            SidebarItem::Queue => "Queue".to_string(),
            SidebarItem::SavedTracks => "Liked Songs".to_string(),
            SidebarItem::Remote(summary) => summary.name.clone(),
            SidebarItem::Local { name, .. } => format!("{} (local)", name),
        }
    }
}

/// What the main pane lists
#[derive(Clone, Debug, PartialEq)]
pub enum ContentView {
    Queue,
    Search(SearchResults),
}

/// Name being typed for a local playlist
#[derive(Clone, Debug, PartialEq)]
pub struct RenameDraft {
    pub id: String,
    pub name: String,
}

#[derive(Clone, Debug)]
pub struct Notification {
    pub message: String,
    pub is_error: bool,
    created: Instant,
}

#[derive(Clone, Debug)]
pub struct UiState {
    pub playlist: Vec<Track>,
    pub current_track: Option<Track>,
    pub is_playing: bool,
    pub progress: Progress,
    pub volume: f64,
    pub shuffle: bool,
    pub repeat: RepeatMode,
    pub connected: bool,
    pub device_id: Option<String>,

    pub section: Section,
    pub content: ContentView,
    pub search_query: String,
    pub selected: usize,
    pub sidebar: Vec<SidebarItem>,
    pub sidebar_selected: usize,
    pub show_help: bool,
    pub should_quit: bool,
    pub notification: Option<Notification>,
    pub rename: Option<RenameDraft>,
    /// Local playlist the queue was loaded from
    pub queue_source: Option<String>,
}

impl UiState {
    pub fn new(playlist: Vec<Track>, volume: f64) -> Self {
        Self {
            playlist,
            current_track: None,
            is_playing: false,
            progress: Progress::default(),
            volume,
            shuffle: false,
            repeat: RepeatMode::None,
            connected: false,
            device_id: None,
            section: Section::Tracks,
            content: ContentView::Queue,
            search_query: String::new(),
            selected: 0,
            sidebar: vec![SidebarItem::Queue],
            sidebar_selected: 0,
            show_help: false,
            should_quit: false,
            notification: None,
            rename: None,
            queue_source: None,
        }
    }

    /// Register listeners that mirror every player event into `state`
    pub fn attach(state: &SharedUiState, events: &EventBus) {
        for kind in EventKind::ALL {
            let state = state.clone();
            events.on(kind, move |event| state.lock().apply(event));
        }
    }

    pub fn apply(&mut self, event: &PlayerEvent) {
        match event {
            PlayerEvent::PlayStateChanged(playing) => self.is_playing = *playing,
            PlayerEvent::TrackChanged(track) => {
                self.current_track = Some(track.clone());
                self.progress = Progress::new(0.0, track.duration_seconds);
            }
            PlayerEvent::VolumeChanged(level) => self.volume = *level,
            PlayerEvent::ProgressChanged(progress) => self.progress = *progress,
            PlayerEvent::ShuffleChanged(enabled) => self.shuffle = *enabled,
            PlayerEvent::RepeatChanged(mode) => self.repeat = *mode,
            PlayerEvent::PlaylistChanged(tracks) => {
                self.playlist = tracks.clone();
                if self.content == ContentView::Queue {
                    self.selected = self.selected.min(tracks.len().saturating_sub(1));
                }
            }
            PlayerEvent::Error { track, cause } => {
                let message = match track {
                    Some(track) => format!("Could not play \"{}\": {}", track.title, cause),
                    None => cause.clone(),
                };
                self.notify_error(message);
            }
            PlayerEvent::ConnectionChanged { connected, device_id } => {
                self.connected = *connected;
                self.device_id = device_id.clone();
                if *connected {
                    self.notify("Connected to Spotify device");
                } else {
                    self.notify("Playing locally");
                }
            }
        }
    }

    pub fn notify(&mut self, message: impl Into<String>) {
        self.notification = Some(Notification {
            message: message.into(),
            is_error: false,
            created: Instant::now(),
        });
    }

    pub fn notify_error(&mut self, message: impl Into<String>) {
        self.notification = Some(Notification {
            message: message.into(),
            is_error: true,
            created: Instant::now(),
        });
    }

    pub fn expire_notification(&mut self, now: Instant) {
        if let Some(notification) = &self.notification {
            if now.duration_since(notification.created) >= NOTIFICATION_TTL {
                self.notification = None;
            }
        }
    }

    /// Number of rows in the main pane
    pub fn content_len(&self) -> usize {
        match &self.content {
            ContentView::Queue => self.playlist.len(),
            ContentView::Search(results) => results.tracks.len(),
        }
    }

    pub fn selected_track(&self) -> Option<&Track> {
        match &self.content {
            ContentView::Queue => self.playlist.get(self.selected),
            ContentView::Search(results) => results.tracks.get(self.selected),
        }
    }

    /// Rebuild the sidebar; the selection stays on the same row when possible
    pub fn set_sidebar(&mut self, remote: Vec<PlaylistSummary>, local: &[LocalPlaylist]) {
        let mut items = vec![SidebarItem::Queue];
        if self.connected || !remote.is_empty() {
            items.push(SidebarItem::SavedTracks);
        }
        items.extend(remote.into_iter().map(SidebarItem::Remote));
        items.extend(local.iter().map(|playlist| SidebarItem::Local {
            id: playlist.id.clone(),
            name: playlist.name.clone(),
        }));
        self.sidebar_selected = self.sidebar_selected.min(items.len() - 1);
        self.sidebar = items;
    }

    pub fn move_selection(&mut self, down: bool) {
        let (index, len) = match self.section {
            Section::Sidebar => (&mut self.sidebar_selected, self.sidebar.len()),
            _ => {
                let len = self.content_len();
                (&mut self.selected, len)
            }
        };
        if len == 0 {
            *index = 0;
        } else if down {
            *index = (*index + 1).min(len - 1);
        } else {
            *index = index.saturating_sub(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track(id: &str) -> Track {
        Track::new(id, id, "Artist", "Album", 120.0, &format!("/music/{id}.mp3"))
    }

    #[test]
    fn listeners_mirror_player_events() {
        let bus = EventBus::new();
        let state: SharedUiState = Arc::new(Mutex::new(UiState::new(vec![track("a")], 0.7)));
        UiState::attach(&state, &bus);

        bus.trigger(&PlayerEvent::TrackChanged(track("a")));
        bus.trigger(&PlayerEvent::PlayStateChanged(true));
        bus.trigger(&PlayerEvent::VolumeChanged(0.3));
        bus.trigger(&PlayerEvent::RepeatChanged(RepeatMode::All));

        let state = state.lock();
        assert_eq!(state.current_track.as_ref().map(|t| t.id.as_str()), Some("a"));
        assert!(state.is_playing);
        assert_eq!(state.volume, 0.3);
        assert_eq!(state.repeat, RepeatMode::All);
    }

    #[test]
    fn error_event_raises_notification_that_expires() {
        let mut state = UiState::new(Vec::new(), 0.7);
        state.apply(&PlayerEvent::Error {
            track: Some(track("a")),
            cause: "boom".into(),
        });
        let notification = state.notification.clone().unwrap();
        assert!(notification.is_error);
        assert!(notification.message.contains("boom"));

        state.expire_notification(Instant::now());
        assert!(state.notification.is_some());
        state.expire_notification(Instant::now() + NOTIFICATION_TTL);
        assert!(state.notification.is_none());
    }

    #[test]
    fn shrinking_playlist_keeps_selection_in_range() {
        let mut state = UiState::new(vec![track("a"), track("b"), track("c")], 0.7);
        state.selected = 2;
        state.apply(&PlayerEvent::PlaylistChanged(vec![track("a")]));
        assert_eq!(state.selected, 0);
    }

    #[test]
    fn selection_stops_at_list_edges() {
        let mut state = UiState::new(vec![track("a"), track("b")], 0.7);
        state.move_selection(false);
        assert_eq!(state.selected, 0);
        state.move_selection(true);
        state.move_selection(true);
        assert_eq!(state.selected, 1);
    }
}
