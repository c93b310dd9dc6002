//! Coordinator module - canonical playback state and backend mediation
//!
//! [`PlaybackCoordinator`] owns the playlist and playback state, picks a
//! backend for every operation, falls back from remote to local playback and
//! republishes normalized events on the [`EventBus`]. It is organized into
//! submodules by responsibility:
//!
//! - `playback`: transport controls and the fallback chain
//! - `signals`: backend signal handling
//! - `library`: search, playlist edits and remote library access
//!
//! The state lock is synchronous and is never held across an `.await` or
//! while listeners run.

mod library;
mod playback;
mod signals;

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::backend::{BackendSignal, PlaybackBackend};
use crate::error::{PlayerError, Result};
use crate::events::{EventBus, PlayerEvent};
use crate::model::{BackendKind, Connection, PlayState, Playlist, Progress, RepeatMode, Track};
use crate::remote::RemoteService;

#[derive(Clone, Debug)]
pub struct CoordinatorSettings {
    /// `previous()` restarts the current track when past this many seconds
    pub restart_threshold: f64,
    pub search_limit: u32,
    pub library_limit: u32,
}

impl Default for CoordinatorSettings {
    fn default() -> Self {
        Self {
            restart_threshold: 3.0,
            search_limit: 20,
            library_limit: 50,
        }
    }
}

pub(crate) struct PlaybackState {
    pub(crate) playlist: Playlist,
    pub(crate) current_index: usize,
    pub(crate) play_state: PlayState,
    pub(crate) volume: f64,
    pub(crate) shuffled: bool,
    pub(crate) repeat: RepeatMode,
    pub(crate) connection: Connection,
    /// Backend that produces (or last produced) audio
    pub(crate) active: BackendKind,
    /// Which backend holds which track, ready to resume
    pub(crate) loaded: Option<(BackendKind, String)>,
    /// Last track announced through `TrackChanged`
    pub(crate) announced: Option<String>,
    /// Bumped by every play/next/previous/pause
    pub(crate) generation: u64,
    /// Volume levels sent to a backend whose echo has not come back yet
    pub(crate) pending_volumes: VecDeque<(BackendKind, f64)>,
}

/// Echoed levels may come back rounded to whole percent
const ECHO_TOLERANCE: f64 = 0.01;
const MAX_PENDING_VOLUMES: usize = 16;

impl PlaybackState {
    fn new(tracks: Vec<Track>) -> Self {
        Self {
            playlist: Playlist::new(tracks),
            current_index: 0,
            play_state: PlayState::Stopped,
            volume: 0.7,
            shuffled: false,
            repeat: RepeatMode::None,
            connection: Connection::LocalOnly,
            active: BackendKind::Local,
            loaded: None,
            announced: None,
            generation: 0,
            pending_volumes: VecDeque::new(),
        }
    }

    pub(crate) fn current_track(&self) -> Option<Track> {
        self.playlist.get(self.current_index).cloned()
    }

    /// Select `index`, failing on an empty playlist or out-of-range index
    pub(crate) fn checked_index(&self, index: usize) -> Result<usize> {
        let len = self.playlist.len();
        if index < len {
            Ok(index)
        } else {
            Err(PlayerError::NotFound { index, len })
        }
    }

    pub(crate) fn expect_volume_echo(&mut self, kind: BackendKind, level: f64) {
        if self.pending_volumes.len() == MAX_PENDING_VOLUMES {
            self.pending_volumes.pop_front();
        }
        self.pending_volumes.push_back((kind, level));
    }

    /// Consume the echo of a level sent to `kind`, along with any older
    /// levels sent to it that were overtaken
    pub(crate) fn take_volume_echo(&mut self, kind: BackendKind, level: f64) -> bool {
        let found = self
            .pending_volumes
            .iter()
            .position(|&(k, sent)| k == kind && (sent - level).abs() <= ECHO_TOLERANCE);
        let Some(found) = found else {
            return false;
        };
        let mut index = 0;
        self.pending_volumes.retain(|&(k, _)| {
            let keep = k != kind || index > found;
            index += 1;
            keep
        });
        true
    }

    pub(crate) fn bump_generation(&mut self) -> u64 {
        self.generation += 1;
        self.generation
    }
}

/// Cloneable handle to the playback core
#[derive(Clone)]
pub struct PlaybackCoordinator {
    pub(crate) state: Arc<Mutex<PlaybackState>>,
    pub(crate) local: Arc<dyn PlaybackBackend>,
    pub(crate) remote: Option<Arc<dyn PlaybackBackend>>,
    pub(crate) service: Option<Arc<dyn RemoteService>>,
    pub(crate) events: EventBus,
    pub(crate) settings: CoordinatorSettings,
}

impl PlaybackCoordinator {
    pub fn new(local: Arc<dyn PlaybackBackend>, playlist: Vec<Track>, events: EventBus) -> Self {
        Self {
            state: Arc::new(Mutex::new(PlaybackState::new(playlist))),
            local,
            remote: None,
            service: None,
            events,
            settings: CoordinatorSettings::default(),
        }
    }

    /// Attach the remote backend used once a Connect device is ready
    pub fn with_remote(mut self, remote: Arc<dyn PlaybackBackend>) -> Self {
        self.remote = Some(remote);
        self
    }

    /// Attach the remote service used for search, library and logout
    pub fn with_service(mut self, service: Arc<dyn RemoteService>) -> Self {
        self.service = Some(service);
        self
    }

    pub fn with_settings(mut self, settings: CoordinatorSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn current_track(&self) -> Option<Track> {
        self.state.lock().current_track()
    }

    pub fn current_index(&self) -> usize {
        self.state.lock().current_index
    }

    pub fn is_playing(&self) -> bool {
        self.state.lock().play_state == PlayState::Playing
    }

    pub fn play_state(&self) -> PlayState {
        self.state.lock().play_state
    }

    pub fn volume(&self) -> f64 {
        self.state.lock().volume
    }

    pub fn is_shuffled(&self) -> bool {
        self.state.lock().shuffled
    }

    pub fn repeat_mode(&self) -> RepeatMode {
        self.state.lock().repeat
    }

    pub fn connection(&self) -> Connection {
        self.state.lock().connection.clone()
    }

    pub fn active_backend(&self) -> BackendKind {
        self.state.lock().active
    }

    pub fn playlist(&self) -> Vec<Track> {
        self.state.lock().playlist.tracks().to_vec()
    }

    pub fn progress(&self) -> Progress {
        let active = self.state.lock().active;
        self.backend(active).position()
    }

    pub(crate) fn backend(&self, kind: BackendKind) -> &Arc<dyn PlaybackBackend> {
        match (kind, &self.remote) {
            (BackendKind::Remote, Some(remote)) => remote,
            _ => &self.local,
        }
    }

    /// Backend for `track` under `connection`: remote only when a device is
    /// ready and the track is remote-addressable
    pub(crate) fn choose_backend(&self, connection: &Connection, track: &Track) -> BackendKind {
        if self.remote.is_some() && connection.is_connected() && track.is_remote() {
            BackendKind::Remote
        } else {
            BackendKind::Local
        }
    }

    pub(crate) fn emit(&self, events: Vec<PlayerEvent>) {
        for event in events {
            self.events.trigger(&event);
        }
    }

    /// Drop the remote session after an authentication failure and fall back
    /// to local-only playback
    pub(crate) async fn degrade_to_local(&self, cause: &PlayerError) {
        tracing::warn!(error = %cause, "Remote session rejected, continuing with local playback");

        if let Some(service) = &self.service {
            service.logout().await;
        }
        if let Some(remote) = &self.remote {
            remote.observe(&BackendSignal::NotReady);
        }

        {
            let mut state = self.state.lock();
            state.connection = Connection::LocalOnly;
            if matches!(state.loaded, Some((BackendKind::Remote, _))) {
                state.loaded = None;
            }
        }

        self.emit(vec![PlayerEvent::ConnectionChanged {
            connected: false,
            device_id: None,
        }]);
    }
}
