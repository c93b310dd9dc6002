//! Normalization of raw backend signals into player events

use crate::backend::BackendSignal;
use crate::error::Result;
use crate::events::PlayerEvent;
use crate::model::{BackendKind, Connection, PlayState, Progress};

use super::PlaybackCoordinator;

/// Volume reports closer than this to the current level are not changes
const VOLUME_EPSILON: f64 = 0.005;

impl PlaybackCoordinator {
    /// Entry point for everything a backend reports. Signals from a backend
    /// that is not currently active are only used for bookkeeping.
    pub async fn handle_signal(&self, kind: BackendKind, signal: BackendSignal) -> Result<()> {
        if kind == BackendKind::Local || self.remote.is_some() {
            self.backend(kind).observe(&signal);
        }

        match signal {
            BackendSignal::Position { current, duration } => {
                if self.state.lock().active == kind {
                    self.emit(vec![PlayerEvent::ProgressChanged(Progress::new(current, duration))]);
                }
                Ok(())
            }
            BackendSignal::Ended => {
                let relevant = {
                    let state = self.state.lock();
                    state.active == kind && state.play_state == PlayState::Playing
                };
                if relevant {
                    self.handle_track_ended().await
                } else {
                    Ok(())
                }
            }
            BackendSignal::Volume(level) => {
                self.on_volume_reported(kind, level);
                Ok(())
            }
            BackendSignal::Error(cause) => {
                self.on_backend_error(kind, cause);
                Ok(())
            }
            BackendSignal::Ready { device_id } => {
                self.on_remote_ready(device_id);
                Ok(())
            }
            BackendSignal::NotReady => {
                self.on_remote_lost();
                Ok(())
            }
        }
    }

    fn on_volume_reported(&self, kind: BackendKind, level: f64) {
        let level = crate::model::clamp_volume(level);
        let changed = {
            let mut state = self.state.lock();
            if state.take_volume_echo(kind, level) {
                false
            } else if (state.volume - level).abs() > VOLUME_EPSILON {
                state.volume = level;
                true
            } else {
                false
            }
        };
        if changed {
            self.emit(vec![PlayerEvent::VolumeChanged(level)]);
        }
    }

    fn on_backend_error(&self, kind: BackendKind, cause: String) {
        let events = {
            let mut state = self.state.lock();
            if state.active != kind || state.play_state != PlayState::Playing {
                tracing::debug!(backend = kind.name(), cause = %cause, "Ignoring error from idle backend");
                return;
            }
            state.play_state = PlayState::Stopped;
            state.loaded = None;
            vec![
                PlayerEvent::PlayStateChanged(false),
                PlayerEvent::Error {
                    track: state.current_track(),
                    cause: cause.clone(),
                },
            ]
        };
        tracing::error!(backend = kind.name(), cause = %cause, "Playback error");
        self.emit(events);
    }

    fn on_remote_ready(&self, device_id: String) {
        if self.remote.is_none() {
            tracing::warn!(device_id = %device_id, "Remote device ready but no remote backend configured");
            return;
        }
        {
            let mut state = self.state.lock();
            state.connection = Connection::RemoteConnected {
                device_id: device_id.clone(),
            };
        }
        tracing::info!(device_id = %device_id, "Remote device connected");
        self.emit(vec![PlayerEvent::ConnectionChanged {
            connected: true,
            device_id: Some(device_id),
        }]);
    }

    fn on_remote_lost(&self) {
        let events = {
            let mut state = self.state.lock();
            if !state.connection.is_connected() {
                return;
            }
            state.connection = Connection::LocalOnly;

            let mut events = Vec::new();
            if state.active == BackendKind::Remote {
                if matches!(state.loaded, Some((BackendKind::Remote, _))) {
                    state.loaded = None;
                }
                if state.play_state == PlayState::Playing {
                    state.play_state = PlayState::Paused;
                    events.push(PlayerEvent::PlayStateChanged(false));
                }
                state.active = BackendKind::Local;
            }
            events.push(PlayerEvent::ConnectionChanged {
                connected: false,
                device_id: None,
            });
            events
        };

        tracing::warn!("Remote device lost, continuing with local playback");
        self.emit(events);
    }
}
