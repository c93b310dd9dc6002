//! Transport controls and the remote-to-local fallback chain

use crate::error::{PlayerError, Result};
use crate::events::PlayerEvent;
use crate::model::{clamp_volume, BackendKind, PlayState, RepeatMode, Track};

use super::{PlaybackCoordinator, PlaybackState};

/// One step of the fallback chain
#[derive(Clone, Debug)]
struct PlaybackAttempt {
    backend: BackendKind,
    track: Track,
    /// Load the track first instead of resuming what the backend holds
    reload: bool,
}

struct StartRequest {
    generation: u64,
    track: Track,
    was_playing: bool,
    attempts: Vec<PlaybackAttempt>,
}

enum Outcome {
    Started,
    Failed,
    Superseded,
}

impl PlaybackCoordinator {
    /// Start playback, selecting `index` first when given
    pub async fn play(&self, index: Option<usize>) -> Result<()> {
        let (request, events) = {
            let mut state = self.state.lock();
            let target = state.checked_index(index.unwrap_or(state.current_index))?;
            state.current_index = target;
            self.prepare_start(&mut state, index.is_some())?
        };
        self.emit(events);
        self.run_attempts(request).await
    }

    pub async fn pause(&self) -> Result<()> {
        let active = {
            let mut state = self.state.lock();
            if state.play_state != PlayState::Playing {
                return Ok(());
            }
            state.bump_generation();
            state.play_state = PlayState::Paused;
            state.active
        };
        self.emit(vec![PlayerEvent::PlayStateChanged(false)]);

        match self.backend(active).pause().await {
            Ok(()) => Ok(()),
            Err(e) if active == BackendKind::Remote => {
                tracing::warn!(error = %e, "Remote pause failed, pausing local player");
                if e.is_auth() {
                    self.degrade_to_local(&e).await;
                }
                if let Err(e) = self.local.pause().await {
                    tracing::debug!(error = %e, "Local pause failed");
                }
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    pub async fn toggle_play(&self) -> Result<()> {
        if self.is_playing() {
            self.pause().await
        } else {
            self.play(None).await
        }
    }

    pub async fn next(&self) -> Result<()> {
        let (request, events) = {
            let mut state = self.state.lock();
            let len = state.playlist.len();
            if len == 0 {
                return Err(PlayerError::NotFound { index: 0, len });
            }
            state.current_index = (state.current_index + 1) % len;
            tracing::debug!(index = state.current_index, "Next track");
            self.prepare_start(&mut state, true)?
        };
        self.emit(events);
        self.run_attempts(request).await
    }

    /// Restart the current track when past the restart threshold, otherwise
    /// step back one track
    pub async fn previous(&self) -> Result<()> {
        let active = {
            let state = self.state.lock();
            if state.playlist.is_empty() {
                return Err(PlayerError::NotFound { index: 0, len: 0 });
            }
            state.active
        };

        let position = self.backend(active).position().current_time;
        if position > self.settings.restart_threshold {
            tracing::debug!(position, "Restarting current track");
            return self.seek(0.0).await;
        }

        let (request, events) = {
            let mut state = self.state.lock();
            let len = state.playlist.len();
            if len == 0 {
                return Err(PlayerError::NotFound { index: 0, len });
            }
            state.current_index = (state.current_index + len - 1) % len;
            tracing::debug!(index = state.current_index, "Previous track");
            self.prepare_start(&mut state, true)?
        };
        self.emit(events);
        self.run_attempts(request).await
    }

    pub async fn seek(&self, seconds: f64) -> Result<()> {
        let active = self.state.lock().active;
        let mut backend = self.backend(active);

        if let Err(e) = backend.seek(seconds).await {
            if active != BackendKind::Remote {
                return Err(e);
            }
            tracing::warn!(error = %e, seconds, "Remote seek failed, seeking local player");
            if e.is_auth() {
                self.degrade_to_local(&e).await;
            }
            backend = &self.local;
            backend.seek(seconds).await?;
        }

        self.emit(vec![PlayerEvent::ProgressChanged(backend.position())]);
        Ok(())
    }

    /// Clamp and apply a volume level; local output always follows, the
    /// remote device too while connected
    pub async fn set_volume(&self, level: f64) -> Result<()> {
        let level = clamp_volume(level);
        let connected = {
            let mut state = self.state.lock();
            state.volume = level;
            let connected = state.connection.is_connected() && self.remote.is_some();
            if connected {
                state.expect_volume_echo(BackendKind::Remote, level);
            }
            state.expect_volume_echo(BackendKind::Local, level);
            connected
        };

        if connected {
            if let Some(remote) = &self.remote {
                if let Err(e) = remote.set_volume(level).await {
                    tracing::warn!(error = %e, level, "Remote volume change failed");
                    if e.is_auth() {
                        self.degrade_to_local(&e).await;
                    }
                }
            }
        }
        if let Err(e) = self.local.set_volume(level).await {
            tracing::warn!(error = %e, level, "Local volume change failed");
        }

        self.emit(vec![PlayerEvent::VolumeChanged(level)]);
        Ok(())
    }

    pub async fn toggle_shuffle(&self) -> bool {
        let (enabled, connected) = {
            let mut state = self.state.lock();
            state.shuffled = !state.shuffled;
            (state.shuffled, state.connection.is_connected())
        };
        self.emit(vec![PlayerEvent::ShuffleChanged(enabled)]);

        if connected {
            if let Some(remote) = &self.remote {
                if let Err(e) = remote.set_shuffle(enabled).await {
                    tracing::warn!(error = %e, enabled, "Could not mirror shuffle to remote device");
                }
            }
        }
        enabled
    }

    pub async fn toggle_repeat(&self) -> RepeatMode {
        let (mode, connected) = {
            let mut state = self.state.lock();
            state.repeat = state.repeat.next();
            (state.repeat, state.connection.is_connected())
        };
        self.emit(vec![PlayerEvent::RepeatChanged(mode)]);

        if connected {
            if let Some(remote) = &self.remote {
                if let Err(e) = remote.set_repeat(mode).await {
                    tracing::warn!(error = %e, ?mode, "Could not mirror repeat to remote device");
                }
            }
        }
        mode
    }

    /// The active backend finished the current track
    pub(crate) async fn handle_track_ended(&self) -> Result<()> {
        let (repeat, is_last) = {
            let mut state = self.state.lock();
            // The finished source can't be resumed.
            state.loaded = None;
            (state.repeat, state.current_index + 1 >= state.playlist.len())
        };
        tracing::debug!(?repeat, is_last, "Track ended");

        match repeat {
            RepeatMode::One => {
                if let Err(e) = self.seek(0.0).await {
                    tracing::debug!(error = %e, "Rewind before repeat failed");
                }
                self.play(None).await
            }
            RepeatMode::All => self.next().await,
            RepeatMode::None if !is_last => self.next().await,
            RepeatMode::None => {
                self.pause().await?;
                self.seek(0.0).await
            }
        }
    }

    /// Bump the generation and build the attempt list for the current track.
    /// `force_reload` is set when the caller picked a track explicitly.
    fn prepare_start(
        &self,
        state: &mut PlaybackState,
        force_reload: bool,
    ) -> Result<(StartRequest, Vec<PlayerEvent>)> {
        let track = state.current_track().ok_or(PlayerError::NotFound {
            index: state.current_index,
            len: state.playlist.len(),
        })?;
        let generation = state.bump_generation();

        let primary = self.choose_backend(&state.connection, &track);
        let holds_track = state.loaded.as_ref() == Some(&(primary, track.id.clone()));
        let mut attempts = vec![PlaybackAttempt {
            backend: primary,
            track: track.clone(),
            reload: force_reload || !holds_track,
        }];
        if let Some(variant) = track.fallback_variant() {
            attempts.push(PlaybackAttempt {
                backend: BackendKind::Local,
                track: variant,
                reload: true,
            });
        }

        let mut events = Vec::new();
        if force_reload || state.announced.as_deref() != Some(track.id.as_str()) {
            state.announced = Some(track.id.clone());
            events.push(PlayerEvent::TrackChanged(track.clone()));
        }

        tracing::debug!(
            track_id = %track.id,
            generation,
            backend = primary.name(),
            attempts = attempts.len(),
            "Starting playback"
        );

        let request = StartRequest {
            generation,
            track,
            was_playing: state.play_state == PlayState::Playing,
            attempts,
        };
        Ok((request, events))
    }

    async fn run_attempts(&self, request: StartRequest) -> Result<()> {
        let mut last_error = None;

        for attempt in &request.attempts {
            let previous = {
                let mut state = self.state.lock();
                if state.generation != request.generation {
                    return Ok(());
                }
                std::mem::replace(&mut state.active, attempt.backend)
            };
            if previous != attempt.backend {
                if let Err(e) = self.backend(previous).pause().await {
                    tracing::debug!(backend = previous.name(), error = %e, "Pausing previous backend failed");
                }
            }

            let backend = self.backend(attempt.backend);
            let result = if attempt.reload {
                backend.play(Some(&attempt.track)).await
            } else {
                backend.play(None).await
            };

            match self.settle(&request, attempt, &result) {
                Outcome::Started => {
                    tracing::info!(
                        track_id = %attempt.track.id,
                        backend = attempt.backend.name(),
                        "Playback started"
                    );
                    self.emit(vec![PlayerEvent::PlayStateChanged(true)]);
                    return Ok(());
                }
                Outcome::Superseded => {
                    tracing::debug!(generation = request.generation, "Discarding superseded playback result");
                    if result.is_ok() {
                        self.settle_superseded(attempt).await;
                    }
                    return Ok(());
                }
                Outcome::Failed => {}
            }

            if let Err(e) = result {
                tracing::warn!(
                    track_id = %attempt.track.id,
                    backend = attempt.backend.name(),
                    error = %e,
                    "Playback attempt failed"
                );
                if e.is_auth() {
                    self.degrade_to_local(&e).await;
                }
                last_error = Some(e);
            }
        }

        let error = last_error.unwrap_or_else(|| PlayerError::Playback("no playback attempt made".into()));
        let events = {
            let mut state = self.state.lock();
            if state.generation != request.generation {
                return Ok(());
            }
            state.play_state = PlayState::Stopped;
            state.loaded = None;

            let mut events = Vec::new();
            if request.was_playing {
                events.push(PlayerEvent::PlayStateChanged(false));
            }
            events.push(PlayerEvent::Error {
                track: Some(request.track.clone()),
                cause: error.to_string(),
            });
            events
        };

        tracing::error!(track_id = %request.track.id, error = %error, "All playback attempts failed");
        self.emit(events);
        Err(error)
    }

    /// Record the result of one attempt unless a newer request superseded it
    fn settle(&self, request: &StartRequest, attempt: &PlaybackAttempt, result: &Result<()>) -> Outcome {
        let mut state = self.state.lock();
        if state.generation != request.generation {
            return Outcome::Superseded;
        }
        match result {
            Ok(()) => {
                state.play_state = PlayState::Playing;
                state.loaded = Some((attempt.backend, attempt.track.id.clone()));
                Outcome::Started
            }
            Err(_) => {
                if matches!(&state.loaded, Some((kind, _)) if *kind == attempt.backend) {
                    state.loaded = None;
                }
                Outcome::Failed
            }
        }
    }

    /// A superseded request may still have started audio. Silence it when
    /// the newer request plays elsewhere; when the newer request already
    /// started a different track on the same backend, start that track again
    /// so the late call does not leave the backend on the old one.
    async fn settle_superseded(&self, attempt: &PlaybackAttempt) {
        enum Action {
            Silence,
            Restart(Track),
            Keep,
        }

        let kind = attempt.backend;
        let action = {
            let state = self.state.lock();
            if state.active != kind || state.play_state != PlayState::Playing {
                Action::Silence
            } else {
                match (&state.loaded, state.current_track()) {
                    (Some((loaded_kind, loaded_id)), Some(current))
                        if *loaded_kind == kind && *loaded_id != attempt.track.id && attempt.reload =>
                    {
                        Action::Restart(current)
                    }
                    _ => Action::Keep,
                }
            }
        };

        match action {
            Action::Silence => {
                if let Err(e) = self.backend(kind).pause().await {
                    tracing::debug!(backend = kind.name(), error = %e, "Silencing superseded playback failed");
                }
            }
            Action::Restart(current) => {
                tracing::debug!(backend = kind.name(), track_id = %current.id, "Restarting current track after late start");
                if let Err(e) = self.backend(kind).play(Some(&current)).await {
                    tracing::warn!(backend = kind.name(), error = %e, "Restarting current track failed");
                }
            }
            Action::Keep => {}
        }
    }
}
