//! Hand-written fakes shared by the coordinator tests

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Notify;

use tunely::backend::{BackendSignal, PlaybackBackend};
use tunely::model::{BackendKind, PlaylistSummary, Progress, RepeatMode, SearchResults, SearchSource, SearchType, Track};
use tunely::remote::RemoteService;
use tunely::{EventBus, EventKind, PlaybackCoordinator, PlayerError, PlayerEvent, Result};

#[derive(Clone, Debug, PartialEq)]
pub enum Call {
    Play(Option<String>),
    Pause,
    Seek(f64),
    Volume(f64),
    Shuffle(bool),
    Repeat(RepeatMode),
}

/// Makes the next `play` wait until released
#[derive(Clone, Default)]
pub struct Gate {
    pub entered: Arc<Notify>,
    pub release: Arc<Notify>,
}

pub struct FakeBackend {
    kind: BackendKind,
    calls: Mutex<Vec<Call>>,
    play_error: Mutex<Option<PlayerError>>,
    seek_error: Mutex<Option<PlayerError>>,
    volume_error: Mutex<Option<PlayerError>>,
    position: Mutex<Progress>,
    gate: Mutex<Option<Gate>>,
}

impl FakeBackend {
    pub fn new(kind: BackendKind) -> Arc<Self> {
        Arc::new(Self {
            kind,
            calls: Mutex::new(Vec::new()),
            play_error: Mutex::new(None),
            seek_error: Mutex::new(None),
            volume_error: Mutex::new(None),
            position: Mutex::new(Progress::default()),
            gate: Mutex::new(None),
        })
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().clear();
    }

    pub fn fail_play(&self, error: PlayerError) {
        *self.play_error.lock() = Some(error);
    }

    pub fn fail_seek(&self, error: PlayerError) {
        *self.seek_error.lock() = Some(error);
    }

    pub fn fail_volume(&self, error: PlayerError) {
        *self.volume_error.lock() = Some(error);
    }

    pub fn set_position(&self, current: f64, duration: f64) {
        *self.position.lock() = Progress::new(current, duration);
    }

    /// Hold the next `play` call until `gate.release` is notified
    pub fn hold_next_play(&self) -> Gate {
        let gate = Gate::default();
        *self.gate.lock() = Some(gate.clone());
        gate
    }

    fn record(&self, call: Call) {
        self.calls.lock().push(call);
    }
}

#[async_trait]
impl PlaybackBackend for FakeBackend {
    fn kind(&self) -> BackendKind {
        self.kind
    }

    async fn load(&self, _track: &Track) -> Result<()> {
        Ok(())
    }

    async fn play(&self, track: Option<&Track>) -> Result<()> {
        self.record(Call::Play(track.map(|t| t.id.clone())));

        let gate = self.gate.lock().take();
        if let Some(gate) = gate {
            gate.entered.notify_one();
            gate.release.notified().await;
        }

        if let Some(error) = self.play_error.lock().clone() {
            return Err(error);
        }
        if let Some(track) = track {
            self.set_position(0.0, track.duration_seconds);
        }
        Ok(())
    }

    async fn pause(&self) -> Result<()> {
        self.record(Call::Pause);
        Ok(())
    }

    async fn seek(&self, seconds: f64) -> Result<()> {
        self.record(Call::Seek(seconds));
        if let Some(error) = self.seek_error.lock().clone() {
            return Err(error);
        }
        let duration = self.position.lock().duration;
        self.set_position(seconds, duration);
        Ok(())
    }

    async fn set_volume(&self, level: f64) -> Result<()> {
        self.record(Call::Volume(level));
        match self.volume_error.lock().clone() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn position(&self) -> Progress {
        *self.position.lock()
    }

    async fn set_shuffle(&self, enabled: bool) -> Result<()> {
        self.record(Call::Shuffle(enabled));
        Ok(())
    }

    async fn set_repeat(&self, mode: RepeatMode) -> Result<()> {
        self.record(Call::Repeat(mode));
        Ok(())
    }
}

/// Remote service with a configurable search outcome
pub struct FakeService {
    session_valid: AtomicBool,
    logouts: AtomicUsize,
    search_error: Mutex<Option<PlayerError>>,
    search_results: Mutex<Vec<Track>>,
}

impl FakeService {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            session_valid: AtomicBool::new(true),
            logouts: AtomicUsize::new(0),
            search_error: Mutex::new(None),
            search_results: Mutex::new(Vec::new()),
        })
    }

    pub fn logouts(&self) -> usize {
        self.logouts.load(Ordering::SeqCst)
    }

    pub fn fail_search(&self, error: PlayerError) {
        *self.search_error.lock() = Some(error);
    }

    pub fn set_search_results(&self, tracks: Vec<Track>) {
        *self.search_results.lock() = tracks;
    }
}

#[async_trait]
impl RemoteService for FakeService {
    fn is_session_valid(&self) -> bool {
        self.session_valid.load(Ordering::SeqCst)
    }

    async fn search(&self, _query: &str, _types: &[SearchType], _limit: u32) -> Result<SearchResults> {
        if let Some(error) = self.search_error.lock().clone() {
            return Err(error);
        }
        Ok(SearchResults {
            tracks: self.search_results.lock().clone(),
            source: SearchSource::Remote,
            ..Default::default()
        })
    }

    async fn play(&self, _device_id: &str, _uri: Option<&str>) -> Result<()> {
        Ok(())
    }

    async fn pause(&self, _device_id: &str) -> Result<()> {
        Ok(())
    }

    async fn seek(&self, _device_id: &str, _position_ms: u32) -> Result<()> {
        Ok(())
    }

    async fn set_volume(&self, _device_id: &str, _percent: u8) -> Result<()> {
        Ok(())
    }

    async fn set_shuffle(&self, _device_id: &str, _enabled: bool) -> Result<()> {
        Ok(())
    }

    async fn set_repeat(&self, _device_id: &str, _mode: RepeatMode) -> Result<()> {
        Ok(())
    }

    async fn saved_tracks(&self, _limit: u32) -> Result<Vec<Track>> {
        Ok(vec![remote_track("liked", 150.0)])
    }

    async fn user_playlists(&self, _limit: u32) -> Result<Vec<PlaylistSummary>> {
        Ok(Vec::new())
    }

    async fn playlist_tracks(&self, _playlist_id: &str, _limit: u32) -> Result<Vec<Track>> {
        Err(PlayerError::Auth("token expired".into()))
    }

    async fn logout(&self) {
        self.session_valid.store(false, Ordering::SeqCst);
        self.logouts.fetch_add(1, Ordering::SeqCst);
    }
}

pub fn local_track(id: &str, duration: f64) -> Track {
    Track::new(id, format!("Song {id}"), "Local Band", "Home Recordings", duration, &format!("/music/{id}.mp3"))
}

pub fn remote_track(id: &str, duration: f64) -> Track {
    Track::new(id, format!("Stream {id}"), "Remote Band", "Cloud", duration, &format!("spotify:track:{id}"))
        .with_fallback(&format!("/music/{id}.mp3"))
}

/// Record every event published on `bus`, in order
pub fn record(bus: &EventBus) -> Arc<Mutex<Vec<PlayerEvent>>> {
    let log = Arc::new(Mutex::new(Vec::new()));
    for kind in EventKind::ALL {
        let log = log.clone();
        bus.on(kind, move |event| log.lock().push(event.clone()));
    }
    log
}

pub struct Harness {
    pub coordinator: PlaybackCoordinator,
    pub local: Arc<FakeBackend>,
    pub remote: Arc<FakeBackend>,
    pub service: Arc<FakeService>,
    pub events: Arc<Mutex<Vec<PlayerEvent>>>,
}

impl Harness {
    /// Local backend only, no remote service
    pub fn local(tracks: Vec<Track>) -> Self {
        let bus = EventBus::new();
        let events = record(&bus);
        let local = FakeBackend::new(BackendKind::Local);
        let coordinator = PlaybackCoordinator::new(local.clone(), tracks, bus);
        Self {
            coordinator,
            local,
            remote: FakeBackend::new(BackendKind::Remote),
            service: FakeService::new(),
            events,
        }
    }

    /// Both backends and a signed-in service; the device is not ready yet
    pub fn with_remote(tracks: Vec<Track>) -> Self {
        let bus = EventBus::new();
        let events = record(&bus);
        let local = FakeBackend::new(BackendKind::Local);
        let remote = FakeBackend::new(BackendKind::Remote);
        let service = FakeService::new();
        let coordinator = PlaybackCoordinator::new(local.clone(), tracks, bus)
            .with_remote(remote.clone())
            .with_service(service.clone());
        Self {
            coordinator,
            local,
            remote,
            service,
            events,
        }
    }

    /// Complete the device handshake
    pub async fn connect(&self) {
        self.coordinator
            .handle_signal(
                BackendKind::Remote,
                BackendSignal::Ready {
                    device_id: "device-1".into(),
                },
            )
            .await
            .unwrap();
    }

    pub fn events(&self) -> Vec<PlayerEvent> {
        self.events.lock().clone()
    }

    pub fn clear_events(&self) {
        self.events.lock().clear();
    }
}
