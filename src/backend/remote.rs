//! Remote playback on a Spotify Connect device

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};

use crate::error::{PlayerError, Result};
use crate::model::{clamp_volume, BackendKind, Locator, Progress, RepeatMode, Track};
use crate::remote::RemoteService;

use super::{BackendSignal, PlaybackBackend};

/// Last reported device position, advanced locally while playing since the
/// device only reports on state changes
#[derive(Clone, Copy, Debug)]
struct PlaybackTiming {
    position: f64,
    duration: f64,
    last_update: Instant,
    is_playing: bool,
}

impl Default for PlaybackTiming {
    fn default() -> Self {
        Self {
            position: 0.0,
            duration: 0.0,
            last_update: Instant::now(),
            is_playing: false,
        }
    }
}

impl PlaybackTiming {
    fn position_at(&self, now: Instant) -> f64 {
        if self.is_playing && self.duration > 0.0 {
            let elapsed = now.saturating_duration_since(self.last_update).as_secs_f64();
            (self.position + elapsed).min(self.duration)
        } else {
            self.position
        }
    }

    fn progress_at(&self, now: Instant) -> Progress {
        Progress::new(self.position_at(now), self.duration)
    }

    fn set_position(&mut self, position: f64, now: Instant) {
        self.position = position;
        self.last_update = now;
    }

    fn set_playing(&mut self, is_playing: bool, now: Instant) {
        let position = self.position_at(now);
        self.set_position(position, now);
        self.is_playing = is_playing;
    }
}

pub struct RemoteProvider {
    service: Arc<dyn RemoteService>,
    device_id: RwLock<Option<String>>,
    /// URI recorded by `load`, started by the next `play`
    pending_uri: Mutex<Option<String>>,
    timing: Mutex<PlaybackTiming>,
}

impl RemoteProvider {
    pub fn new(service: Arc<dyn RemoteService>) -> Self {
        Self {
            service,
            device_id: RwLock::new(None),
            pending_uri: Mutex::new(None),
            timing: Mutex::new(PlaybackTiming::default()),
        }
    }

    pub fn device_id(&self) -> Option<String> {
        self.device_id.read().clone()
    }

    fn device(&self) -> Result<String> {
        self.device_id.read().clone().ok_or(PlayerError::NotReady)
    }
}

#[async_trait]
impl PlaybackBackend for RemoteProvider {
    fn kind(&self) -> BackendKind {
        BackendKind::Remote
    }

    async fn load(&self, track: &Track) -> Result<()> {
        match &track.locator {
            Locator::Remote(uri) => {
                *self.pending_uri.lock() = Some(uri.clone());
                *self.timing.lock() = PlaybackTiming {
                    duration: track.duration_seconds.max(0.0),
                    ..Default::default()
                };
                Ok(())
            }
            Locator::Local(path) => Err(PlayerError::load(path, "remote device cannot open local files")),
        }
    }

    async fn play(&self, track: Option<&Track>) -> Result<()> {
        let device = self.device()?;
        if let Some(track) = track {
            self.load(track).await?;
        }
        let uri = self.pending_uri.lock().take();

        tracing::debug!(device_id = %device, uri = ?uri, "Remote play");
        let result = self.service.play(&device, uri.as_deref()).await;
        match &result {
            Ok(()) => self.timing.lock().set_playing(true, Instant::now()),
            Err(_) => {
                // Keep the URI so a retry starts the same track rather than resuming.
                if let Some(uri) = uri {
                    self.pending_uri.lock().get_or_insert(uri);
                }
            }
        }
        result
    }

    async fn pause(&self) -> Result<()> {
        let device = self.device()?;
        self.service.pause(&device).await?;
        self.timing.lock().set_playing(false, Instant::now());
        Ok(())
    }

    async fn seek(&self, seconds: f64) -> Result<()> {
        let device = self.device()?;
        let duration = self.timing.lock().duration;
        if duration <= 0.0 {
            tracing::debug!("Ignoring remote seek, duration unknown");
            return Ok(());
        }
        let target = if seconds.is_finite() { seconds.clamp(0.0, duration) } else { 0.0 };
        self.service.seek(&device, (target * 1000.0).round() as u32).await?;
        self.timing.lock().set_position(target, Instant::now());
        Ok(())
    }

    async fn set_volume(&self, level: f64) -> Result<()> {
        let device = self.device()?;
        let percent = (clamp_volume(level) * 100.0).round() as u8;
        self.service.set_volume(&device, percent).await
    }

    fn position(&self) -> Progress {
        self.timing.lock().progress_at(Instant::now())
    }

    fn observe(&self, signal: &BackendSignal) {
        match signal {
            BackendSignal::Ready { device_id } => {
                *self.device_id.write() = Some(device_id.clone());
            }
            BackendSignal::NotReady => {
                *self.device_id.write() = None;
            }
            BackendSignal::Position { current, duration } => {
                let mut timing = self.timing.lock();
                if *duration > 0.0 {
                    timing.duration = *duration;
                }
                timing.set_position(current.max(0.0), Instant::now());
            }
            BackendSignal::Ended => {
                let mut timing = self.timing.lock();
                timing.is_playing = false;
                let duration = timing.duration;
                timing.set_position(duration, Instant::now());
            }
            _ => {}
        }
    }

    async fn set_shuffle(&self, enabled: bool) -> Result<()> {
        let device = self.device()?;
        self.service.set_shuffle(&device, enabled).await
    }

    async fn set_repeat(&self, mode: RepeatMode) -> Result<()> {
        let device = self.device()?;
        self.service.set_repeat(&device, mode).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use crate::model::{PlaylistSummary, SearchResults, SearchType};

    #[derive(Default)]
    struct RecordingService {
        calls: Mutex<Vec<String>>,
    }

    impl RecordingService {
        fn calls(&self) -> Vec<String> {
            self.calls.lock().clone()
        }
    }

    #[async_trait]
    impl RemoteService for RecordingService {
        fn is_session_valid(&self) -> bool {
            true
        }

        async fn search(&self, _query: &str, _types: &[SearchType], _limit: u32) -> Result<SearchResults> {
            Ok(SearchResults::default())
        }

        async fn play(&self, device_id: &str, uri: Option<&str>) -> Result<()> {
            self.calls.lock().push(format!("play {device_id} {}", uri.unwrap_or("-")));
            Ok(())
        }

        async fn pause(&self, device_id: &str) -> Result<()> {
            self.calls.lock().push(format!("pause {device_id}"));
            Ok(())
        }

        async fn seek(&self, _device_id: &str, position_ms: u32) -> Result<()> {
            self.calls.lock().push(format!("seek {position_ms}"));
            Ok(())
        }

        async fn set_volume(&self, _device_id: &str, percent: u8) -> Result<()> {
            self.calls.lock().push(format!("volume {percent}"));
            Ok(())
        }

        async fn set_shuffle(&self, _device_id: &str, enabled: bool) -> Result<()> {
            self.calls.lock().push(format!("shuffle {enabled}"));
            Ok(())
        }

        async fn set_repeat(&self, _device_id: &str, mode: RepeatMode) -> Result<()> {
            self.calls.lock().push(format!("repeat {}", mode.label()));
            Ok(())
        }

        async fn saved_tracks(&self, _limit: u32) -> Result<Vec<Track>> {
            Ok(Vec::new())
        }

        async fn user_playlists(&self, _limit: u32) -> Result<Vec<PlaylistSummary>> {
            Ok(Vec::new())
        }

        async fn playlist_tracks(&self, _playlist_id: &str, _limit: u32) -> Result<Vec<Track>> {
            Ok(Vec::new())
        }

        async fn logout(&self) {}
    }

    fn ready_provider() -> (Arc<RecordingService>, RemoteProvider) {
        let service = Arc::new(RecordingService::default());
        let provider = RemoteProvider::new(service.clone());
        provider.observe(&BackendSignal::Ready {
            device_id: "dev-1".into(),
        });
        (service, provider)
    }

    fn remote_track() -> Track {
        Track::new("7", "Song", "Artist", "Album", 200.0, "spotify:track:abc")
    }

    #[tokio::test]
    async fn calls_before_handshake_are_not_ready() {
        let provider = RemoteProvider::new(Arc::new(RecordingService::default()));
        assert_eq!(provider.play(Some(&remote_track())).await, Err(PlayerError::NotReady));
        assert_eq!(provider.pause().await, Err(PlayerError::NotReady));
    }

    #[tokio::test]
    async fn play_starts_loaded_uri_once_then_resumes() {
        let (service, provider) = ready_provider();

        provider.play(Some(&remote_track())).await.unwrap();
        provider.pause().await.unwrap();
        provider.play(None).await.unwrap();

        assert_eq!(
            service.calls(),
            vec!["play dev-1 spotify:track:abc", "pause dev-1", "play dev-1 -"]
        );
    }

    #[tokio::test]
    async fn refuses_local_files() {
        let (_, provider) = ready_provider();
        let track = Track::new("1", "t", "a", "b", 10.0, "music/1.mp3");
        assert!(matches!(provider.load(&track).await, Err(PlayerError::Load { .. })));
    }

    #[tokio::test]
    async fn seek_clamps_and_converts_to_millis() {
        let (service, provider) = ready_provider();
        provider.load(&remote_track()).await.unwrap();

        provider.seek(500.0).await.unwrap();
        provider.seek(12.5).await.unwrap();

        assert_eq!(service.calls(), vec!["seek 200000", "seek 12500"]);
        assert_eq!(provider.position().current_time, 12.5);
    }

    #[tokio::test]
    async fn volume_is_sent_as_percent() {
        let (service, provider) = ready_provider();
        provider.set_volume(0.456).await.unwrap();
        assert_eq!(service.calls(), vec!["volume 46"]);
    }

    #[tokio::test]
    async fn not_ready_forgets_device() {
        let (_, provider) = ready_provider();
        assert_eq!(provider.device_id().as_deref(), Some("dev-1"));

        provider.observe(&BackendSignal::NotReady);
        assert_eq!(provider.device_id(), None);
        assert_eq!(provider.set_shuffle(true).await, Err(PlayerError::NotReady));
    }

    #[tokio::test]
    async fn position_advances_while_playing() {
        let (_, provider) = ready_provider();
        provider.play(Some(&remote_track())).await.unwrap();

        let later = Instant::now() + Duration::from_secs(10);
        let progress = provider.timing.lock().progress_at(later);
        assert!(progress.current_time >= 10.0 && progress.current_time < 11.0);

        let past_end = Instant::now() + Duration::from_secs(500);
        assert_eq!(provider.timing.lock().position_at(past_end), 200.0);
    }

    #[tokio::test]
    async fn position_holds_while_paused() {
        let (_, provider) = ready_provider();
        provider.play(Some(&remote_track())).await.unwrap();
        provider.observe(&BackendSignal::Position {
            current: 42.0,
            duration: 200.0,
        });
        provider.pause().await.unwrap();

        let paused_at = provider.position().current_time;
        let later = Instant::now() + Duration::from_secs(30);
        assert_eq!(provider.timing.lock().position_at(later), paused_at);
        assert!(paused_at >= 42.0 && paused_at < 43.0);
    }

    #[tokio::test]
    async fn position_signals_update_progress() {
        let (_, provider) = ready_provider();
        provider.observe(&BackendSignal::Position {
            current: 30.0,
            duration: 120.0,
        });
        assert_eq!(provider.position().percentage, 25.0);
    }
}
