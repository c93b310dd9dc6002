//! Local playback through a platform media element

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::{PlayerError, Result};
use crate::model::{clamp_volume, BackendKind, Locator, Progress, Track};

use super::PlaybackBackend;

/// Minimal audio element contract, shaped after the browser `<audio>` API.
/// Implementations push time-update/ended/volume/error signals on their own.
#[async_trait]
pub trait MediaElement: Send + Sync {
    async fn load(&self, src: &str) -> Result<()>;
    async fn play(&self) -> Result<()>;
    fn pause(&self);
    fn current_time(&self) -> f64;
    fn set_current_time(&self, seconds: f64);
    /// `None` until the source's length is known
    fn duration(&self) -> Option<f64>;
    fn volume(&self) -> f64;
    fn set_volume(&self, level: f64);
}

pub struct LocalProvider {
    element: Arc<dyn MediaElement>,
    /// Duration from track metadata, used while the element can't tell
    duration_hint: Mutex<Option<f64>>,
}

impl LocalProvider {
    pub fn new(element: Arc<dyn MediaElement>) -> Self {
        Self {
            element,
            duration_hint: Mutex::new(None),
        }
    }

    fn duration(&self) -> Option<f64> {
        self.element
            .duration()
            .filter(|d| d.is_finite() && *d > 0.0)
            .or(*self.duration_hint.lock())
    }
}

#[async_trait]
impl PlaybackBackend for LocalProvider {
    fn kind(&self) -> BackendKind {
        BackendKind::Local
    }

    async fn load(&self, track: &Track) -> Result<()> {
        let path = match &track.locator {
            Locator::Local(path) => path,
            Locator::Remote(uri) => {
                return Err(PlayerError::load(uri, "local player cannot open remote URIs"));
            }
        };

        tracing::debug!(track_id = %track.id, path = %path, "Loading local source");
        self.element.load(path).await?;
        *self.duration_hint.lock() = (track.duration_seconds > 0.0).then_some(track.duration_seconds);
        Ok(())
    }

    async fn play(&self, track: Option<&Track>) -> Result<()> {
        if let Some(track) = track {
            self.load(track).await?;
        }
        self.element.play().await
    }

    async fn pause(&self) -> Result<()> {
        self.element.pause();
        Ok(())
    }

    async fn seek(&self, seconds: f64) -> Result<()> {
        let Some(duration) = self.duration() else {
            tracing::debug!("Ignoring seek, duration unknown");
            return Ok(());
        };
        let target = if seconds.is_finite() { seconds.clamp(0.0, duration) } else { 0.0 };
        self.element.set_current_time(target);
        Ok(())
    }

    async fn set_volume(&self, level: f64) -> Result<()> {
        self.element.set_volume(clamp_volume(level));
        Ok(())
    }

    fn position(&self) -> Progress {
        Progress::new(self.element.current_time(), self.duration().unwrap_or(0.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct StubElement {
        src: Mutex<Option<String>>,
        time: Mutex<f64>,
        duration: Mutex<Option<f64>>,
        volume: Mutex<f64>,
        playing: Mutex<bool>,
    }

    #[async_trait]
    impl MediaElement for StubElement {
        async fn load(&self, src: &str) -> Result<()> {
            *self.src.lock() = Some(src.to_string());
            *self.time.lock() = 0.0;
            Ok(())
        }

        async fn play(&self) -> Result<()> {
            if self.src.lock().is_none() {
                return Err(PlayerError::Playback("no source".into()));
            }
            *self.playing.lock() = true;
            Ok(())
        }

        fn pause(&self) {
            *self.playing.lock() = false;
        }

        fn current_time(&self) -> f64 {
            *self.time.lock()
        }

        fn set_current_time(&self, seconds: f64) {
            *self.time.lock() = seconds;
        }

        fn duration(&self) -> Option<f64> {
            *self.duration.lock()
        }

        fn volume(&self) -> f64 {
            *self.volume.lock()
        }

        fn set_volume(&self, level: f64) {
            *self.volume.lock() = level;
        }
    }

    fn provider() -> (Arc<StubElement>, LocalProvider) {
        let element = Arc::new(StubElement::default());
        let provider = LocalProvider::new(element.clone());
        (element, provider)
    }

    #[tokio::test]
    async fn refuses_remote_locators() {
        let (element, provider) = provider();
        let track = Track::new("1", "t", "a", "b", 100.0, "spotify:track:xyz");

        let err = provider.play(Some(&track)).await.unwrap_err();
        assert!(matches!(err, PlayerError::Load { .. }));
        assert!(element.src.lock().is_none());
    }

    #[tokio::test]
    async fn seek_is_noop_without_duration() {
        let (element, provider) = provider();
        *element.src.lock() = Some("x.mp3".into());
        *element.time.lock() = 12.0;

        provider.seek(40.0).await.unwrap();
        assert_eq!(element.current_time(), 12.0);
    }

    #[tokio::test]
    async fn seek_clamps_to_duration() {
        let (element, provider) = provider();
        *element.duration.lock() = Some(90.0);

        provider.seek(500.0).await.unwrap();
        assert_eq!(element.current_time(), 90.0);
        provider.seek(-3.0).await.unwrap();
        assert_eq!(element.current_time(), 0.0);
    }

    #[tokio::test]
    async fn track_duration_stands_in_for_unknown_length() {
        let (element, provider) = provider();
        let track = Track::new("1", "t", "a", "b", 120.0, "music/1.mp3");
        provider.play(Some(&track)).await.unwrap();

        provider.seek(300.0).await.unwrap();
        assert_eq!(element.current_time(), 120.0);
        assert_eq!(provider.position().percentage, 100.0);
    }

    #[tokio::test]
    async fn volume_is_clamped() {
        let (element, provider) = provider();
        provider.set_volume(3.0).await.unwrap();
        assert_eq!(element.volume(), 1.0);
    }
}
