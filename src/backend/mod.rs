//! Playback backends
//!
//! A backend turns a [`Track`] into audible playback. [`LocalProvider`] drives
//! a platform media element; [`RemoteProvider`] drives a Spotify Connect device
//! through the remote service. Both report raw signals through a
//! [`SignalSender`] that the coordinator drains.

mod local;
mod remote;
mod rodio_element;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::Result;
use crate::model::{BackendKind, Progress, RepeatMode, Track};

pub use local::{LocalProvider, MediaElement};
pub use remote::RemoteProvider;
pub use rodio_element::RodioElement;

/// Raw notification from a backend, before normalization
#[derive(Clone, Debug, PartialEq)]
pub enum BackendSignal {
    Position { current: f64, duration: f64 },
    Ended,
    Volume(f64),
    Error(String),
    /// Remote only: the device handshake completed
    Ready { device_id: String },
    /// Remote only: the device went away or never appeared
    NotReady,
}

pub type SignalReceiver = mpsc::UnboundedReceiver<(BackendKind, BackendSignal)>;

/// Sending half of the signal channel, tagged with the originating backend
#[derive(Clone, Debug)]
pub struct SignalSender {
    kind: BackendKind,
    tx: mpsc::UnboundedSender<(BackendKind, BackendSignal)>,
}

impl SignalSender {
    pub fn kind(&self) -> BackendKind {
        self.kind
    }

    /// Same channel, tagged as another backend
    pub fn for_kind(&self, kind: BackendKind) -> Self {
        Self {
            kind,
            tx: self.tx.clone(),
        }
    }

    pub fn send(&self, signal: BackendSignal) {
        if self.tx.send((self.kind, signal)).is_err() {
            tracing::trace!(backend = self.kind.name(), "Signal receiver dropped");
        }
    }
}

/// Create the signal channel. The returned sender is tagged `Local`; use
/// [`SignalSender::for_kind`] for the remote side.
pub fn signal_channel() -> (SignalSender, SignalReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (
        SignalSender {
            kind: BackendKind::Local,
            tx,
        },
        rx,
    )
}

#[async_trait]
pub trait PlaybackBackend: Send + Sync {
    fn kind(&self) -> BackendKind;

    /// Prepare `track` for playback. Fails with `Load` for locators this
    /// backend cannot address.
    async fn load(&self, track: &Track) -> Result<()>;

    /// Start (or resume, when `track` is `None`) playback
    async fn play(&self, track: Option<&Track>) -> Result<()>;

    async fn pause(&self) -> Result<()>;

    /// Seek to `seconds`, clamped to the known duration
    async fn seek(&self, seconds: f64) -> Result<()>;

    async fn set_volume(&self, level: f64) -> Result<()>;

    fn position(&self) -> Progress;

    /// Let the backend see its own signals before the coordinator acts on them
    fn observe(&self, _signal: &BackendSignal) {}

    async fn set_shuffle(&self, _enabled: bool) -> Result<()> {
        Ok(())
    }

    async fn set_repeat(&self, _mode: RepeatMode) -> Result<()> {
        Ok(())
    }
}
