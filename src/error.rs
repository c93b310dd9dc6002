//! Error types shared by the playback core
//!
//! Backends, the remote service and the coordinator all report failures through
//! [`PlayerError`]. Application plumbing (startup, config, terminal) keeps using
//! `anyhow` on top of it.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PlayerError {
    /// The locator could not be prepared by the backend
    #[error("Cannot load {locator}: {reason}")]
    Load { locator: String, reason: String },

    /// The backend rejected play/pause/seek/volume
    #[error("Playback error: {0}")]
    Playback(String),

    /// Remote call issued before the device handshake completed
    #[error("Remote device is not ready")]
    NotReady,

    /// Expired or invalid remote session
    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Track index {index} out of range (playlist has {len} tracks)")]
    NotFound { index: usize, len: usize },

    /// Remote request failure outside of playback control (search, library)
    #[error("Remote service error: {0}")]
    Remote(String),
}

impl PlayerError {
    pub fn load(locator: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Load {
            locator: locator.into(),
            reason: reason.into(),
        }
    }

    pub fn is_auth(&self) -> bool {
        matches!(self, Self::Auth(_))
    }
}

pub type Result<T> = std::result::Result<T, PlayerError>;
