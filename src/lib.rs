//! Tunely - a terminal music player that plays through a Spotify Connect
//! device when one is available and through the local audio output otherwise.
//!
//! The heart of the crate is the [`PlaybackCoordinator`], which owns the
//! playback state, routes every operation to a [`backend`] and publishes
//! normalized [`PlayerEvent`]s on an [`EventBus`].

pub mod auth;
pub mod backend;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod events;
pub mod logging;
pub mod model;
pub mod remote;
pub mod ui;

pub use coordinator::{CoordinatorSettings, PlaybackCoordinator};
pub use error::{PlayerError, Result};
pub use events::{EventBus, EventKind, ListenerId, PlayerEvent};
