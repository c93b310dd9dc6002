//! Model module - data types shared by the coordinator, backends and UI
//!
//! - `types`: playback enums and progress
//! - `track`: track metadata and locators
//! - `playlist`: ordered navigation list
//! - `content`: search and library results
//! - `samples`: built-in sample tracks
//! - `store`: on-disk local playlists

mod types;
mod track;
mod playlist;
mod content;
mod samples;
mod store;

pub use types::{clamp_volume, BackendKind, Connection, PlayState, Progress, RepeatMode};
pub use track::{Locator, Track};
pub use playlist::Playlist;
pub use content::{PlaylistSummary, SearchAlbum, SearchArtist, SearchResults, SearchSource, SearchType};
pub use samples::sample_tracks;
pub use store::{LocalPlaylist, PlaylistStore, PlaylistUpdate};
