//! Flat JSON store for playlists created in the player

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::track::Track;

const STORE_FILE: &str = "user_playlists.json";
const LOCAL_ID_PREFIX: &str = "local_";

/// A playlist kept on disk rather than on the remote service
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalPlaylist {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_public")]
    pub public: bool,
    #[serde(default)]
    pub collaborative: bool,
    /// Number of entries in `track_list`
    #[serde(default)]
    pub tracks: usize,
    #[serde(default)]
    pub track_list: Vec<Track>,
    #[serde(default)]
    pub is_remote: bool,
    pub created_at: DateTime<Utc>,
}

fn default_public() -> bool {
    true
}

/// Editable fields of a stored playlist
#[derive(Clone, Debug, Default)]
pub struct PlaylistUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub public: Option<bool>,
}

pub struct PlaylistStore {
    path: PathBuf,
    playlists: Vec<LocalPlaylist>,
}

impl PlaylistStore {
    /// Open the store under `cache_dir`. A missing file yields an empty store;
    /// an unreadable one is logged and treated as empty.
    pub fn open(cache_dir: &Path) -> Self {
        let path = cache_dir.join(STORE_FILE);
        let playlists = match fs::read_to_string(&path) {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(playlists) => playlists,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Ignoring corrupt playlist store");
                    Vec::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Could not read playlist store");
                Vec::new()
            }
        };

        tracing::debug!(count = playlists.len(), "Loaded local playlists");
        Self { path, playlists }
    }

    pub fn save(&self) -> Result<()> {
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir)
                .with_context(|| format!("creating {}", dir.display()))?;
        }
        let content = serde_json::to_string_pretty(&self.playlists)?;
        fs::write(&self.path, content)
            .with_context(|| format!("writing {}", self.path.display()))?;
        Ok(())
    }

    pub fn list(&self) -> &[LocalPlaylist] {
        &self.playlists
    }

    pub fn get(&self, id: &str) -> Option<&LocalPlaylist> {
        self.playlists.iter().find(|p| p.id == id)
    }

    /// Create a playlist at the top of the list and persist it
    pub fn create(&mut self, name: &str, description: &str, public: bool) -> Result<&LocalPlaylist> {
        let name = name.trim();
        if name.is_empty() {
            bail!("playlist name cannot be empty");
        }

        let now = Utc::now();
        let playlist = LocalPlaylist {
            id: self.fresh_id(now.timestamp_millis()),
            name: name.to_string(),
            description: description.to_string(),
            public,
            collaborative: false,
            tracks: 0,
            track_list: Vec::new(),
            is_remote: false,
            created_at: now,
        };

        self.playlists.insert(0, playlist);
        self.save()?;
        Ok(&self.playlists[0])
    }

    pub fn update(&mut self, id: &str, update: PlaylistUpdate) -> Result<()> {
        let playlist = self.get_mut(id)?;
        if let Some(name) = update.name {
            if name.trim().is_empty() {
                bail!("playlist name cannot be empty");
            }
            playlist.name = name.trim().to_string();
        }
        if let Some(description) = update.description {
            playlist.description = description;
        }
        if let Some(public) = update.public {
            playlist.public = public;
        }
        self.save()
    }

    pub fn add_track(&mut self, id: &str, track: Track) -> Result<()> {
        let playlist = self.get_mut(id)?;
        playlist.track_list.push(track);
        playlist.tracks = playlist.track_list.len();
        self.save()
    }

    /// Returns `false` when the index is out of range
    pub fn remove_track(&mut self, id: &str, index: usize) -> Result<bool> {
        let playlist = self.get_mut(id)?;
        if index >= playlist.track_list.len() {
            return Ok(false);
        }
        playlist.track_list.remove(index);
        playlist.tracks = playlist.track_list.len();
        self.save()?;
        Ok(true)
    }

    fn get_mut(&mut self, id: &str) -> Result<&mut LocalPlaylist> {
        self.playlists
            .iter_mut()
            .find(|p| p.id == id)
            .with_context(|| format!("no local playlist with id {id}"))
    }

    fn fresh_id(&self, mut millis: i64) -> String {
        loop {
            let id = format!("{LOCAL_ID_PREFIX}{millis}");
            if self.get(&id).is_none() {
                return id;
            }
            millis += 1;
        }
    }
}
