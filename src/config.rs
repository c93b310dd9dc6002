//! Command-line arguments and the TOML configuration file
//!
//! Settings are resolved in this order, later sources winning:
//! 1. Built-in defaults
//! 2. `tunely.toml` (or the file given with `--config`)
//! 3. Command-line flags and their environment variables

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use serde::Deserialize;

use crate::coordinator::CoordinatorSettings;
use crate::model::clamp_volume;
use crate::remote::ConnectSettings;

const DEFAULT_CONFIG_FILE: &str = "tunely.toml";

/// Command-line arguments
#[derive(Parser, Debug, Default)]
#[command(name = "tunely")]
#[command(about = "Terminal music player with Spotify Connect playback")]
#[command(version)]
pub struct Args {
    /// Path to the TOML configuration file
    #[arg(short, long, env = "TUNELY_CONFIG")]
    pub config: Option<PathBuf>,

    /// Skip Spotify sign-in and play local files only
    #[arg(long, env = "TUNELY_LOCAL_ONLY")]
    pub local_only: bool,

    /// Use the built-in demo catalogue instead of Spotify
    #[arg(long, env = "TUNELY_DEMO")]
    pub demo: bool,

    /// Initial volume between 0.0 and 1.0
    #[arg(long, env = "TUNELY_VOLUME")]
    pub volume: Option<f64>,

    /// Directory holding the sample audio files
    #[arg(long, env = "TUNELY_MUSIC_DIR")]
    pub music_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    pub volume: f64,
    /// Seconds into a track after which "previous" restarts it
    pub restart_threshold: f64,
    pub music_dir: PathBuf,
    /// Start with the built-in sample tracks
    pub load_samples: bool,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            volume: 0.7,
            restart_threshold: 3.0,
            music_dir: PathBuf::from("assets/music"),
            load_samples: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    pub enabled: bool,
    /// Fall back to the demo catalogue when sign-in fails
    pub demo_fallback: bool,
    pub client_id: String,
    pub redirect_uri: String,
    pub device_name: String,
    pub handshake_attempts: u32,
    pub handshake_interval_ms: u64,
    pub search_limit: u32,
    pub library_limit: u32,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            demo_fallback: true,
            client_id: "492e1e45ea814fa3ac555fe1576aaf5b".to_string(),
            redirect_uri: "http://127.0.0.1:8898/login".to_string(),
            device_name: "Tunely".to_string(),
            handshake_attempts: 10,
            handshake_interval_ms: 1000,
            search_limit: 20,
            library_limit: 50,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub cache_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            cache_dir: PathBuf::from(".cache"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub dir: PathBuf,
    /// Filter used when `RUST_LOG` is unset
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from(".logs"),
            filter: "tunely=debug,librespot=info,rspotify=info,warn".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub player: PlayerConfig,
    pub remote: RemoteConfig,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
}

/// How the remote side should be brought up
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RemoteMode {
    Disabled,
    Demo,
    Spotify,
}

impl AppConfig {
    /// Load the configuration file named by `args` (or the default file) and
    /// apply command-line overrides. A missing default file yields defaults;
    /// a missing file passed explicitly is an error.
    pub fn load(args: &Args) -> Result<Self> {
        let mut config = match &args.config {
            Some(path) => Self::from_file(path)?,
            None => {
                let path = Path::new(DEFAULT_CONFIG_FILE);
                if path.exists() {
                    Self::from_file(path)?
                } else {
                    Self::default()
                }
            }
        };
        config.apply_args(args);
        config.validate();
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("Invalid config file {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    fn apply_args(&mut self, args: &Args) {
        if args.local_only {
            self.remote.enabled = false;
        }
        if let Some(volume) = args.volume {
            self.player.volume = volume;
        }
        if let Some(dir) = &args.music_dir {
            self.player.music_dir = dir.clone();
        }
        if args.demo {
            self.remote.enabled = true;
            self.remote.demo_fallback = true;
        }
    }

    fn validate(&mut self) {
        self.player.volume = clamp_volume(self.player.volume);
        if !self.player.restart_threshold.is_finite() || self.player.restart_threshold < 0.0 {
            self.player.restart_threshold = PlayerConfig::default().restart_threshold;
        }
        self.remote.handshake_attempts = self.remote.handshake_attempts.max(1);
        self.remote.search_limit = self.remote.search_limit.clamp(1, 50);
        self.remote.library_limit = self.remote.library_limit.max(1);
    }

    pub fn remote_mode(&self, args: &Args) -> RemoteMode {
        if !self.remote.enabled {
            RemoteMode::Disabled
        } else if args.demo {
            RemoteMode::Demo
        } else {
            RemoteMode::Spotify
        }
    }

    pub fn coordinator_settings(&self) -> CoordinatorSettings {
        CoordinatorSettings {
            restart_threshold: self.player.restart_threshold,
            search_limit: self.remote.search_limit,
            library_limit: self.remote.library_limit,
        }
    }

    pub fn connect_settings(&self) -> ConnectSettings {
        ConnectSettings {
            device_name: self.remote.device_name.clone(),
            handshake_attempts: self.remote.handshake_attempts,
            handshake_interval: Duration::from_millis(self.remote.handshake_interval_ms),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let config = AppConfig::parse("").unwrap();
        assert_eq!(config.player.volume, 0.7);
        assert_eq!(config.player.restart_threshold, 3.0);
        assert_eq!(config.storage.cache_dir, PathBuf::from(".cache"));
        assert!(config.remote.enabled);
    }

    #[test]
    fn sections_override_defaults() {
        let config = AppConfig::parse(
            r#"
            [player]
            volume = 0.4
            music_dir = "/srv/music"

            [remote]
            device_name = "Kitchen"
            handshake_attempts = 3

            [logging]
            dir = "/tmp/tunely-logs"
            "#,
        )
        .unwrap();

        assert_eq!(config.player.volume, 0.4);
        assert_eq!(config.player.music_dir, PathBuf::from("/srv/music"));
        assert!(config.player.load_samples);
        assert_eq!(config.remote.device_name, "Kitchen");
        assert_eq!(config.remote.handshake_attempts, 3);
        assert_eq!(config.remote.search_limit, 20);
        assert_eq!(config.logging.dir, PathBuf::from("/tmp/tunely-logs"));
    }

    #[test]
    fn bad_toml_is_an_error() {
        assert!(AppConfig::parse("[player\nvolume = ").is_err());
    }

    #[test]
    fn flags_override_file_and_values_are_validated() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tunely.toml");
        std::fs::write(&path, "[player]\nvolume = 0.2\n[remote]\nhandshake_attempts = 0\n").unwrap();

        let args = Args {
            config: Some(path),
            local_only: true,
            volume: Some(4.0),
            ..Default::default()
        };
        let config = AppConfig::load(&args).unwrap();

        assert_eq!(config.player.volume, 1.0);
        assert_eq!(config.remote.handshake_attempts, 1);
        assert_eq!(config.remote_mode(&args), RemoteMode::Disabled);
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let args = Args {
            config: Some(PathBuf::from("/definitely/not/here.toml")),
            ..Default::default()
        };
        assert!(AppConfig::load(&args).is_err());
    }

    #[test]
    fn demo_flag_selects_demo_mode() {
        let args = Args {
            demo: true,
            ..Default::default()
        };
        let mut config = AppConfig::default();
        config.apply_args(&args);
        assert_eq!(config.remote_mode(&args), RemoteMode::Demo);
    }
}
