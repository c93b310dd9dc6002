//! Spotify Connect receiver backing the remote provider
//!
//! Runs a librespot session, player and Spirc so this machine shows up as a
//! Connect device. librespot player events are translated into remote backend
//! signals, and a handshake task waits for the device to appear in the Web API
//! device list before announcing it ready.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use anyhow::{Context, Result};
use librespot::connect::{ConnectConfig, Spirc};
use librespot::core::config::SessionConfig;
use librespot::core::session::Session;
use librespot::playback::config::{AudioFormat, Bitrate, PlayerConfig};
use librespot::playback::mixer::{MixerConfig, NoOpVolume};
use librespot::playback::player::{Player, PlayerEvent, PlayerEventChannel};
use librespot::playback::{audio_backend, mixer};

use crate::auth::AuthResult;
use crate::backend::{BackendSignal, SignalSender};

use super::SpotifyClient;

/// How often librespot reports the playback position while playing
const POSITION_UPDATE_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Clone, Debug)]
pub struct ConnectSettings {
    pub device_name: String,
    pub handshake_attempts: u32,
    pub handshake_interval: Duration,
}

pub struct ConnectDevice {
    session: Session,
    spirc: Spirc,
    _player: Arc<Player>,
    device_name: String,
}

impl ConnectDevice {
    /// Start the Connect receiver and begin forwarding its events as remote
    /// signals. Readiness is reported separately by [`ConnectDevice::announce`].
    pub async fn start(auth: AuthResult, settings: &ConnectSettings, signals: SignalSender) -> Result<Self> {
        tracing::info!(device = %settings.device_name, "Connecting librespot");

        let session_config = SessionConfig {
            device_id: device_id(&settings.device_name),
            ..Default::default()
        };
        let player_config = PlayerConfig {
            bitrate: Bitrate::Bitrate320,
            position_update_interval: Some(POSITION_UPDATE_INTERVAL),
            ..Default::default()
        };
        let connect_config = ConnectConfig {
            name: settings.device_name.clone(),
            ..Default::default()
        };
        let audio_format = AudioFormat::default();
        let sink_builder = audio_backend::find(None).context("No librespot audio sink available")?;
        let mixer_builder = mixer::find(None).context("No librespot mixer available")?;

        let session = Session::new(session_config, Some(auth.cache));
        let mixer = mixer_builder(MixerConfig::default()).context("Failed to open mixer")?;

        let player = Player::new(
            player_config,
            session.clone(),
            Box::new(NoOpVolume),
            move || sink_builder(None, audio_format),
        );
        let events = player.get_player_event_channel();

        let (spirc, spirc_task) = Spirc::new(
            connect_config,
            session.clone(),
            auth.librespot_credentials,
            player.clone(),
            mixer,
        )
        .await
        .context("Failed to start Spotify Connect")?;
        spirc.activate().context("Failed to activate Spotify Connect")?;

        let task_signals = signals.clone();
        tokio::spawn(async move {
            spirc_task.await;
            tracing::warn!("Spirc task ended");
            task_signals.send(BackendSignal::NotReady);
        });

        forward_player_events(events, signals);

        tracing::info!(device = %settings.device_name, "Connect device started");
        Ok(Self {
            session,
            spirc,
            _player: player,
            device_name: settings.device_name.clone(),
        })
    }

    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    pub fn username(&self) -> String {
        self.session.username()
    }

    /// Poll the Web API until this device is listed, then signal `Ready`.
    /// Gives up with `NotReady` once the attempts run out.
    pub fn announce(&self, client: SpotifyClient, settings: &ConnectSettings, signals: SignalSender) {
        let name = self.device_name.clone();
        let attempts = settings.handshake_attempts.max(1);
        let interval = settings.handshake_interval;

        tokio::spawn(async move {
            for attempt in 1..=attempts {
                match client.find_device(&name).await {
                    Ok(Some(device_id)) => {
                        tracing::info!(device_id = %device_id, attempt, "Connect device is ready");
                        signals.send(BackendSignal::Ready { device_id });
                        return;
                    }
                    Ok(None) => tracing::debug!(attempt, "Connect device not listed yet"),
                    Err(e) if e.is_auth() => {
                        tracing::warn!(error = %e, "Device handshake stopped");
                        break;
                    }
                    Err(e) => tracing::debug!(attempt, error = %e, "Device lookup failed"),
                }
                tokio::time::sleep(interval).await;
            }
            tracing::warn!(device = %name, "Connect device never became available");
            signals.send(BackendSignal::NotReady);
        });
    }

    pub fn shutdown(&self) {
        tracing::info!("Shutting down Connect device");
        let _ = self.spirc.shutdown();
    }
}

fn forward_player_events(mut events: PlayerEventChannel, signals: SignalSender) {
    tokio::spawn(async move {
        let duration_ms = AtomicU32::new(0);
        let position = |position_ms: u32| BackendSignal::Position {
            current: f64::from(position_ms) / 1000.0,
            duration: f64::from(duration_ms.load(Ordering::Relaxed)) / 1000.0,
        };

        while let Some(event) = events.recv().await {
            match event {
                PlayerEvent::Playing { position_ms, .. }
                | PlayerEvent::Paused { position_ms, .. }
                | PlayerEvent::PositionChanged { position_ms, .. }
                | PlayerEvent::Seeked { position_ms, .. } => {
                    tracing::trace!(position_ms, "PlayerEvent position");
                    signals.send(position(position_ms));
                }
                PlayerEvent::TrackChanged { audio_item } => {
                    tracing::info!(
                        track = %audio_item.name,
                        duration_ms = audio_item.duration_ms,
                        "PlayerEvent::TrackChanged"
                    );
                    duration_ms.store(audio_item.duration_ms, Ordering::Relaxed);
                }
                PlayerEvent::EndOfTrack { .. } => {
                    tracing::debug!("PlayerEvent::EndOfTrack");
                    signals.send(BackendSignal::Ended);
                }
                PlayerEvent::Unavailable { .. } => {
                    tracing::warn!("PlayerEvent::Unavailable");
                    signals.send(BackendSignal::Error("track unavailable on Spotify".into()));
                }
                PlayerEvent::VolumeChanged { volume } => {
                    signals.send(BackendSignal::Volume(f64::from(volume) / f64::from(u16::MAX)));
                }
                _ => tracing::trace!("PlayerEvent: other event received"),
            }
        }
        tracing::debug!("Player event channel closed");
    });
}

/// Stable device id derived from the device name and host
fn device_id(device_name: &str) -> String {
    let hostname = hostname::get()
        .map(|h| h.to_string_lossy().to_string())
        .unwrap_or_else(|_| "unknown".to_string());
    format!("{device_name}-{hostname}")
}
