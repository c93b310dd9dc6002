//! Core type definitions for playback state

use serde::{Deserialize, Serialize};

/// Repeat mode state
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepeatMode {
    #[default]
    None,
    All,
    One,
}

impl RepeatMode {
    pub fn next(self) -> Self {
        match self {
            RepeatMode::None => RepeatMode::All,
            RepeatMode::All => RepeatMode::One,
            RepeatMode::One => RepeatMode::None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            RepeatMode::None => "Off",
            RepeatMode::All => "All",
            RepeatMode::One => "One",
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PlayState {
    #[default]
    Stopped,
    Playing,
    Paused,
}

/// Which backend produces (or would produce) audio
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BackendKind {
    Local,
    Remote,
}

impl BackendKind {
    pub fn name(self) -> &'static str {
        match self {
            BackendKind::Local => "local",
            BackendKind::Remote => "remote",
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum Connection {
    #[default]
    LocalOnly,
    RemoteConnected { device_id: String },
}

impl Connection {
    pub fn is_connected(&self) -> bool {
        matches!(self, Connection::RemoteConnected { .. })
    }

    pub fn device_id(&self) -> Option<&str> {
        match self {
            Connection::RemoteConnected { device_id } => Some(device_id),
            Connection::LocalOnly => None,
        }
    }
}

/// Playback position as reported to listeners
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Progress {
    pub current_time: f64,
    pub duration: f64,
    pub percentage: f64,
}

impl Progress {
    pub fn new(current_time: f64, duration: f64) -> Self {
        let current_time = if current_time.is_finite() { current_time.max(0.0) } else { 0.0 };
        let duration = if duration.is_finite() { duration.max(0.0) } else { 0.0 };
        let percentage = if duration > 0.0 {
            (current_time / duration * 100.0).clamp(0.0, 100.0)
        } else {
            0.0
        };

        Self {
            current_time,
            duration,
            percentage,
        }
    }
}

/// Clamp a requested volume into `[0, 1]`; NaN is treated as silence
pub fn clamp_volume(level: f64) -> f64 {
    if level.is_nan() {
        0.0
    } else {
        level.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeat_cycles_with_period_three() {
        let mut mode = RepeatMode::One;
        let mut seen = Vec::new();
        for _ in 0..6 {
            mode = mode.next();
            seen.push(mode);
        }
        assert_eq!(
            seen,
            vec![
                RepeatMode::None,
                RepeatMode::All,
                RepeatMode::One,
                RepeatMode::None,
                RepeatMode::All,
                RepeatMode::One,
            ]
        );
    }

    #[test]
    fn progress_percentage_is_zero_without_duration() {
        let progress = Progress::new(12.0, 0.0);
        assert_eq!(progress.percentage, 0.0);

        let progress = Progress::new(50.0, 200.0);
        assert_eq!(progress.percentage, 25.0);
    }

    #[test]
    fn volume_clamps_to_unit_range() {
        assert_eq!(clamp_volume(1.7), 1.0);
        assert_eq!(clamp_volume(-0.2), 0.0);
        assert_eq!(clamp_volume(f64::NAN), 0.0);
        assert_eq!(clamp_volume(0.35), 0.35);
    }
}
