//! Named-callback registry used to publish player state changes
//!
//! Listeners are registered per [`EventKind`] and invoked synchronously in
//! registration order. Each callback runs inside its own panic boundary, so a
//! misbehaving listener is logged and skipped while the rest still run.

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;

use crate::model::{Progress, RepeatMode, Track};

/// Payload of every event the coordinator publishes
#[derive(Clone, Debug, PartialEq)]
pub enum PlayerEvent {
    PlayStateChanged(bool),
    TrackChanged(Track),
    VolumeChanged(f64),
    ProgressChanged(Progress),
    ShuffleChanged(bool),
    RepeatChanged(RepeatMode),
    PlaylistChanged(Vec<Track>),
    Error {
        track: Option<Track>,
        cause: String,
    },
    ConnectionChanged {
        connected: bool,
        device_id: Option<String>,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventKind {
    PlayStateChanged,
    TrackChanged,
    VolumeChanged,
    ProgressChanged,
    ShuffleChanged,
    RepeatChanged,
    PlaylistChanged,
    Error,
    ConnectionChanged,
}

impl EventKind {
    pub const ALL: [EventKind; 9] = [
        EventKind::PlayStateChanged,
        EventKind::TrackChanged,
        EventKind::VolumeChanged,
        EventKind::ProgressChanged,
        EventKind::ShuffleChanged,
        EventKind::RepeatChanged,
        EventKind::PlaylistChanged,
        EventKind::Error,
        EventKind::ConnectionChanged,
    ];

    /// Callback name as exposed to listeners
    pub fn name(self) -> &'static str {
        match self {
            EventKind::PlayStateChanged => "onPlayStateChanged",
            EventKind::TrackChanged => "onTrackChanged",
            EventKind::VolumeChanged => "onVolumeChanged",
            EventKind::ProgressChanged => "onProgressChanged",
            EventKind::ShuffleChanged => "onShuffleChanged",
            EventKind::RepeatChanged => "onRepeatChanged",
            EventKind::PlaylistChanged => "onPlaylistChanged",
            EventKind::Error => "onError",
            EventKind::ConnectionChanged => "onConnectionChanged",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }
}

impl PlayerEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            PlayerEvent::PlayStateChanged(_) => EventKind::PlayStateChanged,
            PlayerEvent::TrackChanged(_) => EventKind::TrackChanged,
            PlayerEvent::VolumeChanged(_) => EventKind::VolumeChanged,
            PlayerEvent::ProgressChanged(_) => EventKind::ProgressChanged,
            PlayerEvent::ShuffleChanged(_) => EventKind::ShuffleChanged,
            PlayerEvent::RepeatChanged(_) => EventKind::RepeatChanged,
            PlayerEvent::PlaylistChanged(_) => EventKind::PlaylistChanged,
            PlayerEvent::Error { .. } => EventKind::Error,
            PlayerEvent::ConnectionChanged { .. } => EventKind::ConnectionChanged,
        }
    }
}

/// Handle returned by [`EventBus::on`], used to unregister
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Callback = Arc<dyn Fn(&PlayerEvent) + Send + Sync>;

#[derive(Default)]
struct Registry {
    listeners: HashMap<EventKind, Vec<(ListenerId, Callback)>>,
}

#[derive(Clone, Default)]
pub struct EventBus {
    registry: Arc<RwLock<Registry>>,
    next_id: Arc<AtomicU64>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on<F>(&self, kind: EventKind, callback: F) -> ListenerId
    where
        F: Fn(&PlayerEvent) + Send + Sync + 'static,
    {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.registry
            .write()
            .listeners
            .entry(kind)
            .or_default()
            .push((id, Arc::new(callback)));
        id
    }

    /// Remove a listener; returns `false` if it was not registered for `kind`
    pub fn off(&self, kind: EventKind, id: ListenerId) -> bool {
        let mut registry = self.registry.write();
        let Some(list) = registry.listeners.get_mut(&kind) else {
            return false;
        };
        let before = list.len();
        list.retain(|(listener, _)| *listener != id);
        before != list.len()
    }

    pub fn listener_count(&self, kind: EventKind) -> usize {
        self.registry
            .read()
            .listeners
            .get(&kind)
            .map_or(0, Vec::len)
    }

    /// Deliver `event` to every listener of its kind. Returns how many
    /// callbacks completed without panicking.
    pub fn trigger(&self, event: &PlayerEvent) -> usize {
        let kind = event.kind();
        // Snapshot so callbacks may register/unregister without deadlocking.
        let callbacks: Vec<Callback> = match self.registry.read().listeners.get(&kind) {
            Some(list) => list.iter().map(|(_, cb)| Arc::clone(cb)).collect(),
            None => return 0,
        };

        let mut delivered = 0;
        for callback in callbacks {
            match panic::catch_unwind(AssertUnwindSafe(|| callback(event))) {
                Ok(()) => delivered += 1,
                Err(payload) => {
                    let message = payload
                        .downcast_ref::<&str>()
                        .map(|s| s.to_string())
                        .or_else(|| payload.downcast_ref::<String>().cloned())
                        .unwrap_or_else(|| "unknown panic".to_string());
                    tracing::error!(event = kind.name(), panic = %message, "Event listener panicked");
                }
            }
        }
        delivered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[test]
    fn listeners_run_in_registration_order() {
        let bus = EventBus::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        for label in ["first", "second", "third"] {
            let seen = seen.clone();
            bus.on(EventKind::VolumeChanged, move |event| {
                if let PlayerEvent::VolumeChanged(v) = event {
                    seen.lock().push((label, *v));
                }
            });
        }

        assert_eq!(bus.trigger(&PlayerEvent::VolumeChanged(0.4)), 3);
        assert_eq!(
            *seen.lock(),
            vec![("first", 0.4), ("second", 0.4), ("third", 0.4)]
        );
    }

    #[test]
    fn panicking_listener_does_not_stop_delivery() {
        let bus = EventBus::new();
        let hits = Arc::new(Mutex::new(0));

        bus.on(EventKind::ShuffleChanged, |_| panic!("listener blew up"));
        let counter = hits.clone();
        bus.on(EventKind::ShuffleChanged, move |_| *counter.lock() += 1);

        assert_eq!(bus.trigger(&PlayerEvent::ShuffleChanged(true)), 1);
        assert_eq!(*hits.lock(), 1);
    }

    #[test]
    fn off_removes_only_that_listener() {
        let bus = EventBus::new();
        let hits = Arc::new(Mutex::new(Vec::new()));

        let a = {
            let hits = hits.clone();
            bus.on(EventKind::PlayStateChanged, move |_| hits.lock().push("a"))
        };
        {
            let hits = hits.clone();
            bus.on(EventKind::PlayStateChanged, move |_| hits.lock().push("b"));
        }

        assert!(bus.off(EventKind::PlayStateChanged, a));
        assert!(!bus.off(EventKind::PlayStateChanged, a));
        assert!(!bus.off(EventKind::TrackChanged, a));

        bus.trigger(&PlayerEvent::PlayStateChanged(true));
        assert_eq!(*hits.lock(), vec!["b"]);
        assert_eq!(bus.listener_count(EventKind::PlayStateChanged), 1);
    }

    #[test]
    fn events_only_reach_their_kind() {
        let bus = EventBus::new();
        let hits = Arc::new(Mutex::new(0));
        let counter = hits.clone();
        bus.on(EventKind::RepeatChanged, move |_| *counter.lock() += 1);

        assert_eq!(bus.trigger(&PlayerEvent::ShuffleChanged(false)), 0);
        assert_eq!(*hits.lock(), 0);
    }

    #[test]
    fn listener_may_register_during_delivery() {
        let bus = EventBus::new();
        let inner = bus.clone();
        bus.on(EventKind::Error, move |_| {
            inner.on(EventKind::Error, |_| {});
        });

        bus.trigger(&PlayerEvent::Error {
            track: None,
            cause: "boom".into(),
        });
        assert_eq!(bus.listener_count(EventKind::Error), 2);
    }

    #[test]
    fn names_round_trip() {
        for kind in EventKind::ALL {
            assert_eq!(EventKind::from_name(kind.name()), Some(kind));
        }
        assert_eq!(EventKind::from_name("onSomethingElse"), None);
    }
}
