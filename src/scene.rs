// Host collaborators: scene graph and status display
// The core drives these; the host (AR view) implements them.

use std::collections::HashMap;
use std::time::Duration;

use tracing::{info, warn};

use crate::enrichment::FlightInformation;
use crate::error::{EnrichmentError, FeedError};
use crate::flight::FlightRecord;
use crate::geodesy::Placement;
use crate::net::ConnectionState;
use crate::tracker::TrackKey;

/// Opaque handle of an object placed in the host scene
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SceneHandle(pub u64);

/// Trait for the host scene graph.
///
/// Offsets are in the local frame documented in `geodesy` (+X east, +Y up, +Z south).
pub trait SceneGraph: Send {
    /// Place a new aircraft object
    fn place(&mut self, key: &TrackKey, placement: &Placement) -> SceneHandle;

    /// Animate an existing object to a new placement over `duration`
    fn move_to(&mut self, key: &TrackKey, placement: &Placement, duration: Duration);

    /// Remove an object
    fn remove(&mut self, key: &TrackKey);

    /// Reverse lookup used when the host reports a tap on `handle`
    fn identity_for_handle(&self, handle: SceneHandle) -> Option<TrackKey>;
}

/// Trait for the host's status display (selection card and connectivity indicator)
pub trait StatusDisplay: Send + Sync {
    /// A selected flight, with metadata when it is publicly listed
    fn show_flight(&self, record: &FlightRecord, info: Option<&FlightInformation>);

    /// Metadata could not be fetched right now; selecting again retries
    fn enrichment_failed(&self, record: &FlightRecord, error: &EnrichmentError);

    fn connectivity_changed(&self, state: ConnectionState);

    /// A feed message was dropped
    fn feed_error(&self, _error: &FeedError) {}
}

/// Scene graph that only logs intents (headless runs)
#[derive(Debug, Default)]
pub struct LoggingScene {
    next_handle: u64,
    handles: HashMap<SceneHandle, TrackKey>,
}

impl LoggingScene {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle currently assigned to `key`
    pub fn handle_of(&self, key: &TrackKey) -> Option<SceneHandle> {
        self.handles.iter().find(|(_, k)| *k == key).map(|(h, _)| *h)
    }
}

impl SceneGraph for LoggingScene {
    fn place(&mut self, key: &TrackKey, placement: &Placement) -> SceneHandle {
        self.next_handle += 1;
        let handle = SceneHandle(self.next_handle);
        self.handles.insert(handle, key.clone());

        let [x, y, z] = placement.offset;
        info!("place {} at ({:.1}, {:.1}, {:.1}) rot {:.3}", key, x, y, z, placement.rotation);
        handle
    }

    fn move_to(&mut self, key: &TrackKey, placement: &Placement, duration: Duration) {
        let [x, y, z] = placement.offset;
        info!("move {} to ({:.1}, {:.1}, {:.1}) over {:?}", key, x, y, z, duration);
    }

    fn remove(&mut self, key: &TrackKey) {
        self.handles.retain(|_, k| k != key);
        info!("remove {}", key);
    }

    fn identity_for_handle(&self, handle: SceneHandle) -> Option<TrackKey> {
        self.handles.get(&handle).cloned()
    }
}

/// Status display that writes to the log
#[derive(Debug, Default)]
pub struct LoggingStatus;

impl StatusDisplay for LoggingStatus {
    fn show_flight(&self, record: &FlightRecord, info: Option<&FlightInformation>) {
        match info {
            Some(fi) => info!("Selected {}: {}", record, fi),
            None => info!("Selected {}: no public itinerary", record),
        }
    }

    fn enrichment_failed(&self, record: &FlightRecord, error: &EnrichmentError) {
        warn!("Selected {}: {}", record, error);
    }

    fn connectivity_changed(&self, state: ConnectionState) {
        info!("Feed {:?}", state);
    }

    fn feed_error(&self, error: &FeedError) {
        warn!("Feed message dropped: {}", error);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logging_scene_handles() {
        let mut scene = LoggingScene::new();
        let key = TrackKey::Icao("A1".to_string());
        let placement = Placement { offset: [1.0, 2.0, 3.0], rotation: 0.5 };

        let h = scene.place(&key, &placement);
        assert_eq!(scene.identity_for_handle(h), Some(key.clone()));
        assert_eq!(scene.handle_of(&key), Some(h));

        scene.remove(&key);
        assert_eq!(scene.identity_for_handle(h), None);
    }
}
