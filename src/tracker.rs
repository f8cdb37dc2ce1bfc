// Aircraft track reconciliation
// Owns the live set of tracked aircraft and diffs every feed batch against it

use std::collections::HashMap;
use std::fmt;
use std::time::{Duration, Instant};

use tracing::debug;

use crate::flight::FlightRecord;
use crate::geodesy::{GeoPoint, Placement, ProjectionScale};
use crate::scene::SceneHandle;

/// Key of a tracked entity.
///
/// Aircraft without a feed identity get a fresh `Anonymous` key every batch,
/// so they are never merged with an earlier sighting.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TrackKey {
    Icao(String),
    Anonymous(u64),
}

impl fmt::Display for TrackKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackKey::Icao(icao) => write!(f, "{}", icao),
            TrackKey::Anonymous(n) => write!(f, "--#{}", n),
        }
    }
}

/// A single tracked aircraft
#[derive(Debug, Clone)]
pub struct TrackedEntity {
    pub key: TrackKey,
    /// Last record received for this aircraft
    pub record: FlightRecord,
    /// Placement last issued to the scene
    pub placement: Placement,
    /// Scene object, set once the scene has placed it
    pub handle: Option<SceneHandle>,
    /// Last batch this aircraft was part of
    pub last_seen: Instant,
}

/// Scene intent for a created or moved entity
#[derive(Debug, Clone, PartialEq)]
pub struct TrackIntent {
    pub key: TrackKey,
    pub placement: Placement,
}

/// Result of reconciling one batch
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Reconciliation {
    pub created: Vec<TrackIntent>,
    pub moved: Vec<TrackIntent>,
    pub removed: Vec<TrackKey>,
}

impl Reconciliation {
    pub fn is_empty(&self) -> bool {
        self.created.is_empty() && self.moved.is_empty() && self.removed.is_empty()
    }
}

/// Track reconciler - manages all tracked aircraft
pub struct TrackReconciler {
    /// Map of key -> TrackedEntity
    entities: HashMap<TrackKey, TrackedEntity>,
    scale: ProjectionScale,
    /// How long an aircraft may be missing from batches before it is removed
    grace: Duration,
    next_anonymous: u64,
}

impl TrackReconciler {
    /// Create a reconciler that removes aircraft as soon as a batch omits them
    pub fn new(scale: ProjectionScale) -> Self {
        Self::with_grace(scale, Duration::ZERO)
    }

    pub fn with_grace(scale: ProjectionScale, grace: Duration) -> Self {
        TrackReconciler {
            entities: HashMap::new(),
            scale,
            grace,
            next_anonymous: 0,
        }
    }

    /// Number of tracked aircraft
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn get(&self, key: &TrackKey) -> Option<&TrackedEntity> {
        self.entities.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = &TrackedEntity> {
        self.entities.values()
    }

    /// Remember the scene object placed for a created entity
    pub fn attach_handle(&mut self, key: &TrackKey, handle: SceneHandle) {
        if let Some(entity) = self.entities.get_mut(key) {
            entity.handle = Some(handle);
        }
    }

    /// Resolve a scene handle against the live set
    pub fn key_for_handle(&self, handle: SceneHandle) -> Option<&TrackKey> {
        self.entities
            .values()
            .find(|e| e.handle == Some(handle))
            .map(|e| &e.key)
    }

    /// Diff `batch` against the tracked set.
    ///
    /// Removed keys are reported before any create/move and never reappear in the
    /// same reconciliation. Within a batch a repeated identity keeps its last record.
    pub fn reconcile(&mut self, batch: Vec<FlightRecord>, viewer: &GeoPoint, now: Instant) -> Reconciliation {
        let mut outcome = Reconciliation::default();

        // Index the batch by identity, keeping first-seen order
        let mut order: Vec<TrackKey> = Vec::with_capacity(batch.len());
        let mut latest: HashMap<TrackKey, FlightRecord> = HashMap::with_capacity(batch.len());
        for record in batch {
            let key = if record.is_anonymous() {
                self.next_anonymous += 1;
                TrackKey::Anonymous(self.next_anonymous)
            } else {
                TrackKey::Icao(record.icao().to_string())
            };
            if latest.insert(key.clone(), record).is_none() {
                order.push(key);
            }
        }

        // Removals: anonymous entities never survive a batch, named ones after the grace window
        let grace = self.grace;
        let mut removed: Vec<TrackKey> = self
            .entities
            .values()
            .filter(|e| !latest.contains_key(&e.key))
            .filter(|e| {
                matches!(e.key, TrackKey::Anonymous(_))
                    || now.saturating_duration_since(e.last_seen) >= grace
            })
            .map(|e| e.key.clone())
            .collect();
        removed.sort();
        for key in &removed {
            self.entities.remove(key);
        }
        outcome.removed = removed;

        for key in order {
            let Some(record) = latest.remove(&key) else { continue };
            let placement = record.placement(viewer, &self.scale);

            match self.entities.get_mut(&key) {
                Some(entity) => {
                    entity.record = record;
                    entity.placement = placement;
                    entity.last_seen = now;
                    outcome.moved.push(TrackIntent { key, placement });
                }
                None => {
                    self.entities.insert(
                        key.clone(),
                        TrackedEntity {
                            key: key.clone(),
                            record,
                            placement,
                            handle: None,
                            last_seen: now,
                        },
                    );
                    outcome.created.push(TrackIntent { key, placement });
                }
            }
        }

        debug!(
            "Reconciled batch: {} created, {} moved, {} removed, {} tracked",
            outcome.created.len(),
            outcome.moved.len(),
            outcome.removed.len(),
            self.entities.len()
        );

        outcome
    }
}
