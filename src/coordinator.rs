// Coordinator - the single timeline between feed, viewer, scene and enrichment
// Every event goes through one channel so the tracked set has exactly one owner

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::constants::{FEED_POLL_INTERVAL_SECS, MAX_STATUS_INTERVAL_SECS};
use crate::enrichment::{EnrichmentService, ItineraryLookup};
use crate::error::{EnrichmentError, FeedError};
use crate::flight::FlightRecord;
use crate::geodesy::GeoPoint;
use crate::net::{ConnectionState, FeedEvent, LocationUpdate};
use crate::scene::{SceneGraph, SceneHandle, StatusDisplay};
use crate::tracker::{TrackKey, TrackReconciler};

/// Everything the coordinator reacts to
#[derive(Debug)]
pub enum Event {
    Feed(FeedEvent),
    ViewerMoved(GeoPoint),
    /// The host reported a tap on a scene object
    Select {
        handle: SceneHandle,
        reply: oneshot::Sender<Option<FlightRecord>>,
    },
    /// Keys of the live set, sorted
    Snapshot(oneshot::Sender<Vec<TrackKey>>),
}

/// Cloneable sender side of the coordinator channel.
///
/// Every method returns false (or None) once the coordinator has shut down.
#[derive(Debug, Clone)]
pub struct CoordinatorHandle {
    tx: mpsc::Sender<Event>,
}

impl CoordinatorHandle {
    /// Create a handle and the receiver the coordinator consumes
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<Event>) {
        let (tx, rx) = mpsc::channel(capacity);
        (CoordinatorHandle { tx }, rx)
    }

    async fn send(&self, event: Event) -> bool {
        self.tx.send(event).await.is_ok()
    }

    pub async fn feed_batch(&self, batch: Vec<FlightRecord>) -> bool {
        self.send(Event::Feed(FeedEvent::Batch(batch))).await
    }

    pub async fn feed_error(&self, error: FeedError) -> bool {
        self.send(Event::Feed(FeedEvent::ParseError(error))).await
    }

    pub async fn connectivity(&self, state: ConnectionState) -> bool {
        self.send(Event::Feed(FeedEvent::Connectivity(state))).await
    }

    pub async fn update_viewer_location(&self, location: GeoPoint) -> bool {
        self.send(Event::ViewerMoved(location)).await
    }

    /// Resolve a tapped scene object to its current record and start enrichment for it
    pub async fn select(&self, handle: SceneHandle) -> Option<FlightRecord> {
        let (reply, rx) = oneshot::channel();
        if !self.send(Event::Select { handle, reply }).await {
            return None;
        }
        rx.await.ok().flatten()
    }

    pub async fn tracked(&self) -> Vec<TrackKey> {
        let (reply, rx) = oneshot::channel();
        if !self.send(Event::Snapshot(reply)).await {
            return Vec::new();
        }
        rx.await.unwrap_or_default()
    }
}

/// Coordinator.
///
/// Owns the reconciler and the scene collaborator. Batches that arrive before the
/// first viewer location are held (latest only) and reconciled once it is known.
pub struct Coordinator<L> {
    rx: mpsc::Receiver<Event>,
    reconciler: TrackReconciler,
    viewer: Option<GeoPoint>,
    pending: Option<Vec<FlightRecord>>,
    scene: Box<dyn SceneGraph>,
    status: Arc<dyn StatusDisplay>,
    enrichment: Option<EnrichmentService<L>>,
    /// Location updates for the feed client
    upstream: Option<mpsc::UnboundedSender<LocationUpdate>>,
    move_duration: Duration,
    status_interval: Option<Duration>,
    connection: ConnectionState,
    batches: u64,
    dropped_messages: u64,
}

impl<L: ItineraryLookup> Coordinator<L> {
    pub fn new(
        rx: mpsc::Receiver<Event>,
        reconciler: TrackReconciler,
        scene: Box<dyn SceneGraph>,
        status: Arc<dyn StatusDisplay>,
    ) -> Self {
        Coordinator {
            rx,
            reconciler,
            viewer: None,
            pending: None,
            scene,
            status,
            enrichment: None,
            upstream: None,
            move_duration: Duration::from_secs(FEED_POLL_INTERVAL_SECS),
            status_interval: None,
            connection: ConnectionState::Disconnected,
            batches: 0,
            dropped_messages: 0,
        }
    }

    pub fn with_enrichment(mut self, enrichment: EnrichmentService<L>) -> Self {
        self.enrichment = Some(enrichment);
        self
    }

    /// Forward viewer locations to the feed client
    pub fn with_upstream(mut self, upstream: mpsc::UnboundedSender<LocationUpdate>) -> Self {
        self.upstream = Some(upstream);
        self
    }

    pub fn with_move_duration(mut self, duration: Duration) -> Self {
        self.move_duration = duration;
        self
    }

    /// Log a status line every `interval`, capped at a day. None disables.
    pub fn with_status_interval(mut self, interval: Option<Duration>) -> Self {
        self.status_interval = interval
            .filter(|d| !d.is_zero())
            .map(|d| d.min(Duration::from_secs(MAX_STATUS_INTERVAL_SECS)));
        self
    }

    /// Process events until every handle is dropped
    pub async fn run(mut self) {
        info!("Coordinator running");
        let period = self.status_interval.unwrap_or(Duration::from_secs(3600));
        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                event = self.rx.recv() => match event {
                    Some(event) => self.handle_event(event),
                    None => break,
                },
                _ = ticker.tick(), if self.status_interval.is_some() => self.log_status(),
            }
        }

        info!("Coordinator stopped, {} aircraft tracked", self.reconciler.len());
    }

    /// Apply one event. Selections spawn their enrichment and return immediately.
    pub fn handle_event(&mut self, event: Event) {
        match event {
            Event::Feed(FeedEvent::Batch(batch)) => {
                self.batches += 1;
                match self.viewer {
                    Some(viewer) => self.apply_batch(batch, &viewer),
                    None => {
                        debug!("No viewer location yet, holding batch of {}", batch.len());
                        self.pending = Some(batch);
                    }
                }
            }
            Event::Feed(FeedEvent::ParseError(error)) => {
                self.dropped_messages += 1;
                self.status.feed_error(&error);
            }
            Event::Feed(FeedEvent::Connectivity(state)) => {
                self.connection = state;
                self.status.connectivity_changed(state);
            }
            Event::ViewerMoved(location) => self.viewer_moved(location),
            Event::Select { handle, reply } => {
                let record = self.select(handle);
                let _ = reply.send(record);
            }
            Event::Snapshot(reply) => {
                let mut keys: Vec<TrackKey> = self.reconciler.iter().map(|e| e.key.clone()).collect();
                keys.sort();
                let _ = reply.send(keys);
            }
        }
    }

    fn viewer_moved(&mut self, location: GeoPoint) {
        debug!("Viewer at {:.5},{:.5} ({:.0} m)", location.lat, location.lon, location.alt);
        self.viewer = Some(location);

        if let Some(upstream) = &self.upstream {
            if upstream.send(LocationUpdate::from(&location)).is_err() {
                debug!("Feed client gone, location not forwarded");
            }
        }

        if let Some(batch) = self.pending.take() {
            self.apply_batch(batch, &location);
        }
    }

    fn apply_batch(&mut self, batch: Vec<FlightRecord>, viewer: &GeoPoint) {
        let outcome = self.reconciler.reconcile(batch, viewer, Instant::now());

        for key in &outcome.removed {
            self.scene.remove(key);
            if let Some(enrichment) = &self.enrichment {
                match key {
                    // anonymous keys never come back, so their cache entries are dead weight
                    TrackKey::Anonymous(_) => enrichment.forget(&key.to_string()),
                    TrackKey::Icao(_) => {
                        enrichment.cancel(&key.to_string());
                    }
                }
            }
        }
        for intent in &outcome.created {
            let handle = self.scene.place(&intent.key, &intent.placement);
            self.reconciler.attach_handle(&intent.key, handle);
        }
        for intent in &outcome.moved {
            self.scene.move_to(&intent.key, &intent.placement, self.move_duration);
        }
    }

    /// Resolve `handle` through the scene, then confirm it against the live set.
    /// The scene may still know objects the reconciler has already dropped.
    fn select(&self, handle: SceneHandle) -> Option<FlightRecord> {
        let key = self
            .scene
            .identity_for_handle(handle)
            .or_else(|| self.reconciler.key_for_handle(handle).cloned());

        let live = key.filter(|k| {
            self.reconciler
                .get(k)
                .is_some_and(|entity| entity.handle == Some(handle))
        });
        let Some(key) = live else {
            debug!("Selected {:?} is no longer tracked", handle);
            return None;
        };
        let record = self.reconciler.get(&key)?.record.clone();

        let Some(enrichment) = self.enrichment.clone() else {
            self.status.show_flight(&record, None);
            return Some(record);
        };

        let status = Arc::clone(&self.status);
        let selected = record.clone();
        tokio::spawn(async move {
            match enrichment.fetch(&key.to_string(), selected.callsign()).await {
                Ok(info) => status.show_flight(&selected, info.as_deref()),
                Err(EnrichmentError::Cancelled) => debug!("Enrichment for {} cancelled", key),
                Err(e) => status.enrichment_failed(&selected, &e),
            }
        });

        Some(record)
    }

    fn log_status(&self) {
        let (cached, in_flight) = match &self.enrichment {
            Some(e) => (e.num_cached(), e.num_in_flight()),
            None => (0, 0),
        };
        info!(
            "Status: feed {:?}, {} aircraft tracked, {} batches, {} dropped messages, {} cached lookups, {} in flight",
            self.connection,
            self.reconciler.len(),
            self.batches,
            self.dropped_messages,
            cached,
            in_flight
        );
        if self.viewer.is_none() {
            warn!("Status: no viewer location yet");
        }
    }

    pub fn reconciler(&self) -> &TrackReconciler {
        &self.reconciler
    }
}
