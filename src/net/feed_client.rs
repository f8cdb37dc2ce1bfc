// Feed client
// Keeps one websocket to the telemetry server alive, pushes the viewer location
// upstream and hands every inbound batch to the coordinator.

use std::time::Duration;

use rand::Rng;
use tokio::sync::{mpsc, watch};
use tokio::time;
use tracing::{debug, info, warn};

use super::connection::FeedConnection;
use super::messages::{parse_batch, LocationUpdate};
use crate::constants::{RECONNECT_FACTOR, RECONNECT_INITIAL_MS, RECONNECT_JITTER, RECONNECT_MAX_MS};
use crate::coordinator::CoordinatorHandle;
use crate::error::FeedError;
use crate::flight::FlightRecord;

/// Upper bound for `ReconnectPolicy::jitter`, keeps every delay positive
const MAX_JITTER: f64 = 0.99;

/// State of the feed connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// What the feed reports to the coordinator
#[derive(Debug)]
pub enum FeedEvent {
    Batch(Vec<FlightRecord>),
    /// Undecodable message; the tracked set stays as it was
    ParseError(FeedError),
    Connectivity(ConnectionState),
}

/// Exponential backoff with jitter between reconnect attempts
#[derive(Debug, Clone, PartialEq)]
pub struct ReconnectPolicy {
    pub initial: Duration,
    pub max: Duration,
    pub factor: f64,
    /// Relative jitter, 0.1 = +-10%
    pub jitter: f64,
    /// Consecutive failed attempts before giving up, None = retry forever
    pub max_attempts: Option<u32>,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        ReconnectPolicy {
            initial: Duration::from_millis(RECONNECT_INITIAL_MS),
            max: Duration::from_millis(RECONNECT_MAX_MS),
            factor: RECONNECT_FACTOR,
            jitter: RECONNECT_JITTER,
            max_attempts: None,
        }
    }
}

impl ReconnectPolicy {
    /// Delay before reconnect attempt `attempt` (0-based), without jitter
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let exp = self.factor.powi(attempt.min(64) as i32);
        let ms = (self.initial.as_millis() as f64 * exp).min(self.max.as_millis() as f64);
        Duration::from_millis(ms as u64)
    }

    /// Delay before reconnect attempt `attempt`, jittered. Jitter is clamped to [0, 1).
    pub fn delay(&self, attempt: u32) -> Duration {
        let base = self.base_delay(attempt).as_secs_f64();
        if self.jitter.is_nan() || self.jitter <= 0.0 || base == 0.0 {
            return Duration::from_secs_f64(base);
        }
        let jitter = self.jitter.min(MAX_JITTER);
        let r = rand::thread_rng().gen_range((1.0 - jitter)..=(1.0 + jitter));
        Duration::from_secs_f64(base * r)
    }

    fn exhausted(&self, failures: u32) -> bool {
        self.max_attempts.is_some_and(|max| failures >= max)
    }
}

/// Feed client.
///
/// Locations arrive on an unbounded channel: the coordinator must never block on the
/// feed while the feed may be blocked on the coordinator.
pub struct FeedClient {
    url: String,
    policy: ReconnectPolicy,
    coordinator: CoordinatorHandle,
    locations: mpsc::UnboundedReceiver<LocationUpdate>,
    /// Latest viewer location, re-sent on every (re)connect
    location: Option<LocationUpdate>,
    state_tx: watch::Sender<ConnectionState>,
}

/// Why a connected session ended
enum SessionEnd {
    Shutdown,
    Lost(FeedError),
}

impl FeedClient {
    pub fn new(
        url: &str,
        policy: ReconnectPolicy,
        coordinator: CoordinatorHandle,
        locations: mpsc::UnboundedReceiver<LocationUpdate>,
    ) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);
        FeedClient {
            url: url.to_string(),
            policy,
            coordinator,
            locations,
            location: None,
            state_tx,
        }
    }

    /// Get the current state
    pub fn state(&self) -> ConnectionState {
        *self.state_tx.borrow()
    }

    /// Observe state changes
    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }

    /// Run the client until the coordinator or the location source goes away.
    ///
    /// Returns an error only when the reconnect policy gives up.
    pub async fn run(mut self) -> Result<(), FeedError> {
        info!("Starting feed client for {}", self.url);
        let mut failures: u32 = 0;

        loop {
            if !self.set_state(ConnectionState::Connecting).await {
                return Ok(());
            }

            match FeedConnection::connect(&self.url).await {
                Ok(conn) => {
                    info!("Connected to feed at {}", conn.url());
                    failures = 0;
                    if !self.set_state(ConnectionState::Connected).await {
                        conn.close().await;
                        return Ok(());
                    }

                    match self.serve(conn).await {
                        SessionEnd::Shutdown => {
                            self.set_state(ConnectionState::Disconnected).await;
                            info!("Feed client stopped");
                            return Ok(());
                        }
                        SessionEnd::Lost(e) => warn!("Feed connection lost: {}", e),
                    }
                }
                Err(e) => {
                    failures += 1;
                    warn!("{}", e);
                }
            }

            if !self.set_state(ConnectionState::Disconnected).await {
                return Ok(());
            }
            if self.policy.exhausted(failures) {
                return Err(FeedError::RetriesExhausted(failures));
            }

            let delay = self.policy.delay(failures.saturating_sub(1));
            debug!("Reconnecting in {:?}", delay);
            if !self.wait_before_reconnect(delay).await {
                return Ok(());
            }
        }
    }

    /// Message loop for one connection
    async fn serve(&mut self, mut conn: FeedConnection) -> SessionEnd {
        if let Some(location) = self.location {
            if let Err(e) = conn.send_location(&location).await {
                return SessionEnd::Lost(e);
            }
        }

        loop {
            tokio::select! {
                result = conn.read_text() => {
                    match result {
                        Ok(text) => {
                            if !self.dispatch(&text).await {
                                conn.close().await;
                                return SessionEnd::Shutdown;
                            }
                        }
                        Err(e) => return SessionEnd::Lost(e),
                    }
                }
                maybe_location = self.locations.recv() => {
                    match maybe_location {
                        Some(location) => {
                            self.location = Some(location);
                            if let Err(e) = conn.send_location(&location).await {
                                return SessionEnd::Lost(e);
                            }
                        }
                        None => {
                            conn.close().await;
                            return SessionEnd::Shutdown;
                        }
                    }
                }
            }
        }
    }

    /// Parse one inbound message and forward it. Returns false once the coordinator is gone.
    async fn dispatch(&self, text: &str) -> bool {
        match parse_batch(text) {
            Ok(batch) => {
                debug!("Received batch of {} flights", batch.len());
                self.coordinator.feed_batch(batch).await
            }
            Err(e) => {
                warn!("Dropping feed message: {}", e);
                self.coordinator.feed_error(e).await
            }
        }
    }

    /// Sleep out the backoff delay, keeping the newest location. Returns false on shutdown.
    async fn wait_before_reconnect(&mut self, delay: Duration) -> bool {
        let sleep = time::sleep(delay);
        tokio::pin!(sleep);

        loop {
            tokio::select! {
                _ = &mut sleep => return true,
                maybe_location = self.locations.recv() => {
                    match maybe_location {
                        Some(location) => self.location = Some(location),
                        None => return false,
                    }
                }
            }
        }
    }

    async fn set_state(&self, state: ConnectionState) -> bool {
        let changed = self.state_tx.send_if_modified(|current| {
            if *current == state {
                false
            } else {
                *current = state;
                true
            }
        });

        if changed {
            self.coordinator.connectivity(state).await
        } else {
            true
        }
    }
}
