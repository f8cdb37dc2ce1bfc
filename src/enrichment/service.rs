// Enrichment service
// Cached, de-duplicated, cancellable metadata lookups keyed by aircraft identity

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::watch;
use tokio::task::AbortHandle;
use tracing::{debug, warn};

use super::cache::{CacheEntry, EnrichmentCache};
use super::FlightInformation;
use crate::error::{EnrichmentError, LookupError};

/// Source of flight itineraries, keyed by callsign
pub trait ItineraryLookup: Send + Sync + 'static {
    fn lookup(&self, callsign: &str) -> impl Future<Output = Result<FlightInformation, LookupError>> + Send;
}

/// Result handed to every caller waiting on one lookup
pub type Enrichment = Result<Option<Arc<FlightInformation>>, EnrichmentError>;

struct InFlight {
    ticket: u64,
    result: watch::Receiver<Option<Enrichment>>,
    abort: AbortHandle,
}

/// Owned by a lookup task. Dropping it unregisters the task's in-flight entry (if still
/// current) before waiters see the result channel close, so a panicked lookup can be retried.
struct InFlightGuard {
    state: Arc<Mutex<State>>,
    identity: String,
    ticket: u64,
    tx: watch::Sender<Option<Enrichment>>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        let mut state = lock(&self.state);
        if state.in_flight.get(&self.identity).map(|f| f.ticket) == Some(self.ticket) {
            state.in_flight.remove(&self.identity);
        }
    }
}

#[derive(Default)]
struct State {
    cache: EnrichmentCache,
    in_flight: HashMap<String, InFlight>,
    next_ticket: u64,
}

/// Enrichment service.
///
/// Cache and in-flight table share one mutex which is never held across an await.
/// Concurrent fetches of one identity share a single lookup.
pub struct EnrichmentService<L> {
    lookup: Arc<L>,
    state: Arc<Mutex<State>>,
}

impl<L> Clone for EnrichmentService<L> {
    fn clone(&self) -> Self {
        EnrichmentService {
            lookup: Arc::clone(&self.lookup),
            state: Arc::clone(&self.state),
        }
    }
}

fn lock(state: &Mutex<State>) -> MutexGuard<'_, State> {
    // a panicking lookup task cannot leave the maps half-updated
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl<L: ItineraryLookup> EnrichmentService<L> {
    pub fn new(lookup: L) -> Self {
        EnrichmentService {
            lookup: Arc::new(lookup),
            state: Arc::new(Mutex::new(State::default())),
        }
    }

    /// Fetch metadata for `identity`, looked up by `callsign`.
    ///
    /// `Ok(None)` means the flight is private (or has no callsign); `Err` is retryable.
    pub async fn fetch(&self, identity: &str, callsign: &str) -> Enrichment {
        let callsign = callsign.trim();
        if callsign.is_empty() {
            return Ok(None);
        }

        let mut result = {
            let mut state = lock(&self.state);

            match state.cache.get(identity) {
                Some(CacheEntry::Private) => return Ok(None),
                Some(CacheEntry::Listed(info)) => return Ok(Some(Arc::clone(info))),
                None => {}
            }

            match state.in_flight.get(identity) {
                Some(in_flight) => in_flight.result.clone(),
                None => self.start_lookup(&mut state, identity, callsign),
            }
        };

        let outcome = match result.wait_for(Option::is_some).await {
            Ok(value) => value.clone(),
            Err(_) => None, // lookup task aborted
        };
        outcome.unwrap_or(Err(EnrichmentError::Cancelled))
    }

    fn start_lookup(&self, state: &mut State, identity: &str, callsign: &str) -> watch::Receiver<Option<Enrichment>> {
        state.next_ticket += 1;
        let ticket = state.next_ticket;
        let (tx, rx) = watch::channel(None);

        let lookup = Arc::clone(&self.lookup);
        let guard = InFlightGuard {
            state: Arc::clone(&self.state),
            identity: identity.to_string(),
            ticket,
            tx,
        };
        let callsign_owned = callsign.to_string();

        debug!("Looking up {} ({})", callsign, identity);
        let task = tokio::spawn(async move {
            let looked_up = lookup.lookup(&callsign_owned).await;
            let identity_owned = guard.identity.as_str();

            let outcome = {
                let mut state = lock(&guard.state);

                // cancelled or superseded: discard without caching
                if state.in_flight.get(identity_owned).map(|f| f.ticket) != Some(ticket) {
                    return;
                }
                state.in_flight.remove(identity_owned);

                match looked_up {
                    Ok(info) => {
                        let info = Arc::new(info);
                        state.cache.insert(identity_owned, CacheEntry::Listed(Arc::clone(&info)));
                        Ok(Some(info))
                    }
                    Err(e) if e.is_permanent() => {
                        debug!("{} ({}) classified private: {}", callsign_owned, identity_owned, e);
                        state.cache.insert(identity_owned, CacheEntry::Private);
                        Ok(None)
                    }
                    Err(e) => {
                        warn!("Lookup for {} failed: {}", callsign_owned, e);
                        Err(EnrichmentError::Transport(e.to_string()))
                    }
                }
            };

            let _ = guard.tx.send(Some(outcome));
        });

        state.in_flight.insert(
            identity.to_string(),
            InFlight {
                ticket,
                result: rx.clone(),
                abort: task.abort_handle(),
            },
        );

        rx
    }

    /// Cancel an in-flight lookup; its result is discarded and not cached.
    /// Returns true if a lookup was running.
    pub fn cancel(&self, identity: &str) -> bool {
        let removed = lock(&self.state).in_flight.remove(identity);
        match removed {
            Some(in_flight) => {
                in_flight.abort.abort();
                debug!("Cancelled lookup for {}", identity);
                true
            }
            None => false,
        }
    }

    /// Cancel any lookup for `identity` and drop its cache entry.
    /// For identities that can never be selected again.
    pub fn forget(&self, identity: &str) {
        self.cancel(identity);
        if lock(&self.state).cache.remove(identity).is_some() {
            debug!("Dropped cached enrichment for {}", identity);
        }
    }

    /// Cached entry for `identity`, without triggering a lookup
    pub fn cached(&self, identity: &str) -> Option<CacheEntry> {
        lock(&self.state).cache.get(identity).cloned()
    }

    pub fn num_cached(&self) -> usize {
        lock(&self.state).cache.len()
    }

    pub fn num_in_flight(&self) -> usize {
        lock(&self.state).in_flight.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::sync::Notify;

    /// Scripted lookup that counts calls and can be held open
    struct MockLookup {
        calls: Arc<AtomicUsize>,
        gate: Option<Arc<Notify>>,
        panics: bool,
        answer: Result<FlightInformation, LookupError>,
    }

    impl MockLookup {
        fn new(answer: Result<FlightInformation, LookupError>) -> (Self, Arc<AtomicUsize>) {
            let calls = Arc::new(AtomicUsize::new(0));
            (MockLookup { calls: Arc::clone(&calls), gate: None, panics: false, answer }, calls)
        }

        fn gated(mut self, gate: Arc<Notify>) -> Self {
            self.gate = Some(gate);
            self
        }

        fn panicking(mut self) -> Self {
            self.panics = true;
            self
        }
    }

    impl ItineraryLookup for MockLookup {
        async fn lookup(&self, callsign: &str) -> Result<FlightInformation, LookupError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            if self.panics {
                panic!("lookup for {} crashed", callsign);
            }
            self.answer.clone()
        }
    }

    fn delta() -> FlightInformation {
        FlightInformation {
            origin_airport_code: Some("YYZ".to_string()),
            destination_airport_code: Some("ATL".to_string()),
            airline_name: Some("Delta".to_string()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_empty_callsign_short_circuits() {
        let (lookup, calls) = MockLookup::new(Ok(delta()));
        let service = EnrichmentService::new(lookup);

        assert_eq!(service.fetch("A1", "").await, Ok(None));
        assert_eq!(service.fetch("A1", "   ").await, Ok(None));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(service.num_cached(), 0);
    }

    #[tokio::test]
    async fn test_listed_flight_cached() {
        let (lookup, calls) = MockLookup::new(Ok(delta()));
        let service = EnrichmentService::new(lookup);

        let first = service.fetch("A1", "DAL137").await.unwrap().unwrap();
        assert_eq!(first.airline_name.as_deref(), Some("Delta"));

        let second = service.fetch("A1", "DAL137").await.unwrap().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_private_flight_cached() {
        let (lookup, calls) = MockLookup::new(Err(LookupError::NoItinerary));
        let service = EnrichmentService::new(lookup);

        for _ in 0..3 {
            assert_eq!(service.fetch("C0FFEE", "N123AB").await, Ok(None));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(service.cached("C0FFEE"), Some(CacheEntry::Private));
    }

    #[tokio::test]
    async fn test_malformed_classified_private() {
        let (lookup, calls) = MockLookup::new(Err(LookupError::Malformed("bad json".to_string())));
        let service = EnrichmentService::new(lookup);

        assert_eq!(service.fetch("A1", "DAL137").await, Ok(None));
        assert_eq!(service.fetch("A1", "DAL137").await, Ok(None));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_transport_failure_not_cached() {
        let (lookup, calls) = MockLookup::new(Err(LookupError::Transport("connection reset".to_string())));
        let service = EnrichmentService::new(lookup);

        let err = service.fetch("A1", "DAL137").await.unwrap_err();
        assert!(matches!(err, EnrichmentError::Transport(_)));
        assert_eq!(service.cached("A1"), None);

        // retried on the next selection
        assert!(service.fetch("A1", "DAL137").await.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_concurrent_fetches_deduplicated() {
        let gate = Arc::new(Notify::new());
        let (lookup, calls) = MockLookup::new(Ok(delta()));
        let service = EnrichmentService::new(lookup.gated(Arc::clone(&gate)));

        let a = tokio::spawn({
            let service = service.clone();
            async move { service.fetch("A1", "DAL137").await }
        });
        let b = tokio::spawn({
            let service = service.clone();
            async move { service.fetch("A1", "DAL137").await }
        });

        // both callers are waiting on the one lookup
        while calls.load(Ordering::SeqCst) == 0 || service.num_in_flight() == 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
        gate.notify_one();

        let a = a.await.unwrap().unwrap().unwrap();
        let b = b.await.unwrap().unwrap().unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(service.num_in_flight(), 0);
    }

    #[tokio::test]
    async fn test_cancel_discards_result() {
        let gate = Arc::new(Notify::new());
        let (lookup, calls) = MockLookup::new(Ok(delta()));
        let service = EnrichmentService::new(lookup.gated(Arc::clone(&gate)));

        let waiter = tokio::spawn({
            let service = service.clone();
            async move { service.fetch("A1", "DAL137").await }
        });

        while calls.load(Ordering::SeqCst) == 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert!(service.cancel("A1"));
        assert!(!service.cancel("A1"));

        assert_eq!(waiter.await.unwrap(), Err(EnrichmentError::Cancelled));
        assert_eq!(service.cached("A1"), None);
        assert_eq!(service.num_in_flight(), 0);
    }

    #[tokio::test]
    async fn test_panicked_lookup_can_be_retried() {
        let (lookup, calls) = MockLookup::new(Ok(delta()));
        let service = EnrichmentService::new(lookup.panicking());

        assert_eq!(service.fetch("A1", "DAL137").await, Err(EnrichmentError::Cancelled));
        assert_eq!(service.num_in_flight(), 0);
        assert_eq!(service.cached("A1"), None);

        // the next selection starts a fresh lookup instead of waiting on the dead one
        assert_eq!(service.fetch("A1", "DAL137").await, Err(EnrichmentError::Cancelled));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_forget_drops_cache_entry() {
        let (lookup, _) = MockLookup::new(Ok(delta()));
        let service = EnrichmentService::new(lookup);

        service.fetch("--#1", "DAL137").await.unwrap();
        assert_eq!(service.num_cached(), 1);

        service.forget("--#1");
        assert_eq!(service.cached("--#1"), None);
        assert_eq!(service.num_cached(), 0);
    }
}
