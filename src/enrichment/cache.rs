// Per-identity enrichment cache

use std::collections::HashMap;
use std::sync::Arc;

use super::FlightInformation;

/// What is known about one aircraft's metadata
#[derive(Debug, Clone, PartialEq)]
pub enum CacheEntry {
    Listed(Arc<FlightInformation>),
    /// No public itinerary; permanent for the session
    Private,
}

/// Cache keyed by aircraft identity. Last writer wins.
#[derive(Debug, Default)]
pub struct EnrichmentCache {
    entries: HashMap<String, CacheEntry>,
}

impl EnrichmentCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, identity: &str) -> Option<&CacheEntry> {
        self.entries.get(identity)
    }

    pub fn insert(&mut self, identity: &str, entry: CacheEntry) {
        self.entries.insert(identity.to_string(), entry);
    }

    pub fn remove(&mut self, identity: &str) -> Option<CacheEntry> {
        self.entries.remove(identity)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn num_private(&self) -> usize {
        self.entries.values().filter(|e| **e == CacheEntry::Private).count()
    }
}
