// Flight metadata enrichment
// Origin/destination, schedule and airline for a selected aircraft

pub mod cache;
pub mod flightaware;
pub mod info;
pub mod service;

pub use cache::{CacheEntry, EnrichmentCache};
pub use flightaware::FlightAwareLookup;
pub use info::FlightInformation;
pub use service::{Enrichment, EnrichmentService, ItineraryLookup};
