// Shared constants for the flight feed, projection and enrichment

/// Default live feed endpoint (websocket, plain text location out, JSON batches in)
pub const DEFAULT_FEED_URL: &str = "ws://server.calstephens.tech:777";

/// Interval at which the feed server pushes new batches (s).
/// Scene moves are animated over this interval so aircraft glide between updates.
pub const FEED_POLL_INTERVAL_SECS: u64 = 5;

/// Identity used when the feed omits `icao`. Records with this identity are never merged.
pub const UNKNOWN_IDENTITY: &str = "--";

/// Scene units per metre of horizontal distance
pub const HORIZONTAL_SCALE: f64 = 1.0 / 140.0;

/// Scene units per metre of altitude. Earlier builds used 1/20.
pub const VERTICAL_SCALE: f64 = 1.0 / 140.0;

/// Mean Earth radius for the spherical (haversine) model, metres
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

// --- Reconnect policy defaults ---

/// First reconnect delay (ms)
pub const RECONNECT_INITIAL_MS: u64 = 1_000;

/// Upper bound for the reconnect delay (ms)
pub const RECONNECT_MAX_MS: u64 = 60_000;

/// Growth factor between consecutive reconnect delays
pub const RECONNECT_FACTOR: f64 = 2.0;

/// Relative jitter applied to every reconnect delay (0.1 = +-10%)
pub const RECONNECT_JITTER: f64 = 0.1;

/// Longest accepted status log interval (s)
pub const MAX_STATUS_INTERVAL_SECS: u64 = 86_400;

// --- Enrichment (flightaware.com scrape) ---

/// Flight page, the callsign is appended
pub const FLIGHT_PAGE_URL: &str = "https://flightaware.com/live/flight/";

/// Airline logo location, the airline ICAO code and ".png" are appended
pub const AIRLINE_LOGO_URL: &str = "https://flightaware.com/images/airline_logos/90p/";

/// Script variable holding the flight JSON on the flight page
pub const BOOTSTRAP_PREFIX: &str = "var trackpollBootstrap = ";

/// Timeout for a single enrichment request (s)
pub const LOOKUP_TIMEOUT_SECS: u64 = 10;
