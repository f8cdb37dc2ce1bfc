use std::time::Duration;

use clap::Parser;

use crate::constants::{
    DEFAULT_FEED_URL, HORIZONTAL_SCALE, MAX_STATUS_INTERVAL_SECS, RECONNECT_FACTOR, RECONNECT_INITIAL_MS,
    RECONNECT_JITTER, RECONNECT_MAX_MS, VERTICAL_SCALE,
};
use crate::geodesy::{GeoPoint, ProjectionScale};
use crate::net::ReconnectPolicy;

/// Flight AR host configuration
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Config {
    /// Websocket URL of the telemetry feed.
    #[arg(long, value_name = "URL", default_value = DEFAULT_FEED_URL)]
    pub feed_url: String,

    /// Replay a recorded batch from a JSON file instead of connecting to the feed.
    #[arg(long, value_name = "FILE")]
    pub fixture: Option<String>,

    /// Viewer latitude in degrees.
    #[arg(long, allow_hyphen_values = true, default_value_t = 43.4729)]
    pub lat: f64,

    /// Viewer longitude in degrees.
    #[arg(long, allow_hyphen_values = true, default_value_t = -80.5402)]
    pub lon: f64,

    /// Viewer altitude in metres.
    #[arg(long, allow_hyphen_values = true, default_value_t = 0.0)]
    pub alt: f64,

    /// Scene units per metre of horizontal distance.
    #[arg(long, default_value_t = HORIZONTAL_SCALE)]
    pub horizontal_scale: f64,

    /// Scene units per metre of altitude.
    #[arg(long, default_value_t = VERTICAL_SCALE)]
    pub vertical_scale: f64,

    /// Keep an aircraft this many seconds after it drops out of the feed, 0 to remove at once.
    #[arg(long, value_name = "SECS", default_value_t = 0)]
    pub grace_secs: u64,

    /// First reconnect delay in milliseconds.
    #[arg(long, value_name = "MS", default_value_t = RECONNECT_INITIAL_MS)]
    pub reconnect_initial_ms: u64,

    /// Upper bound for the reconnect delay in milliseconds.
    #[arg(long, value_name = "MS", default_value_t = RECONNECT_MAX_MS)]
    pub reconnect_max_ms: u64,

    /// Give up after this many failed connection attempts in a row (retry forever if unset).
    #[arg(long, value_name = "N")]
    pub reconnect_max_attempts: Option<u32>,

    /// Do not look up itineraries for selected flights.
    #[arg(long, default_value_t = false)]
    pub no_enrichment: bool,

    /// Status logging interval in seconds, 0 to disable
    #[arg(long, default_value_t = 60)]
    pub status_interval: u64,

    /// Verbose logging (DEBUG level)
    #[arg(long, short, default_value_t = false)]
    pub verbose: bool,
}

impl Config {
    pub fn viewer(&self) -> GeoPoint {
        GeoPoint::new(self.lat, self.lon, self.alt)
    }

    pub fn projection_scale(&self) -> ProjectionScale {
        ProjectionScale {
            horizontal: self.horizontal_scale,
            vertical: self.vertical_scale,
        }
    }

    pub fn reconnect_policy(&self) -> ReconnectPolicy {
        ReconnectPolicy {
            initial: Duration::from_millis(self.reconnect_initial_ms),
            max: Duration::from_millis(self.reconnect_max_ms.max(self.reconnect_initial_ms)),
            factor: RECONNECT_FACTOR,
            jitter: RECONNECT_JITTER,
            max_attempts: self.reconnect_max_attempts,
        }
    }

    pub fn grace(&self) -> Duration {
        Duration::from_secs(self.grace_secs)
    }

    /// Status log period, capped at `MAX_STATUS_INTERVAL_SECS`
    pub fn status_interval(&self) -> Option<Duration> {
        (self.status_interval > 0)
            .then(|| Duration::from_secs(self.status_interval.min(MAX_STATUS_INTERVAL_SECS)))
    }
}
