// Flight data model
// One observed aircraft at one point in time, as delivered by the feed

use std::fmt;

use serde::Serialize;

use crate::constants::UNKNOWN_IDENTITY;
use crate::geodesy::{self, GeoPoint, Placement, ProjectionScale};

/// A single aircraft observation. Immutable; every feed batch yields fresh records.
///
/// Serializes to the inbound feed entry format.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlightRecord {
    // Identity
    /// ICAO address, or `UNKNOWN_IDENTITY` when the feed did not supply one
    icao: String,
    /// Trimmed callsign, empty for private/unidentified flights
    #[serde(rename = "call")]
    callsign: String,

    // Position
    #[serde(rename = "lat")]
    latitude: f64,
    #[serde(rename = "lng")]
    longitude: f64,
    /// Metres
    #[serde(rename = "alt")]
    altitude: f64,

    // Kinematics
    /// Degrees clockwise from north, 0 if unknown
    #[serde(rename = "hdg")]
    heading: f64,
    #[serde(rename = "gvel")]
    ground_velocity: f64,
    #[serde(rename = "vvel")]
    vertical_velocity: f64,
}

impl FlightRecord {
    /// Create a record. An empty or blank identity is replaced by the sentinel,
    /// the callsign is trimmed.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        icao: &str,
        callsign: &str,
        latitude: f64,
        longitude: f64,
        altitude: f64,
        heading: f64,
        ground_velocity: f64,
        vertical_velocity: f64,
    ) -> Self {
        let icao = icao.trim();
        FlightRecord {
            icao: if icao.is_empty() { UNKNOWN_IDENTITY.to_string() } else { icao.to_string() },
            callsign: callsign.trim().to_string(),
            latitude,
            longitude,
            altitude,
            heading,
            ground_velocity,
            vertical_velocity,
        }
    }

    pub fn icao(&self) -> &str {
        &self.icao
    }

    pub fn callsign(&self) -> &str {
        &self.callsign
    }

    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    pub fn longitude(&self) -> f64 {
        self.longitude
    }

    pub fn altitude(&self) -> f64 {
        self.altitude
    }

    pub fn heading(&self) -> f64 {
        self.heading
    }

    pub fn ground_velocity(&self) -> f64 {
        self.ground_velocity
    }

    pub fn vertical_velocity(&self) -> f64 {
        self.vertical_velocity
    }

    pub fn position(&self) -> GeoPoint {
        GeoPoint::new(self.latitude, self.longitude, self.altitude)
    }

    /// No stable identity from the feed; such records are never merged across batches
    pub fn is_anonymous(&self) -> bool {
        self.icao == UNKNOWN_IDENTITY
    }

    /// No callsign means no public itinerary can be looked up
    pub fn is_private(&self) -> bool {
        self.callsign.is_empty()
    }

    /// Scene placement of this aircraft relative to the viewer
    pub fn placement(&self, viewer: &GeoPoint, scale: &ProjectionScale) -> Placement {
        geodesy::project(&self.position(), self.heading, viewer, scale)
    }
}

impl fmt::Display for FlightRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let call = if self.callsign.is_empty() { "(private)" } else { self.callsign.as_str() };
        write!(
            f,
            "{} {} {:.4},{:.4} {:.0}m hdg {:.0}",
            self.icao, call, self.latitude, self.longitude, self.altitude, self.heading
        )
    }
}
