// Feed message definitions
// Outbound: plain text "{lat},{lon}". Inbound: JSON array of per-aircraft objects.

use std::fmt;

use serde_json::{Map, Value};
use tracing::debug;

use crate::constants::UNKNOWN_IDENTITY;
use crate::error::FeedError;
use crate::flight::FlightRecord;
use crate::geodesy::GeoPoint;

/// Viewer location as sent upstream
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocationUpdate {
    pub lat: f64,
    pub lon: f64,
}

impl From<&GeoPoint> for LocationUpdate {
    fn from(p: &GeoPoint) -> Self {
        LocationUpdate { lat: p.lat, lon: p.lon }
    }
}

impl fmt::Display for LocationUpdate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.lat, self.lon)
    }
}

/// Parse one inbound message into a batch.
///
/// A message that is not a JSON array is an error (the caller keeps its tracked set).
/// Entries missing `lat`, `lng` or `alt` are dropped without failing the batch.
pub fn parse_batch(text: &str) -> Result<Vec<FlightRecord>, FeedError> {
    let value: Value = serde_json::from_str(text).map_err(|e| FeedError::Parse(e.to_string()))?;

    let entries = match value {
        Value::Array(entries) => entries,
        other => {
            return Err(FeedError::Parse(format!("expected array, got {}", json_kind(&other))));
        }
    };

    let total = entries.len();
    let batch: Vec<FlightRecord> = entries
        .iter()
        .filter_map(|entry| {
            let record = entry.as_object().and_then(parse_entry);
            if record.is_none() {
                debug!("Dropping incomplete feed entry: {}", entry);
            }
            record
        })
        .collect();

    if batch.len() < total {
        debug!("Kept {} of {} feed entries", batch.len(), total);
    }

    Ok(batch)
}

/// Per-aircraft entry: icao, call, lat (req), lng (req), alt (req), hdg, gvel, vvel
fn parse_entry(obj: &Map<String, Value>) -> Option<FlightRecord> {
    let icao = obj.get("icao").and_then(Value::as_str).unwrap_or(UNKNOWN_IDENTITY);
    let call = obj.get("call").and_then(Value::as_str).unwrap_or("");

    let lat = obj.get("lat").and_then(Value::as_f64)?;
    let lng = obj.get("lng").and_then(Value::as_f64)?;
    let alt = obj.get("alt").and_then(Value::as_f64)?;

    let optional = |key: &str| obj.get(key).and_then(Value::as_f64).unwrap_or(0.0);

    Some(FlightRecord::new(
        icao,
        call,
        lat,
        lng,
        alt,
        optional("hdg"),
        optional("gvel"),
        optional("vvel"),
    ))
}

fn json_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_location_update_format() {
        let msg = LocationUpdate::from(&GeoPoint::new(43.4729, -80.5402, 330.0));
        assert_eq!(msg.to_string(), "43.4729,-80.5402");
    }

    #[test]
    fn test_parse_full_entry() {
        let json = r#"[{"icao":"A1","call":"DAL137 ","lat":44.4364,"lng":-80.4109,"alt":10888.98,"hdg":216.01,"gvel":230.5,"vvel":-2.5}]"#;

        let batch = parse_batch(json).unwrap();
        assert_eq!(batch.len(), 1);
        let r = &batch[0];
        assert_eq!(r.icao(), "A1");
        assert_eq!(r.callsign(), "DAL137");
        assert_eq!(r.latitude(), 44.4364);
        assert_eq!(r.longitude(), -80.4109);
        assert_eq!(r.altitude(), 10888.98);
        assert_eq!(r.heading(), 216.01);
        assert_eq!(r.ground_velocity(), 230.5);
        assert_eq!(r.vertical_velocity(), -2.5);
    }

    #[test]
    fn test_parse_defaults() {
        let json = r#"[{"lat":1.0,"lng":2.0,"alt":3000}]"#;

        let batch = parse_batch(json).unwrap();
        let r = &batch[0];
        assert_eq!(r.icao(), UNKNOWN_IDENTITY);
        assert_eq!(r.callsign(), "");
        assert_eq!(r.altitude(), 3000.0);
        assert_eq!(r.heading(), 0.0);
        assert_eq!(r.ground_velocity(), 0.0);
        assert_eq!(r.vertical_velocity(), 0.0);
    }

    #[test]
    fn test_parse_drops_incomplete_entries() {
        let json = r#"[
            {"icao":"A1","call":"ACA1","lat":1.0,"lng":2.0,"alt":3.0},
            {"icao":"A2","call":"ACA2","lat":1.0,"alt":3.0},
            {"icao":"A3","call":"ACA3","lat":"1.0","lng":2.0,"alt":3.0},
            42,
            {"icao":"A4","lat":5.0,"lng":6.0,"alt":7.0,"hdg":"north"}
        ]"#;

        let batch = parse_batch(json).unwrap();
        let icaos: Vec<&str> = batch.iter().map(|r| r.icao()).collect();
        assert_eq!(icaos, vec!["A1", "A4"]);
        assert_eq!(batch[1].heading(), 0.0);
    }

    #[test]
    fn test_parse_malformed_message() {
        let err = parse_batch(r#"{"icao":"A1"}"#).unwrap_err();
        assert!(err.is_parse());
        assert!(err.to_string().contains("object"));

        assert!(parse_batch("not json").unwrap_err().is_parse());
    }

    #[test]
    fn test_parse_empty_array() {
        assert!(parse_batch("[]").unwrap().is_empty());
    }
}
