// Flight metadata and its extraction from the flight page bootstrap JSON

use std::fmt;

use chrono::{Local, TimeZone};
use serde_json::Value;

use crate::constants::{AIRLINE_LOGO_URL, BOOTSTRAP_PREFIX};
use crate::error::LookupError;

/// Descriptive metadata for a publicly listed flight
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FlightInformation {
    pub origin_airport_code: Option<String>,
    pub origin_airport: Option<String>,
    pub destination_airport_code: Option<String>,
    pub destination_airport: Option<String>,

    /// Estimated takeoff, short local time
    pub departure_time: Option<String>,
    /// Estimated landing, short local time
    pub arrival_time: Option<String>,

    pub aircraft_type: Option<String>,
    pub airline_name: Option<String>,
    pub airline_logo_url: String,
}

impl FlightInformation {
    /// Build from the `trackpollBootstrap` JSON.
    ///
    /// An empty `flights` object is a structurally valid "no itinerary" answer.
    pub fn from_bootstrap(json: &Value) -> Result<Self, LookupError> {
        let flights = json
            .get("flights")
            .and_then(Value::as_object)
            .ok_or_else(|| LookupError::Malformed("missing flights object".to_string()))?;

        let master = match flights.values().next() {
            Some(Value::Object(master)) => master,
            Some(_) => return Err(LookupError::Malformed("flight entry is not an object".to_string())),
            None => return Err(LookupError::NoItinerary),
        };

        let body = master
            .get("activityLog")
            .and_then(|log| log.get("flights"))
            .and_then(Value::as_array)
            .and_then(|flights| flights.first());

        let field = |path: &[&str]| -> Option<String> {
            let mut v = body?;
            for key in path {
                v = v.get(*key)?;
            }
            v.as_str().map(str::to_string)
        };
        let time = |key: &str| -> Option<String> {
            body?.get(key)?.get("estimated")?.as_f64().and_then(short_local_time)
        };

        let airline = master.get("airline");
        let airline_code = airline.and_then(|a| a.get("icao")).and_then(Value::as_str);
        let airline_name = airline.and_then(|a| a.get("shortName")).and_then(Value::as_str);

        Ok(FlightInformation {
            origin_airport_code: field(&["origin", "iata"]),
            origin_airport: field(&["origin", "friendlyName"]),
            destination_airport_code: field(&["destination", "iata"]),
            destination_airport: field(&["destination", "friendlyName"]),
            departure_time: time("takeoffTimes"),
            arrival_time: time("landingTimes"),
            aircraft_type: field(&["aircraftTypeFriendly"]),
            airline_name: airline_name.map(str::to_string),
            airline_logo_url: airline_logo_url(airline_code),
        })
    }
}

impl fmt::Display for FlightInformation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let or_dash = |v: &Option<String>| v.clone().unwrap_or_else(|| "--".to_string());
        write!(
            f,
            "{} {} -> {} ({} - {}) {}",
            or_dash(&self.airline_name),
            or_dash(&self.origin_airport_code),
            or_dash(&self.destination_airport_code),
            or_dash(&self.departure_time),
            or_dash(&self.arrival_time),
            or_dash(&self.aircraft_type),
        )
    }
}

/// Logo location for an airline ICAO code, "--" when unknown
pub fn airline_logo_url(airline_code: Option<&str>) -> String {
    format!("{}{}.png", AIRLINE_LOGO_URL, airline_code.unwrap_or("--"))
}

/// Epoch seconds to a short local time such as "3:05 PM"
pub fn short_local_time(epoch_secs: f64) -> Option<String> {
    Local
        .timestamp_opt(epoch_secs.floor() as i64, 0)
        .single()
        .map(|t| t.format("%-I:%M %p").to_string())
}

/// Pull the bootstrap JSON out of a flight page
pub fn extract_bootstrap(html: &str) -> Result<Value, LookupError> {
    let start = html
        .find(BOOTSTRAP_PREFIX)
        .ok_or_else(|| LookupError::Malformed("no bootstrap script on page".to_string()))?
        + BOOTSTRAP_PREFIX.len();

    let rest = &html[start..];
    let end = rest.find("</script>").unwrap_or(rest.len());
    let json_text = rest[..end].trim_end().trim_end_matches(';');

    serde_json::from_str(json_text).map_err(|e| LookupError::Malformed(e.to_string()))
}

/// Parse a whole flight page
pub fn parse_flight_page(html: &str) -> Result<FlightInformation, LookupError> {
    FlightInformation::from_bootstrap(&extract_bootstrap(html)?)
}
