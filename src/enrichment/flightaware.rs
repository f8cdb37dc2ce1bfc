// Itinerary lookup against the public flight pages on flightaware.com

use std::time::Duration;

use reqwest::StatusCode;
use tracing::debug;

use super::info::parse_flight_page;
use super::service::ItineraryLookup;
use super::FlightInformation;
use crate::constants::{FLIGHT_PAGE_URL, LOOKUP_TIMEOUT_SECS};
use crate::error::LookupError;

/// Scrapes the `trackpollBootstrap` JSON from `{base_url}{callsign}`
pub struct FlightAwareLookup {
    client: reqwest::Client,
    base_url: String,
}

impl FlightAwareLookup {
    pub fn new() -> Result<Self, LookupError> {
        Self::with_base_url(FLIGHT_PAGE_URL)
    }

    /// Lookup against another host serving the same page layout
    pub fn with_base_url(base_url: &str) -> Result<Self, LookupError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(LOOKUP_TIMEOUT_SECS))
            .build()?;

        Ok(FlightAwareLookup {
            client,
            base_url: base_url.to_string(),
        })
    }
}

impl ItineraryLookup for FlightAwareLookup {
    async fn lookup(&self, callsign: &str) -> Result<FlightInformation, LookupError> {
        let url = format!("{}{}", self.base_url, callsign);
        debug!("GET {}", url);

        let response = self.client.get(&url).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(LookupError::NoItinerary);
        }

        let html = response.error_for_status()?.text().await?;
        parse_flight_page(&html)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::BOOTSTRAP_PREFIX;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// One-shot HTTP server answering every request with `status` and `body`
    async fn serve_once(status: &'static str, body: String) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            if let Ok((mut stream, _)) = listener.accept().await {
                let mut buf = [0u8; 4096];
                let _ = stream.read(&mut buf).await;
                let response = format!(
                    "HTTP/1.1 {}\r\nContent-Type: text/html\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status,
                    body.len(),
                    body
                );
                let _ = stream.write_all(response.as_bytes()).await;
                let _ = stream.shutdown().await;
            }
        });

        format!("http://{}/live/flight/", addr)
    }

    #[tokio::test]
    async fn test_lookup_listed_flight() {
        let body = format!(
            "<script>{}{{\"flights\":{{\"ACA1\":{{\"airline\":{{\"icao\":\"ACA\",\"shortName\":\"Air Canada\"}}}}}}}};</script>",
            BOOTSTRAP_PREFIX
        );
        let base = serve_once("200 OK", body).await;

        let lookup = FlightAwareLookup::with_base_url(&base).unwrap();
        let info = lookup.lookup("ACA1").await.unwrap();
        assert_eq!(info.airline_name.as_deref(), Some("Air Canada"));
        assert!(info.airline_logo_url.ends_with("/ACA.png"));
    }

    #[tokio::test]
    async fn test_lookup_not_found_is_no_itinerary() {
        let base = serve_once("404 Not Found", String::new()).await;

        let lookup = FlightAwareLookup::with_base_url(&base).unwrap();
        assert_eq!(lookup.lookup("N123").await.unwrap_err(), LookupError::NoItinerary);
    }

    #[tokio::test]
    async fn test_lookup_server_error_is_transport() {
        let base = serve_once("503 Service Unavailable", String::new()).await;

        let lookup = FlightAwareLookup::with_base_url(&base).unwrap();
        let err = lookup.lookup("DAL137").await.unwrap_err();
        assert!(!err.is_permanent(), "{:?}", err);
    }

    #[tokio::test]
    async fn test_lookup_connection_refused_is_transport() {
        // bind then drop to get a port nobody listens on
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let lookup = FlightAwareLookup::with_base_url(&format!("http://{}/", addr)).unwrap();
        let err = lookup.lookup("DAL137").await.unwrap_err();
        assert!(matches!(err, LookupError::Transport(_)));
    }
}
