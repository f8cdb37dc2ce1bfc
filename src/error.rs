// Error types for the feed, enrichment and lookup layers

use thiserror::Error;

/// Errors raised by the telemetry feed.
///
/// Transport variants (everything but `Parse`) leave the tracked set untouched and
/// put the client back into reconnect; `Parse` only drops the offending message.
#[derive(Error, Debug)]
pub enum FeedError {
    #[error("connect to {url} failed: {reason}")]
    Connect { url: String, reason: String },

    #[error("websocket error {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("feed closed by server")]
    Closed,

    #[error("malformed feed message: {0}")]
    Parse(String),

    #[error("IO error {0}")]
    Io(#[from] std::io::Error),

    #[error("gave up reconnecting after {0} attempts")]
    RetriesExhausted(u32),
}

impl FeedError {
    /// True for errors that only affect a single message
    pub fn is_parse(&self) -> bool {
        matches!(self, FeedError::Parse(_))
    }
}

/// Failure classification of a single itinerary lookup.
///
/// `NoItinerary` and `Malformed` are permanent for the session (private flight),
/// `Transport` is retryable and never cached.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LookupError {
    #[error("lookup transport error {0}")]
    Transport(String),

    #[error("no itinerary published")]
    NoItinerary,

    #[error("unparsable itinerary: {0}")]
    Malformed(String),
}

impl LookupError {
    pub fn is_permanent(&self) -> bool {
        !matches!(self, LookupError::Transport(_))
    }
}

impl From<reqwest::Error> for LookupError {
    fn from(e: reqwest::Error) -> Self {
        LookupError::Transport(e.to_string())
    }
}

/// Errors returned to enrichment callers. Private flights are not errors (`Ok(None)`).
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EnrichmentError {
    #[error("enrichment lookup failed, retry later: {0}")]
    Transport(String),

    #[error("enrichment lookup cancelled")]
    Cancelled,
}
