// Offline feed source
// Replays a recorded batch from disk so the pipeline runs without a feed server

use std::path::Path;

use tracing::info;

use super::feed_client::ConnectionState;
use super::messages::parse_batch;
use crate::coordinator::CoordinatorHandle;
use crate::error::FeedError;
use crate::flight::FlightRecord;

/// Load a file in the inbound feed format as one batch
pub async fn load_fixture(path: impl AsRef<Path>) -> Result<Vec<FlightRecord>, FeedError> {
    let text = tokio::fs::read_to_string(path.as_ref()).await?;
    parse_batch(&text)
}

/// Record a batch in the inbound feed format, for later replay
pub async fn save_fixture(path: impl AsRef<Path>, batch: &[FlightRecord]) -> Result<(), FeedError> {
    let text = serde_json::to_string_pretty(batch).map_err(|e| FeedError::Parse(e.to_string()))?;
    tokio::fs::write(path.as_ref(), text).await?;
    Ok(())
}

/// Send the fixture to the coordinator as if it came from a connected feed
pub async fn replay_fixture(path: impl AsRef<Path>, coordinator: &CoordinatorHandle) -> Result<usize, FeedError> {
    let batch = load_fixture(path.as_ref()).await?;
    let n = batch.len();
    info!("Replaying {} flights from {}", n, path.as_ref().display());

    if !coordinator.connectivity(ConnectionState::Connected).await || !coordinator.feed_batch(batch).await {
        return Err(FeedError::Closed);
    }
    Ok(n)
}
