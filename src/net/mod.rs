// Network layer module
// Websocket telemetry feed and its offline replacement

pub mod connection;
pub mod feed_client;
pub mod fixture;
pub mod messages;

pub use connection::FeedConnection;
pub use feed_client::{ConnectionState, FeedClient, FeedEvent, ReconnectPolicy};
pub use fixture::{load_fixture, replay_fixture, save_fixture};
pub use messages::{parse_batch, LocationUpdate};
