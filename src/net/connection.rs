// Websocket connection to the telemetry feed
// Wraps the stream with the two operations the feed protocol needs

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::{connect_async, tungstenite::protocol::Message, MaybeTlsStream, WebSocketStream};
use tracing::debug;

use super::messages::LocationUpdate;
use crate::error::FeedError;

pub type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// A single live connection to the feed server
pub struct FeedConnection {
    stream: WsStream,
    url: String,
}

impl FeedConnection {
    /// Open the websocket
    pub async fn connect(url: &str) -> Result<Self, FeedError> {
        let (stream, _response) = connect_async(url).await.map_err(|e| FeedError::Connect {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

        Ok(FeedConnection {
            stream,
            url: url.to_string(),
        })
    }

    /// Get the feed URL
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Send the viewer location ("{lat},{lon}" text frame)
    pub async fn send_location(&mut self, location: &LocationUpdate) -> Result<(), FeedError> {
        self.stream.send(Message::text(location.to_string())).await?;
        Ok(())
    }

    /// Read the next text message, skipping binary and control frames.
    ///
    /// Cancellation safe: nothing is buffered between polls of the underlying stream.
    pub async fn read_text(&mut self) -> Result<String, FeedError> {
        loop {
            match self.stream.next().await {
                Some(Ok(Message::Text(text))) => return Ok(text.as_str().to_owned()),
                Some(Ok(Message::Close(frame))) => {
                    debug!("Feed close frame: {:?}", frame);
                    return Err(FeedError::Closed);
                }
                Some(Ok(_)) => continue, // binary, ping, pong
                Some(Err(e)) => return Err(e.into()),
                None => return Err(FeedError::Closed),
            }
        }
    }

    /// Close the connection, errors are irrelevant at this point
    pub async fn close(mut self) {
        let _ = self.stream.close(None).await;
    }
}
