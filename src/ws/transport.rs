//! Transport session: the long-lived socket connection.
//!
//! [`connect`] opens the socket and splits it into a [`WsReader`] owned by
//! the receive task and a [`WsWriter`] owned by the session loop. The two
//! halves are also the [`MessageSource`] / [`MessageSink`] seams the loop
//! is generic over.

use std::fmt;
use std::future::Future;
use std::io::ErrorKind;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::error::ProtocolError;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::http::header::ORIGIN;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, info};

use super::messages::RtmMessage;
use crate::domain::SessionEndpoint;
use crate::error::ClientError;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Result of a successful receive.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// One decoded message.
    Message(RtmMessage),
    /// The peer closed the connection (end of stream).
    Closed,
}

/// Read side of a connection.
pub trait MessageSource: Send + 'static {
    /// Waits for the next decoded message.
    ///
    /// Returns [`Inbound::Closed`] on orderly end of stream. Errors for
    /// which [`ClientError::is_transient`] holds concern a single payload;
    /// the caller may keep reading after them.
    fn receive(&mut self) -> impl Future<Output = Result<Inbound, ClientError>> + Send;
}

/// Write side of a connection.
pub trait MessageSink: Send {
    /// Serializes and writes one message.
    fn send(&mut self, message: &RtmMessage)
    -> impl Future<Output = Result<(), ClientError>> + Send;

    /// Releases the connection. Calling it more than once is a no-op.
    fn close(&mut self) -> impl Future<Output = ()> + Send;
}

/// Opens a socket to `endpoint`, sending `origin` as the `Origin` header.
///
/// The endpoint is consumed: a failed attempt is not retried with it.
///
/// # Errors
///
/// Returns [`ClientError::InvalidOrigin`] if `origin` is not a valid
/// header value and [`ClientError::Connect`] if the URL is unusable or the
/// upgrade fails.
pub async fn connect(
    endpoint: SessionEndpoint,
    origin: &str,
) -> Result<(WsReader, WsWriter), ClientError> {
    let mut request = endpoint
        .into_url()
        .into_client_request()
        .map_err(|err| ClientError::Connect(Box::new(err)))?;
    // The path and query carry the session ticket.
    info!(host = request.uri().host().unwrap_or_default(), "connecting socket");

    let origin =
        HeaderValue::from_str(origin).map_err(|_| ClientError::InvalidOrigin(origin.to_string()))?;
    request.headers_mut().insert(ORIGIN, origin);

    let (stream, response) = tokio_tungstenite::connect_async(request)
        .await
        .map_err(|err| ClientError::Connect(Box::new(err)))?;
    debug!(status = %response.status(), "socket upgraded");

    let (sink, stream) = stream.split();
    Ok((WsReader { stream }, WsWriter { sink, closed: false }))
}

/// Read half of an open socket.
pub struct WsReader {
    stream: SplitStream<WsStream>,
}

impl fmt::Debug for WsReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WsReader").finish_non_exhaustive()
    }
}

impl MessageSource for WsReader {
    async fn receive(&mut self) -> Result<Inbound, ClientError> {
        loop {
            let Some(frame) = self.stream.next().await else {
                return Ok(Inbound::Closed);
            };
            match frame {
                Ok(Message::Text(text)) => {
                    return RtmMessage::decode(text.as_str().as_bytes()).map(Inbound::Message);
                }
                Ok(Message::Binary(bytes)) => {
                    return RtmMessage::decode(&bytes).map(Inbound::Message);
                }
                Ok(Message::Close(frame)) => {
                    debug!(?frame, "peer sent close frame");
                    return Ok(Inbound::Closed);
                }
                // Control frames are answered by tungstenite itself.
                Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_)) => {}
                Err(err) if is_disconnect(&err) => {
                    debug!(error = %err, "connection dropped");
                    return Ok(Inbound::Closed);
                }
                Err(err) => return Err(err.into()),
            }
        }
    }
}

/// Returns `true` for read errors that mean the peer went away, with or
/// without a closing handshake.
fn is_disconnect(err: &tungstenite::Error) -> bool {
    match err {
        tungstenite::Error::ConnectionClosed
        | tungstenite::Error::AlreadyClosed
        | tungstenite::Error::Protocol(ProtocolError::ResetWithoutClosingHandshake) => true,
        tungstenite::Error::Io(io) => matches!(
            io.kind(),
            ErrorKind::UnexpectedEof
                | ErrorKind::ConnectionReset
                | ErrorKind::ConnectionAborted
                | ErrorKind::BrokenPipe
        ),
        _ => false,
    }
}

/// Write half of an open socket.
pub struct WsWriter {
    sink: SplitSink<WsStream, Message>,
    closed: bool,
}

impl fmt::Debug for WsWriter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WsWriter")
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}

impl MessageSink for WsWriter {
    async fn send(&mut self, message: &RtmMessage) -> Result<(), ClientError> {
        if self.closed {
            return Err(tungstenite::Error::AlreadyClosed.into());
        }
        let text = message.encode()?;
        self.sink.send(Message::text(text)).await?;
        Ok(())
    }

    async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if let Err(err) = self.sink.close().await {
            debug!(error = %err, "socket close did not complete cleanly");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io;

    use super::*;

    #[test]
    fn dropped_connection_is_a_disconnect() {
        assert!(is_disconnect(&tungstenite::Error::Protocol(
            ProtocolError::ResetWithoutClosingHandshake
        )));
        assert!(is_disconnect(&tungstenite::Error::ConnectionClosed));
        assert!(is_disconnect(&tungstenite::Error::Io(io::Error::from(
            ErrorKind::ConnectionReset
        ))));
        assert!(is_disconnect(&tungstenite::Error::Io(io::Error::from(
            ErrorKind::UnexpectedEof
        ))));
    }

    #[test]
    fn other_read_errors_are_not_a_disconnect() {
        assert!(!is_disconnect(&tungstenite::Error::AttackAttempt));
        assert!(!is_disconnect(&tungstenite::Error::Io(io::Error::from(
            ErrorKind::PermissionDenied
        ))));
        assert!(!is_disconnect(&tungstenite::Error::Protocol(
            ProtocolError::NonZeroReservedBits
        )));
    }
}
