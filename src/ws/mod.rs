//! WebSocket layer: transport, message codec, keepalive, session loop.
//!
//! The session loop in [`session`] is the only writer on the connection;
//! everything else reaches the socket through the queue in [`outbound`].

pub mod dispatch;
pub mod keepalive;
pub mod messages;
pub mod outbound;
pub mod session;
pub mod transport;

pub use messages::{ChatMessage, RtmMessage};
pub use session::{CloseReason, Session, SessionState, SessionStats, SessionSummary};
pub use transport::{Inbound, MessageSink, MessageSource};
