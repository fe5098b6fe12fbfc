//! Client error types.
//!
//! [`ClientError`] is the central error type for the client. Variants are
//! grouped by the phase that produces them: handshake, transport open,
//! live session. Only a few of them ever reach the process exit path; the
//! session loop is the error boundary for everything else.

use tokio_tungstenite::tungstenite;

/// Client-side error enum.
///
/// # Error Phases
///
/// | Phase      | Variants                                                    | Outcome            |
/// |------------|-------------------------------------------------------------|--------------------|
/// | Handshake  | `Http`, `UnexpectedStatus`, `Json`, `AuthRejected`, `MissingUrl`, `InvalidEndpoint` | fatal  |
/// | Connect    | `InvalidOrigin`, `Connect`                                  | fatal              |
/// | Session    | `MalformedMessage`                                          | logged, continues  |
/// | Session    | `Transport`, `SendExhausted`                                | session terminates |
/// | Teardown   | `SessionClosed`                                             | enqueue refused    |
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The handshake request could not be sent or its body not read.
    #[error("handshake request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The handshake endpoint answered with a status other than 200.
    #[error("unexpected handshake status: {0}")]
    UnexpectedStatus(reqwest::StatusCode),

    /// A body that should be JSON could not be decoded.
    #[error("malformed json: {0}")]
    Json(#[from] serde_json::Error),

    /// The server rejected the credential (`ok: false`).
    #[error("handshake rejected: {0}")]
    AuthRejected(String),

    /// The server accepted the credential but returned no connection URL.
    #[error("handshake response did not include a connection url")]
    MissingUrl,

    /// The returned connection URL is not a `ws://` or `wss://` URL.
    #[error("invalid session endpoint: {0}")]
    InvalidEndpoint(String),

    /// The configured origin is not a valid header value.
    #[error("invalid origin header: {0}")]
    InvalidOrigin(String),

    /// The socket connection could not be opened.
    #[error("failed to open connection: {0}")]
    Connect(Box<tungstenite::Error>),

    /// Reading from or writing to an open connection failed.
    #[error("transport error: {0}")]
    Transport(Box<tungstenite::Error>),

    /// An inbound payload could not be decoded into a message.
    #[error("malformed message: {0}")]
    MalformedMessage(String),

    /// An outbound message failed on every allowed attempt.
    #[error("message send failed after {attempts} attempts")]
    SendExhausted {
        /// Number of attempts made before giving up.
        attempts: u32,
    },

    /// The session has closed and no longer accepts outbound messages.
    #[error("session closed")]
    SessionClosed,
}

impl ClientError {
    /// Returns `true` for errors that only affect a single inbound payload.
    ///
    /// The receive task logs transient errors and keeps reading; any other
    /// error escalates to session termination.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::MalformedMessage(_) | Self::Json(_))
    }

    /// Returns `true` for errors the handshake step produces.
    ///
    /// Inbound decode failures are `Json` too, but they never leave the
    /// session.
    #[must_use]
    pub const fn is_handshake(&self) -> bool {
        matches!(
            self,
            Self::Http(_)
                | Self::UnexpectedStatus(_)
                | Self::Json(_)
                | Self::AuthRejected(_)
                | Self::MissingUrl
                | Self::InvalidEndpoint(_)
        )
    }
}

impl From<tungstenite::Error> for ClientError {
    fn from(err: tungstenite::Error) -> Self {
        Self::Transport(Box::new(err))
    }
}
