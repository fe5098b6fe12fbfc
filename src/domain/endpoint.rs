//! Single-use socket endpoint returned by the handshake.
//!
//! [`SessionEndpoint`] is deliberately not `Clone`: opening the transport
//! takes it by value, so one endpoint backs at most one connection attempt.

use std::fmt;

use crate::error::ClientError;

/// Connection URL valid for exactly one connection attempt.
#[derive(Debug, PartialEq, Eq)]
pub struct SessionEndpoint(String);

impl SessionEndpoint {
    /// Validates a URL returned by the handshake.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::MissingUrl`] for an empty string and
    /// [`ClientError::InvalidEndpoint`] when the scheme is not `ws` or `wss`.
    pub fn parse(url: impl Into<String>) -> Result<Self, ClientError> {
        let url = url.into();
        let trimmed = url.trim();
        if trimmed.is_empty() {
            return Err(ClientError::MissingUrl);
        }
        if !(trimmed.starts_with("wss://") || trimmed.starts_with("ws://")) {
            return Err(ClientError::InvalidEndpoint(trimmed.to_string()));
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Returns the URL for logging.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the endpoint, yielding the URL to connect to.
    #[must_use]
    pub fn into_url(self) -> String {
        self.0
    }
}

impl fmt::Display for SessionEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
