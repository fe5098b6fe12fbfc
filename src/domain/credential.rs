//! Bearer credential supplied on the command line.
//!
//! [`Credential`] wraps the bot token so it cannot be logged by accident:
//! its `Debug` output is redacted and the raw value is only reachable via
//! [`Credential::expose`].

use std::fmt;

/// Opaque bearer token used once, at handshake time.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    /// Builds a credential from a raw command-line value.
    ///
    /// Returns `None` for blank input and for placeholders such as
    /// `<slack-api-token>`, so the caller can print usage instead of
    /// attempting a handshake that cannot succeed.
    #[must_use]
    pub fn from_arg(raw: &str) -> Option<Self> {
        let token = raw.trim();
        if token.is_empty() || is_placeholder(token) {
            return None;
        }
        Some(Self(token.to_string()))
    }

    /// Returns the raw token for the handshake request.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}

fn is_placeholder(token: &str) -> bool {
    token.starts_with('<') && token.ends_with('>')
}
