//! Response bodies of the real-time messaging API methods.

use serde::Deserialize;
use serde_json::Value;

use crate::domain::SessionEndpoint;
use crate::error::ClientError;

/// Reason reported when a rejection carries no `error` field.
pub const UNKNOWN_ERROR: &str = "unknown_error";

/// Body of an `rtm.start` response.
///
/// Only the fields this client consumes are modelled; everything else the
/// server sends (channel lists, user directories, ...) is ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct RtmStartResponse {
    /// Whether the credential was accepted.
    pub ok: bool,
    /// Single-use socket URL, present on success.
    #[serde(default)]
    pub url: Option<String>,
    /// Machine-readable failure reason, present when `ok` is false.
    #[serde(default)]
    pub error: Option<String>,
    /// The authenticated bot identity, in whatever shape the server sent.
    #[serde(default, rename = "self")]
    pub identity: Option<Value>,
    /// The workspace the bot belongs to, in whatever shape the server sent.
    #[serde(default)]
    pub team: Option<Value>,
}

impl RtmStartResponse {
    /// Converts the response into the endpoint to connect to.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::AuthRejected`] with the server's reason when
    /// `ok` is false, and [`ClientError::MissingUrl`] or
    /// [`ClientError::InvalidEndpoint`] when the URL is absent or unusable.
    pub fn into_endpoint(self) -> Result<SessionEndpoint, ClientError> {
        if !self.ok {
            let reason = self.error.unwrap_or_else(|| UNKNOWN_ERROR.to_string());
            return Err(ClientError::AuthRejected(reason));
        }
        match self.url {
            Some(url) => SessionEndpoint::parse(url),
            None => Err(ClientError::MissingUrl),
        }
    }
}

/// Short label for an identity or team field: the string itself, or the
/// `name` (else `id`) of an object. Other shapes have no label.
#[must_use]
pub fn describe(value: &Value) -> Option<&str> {
    match value {
        Value::String(label) => Some(label.as_str()),
        Value::Object(fields) => fields
            .get("name")
            .or_else(|| fields.get("id"))
            .and_then(Value::as_str),
        _ => None,
    }
}
