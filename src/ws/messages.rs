//! Structured messages exchanged over the socket.
//!
//! Every frame is a JSON object carrying a `type` discriminator. The
//! recognized kinds decode into dedicated variants; any other kind is kept
//! as [`RtmMessage::Unknown`] with its raw fields so it can still be
//! reported.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ClientError;

/// Discriminator field present on every message.
pub const TYPE_FIELD: &str = "type";

/// A decoded unit of protocol traffic.
#[derive(Debug, Clone, PartialEq)]
pub enum RtmMessage {
    /// Server greeting sent once the socket is ready (`{"type":"hello"}`).
    Hello,
    /// A chat message posted to a channel.
    Message(ChatMessage),
    /// Keepalive (`{"type":"ping"}`); outbound in practice.
    Ping,
    /// Any other kind, with all of its fields except `type`.
    Unknown {
        /// Value of the `type` discriminator.
        kind: String,
        /// Remaining fields, kept verbatim.
        fields: Map<String, Value>,
    },
}

/// Payload of a `message` event.
///
/// Fields are optional on the wire: edited, bot and system messages omit
/// some of them. Interpretation decides what a missing field means.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Author user ID.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    /// Message text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Channel ID the message was posted to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
    /// Server timestamp, also the message ID within its channel.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ts: Option<String>,
    /// Message subtype (`bot_message`, `channel_join`, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtype: Option<String>,
}

impl RtmMessage {
    /// Decodes one JSON frame.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Json`] when the payload is not JSON and
    /// [`ClientError::MalformedMessage`] when it is not an object with a
    /// string `type` field or a recognized kind has ill-typed fields.
    pub fn decode(payload: &[u8]) -> Result<Self, ClientError> {
        let value: Value = serde_json::from_slice(payload)?;
        Self::from_value(value)
    }

    /// Classifies an already-parsed JSON value by its `type` field.
    ///
    /// # Errors
    ///
    /// See [`RtmMessage::decode`].
    pub fn from_value(value: Value) -> Result<Self, ClientError> {
        let Value::Object(mut fields) = value else {
            return Err(ClientError::MalformedMessage(
                "payload is not a json object".to_string(),
            ));
        };

        let kind = match fields.remove(TYPE_FIELD) {
            Some(Value::String(kind)) => kind,
            Some(_) => {
                return Err(ClientError::MalformedMessage(
                    "type field is not a string".to_string(),
                ));
            }
            None => {
                return Err(ClientError::MalformedMessage(
                    "missing type field".to_string(),
                ));
            }
        };

        match kind.as_str() {
            "hello" => Ok(Self::Hello),
            "ping" => Ok(Self::Ping),
            "message" => serde_json::from_value(Value::Object(fields))
                .map(Self::Message)
                .map_err(|err| ClientError::MalformedMessage(format!("message event: {err}"))),
            _ => Ok(Self::Unknown { kind, fields }),
        }
    }

    /// Returns the `type` discriminator of this message.
    #[must_use]
    pub fn kind(&self) -> &str {
        match self {
            Self::Hello => "hello",
            Self::Message(_) => "message",
            Self::Ping => "ping",
            Self::Unknown { kind, .. } => kind,
        }
    }

    /// Converts the message back into a JSON object with its `type` field.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Json`] if a chat payload cannot be serialized.
    pub fn to_value(&self) -> Result<Value, ClientError> {
        let mut object = match self {
            Self::Hello | Self::Ping => Map::new(),
            Self::Message(chat) => match serde_json::to_value(chat)? {
                Value::Object(map) => map,
                _ => Map::new(),
            },
            Self::Unknown { fields, .. } => fields.clone(),
        };
        object.insert(TYPE_FIELD.to_string(), Value::String(self.kind().to_string()));
        Ok(Value::Object(object))
    }

    /// Encodes the message as a JSON text frame.
    ///
    /// A ping encodes to exactly `{"type":"ping"}`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Json`] if serialization fails.
    pub fn encode(&self) -> Result<String, ClientError> {
        Ok(serde_json::to_string(&self.to_value()?)?)
    }
}
