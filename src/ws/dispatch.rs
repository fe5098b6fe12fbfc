//! Interpretation of inbound messages.
//!
//! Every inbound message is classified as exactly one of greeting, chat
//! or unrecognized. Interpretation is pure: it produces the console line
//! to print and nothing else, so the session loop runs it inline.

use std::fmt;

use super::messages::{ChatMessage, RtmMessage};

/// Error raised when a recognized message lacks a field it needs.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InterpretError {
    /// A required field is absent.
    #[error("{kind} message is missing field `{field}`")]
    MissingField {
        /// Message kind.
        kind: &'static str,
        /// Name of the absent field.
        field: &'static str,
    },
}

/// Outcome of interpreting one inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Interpretation {
    /// The server greeting.
    Greeting,
    /// A chat line.
    Chat {
        /// Author.
        user: String,
        /// Message text.
        text: String,
        /// Channel it was posted to.
        channel: String,
    },
    /// Any other message kind.
    Unrecognized {
        /// The message's `type` discriminator.
        kind: String,
    },
}

impl fmt::Display for Interpretation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Greeting => f.write_str("Hello!"),
            Self::Chat {
                user,
                text,
                channel,
            } => write!(f, "{user} say: {text} in channel: {channel}"),
            Self::Unrecognized { kind } => write!(f, "Unknown action happens: {kind}"),
        }
    }
}

/// Classifies an inbound message.
///
/// # Errors
///
/// Returns [`InterpretError::MissingField`] for a chat message without a
/// `user`, `text` or `channel`. The failure concerns this message only.
pub fn interpret(message: &RtmMessage) -> Result<Interpretation, InterpretError> {
    match message {
        RtmMessage::Hello => Ok(Interpretation::Greeting),
        RtmMessage::Message(chat) => interpret_chat(chat),
        RtmMessage::Ping | RtmMessage::Unknown { .. } => Ok(Interpretation::Unrecognized {
            kind: message.kind().to_string(),
        }),
    }
}

fn interpret_chat(chat: &ChatMessage) -> Result<Interpretation, InterpretError> {
    Ok(Interpretation::Chat {
        user: required(chat.user.as_ref(), "user")?,
        text: required(chat.text.as_ref(), "text")?,
        channel: required(chat.channel.as_ref(), "channel")?,
    })
}

fn required(value: Option<&String>, field: &'static str) -> Result<String, InterpretError> {
    value.cloned().ok_or(InterpretError::MissingField {
        kind: "message",
        field,
    })
}
