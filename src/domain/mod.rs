//! Domain layer: the values exchanged between handshake and session.
//!
//! A [`Credential`] goes into the handshake; a [`SessionEndpoint`] comes
//! out of it and is consumed by the transport.

pub mod credential;
pub mod endpoint;

pub use credential::Credential;
pub use endpoint::SessionEndpoint;
