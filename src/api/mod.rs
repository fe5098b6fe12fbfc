//! HTTP API layer: the handshake client and its response DTOs.
//!
//! Every method is called as `POST {api_base}/{method}` with a
//! form-encoded body.

pub mod dto;
pub mod handshake;

pub use handshake::HandshakeClient;
