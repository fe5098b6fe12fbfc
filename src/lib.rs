//! # rtm-client
//!
//! Minimal command-line client for a real-time messaging socket protocol
//! authenticated with a bot token.
//!
//! A credential is exchanged for a single-use socket URL (`rtm.start`),
//! the socket is opened, and a session loop exchanges JSON messages with
//! the server until the connection closes or the process is interrupted.
//!
//! ## Architecture
//!
//! ```text
//! CLI (cli, main)
//!     │
//!     ├── HandshakeClient (api/)      credential ──► SessionEndpoint
//!     │
//!     ├── connect (ws/transport)      SessionEndpoint ──► WsReader + WsWriter
//!     │
//!     └── Session (ws/session)
//!             ├── receive task ──► inbound queue ──► interpret (ws/dispatch) ──► Printer
//!             ├── Keepalive (ws/keepalive) ──► outbound queue (ws/outbound)
//!             └── single writer ──► WsWriter
//! ```

pub mod api;
pub mod cli;
pub mod client;
pub mod config;
pub mod console;
pub mod domain;
pub mod error;
pub mod ws;
