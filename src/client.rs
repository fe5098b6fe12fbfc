//! End-to-end client flow: handshake, connect, run the session.

use std::future::Future;

use tracing::info;

use crate::api::HandshakeClient;
use crate::config::ClientConfig;
use crate::console::Printer;
use crate::domain::Credential;
use crate::error::ClientError;
use crate::ws::session::{Session, SessionSummary};
use crate::ws::transport;

/// Authenticates, opens the socket and runs one session to completion.
///
/// Returns when the peer closes the connection or `shutdown` completes.
///
/// # Errors
///
/// Handshake and connection failures are returned before any session is
/// started. Once running, only a fatal read error or an exhausted send
/// ends the session with an error.
pub async fn run<P, F>(
    config: &ClientConfig,
    credential: &Credential,
    printer: P,
    shutdown: F,
) -> Result<SessionSummary, ClientError>
where
    P: Printer,
    F: Future<Output = ()>,
{
    let handshake = HandshakeClient::new(config.api_base.as_str(), config.http_timeout())?;
    let endpoint = handshake.rtm_start(credential).await?;

    let (reader, writer) = transport::connect(endpoint, &config.origin).await?;
    info!("connected");

    let mut session = Session::start(reader, writer, printer, config.session_config());
    session.run_until(shutdown).await
}
