//! Handshake client: exchanges a credential for a socket endpoint.
//!
//! One form-encoded `POST {api_base}/{method}` per call. No retries are
//! performed here; every failure is returned to the caller.

use std::time::Duration;

use reqwest::StatusCode;
use tracing::{debug, info};

use super::dto::{RtmStartResponse, describe};
use crate::domain::{Credential, SessionEndpoint};
use crate::error::ClientError;

/// Name of the API method that opens a real-time session.
pub const RTM_START: &str = "rtm.start";

/// HTTP client for the messaging API.
#[derive(Debug, Clone)]
pub struct HandshakeClient {
    http: reqwest::Client,
    api_base: String,
}

impl HandshakeClient {
    /// Creates a client with its own connection pool and request timeout.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Http`] if the underlying HTTP client cannot
    /// be built (e.g. the TLS backend fails to initialize).
    pub fn new(api_base: impl Into<String>, timeout: Duration) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(http, api_base))
    }

    /// Creates a client on top of an existing [`reqwest::Client`].
    #[must_use]
    pub fn with_client(http: reqwest::Client, api_base: impl Into<String>) -> Self {
        Self {
            http,
            api_base: api_base.into(),
        }
    }

    /// Returns the full URL of an API method.
    #[must_use]
    pub fn method_url(&self, method: &str) -> String {
        format!("{}/{method}", self.api_base.trim_end_matches('/'))
    }

    /// Calls an API method with form-encoded parameters.
    ///
    /// Returns the decoded JSON body; interpreting `ok`/`error` is left to
    /// the caller.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Http`] on network failure,
    /// [`ClientError::UnexpectedStatus`] for any status other than 200 and
    /// [`ClientError::Json`] when the body is not JSON.
    pub async fn call(
        &self,
        method: &str,
        params: &[(&str, &str)],
    ) -> Result<serde_json::Value, ClientError> {
        let url = self.method_url(method);
        debug!(%url, "calling api method");

        let response = self.http.post(&url).form(params).send().await?;
        let status = response.status();
        if status != StatusCode::OK {
            return Err(ClientError::UnexpectedStatus(status));
        }

        let body = response.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }

    /// Performs the `rtm.start` handshake.
    ///
    /// # Errors
    ///
    /// Transport failures are returned as by [`HandshakeClient::call`]. A
    /// rejected credential yields [`ClientError::AuthRejected`] carrying
    /// the server's reason; an accepted one without a usable URL yields
    /// [`ClientError::MissingUrl`] or [`ClientError::InvalidEndpoint`].
    pub async fn rtm_start(&self, credential: &Credential) -> Result<SessionEndpoint, ClientError> {
        info!("authorizing");

        let body = self
            .call(RTM_START, &[("token", credential.expose())])
            .await?;
        let response: RtmStartResponse = serde_json::from_value(body)?;

        if response.ok {
            if let Some(user) = response.identity.as_ref().and_then(describe) {
                info!(user, "authorized");
            }
            if let Some(team) = response.team.as_ref().and_then(describe) {
                info!(team, "joined team");
            }
        }

        response.into_endpoint()
    }
}
