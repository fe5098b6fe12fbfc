//! Command-line interface.

use clap::Parser;

use crate::config::ClientConfig;
use crate::domain::Credential;

/// Connects a bot to the real-time messaging socket and prints what it
/// receives.
#[derive(Parser, Debug, Clone)]
#[command(name = "rtm-client", version, about, long_about = None)]
pub struct Cli {
    /// Bot API token.
    #[arg(value_name = "TOKEN", conflicts_with = "token")]
    pub positional_token: Option<String>,

    /// Bot API token (alternative to the positional form).
    #[arg(long)]
    pub token: Option<String>,

    /// Base URL of the API, overriding `RTM_API_BASE`.
    #[arg(long)]
    pub api_base: Option<String>,

    /// `Origin` header for the socket, overriding `RTM_ORIGIN`.
    #[arg(long)]
    pub origin: Option<String>,
}

impl Cli {
    /// Returns the credential, or `None` when it is missing or a
    /// placeholder and usage should be shown instead.
    #[must_use]
    pub fn credential(&self) -> Option<Credential> {
        self.token
            .as_deref()
            .or(self.positional_token.as_deref())
            .and_then(Credential::from_arg)
    }

    /// Applies command-line overrides on top of the loaded configuration.
    pub fn apply(&self, config: &mut ClientConfig) {
        if let Some(api_base) = &self.api_base {
            config.api_base.clone_from(api_base);
        }
        if let Some(origin) = &self.origin {
            config.origin.clone_from(origin);
        }
    }
}

/// Short usage text printed when no usable token is given.
#[must_use]
pub fn usage() -> &'static str {
    "Usage: rtm-client <token>\n       rtm-client --token <token>\n"
}
