//! rtm-client entry point.
//!
//! Parses the token, authenticates and runs one session until the server
//! closes the connection or Ctrl-C is pressed.

use clap::Parser;
use tracing_subscriber::EnvFilter;

use rtm_client::cli::{self, Cli};
use rtm_client::client;
use rtm_client::config::ClientConfig;
use rtm_client::console::StdoutPrinter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Load configuration
    let mut config = ClientConfig::from_env();
    cli.apply(&mut config);

    init_tracing(config.log_json);

    let Some(credential) = cli.credential() else {
        println!("{}", cli::usage());
        return Ok(());
    };

    let shutdown = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %err, "failed to install ctrl-c handler");
            std::future::pending::<()>().await;
        }
        tracing::info!("interrupted");
    };

    match client::run(&config, &credential, StdoutPrinter, shutdown).await {
        Ok(summary) => {
            tracing::info!(reason = ?summary.reason, "done");
            Ok(())
        }
        Err(err) => {
            if err.is_handshake() {
                tracing::error!(error = %err, "handshake failed");
            } else {
                tracing::error!(error = %err, "session failed");
            }
            Err(err.into())
        }
    }
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}
