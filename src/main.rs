//! URL-fetch tunneling gateway.
//!
//! # Architecture Overview
//!
//! ```text
//!                       ┌───────────────────────────────────────────────────┐
//!                       │                  URLFETCH GATEWAY                  │
//!                       │                                                    │
//!   Outer POST          │  ┌──────────┐   ┌──────────┐   ┌──────────────┐   │
//!   ────────────────────┼─▶│   http   │──▶│ envelope │──▶│   gateway    │   │
//!                       │  │  server  │   │  frame + │   │ params/auth  │   │
//!                       │  └──────────┘   │  parser  │   └──────┬───────┘   │
//!                       │                 └──────────┘          │           │
//!                       │                                       ▼           │
//!   Outer 200           │  ┌──────────┐                 ┌──────────────┐   │
//!   ◀───────────────────┼──│  relay   │◀────────────────│  forwarder   │◀──┼──── Destination
//!                       │  │head+body │                 │deadline/retry│   │
//!                       │  └──────────┘                 └──────────────┘   │
//!                       │                                                    │
//!                       │  config · observability · lifecycle · pool         │
//!                       └───────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;

use urlfetch_gateway::config::load_config;
use urlfetch_gateway::lifecycle::startup;
use urlfetch_gateway::observability::logging;

#[derive(Parser)]
#[command(name = "urlfetch-gateway")]
#[command(about = "Tunneling gateway for enveloped HTTP requests", long_about = None)]
struct Cli {
    /// TOML config file; defaults apply when omitted
    #[arg(short, long, env = "URLFETCH_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    logging::init(&config.observability.log_level);
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        bind_address = %config.listener.bind_address,
        "urlfetch-gateway starting"
    );

    startup::run(config).await
}
