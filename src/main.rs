//! Vulners API forwarding proxy.
//!
//! # Architecture Overview
//!
//! ```text
//!                        ┌──────────────────────────────────────────────┐
//!                        │                VULNERS PROXY                  │
//!                        │                                               │
//!   Client Request       │  ┌─────────┐   ┌────────────┐   ┌──────────┐  │
//!   ─────────────────────┼─▶│  http   │──▶│   proxy    │──▶│ upstream │──┼──▶ vulners.com
//!                        │  │ server  │   │ forwarder  │   │  client  │  │
//!                        │  └─────────┘   └─────┬──────┘   └──────────┘  │
//!                        │                      │                        │
//!   Client Response      │  ┌─────────┐         ▼                        │
//!   ◀────────────────────┼──│  relay  │◀── filtered headers + body ◀────┼─── response
//!                        │  │  body   │                                  │
//!                        │  └─────────┘                                  │
//!                        │                                               │
//!                        │  config · security · observability · lifecycle│
//!                        └──────────────────────────────────────────────┘
//! ```

use clap::Parser;

use vulners_proxy::config::Cli;
use vulners_proxy::lifecycle;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if let Err(err) = lifecycle::run(cli).await {
        tracing::error!(error = %err, "Fatal startup error");
        return Err(err.into());
    }

    Ok(())
}
