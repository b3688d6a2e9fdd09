//! Switchboard CLI - model selection, fallback execution and tier detection
#![cfg_attr(
    test,
    allow(
        clippy::expect_used,
        clippy::unwrap_used,
        clippy::panic,
        reason = "Allow for tests"
    )
)]

use anyhow::Result;
use clap::Parser as _;
use std::io::{self, Write as _};
use switchboard_cli::cli::Cli;
use switchboard_cli::handlers;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt as _, util::SubscriberInitExt as _};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose {
        "switchboard_routing=debug,switchboard_providers=debug,switchboard_cli=debug"
    } else {
        "switchboard_routing=info,switchboard_providers=warn,switchboard_cli=info"
    };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into()))
        .with(fmt::layer().with_writer(io::stderr).with_target(false))
        .init();

    let output = handlers::run(cli).await?;
    writeln!(io::stdout().lock(), "{output}")?;
    Ok(())
}
