// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::error;

use liverelay::config::RelayConfig;

#[derive(Debug, Parser)]
#[command(name = "liverelay", version, about = "Relay live-stream events to viewers")]
struct Cli {
    #[command(flatten)]
    config: RelayConfig,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the relay (default).
    Serve,
    /// Print a relay's viewer feed to the terminal.
    Watch {
        /// Push channel URL.
        #[arg(long, default_value = "ws://127.0.0.1:3002/ws")]
        url: String,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(&cli.config);

    let result = match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => liverelay::run(cli.config).await,
        Command::Watch { url } => watch(&url).await,
    };
    if let Err(e) = result {
        error!("fatal: {e:#}");
        std::process::exit(1);
    }
}

async fn watch(url: &str) -> anyhow::Result<()> {
    let shutdown = CancellationToken::new();
    let sd = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            sd.cancel();
        }
    });
    liverelay::watch::run(url, shutdown).await
}

fn init_tracing(config: &RelayConfig) {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info"));

    match config.log_format.as_str() {
        "json" => {
            fmt::fmt().with_env_filter(filter).json().init();
        }
        _ => {
            fmt::fmt().with_env_filter(filter).init();
        }
    }
}
