//! Stratum Command-Line Client
//!
//! Applies a versioned roadmap of schema phases to a PostgreSQL database.

mod commands;
mod config;
mod error;
mod formatter;
mod output;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use commands::Context;
use config::{Args, Command};
use error::CliError;

#[tokio::main]
async fn main() {
    let args = Args::parse();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| args.log_filter().into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(!args.no_color),
        )
        .init();

    tracing::debug!(version = env!("CARGO_PKG_VERSION"), "starting stratum");

    let cancel = CancellationToken::new();
    let signal_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received, stopping after the current step");
            signal_token.cancel();
        }
    });

    let ctx = Context::new(args.to_config());
    let result = run(&ctx, args.command, &cancel).await;

    if let Err(e) = result {
        if e.is_benign() {
            ctx.printer.info(&e.to_string());
        } else {
            ctx.printer.error(&format!("{}: {}", e.kind(), e));
        }
        std::process::exit(e.exit_code());
    }
}

async fn run(ctx: &Context, command: Command, cancel: &CancellationToken) -> Result<(), CliError> {
    match command {
        Command::Migrate {
            target,
            no_build,
            dry_run,
        } => commands::migrate(ctx, target, no_build, dry_run, cancel).await,
        Command::Plan { target, format } => commands::plan(ctx, target, format).await,
        Command::Status { format } => commands::status(ctx, format).await,
        Command::Verify { format } => commands::verify(ctx, format),
    }
}
