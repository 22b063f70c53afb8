// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # WEFT Overlay Node
//!
//! Entry point for the `weft-node` binary. Parses CLI arguments,
//! initializes logging, and runs the requested role.
//!
//! The binary supports five subcommands:
//!
//! - `seed`     — run a seed directory process
//! - `peer`     — run a peer process
//! - `supervise`— launch and manage a local deployment
//! - `simulate` — offline topology growth simulation
//! - `version`  — print build version information
//!
//! Both roles take a single positional `IP:PORT` argument — the listening
//! address that doubles as the process identity. A malformed address is
//! rejected by clap with a nonzero exit before any socket is touched.

mod cli;
mod logging;
mod sim;
mod supervisor;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::watch;

use weft_protocol::directory::SeedNode;
use weft_protocol::overlay::PeerNode;
use weft_protocol::seeds::SeedList;

use cli::{Commands, RoleArgs, WeftCli};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = WeftCli::parse();

    match cli.command {
        Commands::Seed(args) => run_seed(args).await,
        Commands::Peer(args) => run_peer(args).await,
        Commands::Supervise(args) => supervisor::run(args),
        Commands::Simulate(args) => {
            logging::init_logging(&role_filter("info"));
            sim::run(args);
            Ok(())
        }
        Commands::Version => {
            print_version();
            Ok(())
        }
    }
}

// ---------------------------------------------------------------------------
// seed — Directory process
// ---------------------------------------------------------------------------

/// Runs a seed: load the seed list (appending ourselves if absent), bind,
/// and serve the directory until a shutdown signal arrives.
async fn run_seed(args: RoleArgs) -> Result<()> {
    logging::init_role_logging(
        &role_filter(&args.log_level),
        std::path::Path::new("seed.log"),
        &args.output_file,
    )?;

    let me = args.addr;
    let seeds = SeedList::load_with_self(&args.seed_config, &me)
        .context("seed configuration unavailable")?;

    let listener = TcpListener::bind(me.as_dial_pair())
        .await
        .with_context(|| format!("failed to bind seed listener on {me}"))?;

    tracing::info!(
        seed = %me,
        config = %args.seed_config.display(),
        seeds = seeds.len(),
        quorum = seeds.quorum(),
        "starting seed"
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let node = SeedNode::new(me, seeds);

    tokio::select! {
        _ = node.run(listener, shutdown_rx) => {}
        _ = shutdown_signal() => {
            tracing::info!("shutdown signal received");
        }
    }

    let _ = shutdown_tx.send(true);
    Ok(())
}

// ---------------------------------------------------------------------------
// peer — Participant process
// ---------------------------------------------------------------------------

/// Runs a peer: load the seed list, bind, and run the bootstrap-gossip-
/// ping lifecycle until a shutdown signal arrives.
async fn run_peer(args: RoleArgs) -> Result<()> {
    logging::init_role_logging(
        &role_filter(&args.log_level),
        std::path::Path::new("peer.log"),
        &args.output_file,
    )?;

    let me = args.addr;
    let seeds = SeedList::load(&args.seed_config).context("seed configuration unavailable")?;

    let listener = TcpListener::bind(me.as_dial_pair())
        .await
        .with_context(|| format!("failed to bind peer listener on {me}"))?;

    tracing::info!(
        peer = %me,
        config = %args.seed_config.display(),
        seeds = seeds.len(),
        "starting peer"
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let node = PeerNode::new(me, seeds);

    tokio::select! {
        _ = node.run(listener, shutdown_rx) => {}
        _ = shutdown_signal() => {
            tracing::info!("shutdown signal received");
        }
    }

    let _ = shutdown_tx.send(true);
    Ok(())
}

// ---------------------------------------------------------------------------
// version
// ---------------------------------------------------------------------------

/// Prints version information to stdout.
fn print_version() {
    println!("weft-node {}", env!("CARGO_PKG_VERSION"));
    println!("rustc     {}", option_env!("RUSTC_VERSION").unwrap_or("unknown"));
    if let Some(commit) = option_env!("GIT_COMMIT") {
        println!("commit    {commit}");
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Default tracing directives for a role process at the given level.
fn role_filter(level: &str) -> String {
    format!("weft_node={level},weft_protocol={level}")
}

/// Waits for SIGINT (Ctrl+C) or SIGTERM, whichever comes first.
///
/// On non-Unix platforms, only Ctrl+C is supported.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_filter_covers_both_crates() {
        let filter = role_filter("debug");
        assert!(filter.contains("weft_node=debug"));
        assert!(filter.contains("weft_protocol=debug"));
    }
}
