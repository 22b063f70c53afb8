//! # CLI Interface
//!
//! Defines the command-line argument structure for `weft-node` using
//! `clap` derive. One binary, every role: `seed`, `peer`, `supervise`,
//! `simulate`, and `version`.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use weft_protocol::endpoint::Endpoint;

/// WEFT overlay node.
///
/// Runs either side of the two-tier membership overlay: a seed directory
/// process or a peer process. Also ships the local deployment supervisor
/// and an offline topology simulator.
#[derive(Parser, Debug)]
#[command(
    name = "weft-node",
    about = "WEFT overlay node",
    version,
    propagate_version = true
)]
pub struct WeftCli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level subcommands for the WEFT node binary.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a seed directory process.
    Seed(RoleArgs),
    /// Run a peer process.
    Peer(RoleArgs),
    /// Launch and manage a local deployment (seeds + peers) interactively.
    Supervise(SuperviseArgs),
    /// Grow a synthetic overlay offline and print its degree distribution.
    Simulate(SimulateArgs),
    /// Print version information and exit.
    Version,
}

/// Arguments shared by the `seed` and `peer` roles.
#[derive(Parser, Debug)]
pub struct RoleArgs {
    /// Listening address, `IP:PORT`. Doubles as this process's identity.
    pub addr: Endpoint,

    /// Path to the seed list file, one `HOST:PORT` per line.
    #[arg(long, env = "WEFT_SEED_CONFIG", default_value = "config.txt")]
    pub seed_config: PathBuf,

    /// Path to the shared output file every role appends to.
    #[arg(long, env = "WEFT_OUTPUT_FILE", default_value = "outputfile.txt")]
    pub output_file: PathBuf,

    /// Default log level when RUST_LOG is not set.
    #[arg(long, env = "WEFT_LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

/// Arguments for the `supervise` subcommand.
#[derive(Parser, Debug)]
pub struct SuperviseArgs {
    /// Path to the supervisor configuration (TOML).
    #[arg(
        long,
        short = 'c',
        env = "WEFT_SUPERVISOR_CONFIG",
        default_value = "supervisor.toml"
    )]
    pub config: PathBuf,
}

/// Arguments for the `simulate` subcommand.
#[derive(Parser, Debug)]
pub struct SimulateArgs {
    /// Number of peers to grow the synthetic overlay to.
    #[arg(long, default_value_t = 1000)]
    pub peers: usize,

    /// Seed for the simulation RNG. Omit for a fresh run each time.
    #[arg(long)]
    pub rng_seed: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli_structure() {
        // Ensures the derive macros produce a valid CLI definition.
        WeftCli::command().debug_assert();
    }

    #[test]
    fn role_addr_parses_as_an_endpoint() {
        let cli = WeftCli::parse_from(["weft-node", "seed", "127.0.0.1:6001"]);
        match cli.command {
            Commands::Seed(args) => assert_eq!(args.addr, Endpoint::new("127.0.0.1", 6001)),
            other => panic!("expected seed, got {other:?}"),
        }
    }

    #[test]
    fn malformed_addr_is_rejected() {
        let result = WeftCli::try_parse_from(["weft-node", "peer", "not-an-endpoint"]);
        assert!(result.is_err());
    }
}
