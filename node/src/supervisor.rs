//! # Deployment Supervisor
//!
//! Launches and babysits a local WEFT deployment: every configured seed as
//! a child process, an initial batch of peers on ports scanned from the
//! configured range, and an interactive console for adding and killing
//! peers while the overlay runs.
//!
//! The supervisor is plumbing, not protocol. It never speaks the wire
//! format; its entire view of a child is "the process I spawned on port N
//! is still my problem". Seeds write themselves into the seed config file
//! at startup, so the peers launched afterwards read an authoritative
//! list without the supervisor copying anything around.

use std::collections::{BTreeMap, HashSet};
use std::io::Write as _;
use std::net::TcpStream;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use tracing::{info, warn};

use weft_protocol::endpoint::Endpoint;

use crate::cli::SuperviseArgs;

/// Pause between child launches, so seeds are accepting before the next
/// process needs them.
const LAUNCH_STAGGER: Duration = Duration::from_millis(500);

/// Artifacts `del` sweeps up, matching what the roles write.
const ARTIFACTS: [&str; 3] = ["seed.log", "peer.log", "outputfile.txt"];

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Supervisor configuration, read from TOML.
///
/// ```toml
/// initial_peers = 3
/// seed_config = "config.txt"
///
/// [[seeds]]
/// ip = "127.0.0.1"
/// port = 6001
///
/// [peer_port_range]
/// start = 7001
/// end = 7100
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct SupervisorConfig {
    /// Seed processes to launch.
    pub seeds: Vec<SeedEntry>,
    /// Port range peers are allocated from.
    pub peer_port_range: PortRange,
    /// Peers to launch at startup.
    #[serde(default = "default_initial_peers")]
    pub initial_peers: usize,
    /// Seed list file handed to every child via `--seed-config`.
    #[serde(default = "default_seed_config")]
    pub seed_config: PathBuf,
}

/// One seed's address in the supervisor config.
#[derive(Debug, Clone, Deserialize)]
pub struct SeedEntry {
    pub ip: String,
    pub port: u16,
}

/// Inclusive port range for peer allocation.
#[derive(Debug, Clone, Deserialize)]
pub struct PortRange {
    pub start: u16,
    pub end: u16,
}

fn default_initial_peers() -> usize {
    3
}

fn default_seed_config() -> PathBuf {
    PathBuf::from("config.txt")
}

impl SupervisorConfig {
    /// Loads and validates the configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read supervisor config {}", path.display()))?;
        let config: Self = toml::from_str(&text)
            .with_context(|| format!("failed to parse supervisor config {}", path.display()))?;

        if config.seeds.is_empty() {
            bail!("supervisor config lists no seeds");
        }
        if config.peer_port_range.start > config.peer_port_range.end {
            bail!(
                "peer_port_range is empty: {}..={}",
                config.peer_port_range.start,
                config.peer_port_range.end
            );
        }
        Ok(config)
    }
}

// ---------------------------------------------------------------------------
// Console commands
// ---------------------------------------------------------------------------

/// One line of operator input, parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleCommand {
    /// Spawn one more peer.
    Add,
    /// Kill the peer on this port.
    Kill(u16),
    /// List live peer ports.
    List,
    /// Terminate every child and exit.
    Exit,
    /// Exit, then remove log artifacts and the seed config file.
    Del,
}

/// Parses an operator command line. Errors are messages for the operator,
/// not failures of the supervisor.
pub fn parse_command(line: &str) -> Result<ConsoleCommand, String> {
    let mut words = line.split_whitespace();
    match words.next() {
        Some("add") => Ok(ConsoleCommand::Add),
        Some("kill") => {
            let port = words
                .next()
                .ok_or_else(|| "usage: kill <port>".to_string())?;
            let port = port
                .parse::<u16>()
                .map_err(|_| format!("not a port: {port}"))?;
            Ok(ConsoleCommand::Kill(port))
        }
        Some("list") => Ok(ConsoleCommand::List),
        Some("exit") => Ok(ConsoleCommand::Exit),
        Some("del") => Ok(ConsoleCommand::Del),
        Some(other) => Err(format!("unknown command: {other}")),
        None => Err("empty command".to_string()),
    }
}

// ---------------------------------------------------------------------------
// Node manager
// ---------------------------------------------------------------------------

/// Owns every child process of the deployment.
pub struct NodeManager {
    config: SupervisorConfig,
    binary: PathBuf,
    seed_children: Vec<Child>,
    peer_children: BTreeMap<u16, Child>,
    used_ports: HashSet<u16>,
}

impl NodeManager {
    /// Creates a manager that spawns children of this very binary.
    pub fn new(config: SupervisorConfig) -> Result<Self> {
        let binary = std::env::current_exe().context("cannot locate own binary")?;
        Ok(Self {
            config,
            binary,
            seed_children: Vec::new(),
            peer_children: BTreeMap::new(),
            used_ports: HashSet::new(),
        })
    }

    /// True when nothing is currently listening on the port and we have
    /// not already promised it to a child.
    fn port_is_free(&self, port: u16) -> bool {
        if self.used_ports.contains(&port) {
            return false;
        }
        TcpStream::connect_timeout(
            &std::net::SocketAddr::from(([127, 0, 0, 1], port)),
            Duration::from_millis(200),
        )
        .is_err()
    }

    /// Scans the configured range for the next free peer port.
    pub fn next_free_port(&mut self) -> Result<u16> {
        let range = self.config.peer_port_range.start..=self.config.peer_port_range.end;
        for port in range {
            if self.port_is_free(port) {
                self.used_ports.insert(port);
                return Ok(port);
            }
        }
        bail!("no free peer ports left in the configured range")
    }

    fn spawn_role(&self, role: &str, endpoint: &Endpoint) -> Result<Child> {
        Command::new(&self.binary)
            .arg(role)
            .arg(endpoint.to_string())
            .arg("--seed-config")
            .arg(&self.config.seed_config)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .with_context(|| format!("failed to spawn {role} {endpoint}"))
    }

    /// Launches every configured seed, staggered so each one is accepting
    /// (and has appended itself to the seed file) before the next starts.
    pub fn spawn_seeds(&mut self) -> Result<()> {
        for entry in self.config.seeds.clone() {
            let endpoint = Endpoint::new(entry.ip, entry.port);
            let child = self.spawn_role("seed", &endpoint)?;
            info!(seed = %endpoint, pid = child.id(), "seed launched");
            self.seed_children.push(child);
            std::thread::sleep(LAUNCH_STAGGER);
        }
        Ok(())
    }

    /// Launches one peer on the next free port. Returns the port.
    pub fn spawn_peer(&mut self) -> Result<u16> {
        let port = self.next_free_port()?;
        let endpoint = Endpoint::new("127.0.0.1", port);
        let child = self.spawn_role("peer", &endpoint)?;
        info!(peer = %endpoint, pid = child.id(), "peer launched");
        self.peer_children.insert(port, child);
        Ok(port)
    }

    /// Launches the configured initial batch of peers.
    pub fn spawn_initial_peers(&mut self) -> Result<()> {
        for _ in 0..self.config.initial_peers {
            self.spawn_peer()?;
            std::thread::sleep(LAUNCH_STAGGER);
        }
        Ok(())
    }

    /// Kills the peer on `port`. Returns whether there was one.
    pub fn kill_peer(&mut self, port: u16) -> bool {
        let Some(mut child) = self.peer_children.remove(&port) else {
            return false;
        };
        if let Err(e) = child.kill() {
            warn!(port, error = %e, "kill failed");
        }
        let _ = child.wait();
        self.used_ports.remove(&port);
        info!(port, "peer killed");
        true
    }

    /// Live peer ports, ascending.
    pub fn list_peers(&self) -> Vec<u16> {
        self.peer_children.keys().copied().collect()
    }

    /// Terminates every child, peers first.
    pub fn shutdown(&mut self) {
        let ports: Vec<u16> = self.peer_children.keys().copied().collect();
        for port in ports {
            self.kill_peer(port);
        }
        for mut child in self.seed_children.drain(..) {
            let _ = child.kill();
            let _ = child.wait();
        }
        info!("all children terminated");
    }

    /// Removes the deployment's on-disk leftovers. Missing files are fine.
    pub fn remove_artifacts(&self) {
        for name in ARTIFACTS {
            let _ = std::fs::remove_file(name);
        }
        let _ = std::fs::remove_file(&self.config.seed_config);
    }
}

// ---------------------------------------------------------------------------
// Interactive loop
// ---------------------------------------------------------------------------

/// Runs the supervisor: spawn the deployment, then take operator commands
/// until `exit` or `del`.
pub fn run(args: SuperviseArgs) -> Result<()> {
    let config = SupervisorConfig::load(&args.config)?;
    let mut manager = NodeManager::new(config)?;

    manager.spawn_seeds()?;
    manager.spawn_initial_peers()?;

    println!();
    println!("WEFT deployment supervisor");
    println!("Commands: add | kill <port> | list | exit | del");
    println!();

    let stdin = std::io::stdin();
    loop {
        print!("weft> ");
        std::io::stdout().flush().ok();

        let mut line = String::new();
        if stdin.read_line(&mut line)? == 0 {
            // EOF on stdin: treat like exit.
            manager.shutdown();
            return Ok(());
        }
        if line.trim().is_empty() {
            continue;
        }

        match parse_command(&line) {
            Ok(ConsoleCommand::Add) => match manager.spawn_peer() {
                Ok(port) => println!("peer up on {port}"),
                Err(e) => println!("add failed: {e}"),
            },
            Ok(ConsoleCommand::Kill(port)) => {
                if !manager.kill_peer(port) {
                    println!("no peer on {port}");
                }
            }
            Ok(ConsoleCommand::List) => {
                println!("active peers: {:?}", manager.list_peers());
            }
            Ok(ConsoleCommand::Exit) => {
                manager.shutdown();
                return Ok(());
            }
            Ok(ConsoleCommand::Del) => {
                manager.shutdown();
                manager.remove_artifacts();
                return Ok(());
            }
            Err(msg) => println!("{msg}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
initial_peers = 2

[[seeds]]
ip = "127.0.0.1"
port = 6001

[[seeds]]
ip = "127.0.0.1"
port = 6002

[peer_port_range]
start = 7001
end = 7100
"#;

    #[test]
    fn config_parses_from_toml() {
        let config: SupervisorConfig = toml::from_str(SAMPLE).unwrap();
        assert_eq!(config.seeds.len(), 2);
        assert_eq!(config.peer_port_range.start, 7001);
        assert_eq!(config.initial_peers, 2);
        assert_eq!(config.seed_config, PathBuf::from("config.txt"));
    }

    #[test]
    fn config_load_rejects_empty_seed_list() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("supervisor.toml");
        std::fs::write(
            &path,
            "seeds = []\n[peer_port_range]\nstart = 7001\nend = 7100\n",
        )
        .unwrap();
        assert!(SupervisorConfig::load(&path).is_err());
    }

    #[test]
    fn config_load_rejects_inverted_port_range() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("supervisor.toml");
        std::fs::write(
            &path,
            "[[seeds]]\nip = \"127.0.0.1\"\nport = 6001\n[peer_port_range]\nstart = 7100\nend = 7001\n",
        )
        .unwrap();
        assert!(SupervisorConfig::load(&path).is_err());
    }

    #[test]
    fn commands_parse() {
        assert_eq!(parse_command("add"), Ok(ConsoleCommand::Add));
        assert_eq!(parse_command("kill 7003"), Ok(ConsoleCommand::Kill(7003)));
        assert_eq!(parse_command("  list  "), Ok(ConsoleCommand::List));
        assert_eq!(parse_command("exit"), Ok(ConsoleCommand::Exit));
        assert_eq!(parse_command("del"), Ok(ConsoleCommand::Del));
    }

    #[test]
    fn malformed_commands_are_messages_not_panics() {
        assert!(parse_command("kill").is_err());
        assert!(parse_command("kill seventy").is_err());
        assert!(parse_command("launch-the-missiles").is_err());
        assert!(parse_command("").is_err());
    }

    #[test]
    fn port_allocation_skips_occupied_ports() {
        // Occupy one port in a private range; the allocator must step past.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let taken = listener.local_addr().unwrap().port();

        let config: SupervisorConfig = toml::from_str(&format!(
            "[[seeds]]\nip = \"127.0.0.1\"\nport = 6001\n[peer_port_range]\nstart = {taken}\nend = {}\n",
            taken.saturating_add(20)
        ))
        .unwrap();
        let mut manager = NodeManager::new(config).unwrap();

        let first = manager.next_free_port().unwrap();
        assert_ne!(first, taken);

        // A promised port is not handed out twice.
        let second = manager.next_free_port().unwrap();
        assert_ne!(second, first);
    }
}
