//! # Structured Logging
//!
//! Initializes the `tracing` subscriber. Role processes (seed, peer) log
//! to three destinations at once: stdout, a role-specific log file, and
//! the shared output file that interleaves every process in a deployment.
//! The file layers write without ANSI colors so the logs stay grep-able.
//!
//! The `RUST_LOG` environment variable overrides the default directives
//! when set, with the usual `tracing_subscriber::EnvFilter` syntax.

use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize plain stdout logging. Used by the supervisor and simulator,
/// which have no business writing protocol log files.
///
/// Call exactly once, early in `main()`. Subsequent calls will panic.
pub fn init_logging(default_directives: &str) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(false))
        .init();
}

/// Initialize three-destination logging for a role process: stdout, the
/// role log file, and the shared output file. Both files are opened in
/// append mode so restarts and co-located processes interleave instead of
/// clobbering each other.
pub fn init_role_logging(
    default_directives: &str,
    role_log: &Path,
    shared_log: &Path,
) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives));

    let role_file = Arc::new(
        File::options()
            .create(true)
            .append(true)
            .open(role_log)
            .with_context(|| format!("failed to open role log {}", role_log.display()))?,
    );
    let shared_file = Arc::new(
        File::options()
            .create(true)
            .append(true)
            .open(shared_log)
            .with_context(|| format!("failed to open output file {}", shared_log.display()))?,
    );

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(false))
        .with(
            fmt::layer()
                .with_ansi(false)
                .with_target(false)
                .with_writer(role_file),
        )
        .with(
            fmt::layer()
                .with_ansi(false)
                .with_target(false)
                .with_writer(shared_file),
        )
        .init();

    tracing::debug!(
        role_log = %role_log.display(),
        shared_log = %shared_log.display(),
        "logging initialized"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_log_files_are_created_in_append_mode() {
        // Exercise the file-opening path without installing the global
        // subscriber (which can only happen once per process).
        let dir = tempfile::tempdir().unwrap();
        let role = dir.path().join("peer.log");
        let shared = dir.path().join("outputfile.txt");

        for path in [&role, &shared] {
            let file = File::options().create(true).append(true).open(path).unwrap();
            drop(file);
            assert!(path.exists());
        }
    }
}
