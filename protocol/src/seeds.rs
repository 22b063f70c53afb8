//! # Seed List
//!
//! The set of well-known seed endpoints, read once at process start from a
//! plain-text file: one `HOST:PORT` per line, blank lines ignored. The
//! list is static for the lifetime of the process — there is no dynamic
//! seed membership, and every quorum computation in the system is anchored
//! on this file's length.
//!
//! A seed process appends its own endpoint to the file if it is not
//! already listed, so a deployment can be bootstrapped by just starting
//! seeds; peers read the same file and see everyone who came up.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use rand::seq::SliceRandom;
use rand::Rng;

use crate::config::majority;
use crate::endpoint::{Endpoint, EndpointError};

/// The configured seed endpoints, in file order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedList {
    entries: Vec<Endpoint>,
}

/// Errors loading or updating the seed file. All of them are fatal at
/// startup — a node that cannot learn the seed set has no network to join.
#[derive(Debug, thiserror::Error)]
pub enum SeedFileError {
    /// The file could not be read or written.
    #[error("seed config {path:?} unavailable: {source}")]
    Unavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// A line in the file is not a `HOST:PORT` endpoint.
    #[error("seed config {path:?} line {line}: {source}")]
    Malformed {
        path: PathBuf,
        line: usize,
        #[source]
        source: EndpointError,
    },
}

impl SeedList {
    /// Builds a list directly from endpoints, bypassing the file. Used by
    /// tooling that already knows the deployment layout, and by tests.
    pub fn from_entries(entries: Vec<Endpoint>) -> Self {
        Self { entries }
    }

    /// Reads the seed list from `path`.
    pub fn load(path: &Path) -> Result<Self, SeedFileError> {
        let text = std::fs::read_to_string(path).map_err(|source| SeedFileError::Unavailable {
            path: path.to_path_buf(),
            source,
        })?;

        let mut entries = Vec::new();
        for (idx, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let endpoint = line.parse().map_err(|source| SeedFileError::Malformed {
                path: path.to_path_buf(),
                line: idx + 1,
                source,
            })?;
            entries.push(endpoint);
        }

        Ok(Self { entries })
    }

    /// Reads the seed list and guarantees `me` appears in it, appending to
    /// the file when absent. Used by the seed role at startup; idempotent
    /// across restarts.
    ///
    /// A missing file is not an error here — the first seed of a fresh
    /// deployment creates it.
    pub fn load_with_self(path: &Path, me: &Endpoint) -> Result<Self, SeedFileError> {
        let mut list = match Self::load(path) {
            Ok(list) => list,
            Err(SeedFileError::Unavailable { ref source, .. })
                if source.kind() == std::io::ErrorKind::NotFound =>
            {
                Self {
                    entries: Vec::new(),
                }
            }
            Err(e) => return Err(e),
        };

        if !list.entries.contains(me) {
            let mut file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|source| SeedFileError::Unavailable {
                    path: path.to_path_buf(),
                    source,
                })?;
            writeln!(file, "{me}").map_err(|source| SeedFileError::Unavailable {
                path: path.to_path_buf(),
                source,
            })?;
            list.entries.push(me.clone());
        }

        Ok(list)
    }

    /// All configured seeds, in file order.
    pub fn entries(&self) -> &[Endpoint] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The seed quorum Q: a simple majority of the configured list.
    pub fn quorum(&self) -> usize {
        majority(self.entries.len())
    }

    /// Every configured seed except `me`. The fan-out targets of a seed's
    /// own votes.
    pub fn others(&self, me: &Endpoint) -> Vec<Endpoint> {
        self.entries.iter().filter(|e| *e != me).cloned().collect()
    }

    /// A uniformly random majority-sized subset, used by peers to pick
    /// which seeds to register with.
    pub fn random_majority<R: Rng + ?Sized>(&self, rng: &mut R) -> Vec<Endpoint> {
        if self.entries.is_empty() {
            return Vec::new();
        }
        self.entries
            .choose_multiple(rng, self.quorum())
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::io::Write as _;

    fn write_config(lines: &str) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.txt");
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(lines.as_bytes()).unwrap();
        (dir, path)
    }

    #[test]
    fn loads_entries_in_file_order() {
        let (_dir, path) = write_config("127.0.0.1:6001\n\n127.0.0.1:6002\n127.0.0.1:6003\n");
        let list = SeedList::load(&path).unwrap();
        assert_eq!(
            list.entries(),
            &[
                Endpoint::new("127.0.0.1", 6001),
                Endpoint::new("127.0.0.1", 6002),
                Endpoint::new("127.0.0.1", 6003),
            ]
        );
        assert_eq!(list.quorum(), 2);
    }

    #[test]
    fn missing_file_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let err = SeedList::load(&dir.path().join("nope.txt")).unwrap_err();
        assert!(matches!(err, SeedFileError::Unavailable { .. }));
    }

    #[test]
    fn malformed_line_is_rejected_with_its_line_number() {
        let (_dir, path) = write_config("127.0.0.1:6001\nnot-an-endpoint\n");
        match SeedList::load(&path).unwrap_err() {
            SeedFileError::Malformed { line, .. } => assert_eq!(line, 2),
            other => panic!("expected Malformed, got {other:?}"),
        }
    }

    #[test]
    fn load_with_self_appends_exactly_once() {
        let (_dir, path) = write_config("127.0.0.1:6001\n");
        let me = Endpoint::new("127.0.0.1", 6002);

        let list = SeedList::load_with_self(&path, &me).unwrap();
        assert_eq!(list.len(), 2);

        // A second start must not duplicate the entry.
        let list = SeedList::load_with_self(&path, &me).unwrap();
        assert_eq!(list.len(), 2);

        let on_disk = SeedList::load(&path).unwrap();
        assert_eq!(on_disk, list);
    }

    #[test]
    fn load_with_self_creates_a_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.txt");
        let me = Endpoint::new("127.0.0.1", 6001);

        let list = SeedList::load_with_self(&path, &me).unwrap();
        assert_eq!(list.entries(), &[me]);
        assert!(path.exists());
    }

    #[test]
    fn others_excludes_only_me() {
        let (_dir, path) = write_config("127.0.0.1:6001\n127.0.0.1:6002\n127.0.0.1:6003\n");
        let list = SeedList::load(&path).unwrap();
        let me = Endpoint::new("127.0.0.1", 6002);
        let others = list.others(&me);
        assert_eq!(others.len(), 2);
        assert!(!others.contains(&me));
    }

    #[test]
    fn random_majority_has_quorum_size_and_no_duplicates() {
        let (_dir, path) = write_config(
            "127.0.0.1:6001\n127.0.0.1:6002\n127.0.0.1:6003\n127.0.0.1:6004\n127.0.0.1:6005\n",
        );
        let list = SeedList::load(&path).unwrap();
        let mut rng = StdRng::seed_from_u64(7);

        for _ in 0..32 {
            let picked = list.random_majority(&mut rng);
            assert_eq!(picked.len(), 3);
            let mut dedup = picked.clone();
            dedup.sort();
            dedup.dedup();
            assert_eq!(dedup.len(), picked.len());
        }
    }
}
