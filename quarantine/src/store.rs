//! Per-source-file quarantine logs.
//!
//! Each source test file owns one log, a JSON array of
//! [`QuarantineRecord`]s stored under the configured storage directory in a
//! tree that mirrors the source tree. Logs are ledgers of first-seen status:
//! once a test name is logged, later runs never replace its entry.

use crate::config::{relative_to, QuarantineConfig};
use crate::context::RunBuffer;
use crate::host::{QuarantineError, QuarantineResult};
use crate::record::{from_log_json, to_log_json, QuarantineRecord};
use std::collections::HashSet;
use std::fs;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, info};

/// What [`ResultStore::persist`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PersistOutcome {
    /// Tracking is off; nothing was touched.
    Untracked,
    /// The buffer was empty. `removed` is true when a log was deleted.
    Cleared { removed: bool },
    /// The merged log was written.
    Written {
        path: PathBuf,
        total: usize,
        added: usize,
    },
}

#[derive(Debug, Clone)]
pub struct ResultStore {
    config: QuarantineConfig,
}

impl ResultStore {
    pub fn new(config: QuarantineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &QuarantineConfig {
        &self.config
    }

    pub fn log_path(&self, test_file: &Path) -> PathBuf {
        log_path_for(&self.config, test_file)
    }

    /// Records previously logged for `test_file`, or `None` if it has no log.
    pub fn load(&self, test_file: &Path) -> QuarantineResult<Option<Vec<QuarantineRecord>>> {
        read_log(&self.log_path(test_file))
    }

    /// Merge the buffer into the log for `test_file` and clear the buffer.
    ///
    /// An empty buffer means the file has nothing quarantined right now, so
    /// its log is deleted. Without a buffer nothing happens at all.
    pub fn persist(
        &self,
        test_file: &Path,
        buffer: Option<&RunBuffer>,
    ) -> QuarantineResult<PersistOutcome> {
        let Some(buffer) = buffer else {
            return Ok(PersistOutcome::Untracked);
        };

        let incoming = buffer.take();
        let path = self.log_path(test_file);

        if incoming.is_empty() {
            let removed = remove_log(&path)?;
            if removed {
                info!(log = %path.display(), "removed stale quarantine log");
            }
            return Ok(PersistOutcome::Cleared { removed });
        }

        let prior = read_log(&path)?.unwrap_or_default();
        let (merged, added) = merge_first_seen(prior, incoming);
        write_log(&path, &merged)?;

        info!(log = %path.display(), total = merged.len(), added, "saved quarantine log");
        Ok(PersistOutcome::Written {
            path,
            total: merged.len(),
            added,
        })
    }
}

/// Prior records followed by incoming records whose name is not yet taken.
/// Returns the merged list and how many incoming records made it in.
pub fn merge_first_seen(
    prior: Vec<QuarantineRecord>,
    incoming: Vec<QuarantineRecord>,
) -> (Vec<QuarantineRecord>, usize) {
    let mut seen: HashSet<String> = prior.iter().map(|r| r.name.clone()).collect();
    let mut merged = prior;
    let mut added = 0;

    for record in incoming {
        if seen.insert(record.name.clone()) {
            merged.push(record);
            added += 1;
        } else {
            debug!(test = %record.name, "keeping earlier quarantine entry");
        }
    }

    (merged, added)
}

/// `<root>/<storage_dir>/<dir of test_file relative to root>/<stem>.<ext>`
pub fn log_path_for(config: &QuarantineConfig, test_file: &Path) -> PathBuf {
    let relative = relative_to(&config.root, test_file);
    let mut path = config.storage_path();

    if let Some(parent) = relative.parent() {
        for component in parent.components() {
            if let Component::Normal(part) = component {
                path.push(part);
            }
        }
    }

    let stem = relative.file_stem().unwrap_or_default().to_string_lossy();
    path.push(format!("{}.{}", stem, config.log_extension));
    path
}

pub(crate) fn read_log(path: &Path) -> QuarantineResult<Option<Vec<QuarantineRecord>>> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(QuarantineError::io(path, e)),
    };

    from_log_json(&raw)
        .map(Some)
        .map_err(|e| QuarantineError::serialization(path, e))
}

pub(crate) fn write_log(path: &Path, records: &[QuarantineRecord]) -> QuarantineResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| QuarantineError::io(parent, e))?;
    }

    let json = to_log_json(records).map_err(|e| QuarantineError::serialization(path, e))?;
    fs::write(path, json).map_err(|e| QuarantineError::io(path, e))
}

fn remove_log(path: &Path) -> QuarantineResult<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(QuarantineError::io(path, e)),
    }
}
