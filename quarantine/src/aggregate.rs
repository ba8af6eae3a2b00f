//! Cross-file view of the quarantine logs touched by one run.

use crate::config::QuarantineConfig;
use crate::host::QuarantineResult;
use crate::record::QuarantineRecord;
use crate::store::{log_path_for, read_log, write_log};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Records gathered from every log of a run, and where they were combined.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuarantineSummary {
    pub records: Vec<QuarantineRecord>,
    pub combined_path: PathBuf,
}

impl QuarantineSummary {
    pub fn total(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Concatenate the logs of `test_files`, in order, into the combined artifact.
///
/// Files without a log are skipped. The combined file is rebuilt from scratch
/// each time, so it is written even when no records were found.
pub fn combine_logs<I, P>(
    config: &QuarantineConfig,
    test_files: I,
) -> QuarantineResult<QuarantineSummary>
where
    I: IntoIterator<Item = P>,
    P: AsRef<Path>,
{
    let mut records = Vec::new();

    for test_file in test_files {
        let path = log_path_for(config, test_file.as_ref());
        match read_log(&path)? {
            Some(logged) => {
                debug!(log = %path.display(), count = logged.len(), "read quarantine log");
                records.extend(logged);
            }
            None => debug!(log = %path.display(), "no quarantine log"),
        }
    }

    let combined_path = config.combined_path();
    write_log(&combined_path, &records)?;
    info!(
        combined = %combined_path.display(),
        total = records.len(),
        "combined quarantine logs"
    );

    Ok(QuarantineSummary {
        records,
        combined_path,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::from_log_json;
    use chrono::{TimeZone, Utc};
    use std::fs;
    use tempfile::TempDir;

    fn record(name: &str, test_path: &str) -> QuarantineRecord {
        QuarantineRecord::new(
            name,
            false,
            test_path,
            Utc.with_ymd_and_hms(2020, 1, 20, 0, 0, 0).unwrap(),
        )
    }

    #[test]
    fn test_combines_in_file_order_and_skips_missing() {
        let dir = TempDir::new().unwrap();
        let config = QuarantineConfig::new().with_root(dir.path());

        let second = Path::new("tests/b.test.rs");
        let first = Path::new("tests/a.test.rs");
        write_log(
            &log_path_for(&config, second),
            &[record("b1", "tests/b.test.rs"), record("b2", "tests/b.test.rs")],
        )
        .unwrap();
        write_log(&log_path_for(&config, first), &[record("a1", "tests/a.test.rs")]).unwrap();

        let summary = combine_logs(
            &config,
            [second, Path::new("tests/missing.test.rs"), first],
        )
        .unwrap();

        let names: Vec<_> = summary.records.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, ["b1", "b2", "a1"]);
        assert_eq!(summary.total(), 3);
        assert_eq!(
            summary.combined_path,
            dir.path().join("quarantined-tests/combined-results.log")
        );

        let written = from_log_json(&fs::read_to_string(&summary.combined_path).unwrap()).unwrap();
        assert_eq!(written, summary.records);
    }

    #[test]
    fn test_combined_artifact_is_rewritten() {
        let dir = TempDir::new().unwrap();
        let config = QuarantineConfig::new().with_root(dir.path());
        let test_file = Path::new("a.test.rs");
        write_log(&log_path_for(&config, test_file), &[record("a1", "a.test.rs")]).unwrap();

        assert_eq!(combine_logs(&config, [test_file]).unwrap().total(), 1);

        let summary = combine_logs(&config, Vec::<PathBuf>::new()).unwrap();
        assert!(summary.is_empty());
        assert_eq!(fs::read_to_string(&summary.combined_path).unwrap(), "[]");
    }
}
