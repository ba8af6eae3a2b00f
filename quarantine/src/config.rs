//! Storage configuration.

use crate::host::{QuarantineError, QuarantineResult};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Component, Path, PathBuf};

pub const DEFAULT_STORAGE_DIR: &str = "quarantined-tests";
pub const DEFAULT_LOG_EXTENSION: &str = "log";
pub const DEFAULT_COMBINED_FILE: &str = "combined-results.log";

/// Where quarantine logs live.
///
/// Every path the store derives is rooted at `root`: per-file logs go to
/// `<root>/<storage_dir>/<mirrored dir>/<stem>.<log_extension>` and the
/// combined artifact to `<root>/<storage_dir>/<combined_file>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuarantineConfig {
    pub root: PathBuf,
    pub storage_dir: String,
    pub log_extension: String,
    pub combined_file: String,
}

impl Default for QuarantineConfig {
    fn default() -> Self {
        Self {
            root: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            storage_dir: DEFAULT_STORAGE_DIR.to_string(),
            log_extension: DEFAULT_LOG_EXTENSION.to_string(),
            combined_file: DEFAULT_COMBINED_FILE.to_string(),
        }
    }
}

impl QuarantineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = root.into();
        self
    }

    pub fn with_storage_dir(mut self, storage_dir: impl Into<String>) -> Self {
        self.storage_dir = storage_dir.into();
        self
    }

    pub fn with_log_extension(mut self, log_extension: impl Into<String>) -> Self {
        self.log_extension = log_extension.into();
        self
    }

    pub fn with_combined_file(mut self, combined_file: impl Into<String>) -> Self {
        self.combined_file = combined_file.into();
        self
    }

    pub fn validate(&self) -> QuarantineResult<()> {
        if self.storage_dir.is_empty() {
            return Err(invalid("Storage directory cannot be empty"));
        }

        if Path::new(&self.storage_dir).is_absolute() {
            return Err(invalid("Storage directory must be relative to the root"));
        }

        if self.log_extension.is_empty() || self.log_extension.starts_with('.') {
            return Err(invalid(
                "Log extension must be non-empty and given without a leading dot",
            ));
        }

        if self.combined_file.is_empty() || self.combined_file.contains(['/', '\\']) {
            return Err(invalid("Combined file must be a plain file name"));
        }

        Ok(())
    }

    /// Parse a TOML document. Missing keys fall back to the defaults.
    pub fn from_toml_str(raw: &str) -> QuarantineResult<Self> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> QuarantineResult<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|e| QuarantineError::io(path, e))?;
        Self::from_toml_str(&raw)
    }

    /// `<root>/<storage_dir>`
    pub fn storage_path(&self) -> PathBuf {
        self.root.join(&self.storage_dir)
    }

    /// `<root>/<storage_dir>/<combined_file>`
    pub fn combined_path(&self) -> PathBuf {
        self.storage_path().join(&self.combined_file)
    }

    /// `path` relative to the root. Relative inputs are taken as already
    /// relative; absolute paths outside the root come back unchanged.
    pub fn relative_path(&self, path: &Path) -> PathBuf {
        relative_to(&self.root, path)
    }
}

fn invalid(message: &str) -> QuarantineError {
    QuarantineError::InvalidConfig {
        message: message.to_string(),
    }
}

pub(crate) fn relative_to(root: &Path, path: &Path) -> PathBuf {
    if path.is_relative() {
        return path
            .components()
            .filter(|c| !matches!(c, Component::CurDir))
            .collect();
    }

    path.strip_prefix(root)
        .map(Path::to_path_buf)
        .unwrap_or_else(|_| path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = QuarantineConfig::default();
        assert_eq!(config.storage_dir, "quarantined-tests");
        assert_eq!(config.log_extension, "log");
        assert_eq!(config.combined_file, "combined-results.log");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_builder() {
        let config = QuarantineConfig::new()
            .with_root("/work")
            .with_storage_dir("flaky")
            .with_log_extension("json")
            .with_combined_file("all.json");

        assert_eq!(config.storage_path(), PathBuf::from("/work/flaky"));
        assert_eq!(config.combined_path(), PathBuf::from("/work/flaky/all.json"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = QuarantineConfig::default();

        config.storage_dir = "".to_string();
        assert!(config.validate().is_err());

        config.storage_dir = "/abs".to_string();
        assert!(config.validate().is_err());

        config.storage_dir = DEFAULT_STORAGE_DIR.to_string();
        config.log_extension = ".log".to_string();
        assert!(config.validate().is_err());

        config.log_extension = "log".to_string();
        config.combined_file = "nested/combined.log".to_string();
        assert!(config.validate().is_err());

        config.combined_file = DEFAULT_COMBINED_FILE.to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_toml_uses_defaults_for_missing_keys() {
        let config = QuarantineConfig::from_toml_str(
            r#"
            root = "/repo"
            storage_dir = "flaky-tests"
            "#,
        )
        .unwrap();

        assert_eq!(config.root, PathBuf::from("/repo"));
        assert_eq!(config.storage_dir, "flaky-tests");
        assert_eq!(config.log_extension, DEFAULT_LOG_EXTENSION);
    }

    #[test]
    fn test_from_toml_rejects_invalid_values() {
        let err = QuarantineConfig::from_toml_str(r#"log_extension = """#).unwrap_err();
        assert!(matches!(err, QuarantineError::InvalidConfig { .. }));

        let err = QuarantineConfig::from_toml_str("storage_dir = [").unwrap_err();
        assert!(matches!(err, QuarantineError::ConfigParse(_)));
    }

    #[test]
    fn test_relative_path() {
        let config = QuarantineConfig::new().with_root("/repo");
        assert_eq!(
            config.relative_path(Path::new("/repo/tests/a.rs")),
            PathBuf::from("tests/a.rs")
        );
        assert_eq!(
            config.relative_path(Path::new("./tests/a.rs")),
            PathBuf::from("tests/a.rs")
        );
        assert_eq!(
            config.relative_path(Path::new("/elsewhere/a.rs")),
            PathBuf::from("/elsewhere/a.rs")
        );
    }
}
