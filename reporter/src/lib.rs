//! End-of-run reporting for quarantined tests.
//!
//! Once a run completes, [`ConsoleReporter`] gathers the quarantine logs of
//! every test file that ran into the combined artifact and prints how many
//! quarantined tests there are, optionally listing each of them.

use async_trait::async_trait;
use quarantine::{combine_logs, QuarantineConfig, QuarantineError, QuarantineSummary};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum ReporterError {
    #[error("Quarantine error: {0}")]
    Quarantine(#[from] QuarantineError),

    #[error("Failed to write report: {0}")]
    Output(#[from] io::Error),

    #[error("Aggregation task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("Failed to parse configuration: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("Invalid test file pattern {pattern}: {message}")]
    InvalidPattern { pattern: String, message: String },
}

pub type ReporterResult<T> = Result<T, ReporterError>;

fn default_enabled() -> bool {
    true
}

fn default_color() -> bool {
    true
}

/// Console output switches, read from the `[reporter]` table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReporterOptions {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub show_tests: bool,
    #[serde(default = "default_color")]
    pub color: bool,
}

impl Default for ReporterOptions {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            show_tests: false,
            color: default_color(),
        }
    }
}

impl ReporterOptions {
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_show_tests(mut self, show_tests: bool) -> Self {
        self.show_tests = show_tests;
        self
    }

    pub fn with_color(mut self, color: bool) -> Self {
        self.color = color;
        self
    }
}

/// The whole configuration file: storage keys at the top level plus an
/// optional `[reporter]` table.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ReporterConfig {
    #[serde(flatten)]
    pub storage: QuarantineConfig,
    #[serde(default)]
    pub reporter: ReporterOptions,
}

impl ReporterConfig {
    pub fn from_toml_str(raw: &str) -> ReporterResult<Self> {
        let config: Self = toml::from_str(raw)?;
        config.storage.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> ReporterResult<Self> {
        let raw = fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&raw)
    }
}

/// The test files a run executed, in execution order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunResults {
    pub test_files: Vec<PathBuf>,
}

impl RunResults {
    pub fn new<I, P>(test_files: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            test_files: test_files.into_iter().map(Into::into).collect(),
        }
    }
}

#[async_trait]
pub trait RunReporter: Send {
    /// Called once after every test file has finished. Returns the summary
    /// that was reported, or `None` when reporting is switched off.
    async fn on_run_complete(
        &mut self,
        results: &RunResults,
    ) -> ReporterResult<Option<QuarantineSummary>>;
}

const BOLD_WHITE: &str = "\x1b[1;37m";
const BOLD_MAGENTA: &str = "\x1b[1;35m";
const UNDERLINE_WHITE: &str = "\x1b[4;37m";
const RESET: &str = "\x1b[0m";

/// Prints the quarantine summary to a writer (stdout by default).
pub struct ConsoleReporter<W = io::Stdout> {
    config: QuarantineConfig,
    options: ReporterOptions,
    out: W,
}

impl ConsoleReporter<io::Stdout> {
    pub fn new(config: QuarantineConfig, options: ReporterOptions) -> Self {
        Self::with_writer(config, options, io::stdout())
    }
}

impl<W: Write + Send> ConsoleReporter<W> {
    pub fn with_writer(config: QuarantineConfig, options: ReporterOptions, out: W) -> Self {
        Self {
            config,
            options,
            out,
        }
    }

    pub fn options(&self) -> &ReporterOptions {
        &self.options
    }

    pub fn into_writer(self) -> W {
        self.out
    }

    fn paint(&self, style: &str, text: &str) -> String {
        if self.options.color {
            format!("{style}{text}{RESET}")
        } else {
            text.to_string()
        }
    }

    /// Write the header and, with `show_tests`, one entry per record. Entries
    /// are indented under the header.
    pub fn write_summary(&mut self, summary: &QuarantineSummary) -> io::Result<()> {
        let count_style = if summary.is_empty() {
            BOLD_WHITE
        } else {
            BOLD_MAGENTA
        };
        let header = format!(
            "{} {}",
            self.paint(BOLD_WHITE, "Quarantined:"),
            self.paint(count_style, &format!("{} total", summary.total()))
        );
        writeln!(self.out, "{header}")?;

        if self.options.show_tests {
            for record in &summary.records {
                let path = self.paint(UNDERLINE_WHITE, &record.test_path);
                writeln!(self.out, "  {path}")?;
                writeln!(self.out, "  {}", record.detail_line())?;
            }
        }

        self.out.flush()
    }
}

#[async_trait]
impl<W: Write + Send> RunReporter for ConsoleReporter<W> {
    async fn on_run_complete(
        &mut self,
        results: &RunResults,
    ) -> ReporterResult<Option<QuarantineSummary>> {
        if !self.options.enabled {
            debug!("quarantine reporter disabled");
            return Ok(None);
        }

        let config = self.config.clone();
        let files = results.test_files.clone();
        let summary =
            tokio::task::spawn_blocking(move || combine_logs(&config, files)).await??;

        self.write_summary(&summary)?;
        Ok(Some(summary))
    }
}

/// Expand shell-style patterns into test files. Arguments without glob
/// metacharacters are taken literally, even when the file does not exist.
pub fn expand_test_files<S: AsRef<str>>(patterns: &[S]) -> ReporterResult<Vec<PathBuf>> {
    let mut files = Vec::new();

    for pattern in patterns {
        let pattern = pattern.as_ref();
        if !pattern.contains(['*', '?', '[']) {
            files.push(PathBuf::from(pattern));
            continue;
        }

        let invalid = |message: String| ReporterError::InvalidPattern {
            pattern: pattern.to_string(),
            message,
        };
        let mut matched: Vec<PathBuf> = glob::glob(pattern)
            .map_err(|e| invalid(e.to_string()))?
            .collect::<Result<_, _>>()
            .map_err(|e| invalid(e.to_string()))?;
        matched.sort();
        debug!(pattern, count = matched.len(), "expanded test file pattern");
        files.extend(matched);
    }

    Ok(files)
}
