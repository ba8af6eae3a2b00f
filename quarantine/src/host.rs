//! Host test framework capability surface.
//!
//! The evaluator never talks to a concrete test framework. It is handed a
//! [`TestHost`] that can register pending and live tests, name the source file
//! currently being evaluated and accept end-of-run hooks. [`Suite`] is a small
//! in-process host covering one source test file.

use crate::plugin::{HostPlugin, PluginRegistry};
use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum QuarantineError {
    #[error(
        "quarantine: expiration must be a date string like \"yyyy-MM-dd\", instead it was passed: {value}"
    )]
    InvalidExpirationFormat { value: String },

    #[error("IO error at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed quarantine log {}: {source}", .path.display())]
    Serialization {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    #[error("Failed to parse configuration: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("Plugin already installed: {name}")]
    PluginAlreadyInstalled { name: String },
}

impl QuarantineError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn serialization(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        Self::Serialization {
            path: path.into(),
            source,
        }
    }
}

pub type QuarantineResult<T> = Result<T, QuarantineError>;

/// A test body. Shared so an expired quarantine can hand the same function
/// back to the host for a live run.
pub type TestFn = Arc<dyn Fn() + Send + Sync + 'static>;

/// Callback run once after every test of a source file has completed. It
/// receives the path of that source file.
pub type FinalizeHook = Box<dyn FnOnce(&Path) -> QuarantineResult<()> + Send + 'static>;

/// Capabilities the quarantine core needs from a test framework.
pub trait TestHost: Send + Sync {
    /// Mark a test as known but not executed in this run.
    fn register_pending(&self, name: &str);

    /// Register a test for normal execution and reporting by the host.
    fn register_live(&self, name: &str, test: TestFn);

    /// Path of the source file whose tests are currently being evaluated.
    fn current_test_file_path(&self) -> PathBuf;

    /// Register a callback to run once all tests of the file are done.
    fn on_run_finalize(&self, hook: FinalizeHook);
}

/// A captured test failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    pub message: String,
}

impl Failure {
    fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(message) = payload.downcast_ref::<&str>() {
            (*message).to_string()
        } else if let Some(message) = payload.downcast_ref::<String>() {
            message.clone()
        } else {
            "test panicked with a non-string payload".to_string()
        };
        Self { message }
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Run a test body, turning a panic into a [`Failure`] value.
pub fn run_isolated(test: &dyn Fn()) -> Result<(), Failure> {
    panic::catch_unwind(AssertUnwindSafe(test)).map_err(Failure::from_panic)
}

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|err| err.into_inner())
}

/// Outcome of [`Suite::finish`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SuiteReport {
    pub passed: Vec<String>,
    pub failed: Vec<(String, Failure)>,
    pub pending: Vec<String>,
}

impl SuiteReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

#[derive(Default)]
struct SuiteState {
    pending: Vec<String>,
    live: Vec<(String, TestFn)>,
    finalizers: Vec<FinalizeHook>,
}

/// In-process host for the tests of a single source file.
pub struct Suite {
    test_file: PathBuf,
    state: Mutex<SuiteState>,
    plugins: Mutex<PluginRegistry>,
}

impl Suite {
    pub fn new(test_file: impl Into<PathBuf>) -> Arc<Self> {
        Arc::new(Self {
            test_file: test_file.into(),
            state: Mutex::new(SuiteState::default()),
            plugins: Mutex::new(PluginRegistry::new()),
        })
    }

    pub fn test_file(&self) -> &Path {
        &self.test_file
    }

    /// Names registered as pending so far.
    pub fn pending(&self) -> Vec<String> {
        lock(&self.state).pending.clone()
    }

    /// Names registered for a live run so far.
    pub fn live(&self) -> Vec<String> {
        lock(&self.state)
            .live
            .iter()
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Install a plugin into this suite's extension point.
    pub fn install(&self, plugin: Box<dyn HostPlugin>) -> QuarantineResult<()> {
        let mut plugins = lock(&self.plugins);
        if plugins.contains(plugin.name()) {
            return Err(QuarantineError::PluginAlreadyInstalled {
                name: plugin.name().to_string(),
            });
        }

        plugin.install(self)?;
        debug!(plugin = plugin.name(), file = %self.test_file.display(), "installed plugin");
        plugins.register(plugin);
        Ok(())
    }

    /// Uninstall a plugin by name. Returns false when nothing was installed.
    pub fn uninstall(&self, name: &str) -> bool {
        match lock(&self.plugins).remove(name) {
            Some(plugin) => {
                plugin.uninstall(self);
                true
            }
            None => false,
        }
    }

    pub fn has_plugin(&self, name: &str) -> bool {
        lock(&self.plugins).contains(name)
    }

    /// Run every live registration, then the finalize hooks in the order they
    /// were registered. The first hook error aborts the remaining hooks.
    pub fn finish(&self) -> QuarantineResult<SuiteReport> {
        let (pending, live, finalizers) = {
            let mut state = lock(&self.state);
            (
                std::mem::take(&mut state.pending),
                std::mem::take(&mut state.live),
                std::mem::take(&mut state.finalizers),
            )
        };

        let mut report = SuiteReport {
            pending,
            ..SuiteReport::default()
        };

        for (name, test) in live {
            match run_isolated(test.as_ref()) {
                Ok(()) => report.passed.push(name),
                Err(failure) => report.failed.push((name, failure)),
            }
        }

        for hook in finalizers {
            hook(&self.test_file)?;
        }

        info!(
            file = %self.test_file.display(),
            passed = report.passed.len(),
            failed = report.failed.len(),
            pending = report.pending.len(),
            "suite finished"
        );
        Ok(report)
    }
}

impl TestHost for Suite {
    fn register_pending(&self, name: &str) {
        lock(&self.state).pending.push(name.to_string());
    }

    fn register_live(&self, name: &str, test: TestFn) {
        lock(&self.state).live.push((name.to_string(), test));
    }

    fn current_test_file_path(&self) -> PathBuf {
        self.test_file.clone()
    }

    fn on_run_finalize(&self, hook: FinalizeHook) {
        lock(&self.state).finalizers.push(hook);
    }
}
