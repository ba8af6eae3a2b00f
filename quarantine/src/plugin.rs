//! Host extension point.
//!
//! A host keeps installed capabilities in a [`PluginRegistry`] keyed by name.
//! Installing [`QuarantinePlugin`] is the setup step of a quarantine-aware
//! run: it creates a fresh run buffer for the host's test file and hooks
//! persistence into the host's end-of-run callbacks. Uninstalling drops the
//! buffer again.

use crate::config::QuarantineConfig;
use crate::context::{Clock, RunBuffer, RunContext, SystemClock};
use crate::host::{lock, QuarantineResult, TestHost};
use crate::store::ResultStore;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::debug;

pub trait HostPlugin: Send + Sync {
    fn name(&self) -> &str;

    /// Called once when the plugin is added to a host.
    fn install(&self, host: &dyn TestHost) -> QuarantineResult<()>;

    /// Called when the plugin is removed from `host`.
    fn uninstall(&self, host: &dyn TestHost);
}

pub struct PluginRegistry {
    plugins: HashMap<String, Box<dyn HostPlugin>>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self {
            plugins: HashMap::new(),
        }
    }

    /// Register a plugin under its name, returning any plugin it replaced.
    pub fn register(&mut self, plugin: Box<dyn HostPlugin>) -> Option<Box<dyn HostPlugin>> {
        let name = plugin.name().to_string();
        self.plugins.insert(name, plugin)
    }

    pub fn remove(&mut self, name: &str) -> Option<Box<dyn HostPlugin>> {
        self.plugins.remove(name)
    }

    pub fn get(&self, name: &str) -> Option<&dyn HostPlugin> {
        self.plugins.get(name).map(|p| p.as_ref())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.plugins.contains_key(name)
    }

    pub fn list_plugins(&self) -> Vec<&str> {
        self.plugins.keys().map(|s| s.as_str()).collect()
    }
}

impl Default for PluginRegistry {
    fn default() -> Self {
        Self::new()
    }
}

struct PluginState {
    config: QuarantineConfig,
    store: ResultStore,
    clock: Arc<dyn Clock>,
    /// One buffer per installed source file.
    buffers: Mutex<HashMap<PathBuf, RunBuffer>>,
}

impl PluginState {
    /// Whether `buffer` is still the live buffer for `test_file`.
    fn is_current(&self, test_file: &Path, buffer: &RunBuffer) -> bool {
        lock(&self.buffers)
            .get(test_file)
            .is_some_and(|current| current.same_as(buffer))
    }
}

/// Quarantine capability for a host. Clones share state, so keep one handle
/// to build contexts after handing another to the host.
///
/// Buffers are kept per source file: one plugin can be installed on the hosts
/// of several files and each file's records only reach that file's log.
#[derive(Clone)]
pub struct QuarantinePlugin {
    state: Arc<PluginState>,
}

impl QuarantinePlugin {
    pub const NAME: &'static str = "quarantine";

    pub fn new(config: QuarantineConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: QuarantineConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            state: Arc::new(PluginState {
                store: ResultStore::new(config.clone()),
                config,
                clock,
                buffers: Mutex::new(HashMap::new()),
            }),
        }
    }

    pub fn config(&self) -> &QuarantineConfig {
        &self.state.config
    }

    pub fn store(&self) -> &ResultStore {
        &self.state.store
    }

    /// The live run buffer for `test_file`, if the plugin is installed there.
    pub fn buffer(&self, test_file: &Path) -> Option<RunBuffer> {
        lock(&self.state.buffers).get(test_file).cloned()
    }

    pub fn is_installed(&self, test_file: &Path) -> bool {
        lock(&self.state.buffers).contains_key(test_file)
    }

    /// A context for evaluating tests on `host`. It records into the buffer
    /// of the host's current file while installed there, and records nothing
    /// otherwise.
    pub fn context(&self, host: Arc<dyn TestHost>) -> RunContext {
        let buffer = self.buffer(&host.current_test_file_path());
        let ctx =
            RunContext::untracked(host, &self.state.config).with_clock(self.state.clock.clone());
        match buffer {
            Some(buffer) => ctx.with_buffer(buffer),
            None => ctx,
        }
    }
}

impl HostPlugin for QuarantinePlugin {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn install(&self, host: &dyn TestHost) -> QuarantineResult<()> {
        let test_file = host.current_test_file_path();
        let buffer = RunBuffer::new();
        // A reinstall starts over with an empty buffer.
        lock(&self.state.buffers).insert(test_file.clone(), buffer.clone());

        let state = self.state.clone();
        host.on_run_finalize(Box::new(move |finished: &Path| {
            // Hooks left behind by an earlier install must not touch the log.
            if !state.is_current(&test_file, &buffer) {
                debug!(file = %test_file.display(), "skipping superseded quarantine hook");
                return Ok(());
            }
            state.store.persist(finished, Some(&buffer)).map(|_| ())
        }));

        debug!(
            root = %self.state.config.root.display(),
            file = %host.current_test_file_path().display(),
            "quarantine tracking enabled"
        );
        Ok(())
    }

    fn uninstall(&self, host: &dyn TestHost) {
        let test_file = host.current_test_file_path();
        lock(&self.state.buffers).remove(&test_file);
        debug!(file = %test_file.display(), "quarantine tracking disabled");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::Suite;
    use crate::record::QuarantineRecord;
    use chrono::{TimeZone, Utc};
    use tempfile::TempDir;

    fn record(name: &str, test_path: &str) -> QuarantineRecord {
        QuarantineRecord::new(
            name,
            false,
            test_path,
            Utc.with_ymd_and_hms(2020, 1, 20, 0, 0, 0).unwrap(),
        )
    }

    struct NamedPlugin(&'static str);

    impl HostPlugin for NamedPlugin {
        fn name(&self) -> &str {
            self.0
        }

        fn install(&self, _host: &dyn TestHost) -> QuarantineResult<()> {
            Ok(())
        }

        fn uninstall(&self, _host: &dyn TestHost) {}
    }

    #[test]
    fn test_plugin_registry() {
        let mut registry = PluginRegistry::new();
        assert!(registry.register(Box::new(NamedPlugin("a"))).is_none());
        assert!(registry.register(Box::new(NamedPlugin("b"))).is_none());
        assert!(registry.register(Box::new(NamedPlugin("a"))).is_some());

        assert_eq!(registry.list_plugins().len(), 2);
        assert!(registry.get("a").is_some());
        assert!(registry.get("missing").is_none());

        assert!(registry.remove("a").is_some());
        assert!(!registry.contains("a"));
    }

    #[test]
    fn test_install_creates_empty_buffer_and_uninstall_drops_it() {
        let file = Path::new("tests/flaky.rs");
        let suite = Suite::new(file);
        let plugin = QuarantinePlugin::new(QuarantineConfig::default());
        assert!(!plugin.is_installed(file));
        assert!(plugin.context(suite.clone()).buffer().is_none());

        suite.install(Box::new(plugin.clone())).unwrap();
        assert!(suite.has_plugin(QuarantinePlugin::NAME));
        assert!(plugin.is_installed(file));
        assert!(plugin.buffer(file).unwrap().is_empty());
        assert!(plugin.context(suite.clone()).buffer().is_some());

        assert!(suite.uninstall(QuarantinePlugin::NAME));
        assert!(!plugin.is_installed(file));
        assert!(!suite.uninstall(QuarantinePlugin::NAME));
    }

    #[test]
    fn test_installing_twice_is_rejected() {
        let suite = Suite::new("tests/flaky.rs");
        let plugin = QuarantinePlugin::new(QuarantineConfig::default());
        suite.install(Box::new(plugin.clone())).unwrap();

        let err = suite.install(Box::new(plugin)).unwrap_err();
        assert!(err.to_string().contains("quarantine"));
    }

    #[test]
    fn test_reinstall_replaces_buffer() {
        let file = Path::new("tests/flaky.rs");
        let suite = Suite::new(file);
        let plugin = QuarantinePlugin::new(QuarantineConfig::default());
        suite.install(Box::new(plugin.clone())).unwrap();

        let first = plugin.buffer(file).unwrap();
        first.push(record("stale", "tests/flaky.rs"));

        suite.uninstall(QuarantinePlugin::NAME);
        suite.install(Box::new(plugin.clone())).unwrap();
        let second = plugin.buffer(file).unwrap();
        assert!(second.is_empty());
        assert!(!second.same_as(&first));
    }

    #[test]
    fn test_reinstall_keeps_log_written_by_current_hook() {
        let dir = TempDir::new().unwrap();
        let file = Path::new("tests/flaky.rs");
        let suite = Suite::new(file);
        let plugin = QuarantinePlugin::new(QuarantineConfig::new().with_root(dir.path()));

        suite.install(Box::new(plugin.clone())).unwrap();
        suite.uninstall(QuarantinePlugin::NAME);
        suite.install(Box::new(plugin.clone())).unwrap();

        plugin.buffer(file).unwrap().push(record("fails", "tests/flaky.rs"));
        suite.finish().unwrap();

        let logged = plugin.store().load(file).unwrap().unwrap();
        assert_eq!(logged, vec![record("fails", "tests/flaky.rs")]);
    }

    #[test]
    fn test_shared_plugin_keeps_files_apart() {
        let dir = TempDir::new().unwrap();
        let plugin = QuarantinePlugin::new(QuarantineConfig::new().with_root(dir.path()));
        let (a, b) = (Path::new("tests/a.rs"), Path::new("tests/b.rs"));
        let suite_a = Suite::new(a);
        let suite_b = Suite::new(b);

        suite_a.install(Box::new(plugin.clone())).unwrap();
        suite_b.install(Box::new(plugin.clone())).unwrap();

        plugin.context(suite_a.clone()).buffer().unwrap().push(record("a fails", "tests/a.rs"));
        plugin.context(suite_b.clone()).buffer().unwrap().push(record("b fails", "tests/b.rs"));

        suite_a.finish().unwrap();
        suite_b.finish().unwrap();

        assert_eq!(
            plugin.store().load(a).unwrap(),
            Some(vec![record("a fails", "tests/a.rs")])
        );
        assert_eq!(
            plugin.store().load(b).unwrap(),
            Some(vec![record("b fails", "tests/b.rs")])
        );
    }

    #[test]
    fn test_uninstalling_one_file_leaves_the_other_tracked() {
        let plugin = QuarantinePlugin::new(QuarantineConfig::default());
        let suite_a = Suite::new("tests/a.rs");
        let suite_b = Suite::new("tests/b.rs");
        suite_a.install(Box::new(plugin.clone())).unwrap();
        suite_b.install(Box::new(plugin.clone())).unwrap();

        suite_a.uninstall(QuarantinePlugin::NAME);

        assert!(!plugin.is_installed(Path::new("tests/a.rs")));
        assert!(plugin.is_installed(Path::new("tests/b.rs")));
    }
}
