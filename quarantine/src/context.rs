//! Per-evaluation context: the host, where records go and what time it is.

use crate::config::{relative_to, QuarantineConfig};
use crate::host::{lock, TestHost};
use crate::record::QuarantineRecord;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Source of the evaluation timestamp.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock frozen at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedClock(pub DateTime<Utc>);

impl FixedClock {
    /// Midnight UTC on `date`.
    pub fn on(date: NaiveDate) -> Self {
        Self(Utc.from_utc_datetime(&date.and_time(chrono::NaiveTime::MIN)))
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// Records accumulated while one source file's tests are evaluated.
///
/// Cloning yields another handle onto the same records.
#[derive(Debug, Clone, Default)]
pub struct RunBuffer {
    records: Arc<Mutex<Vec<QuarantineRecord>>>,
}

impl RunBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, record: QuarantineRecord) {
        lock(&self.records).push(record);
    }

    pub fn len(&self) -> usize {
        lock(&self.records).len()
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.records).is_empty()
    }

    pub fn snapshot(&self) -> Vec<QuarantineRecord> {
        lock(&self.records).clone()
    }

    /// Whether both handles point at the same records.
    pub fn same_as(&self, other: &RunBuffer) -> bool {
        Arc::ptr_eq(&self.records, &other.records)
    }

    /// Remove and return every record, leaving the buffer empty.
    pub fn take(&self) -> Vec<QuarantineRecord> {
        std::mem::take(&mut *lock(&self.records))
    }
}

/// Everything an evaluation needs: the host, the optional run buffer, the
/// clock and the root that test paths are made relative to.
///
/// A context without a buffer still quarantines failing tests but records
/// nothing.
#[derive(Clone)]
pub struct RunContext {
    host: Arc<dyn TestHost>,
    buffer: Option<RunBuffer>,
    clock: Arc<dyn Clock>,
    root: PathBuf,
}

impl RunContext {
    pub fn new(host: Arc<dyn TestHost>, config: &QuarantineConfig) -> Self {
        Self::untracked(host, config).with_buffer(RunBuffer::new())
    }

    pub fn untracked(host: Arc<dyn TestHost>, config: &QuarantineConfig) -> Self {
        Self {
            host,
            buffer: None,
            clock: Arc::new(SystemClock),
            root: config.root.clone(),
        }
    }

    pub fn with_buffer(mut self, buffer: RunBuffer) -> Self {
        self.buffer = Some(buffer);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn host(&self) -> &dyn TestHost {
        self.host.as_ref()
    }

    pub fn buffer(&self) -> Option<&RunBuffer> {
        self.buffer.as_ref()
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The host's current test file, relative to the root.
    pub fn relative_test_path(&self) -> String {
        let path = self.host.current_test_file_path();
        relative_to(&self.root, &path).to_string_lossy().into_owned()
    }
}
