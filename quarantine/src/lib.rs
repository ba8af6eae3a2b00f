//! Quarantine failing tests until a date, while keeping a ledger of them.
//!
//! A quarantined test still runs, but a failure marks it pending instead of
//! failing the build. Once its expiration date is reached a failure is handed
//! back to the host to run live. Every decision is buffered during the run and
//! merged into a per-source-file log when the host finalizes the file.
//!
//! ```no_run
//! use quarantine::prelude::*;
//!
//! # fn main() -> QuarantineResult<()> {
//! let suite = Suite::new("tests/checkout.rs");
//! let plugin = QuarantinePlugin::new(QuarantineConfig::default());
//! suite.install(Box::new(plugin.clone()))?;
//!
//! let ctx = plugin.context(suite.clone());
//! quarantine!(ctx, "applies the discount", || assert_eq!(2 + 2, 4))?;
//! quarantine!(ctx, "talks to the payment sandbox", "2030-01-01", || {
//!     panic!("sandbox is down");
//! })?;
//!
//! let report = suite.finish()?;
//! assert!(report.is_success());
//! # Ok(())
//! # }
//! ```

pub mod aggregate;
pub mod config;
pub mod context;
pub mod evaluator;
pub mod expiration;
pub mod host;
pub mod plugin;
pub mod record;
pub mod store;

pub use aggregate::{combine_logs, QuarantineSummary};
pub use config::QuarantineConfig;
pub use context::{Clock, FixedClock, RunBuffer, RunContext, SystemClock};
pub use evaluator::{evaluate, quarantine, quarantine_until, Decision};
pub use expiration::{Expiration, ExpirationArg};
pub use host::{
    run_isolated, Failure, FinalizeHook, QuarantineError, QuarantineResult, Suite, SuiteReport,
    TestFn, TestHost,
};
pub use plugin::{HostPlugin, PluginRegistry, QuarantinePlugin};
pub use record::QuarantineRecord;
pub use store::{PersistOutcome, ResultStore};

/// Quarantine a test, with or without an expiration date.
///
/// `quarantine!(ctx, name, test)` never expires;
/// `quarantine!(ctx, name, expiration, test)` expires on `expiration`.
#[macro_export]
macro_rules! quarantine {
    ($ctx:expr, $name:expr, $test:expr $(,)?) => {
        $crate::evaluator::quarantine(&$ctx, $name, $test)
    };
    ($ctx:expr, $name:expr, $expiration:expr, $test:expr $(,)?) => {
        $crate::evaluator::quarantine_until(&$ctx, $name, $expiration, $test)
    };
}

pub mod prelude {
    pub use crate::quarantine;

    pub use crate::aggregate::*;
    pub use crate::config::QuarantineConfig;
    pub use crate::context::*;
    pub use crate::evaluator::*;
    pub use crate::expiration::*;
    pub use crate::host::*;
    pub use crate::plugin::*;
    pub use crate::record::*;
    pub use crate::store::*;
}
