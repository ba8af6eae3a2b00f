//! The quarantine decision.
//!
//! A quarantined test is run once, in isolation. A pass is simply recorded. A
//! failure is absorbed and the test is registered as pending with the host,
//! unless its expiration date has been reached: then the test is handed back
//! to the host to run live and fail the build again.

use crate::context::RunContext;
use crate::expiration::ExpirationArg;
use crate::host::{run_isolated, QuarantineResult, TestFn};
use crate::record::QuarantineRecord;
use std::sync::Arc;
use tracing::{debug, warn};

/// What an evaluation did with the test.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// The test passed; nothing was registered.
    Passed,
    /// The test failed and was registered as pending.
    Pending,
    /// The test failed after its quarantine expired and was registered live.
    Live,
}

/// Quarantine `test` with no expiration.
pub fn quarantine<F>(ctx: &RunContext, name: &str, test: F) -> QuarantineResult<Decision>
where
    F: Fn() + Send + Sync + 'static,
{
    evaluate(ctx, name, ExpirationArg::Absent, Arc::new(test))
}

/// Quarantine `test` until `expiration` (`yyyy-MM-dd`).
pub fn quarantine_until<E, F>(
    ctx: &RunContext,
    name: &str,
    expiration: E,
    test: F,
) -> QuarantineResult<Decision>
where
    E: Into<ExpirationArg>,
    F: Fn() + Send + Sync + 'static,
{
    evaluate(ctx, name, expiration.into(), Arc::new(test))
}

/// Validate the expiration, run the test and act on the result.
///
/// An invalid expiration is the only error: it is reported before the test
/// runs, and nothing is registered or recorded.
pub fn evaluate(
    ctx: &RunContext,
    name: &str,
    expiration: ExpirationArg,
    test: TestFn,
) -> QuarantineResult<Decision> {
    let expiration = expiration.resolve()?;

    let now = ctx.now();
    let test_path = ctx.relative_test_path();

    let outcome = run_isolated(test.as_ref());
    let passes = outcome.is_ok();

    let decision = match outcome {
        Ok(()) => Decision::Passed,
        Err(failure) => match expiration {
            Some(expiration) if expiration.has_expired(now) => {
                warn!(test = name, %expiration, "quarantine expired, running test live");
                ctx.host().register_live(name, test);
                Decision::Live
            }
            _ => {
                debug!(test = name, reason = %failure, "quarantined failing test");
                ctx.host().register_pending(name);
                Decision::Pending
            }
        },
    };

    if let Some(buffer) = ctx.buffer() {
        buffer.push(QuarantineRecord::new(name, passes, test_path, now));
    }

    Ok(decision)
}
