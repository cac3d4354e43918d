//! Check registry for the concurrent phase.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use futures::FutureExt;

use crate::board::Board;
use crate::capability::CapabilityRecord;
use crate::checks;
use crate::config::HarnessConfig;

pub type CheckResult = anyhow::Result<()>;

/// Names of the units registered on every platform, in launch order.
pub const BASE_CHECKS: [&str; 6] = ["fs", "timer", "sleep", "rng", "ecdsa", "btc"];

/// Name of the unit registered only on cipher-capable hardware.
pub const HW_CIPHER_CHECK: &str = "dcp";

/// How a unit's body executes.
pub enum CheckBody {
    /// Runs on a blocking worker thread.
    Blocking(Box<dyn FnOnce() -> CheckResult + Send + 'static>),
    /// Runs as a task on the async runtime.
    Async(BoxFuture<'static, CheckResult>),
}

/// One named diagnostic operation for the concurrent phase.
pub struct CheckUnit {
    name: String,
    title: String,
    body: CheckBody,
}

impl CheckUnit {
    pub fn blocking<F>(name: &str, title: &str, body: F) -> Self
    where
        F: FnOnce() -> CheckResult + Send + 'static,
    {
        Self {
            name: name.to_string(),
            title: title.to_string(),
            body: CheckBody::Blocking(Box::new(body)),
        }
    }

    pub fn future<F>(name: &str, title: &str, body: F) -> Self
    where
        F: Future<Output = CheckResult> + Send + 'static,
    {
        Self {
            name: name.to_string(),
            title: title.to_string(),
            body: CheckBody::Async(body.boxed()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn into_body(self) -> CheckBody {
        self.body
    }
}

/// Assemble the units for one concurrent phase.
///
/// Always built fresh from the record it is given; the cipher unit is
/// appended if and only if [`CapabilityRecord::has_hw_cipher`] holds.
pub fn build_registry(
    caps: &CapabilityRecord,
    config: &HarnessConfig,
    board: Arc<dyn Board>,
) -> Vec<CheckUnit> {
    let sleep = Duration::from_millis(config.timing.sleep_ms);
    let rng = config.rng.clone();

    let mut units = vec![
        CheckUnit::blocking("fs", "fs", checks::fs::run),
        CheckUnit::future("timer", "timer", checks::timing::timer(sleep)),
        CheckUnit::blocking("sleep", "sleep", move || checks::timing::sleep(sleep)),
        CheckUnit::blocking("rng", "rng", move || checks::rng::run(&rng)),
        CheckUnit::blocking("ecdsa", "ecdsa", checks::signing::run),
        CheckUnit::blocking("btc", "btc", checks::ledger::run),
    ];

    if caps.has_hw_cipher() {
        units.push(CheckUnit::blocking(HW_CIPHER_CHECK, "i.mx6 dcp", move || {
            checks::cipher::run(board.as_ref())
        }));
    }

    units
}
