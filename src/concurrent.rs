//! Concurrent phase runner.
//!
//! Every unit runs as its own task and reports back through a
//! [`CompletionBarrier`]. The barrier releases only after it has received one
//! [`CompletionSignal`] per launched unit. There is no per-unit timeout: a
//! unit that never finishes holds the phase forever.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::time::{Duration, Instant};

use futures::FutureExt;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::error::HarnessError;
use crate::logging::section;
use crate::registry::{CheckBody, CheckResult, CheckUnit};
use crate::telemetry::{EventLog, HarnessEvent};

/// How a unit ended, as seen from its execution context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnitOutcome {
    Passed,
    /// The body returned an error; the unit logged it and carried on.
    Failed(String),
    /// The body panicked. Fatal to the process.
    Aborted(String),
}

impl UnitOutcome {
    fn from_result(result: CheckResult) -> Self {
        match result {
            Ok(()) => UnitOutcome::Passed,
            Err(err) => UnitOutcome::Failed(format!("{err:#}")),
        }
    }
}

/// One-shot completion report from a unit.
#[derive(Debug, Clone)]
pub struct CompletionSignal {
    pub name: String,
    pub elapsed: Duration,
    pub outcome: UnitOutcome,
}

/// Sending half handed to one unit. Consumed by [`Signaller::signal`], so a
/// unit can report at most once.
pub struct Signaller {
    tx: mpsc::Sender<CompletionSignal>,
}

impl Signaller {
    pub fn signal(self, signal: CompletionSignal) {
        // Capacity equals the unit count, so this only fails once the
        // barrier is gone.
        let _ = self.tx.try_send(signal);
    }
}

/// Counting barrier over completion signals.
pub struct CompletionBarrier {
    expected: usize,
    received: usize,
    tx: Option<mpsc::Sender<CompletionSignal>>,
    rx: mpsc::Receiver<CompletionSignal>,
}

impl CompletionBarrier {
    pub fn new(expected: usize) -> Self {
        let (tx, rx) = mpsc::channel(expected.max(1));
        Self {
            expected,
            received: 0,
            tx: Some(tx),
            rx,
        }
    }

    /// Hand out a signaller. Must be called once per launched unit.
    pub fn signaller(&self) -> Option<Signaller> {
        self.tx.as_ref().map(|tx| Signaller { tx: tx.clone() })
    }

    pub fn expected(&self) -> usize {
        self.expected
    }

    pub fn received(&self) -> usize {
        self.received
    }

    /// Wait for the next signal.
    ///
    /// Returns `Ok(None)` once `expected` signals have arrived. If every
    /// signaller is dropped first, the count can never be reached and
    /// [`HarnessError::SignalLost`] is returned.
    pub async fn recv(&mut self) -> Result<Option<CompletionSignal>, HarnessError> {
        // Stop handing out signallers so the channel closes once all units
        // have dropped theirs.
        self.tx = None;

        if self.received == self.expected {
            return Ok(None);
        }

        match self.rx.recv().await {
            Some(signal) => {
                self.received += 1;
                Ok(Some(signal))
            }
            None => Err(HarnessError::SignalLost {
                launched: self.expected,
                received: self.received,
            }),
        }
    }
}

/// Summary of a drained concurrent phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseReport {
    pub launched: usize,
    pub elapsed: Duration,
}

/// Launch every unit and block until all of them have signalled.
pub async fn run_concurrent_phase(
    units: Vec<CheckUnit>,
    events: &EventLog,
) -> Result<PhaseReport, HarnessError> {
    let start = Instant::now();
    let launched = units.len();
    let mut barrier = CompletionBarrier::new(launched);

    info!("{}", section("begin tests"));

    for unit in units {
        let Some(signaller) = barrier.signaller() else {
            break;
        };
        events.publish(HarnessEvent::UnitLaunched {
            name: unit.name().to_string(),
        });
        tokio::spawn(run_unit(unit, signaller));
    }

    info!("launched {} test tasks", launched);

    while let Some(signal) = barrier.recv().await? {
        events.publish(HarnessEvent::UnitCompleted {
            name: signal.name.clone(),
            elapsed: signal.elapsed,
            outcome: signal.outcome.clone(),
        });

        if let UnitOutcome::Aborted(reason) = signal.outcome {
            return Err(HarnessError::CheckAborted {
                name: signal.name,
                reason,
            });
        }
    }

    let elapsed = start.elapsed();
    info!("{}", "-".repeat(70));
    info!("completed {} tasks ({:?})", barrier.received(), elapsed);
    events.publish(HarnessEvent::ConcurrentReleased {
        units: launched,
        elapsed,
    });

    Ok(PhaseReport { launched, elapsed })
}

async fn run_unit(unit: CheckUnit, signaller: Signaller) {
    let start = Instant::now();
    let name = unit.name().to_string();
    info!("{}", section(unit.title()));

    let outcome = match unit.into_body() {
        CheckBody::Blocking(body) => match tokio::task::spawn_blocking(body).await {
            Ok(result) => UnitOutcome::from_result(result),
            Err(err) if err.is_panic() => UnitOutcome::Aborted(panic_message(err.into_panic())),
            Err(err) => UnitOutcome::Aborted(err.to_string()),
        },
        CheckBody::Async(body) => match AssertUnwindSafe(body).catch_unwind().await {
            Ok(result) => UnitOutcome::from_result(result),
            Err(payload) => UnitOutcome::Aborted(panic_message(payload)),
        },
    };

    match &outcome {
        UnitOutcome::Passed => {}
        UnitOutcome::Failed(reason) => warn!("{} check failed: {}", name, reason),
        UnitOutcome::Aborted(reason) => error!("{} check panicked: {}", name, reason),
    }

    let elapsed = start.elapsed();
    info!("completed {} ({:?})", name, elapsed);
    signaller.signal(CompletionSignal {
        name,
        elapsed,
        outcome,
    });
}

pub(crate) fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests;
