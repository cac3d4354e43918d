//! Event types recorded by the orchestration engine.

use std::time::Duration;

use crate::concurrent::UnitOutcome;
use crate::orchestrator::OrchestratorState;
use crate::sequential::DiagnosticContext;

/// One observable step of an orchestration run, in the order it happened.
#[derive(Debug, Clone, PartialEq)]
pub enum HarnessEvent {
    StateChanged {
        state: OrchestratorState,
    },
    UnitLaunched {
        name: String,
    },
    UnitCompleted {
        name: String,
        elapsed: Duration,
        outcome: UnitOutcome,
    },
    ConcurrentReleased {
        units: usize,
        elapsed: Duration,
    },
    AllocationStarted {
        runs: usize,
        chunk_count: usize,
        chunk_size: usize,
    },
    /// One fill/free cycle of the allocation stress completed.
    AllocationCycle {
        run: usize,
        elapsed: Duration,
    },
    AllocationFinished {
        cycles: usize,
        elapsed: Duration,
    },
    MediaTested {
        target: String,
        read_chunk: usize,
        context: DiagnosticContext,
        passed: bool,
    },
    DeviceModeEntered,
    Goodbye {
        elapsed: Duration,
    },
}
