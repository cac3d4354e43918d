//! Top-level driver.
//!
//! Sequences the capability probe, the concurrent phase, the sequential phase
//! and, when the board supports it, the USB device-mode service. Device mode
//! is a terminal state: once entered the orchestrator hands the process to
//! the board and never logs the closing line.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::runtime::Handle;
use tracing::info;

use crate::board::Board;
use crate::build_info::{banner, BuildInfo};
use crate::capability::{probe, CapabilityRecord};
use crate::concurrent::{panic_message, run_concurrent_phase};
use crate::config::HarnessConfig;
use crate::error::HarnessError;
use crate::registry::build_registry;
use crate::sequential::{run_sequential_phase, DiagnosticContext};
use crate::telemetry::{EventLog, HarnessEvent};

/// Orchestrator lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrchestratorState {
    Probing,
    ConcurrentPhase,
    SequentialPhase,
    /// Normal completion.
    Idle,
    /// The device-mode service owns the process.
    DeviceModeService,
}

impl OrchestratorState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            OrchestratorState::Idle | OrchestratorState::DeviceModeService
        )
    }

    pub fn can_transition_to(self, next: OrchestratorState) -> bool {
        use OrchestratorState::*;
        matches!(
            (self, next),
            (Probing, ConcurrentPhase)
                | (ConcurrentPhase, SequentialPhase)
                | (SequentialPhase, Idle)
                | (SequentialPhase, DeviceModeService)
        )
    }
}

/// How [`Orchestrator::run`] ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Terminal {
    Complete { elapsed: Duration },
    /// The device-mode service returned. On hardware this does not happen
    /// while a host is attached.
    DeviceMode,
}

/// The diagnostic battery: one concurrent phase followed by one sequential
/// phase. Cheap to clone, so the device-mode service can hold a copy.
#[derive(Clone)]
pub struct Diagnostics {
    board: Arc<dyn Board>,
    config: Arc<HarnessConfig>,
    events: EventLog,
}

impl Diagnostics {
    pub async fn run_concurrent(&self, caps: &CapabilityRecord) -> Result<(), HarnessError> {
        let units = build_registry(caps, &self.config, self.board.clone());
        run_concurrent_phase(units, &self.events).await?;
        Ok(())
    }

    pub async fn run_sequential(
        &self,
        caps: &CapabilityRecord,
        context: DiagnosticContext,
    ) -> Result<(), HarnessError> {
        run_sequential_phase(caps, &self.config, self.board.clone(), context, &self.events).await
    }

    pub async fn run(
        &self,
        caps: &CapabilityRecord,
        context: DiagnosticContext,
    ) -> Result<(), HarnessError> {
        self.run_concurrent(caps).await?;
        self.run_sequential(caps, context).await
    }
}

/// Handed to [`Board::serve_device_mode`].
///
/// Lets the USB side re-run the battery once the device stack owns its
/// share of on-chip memory.
pub struct DeviceModeHost {
    diagnostics: Diagnostics,
    caps: CapabilityRecord,
    runtime: Handle,
}

impl DeviceModeHost {
    pub fn capabilities(&self) -> &CapabilityRecord {
        &self.caps
    }

    /// Re-run the full battery with the post-device-mode read chunk.
    ///
    /// Blocks the calling thread. Must not be called from inside an async
    /// task.
    pub fn rerun_diagnostics(&self) -> Result<(), HarnessError> {
        info!("re-running diagnostics from device mode");
        self.runtime.block_on(
            self.diagnostics
                .run(&self.caps, DiagnosticContext::PostDeviceMode),
        )
    }
}

pub struct Orchestrator {
    diagnostics: Diagnostics,
    build: BuildInfo,
    state: OrchestratorState,
}

impl Orchestrator {
    /// Validates `config`; it is immutable from here on.
    pub fn new(
        board: Arc<dyn Board>,
        config: HarnessConfig,
        build: BuildInfo,
    ) -> Result<Self, HarnessError> {
        config.validate()?;
        Ok(Self {
            diagnostics: Diagnostics {
                board,
                config: Arc::new(config),
                events: EventLog::default(),
            },
            build,
            state: OrchestratorState::Probing,
        })
    }

    pub fn events(&self) -> EventLog {
        self.diagnostics.events.clone()
    }

    pub fn state(&self) -> OrchestratorState {
        self.state
    }

    /// Drive one full orchestration. Can only be called once.
    pub async fn run(&mut self) -> Result<Terminal, HarnessError> {
        if self.state != OrchestratorState::Probing {
            return Err(HarnessError::StepAborted {
                step: "run".to_string(),
                reason: format!("orchestrator already ran (state {:?})", self.state),
            });
        }

        let start = Instant::now();
        self.diagnostics.events.publish(HarnessEvent::StateChanged {
            state: OrchestratorState::Probing,
        });

        let caps = {
            let board = self.diagnostics.board.clone();
            let config = self.diagnostics.config.clone();
            tokio::task::spawn_blocking(move || probe(board.as_ref(), &config))
                .await
                .map_err(|err| HarnessError::StepAborted {
                    step: "probe".to_string(),
                    reason: err.to_string(),
                })?
        };
        info!("{}", banner(&self.build, &caps));

        self.transition(OrchestratorState::ConcurrentPhase);
        self.diagnostics.run_concurrent(&caps).await?;

        self.transition(OrchestratorState::SequentialPhase);
        self.diagnostics
            .run_sequential(&caps, DiagnosticContext::PreDeviceMode)
            .await?;

        if caps.supports_device_mode() {
            self.transition(OrchestratorState::DeviceModeService);
            return self.enter_device_mode(caps).await;
        }

        self.transition(OrchestratorState::Idle);
        let elapsed = start.elapsed();
        info!("Goodbye from bringup_harness ({:?})", elapsed);
        self.diagnostics
            .events
            .publish(HarnessEvent::Goodbye { elapsed });
        Ok(Terminal::Complete { elapsed })
    }

    fn transition(&mut self, next: OrchestratorState) {
        debug_assert!(self.state.can_transition_to(next));
        tracing::debug!("state {:?} -> {:?}", self.state, next);
        self.state = next;
        self.diagnostics
            .events
            .publish(HarnessEvent::StateChanged { state: next });
    }

    async fn enter_device_mode(&self, caps: CapabilityRecord) -> Result<Terminal, HarnessError> {
        info!("entering USB device mode");
        self.diagnostics.events.publish(HarnessEvent::DeviceModeEntered);

        let board = self.diagnostics.board.clone();
        let host = DeviceModeHost {
            diagnostics: self.diagnostics.clone(),
            caps,
            runtime: Handle::current(),
        };

        match tokio::task::spawn_blocking(move || board.serve_device_mode(host)).await {
            Ok(Ok(())) => Ok(Terminal::DeviceMode),
            Ok(Err(err)) if err.is_fatal() => Err(err),
            Ok(Err(err)) => Err(HarnessError::DeviceMode {
                reason: err.to_string(),
            }),
            Err(err) if err.is_panic() => Err(HarnessError::DeviceMode {
                reason: panic_message(err.into_panic()),
            }),
            Err(err) => Err(HarnessError::DeviceMode {
                reason: err.to_string(),
            }),
        }
    }
}
