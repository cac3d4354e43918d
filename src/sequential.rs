//! Sequential phase runner.
//!
//! Runs after the concurrent phase has drained. Allocation stress always
//! runs; media checks follow on physical hardware only, one target at a time
//! in configuration order.

use std::sync::Arc;
use std::time::Instant;

use log::{info, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::board::Board;
use crate::capability::CapabilityRecord;
use crate::checks;
use crate::concurrent::panic_message;
use crate::config::{AllocConfig, HarnessConfig, MediaConfig};
use crate::error::{log_harness_error, HarnessError};
use crate::logging::section;
use crate::telemetry::{EventLog, HarnessEvent};

/// Whether diagnostics run at startup or are re-run from the device-mode
/// service. Selects the media read chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticContext {
    PreDeviceMode,
    PostDeviceMode,
}

/// Parameters for one allocation stress step.
///
/// The chunk count is drawn once and reused for every run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllocationRunSpec {
    pub runs: usize,
    pub chunk_count: usize,
    pub chunk_size: usize,
}

impl AllocationRunSpec {
    /// Split `fill_bytes` evenly over `chunk_count` chunks, rounding down.
    pub fn with_chunk_count(runs: usize, chunk_count: usize, fill_bytes: usize) -> Self {
        let chunk_count = chunk_count.max(1);
        Self {
            runs,
            chunk_count,
            chunk_size: fill_bytes / chunk_count,
        }
    }

    /// Draw a chunk count uniformly from `1..=config.chunks_max`.
    pub fn draw<R: Rng>(rng: &mut R, config: &AllocConfig) -> Self {
        let chunk_count = rng.gen_range(1..=config.chunks_max.max(1));
        Self::with_chunk_count(config.runs, chunk_count, config.fill_bytes)
    }

    /// Bytes live at once during a single run.
    pub fn total_bytes(&self) -> usize {
        self.chunk_count * self.chunk_size
    }
}

/// One storage device to exercise.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaTarget {
    pub identifier: String,
    pub byte_count: usize,
    pub read_chunk: usize,
}

impl MediaTarget {
    /// Targets from `config`, in order, with the read chunk for `context`.
    pub fn configured(config: &MediaConfig, context: DiagnosticContext) -> Vec<Self> {
        let read_chunk = match context {
            DiagnosticContext::PreDeviceMode => config.pre_device_mode_read_chunk,
            DiagnosticContext::PostDeviceMode => config.post_device_mode_read_chunk,
        };

        config
            .targets
            .iter()
            .map(|identifier| Self {
                identifier: identifier.clone(),
                byte_count: config.byte_count,
                read_chunk,
            })
            .collect()
    }
}

/// Run the sequential phase to completion.
///
/// Step failures are logged and the phase moves on. Only a panicking step
/// is returned as an error.
pub async fn run_sequential_phase(
    caps: &CapabilityRecord,
    config: &HarnessConfig,
    board: Arc<dyn Board>,
    context: DiagnosticContext,
    events: &EventLog,
) -> Result<(), HarnessError> {
    run_allocation(&config.alloc, events).await?;

    if !caps.runs_media_checks() {
        info!("skipping media checks on emulated hardware");
        return Ok(());
    }

    for target in MediaTarget::configured(&config.media, context) {
        run_media(board.clone(), target, context, events).await?;
    }

    Ok(())
}

async fn run_allocation(config: &AllocConfig, events: &EventLog) -> Result<(), HarnessError> {
    let mut rng = match config.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let spec = AllocationRunSpec::draw(&mut rng, config);

    info!("{}", section("memory allocation"));
    info!(
        "{} runs of {} chunks x {} bytes",
        spec.runs, spec.chunk_count, spec.chunk_size
    );
    events.publish(HarnessEvent::AllocationStarted {
        runs: spec.runs,
        chunk_count: spec.chunk_count,
        chunk_size: spec.chunk_size,
    });

    let start = Instant::now();
    let cycle_events = events.clone();
    let stress = tokio::task::spawn_blocking(move || {
        let mut cycles = 0;
        let result = checks::alloc::stress(&spec, |run, elapsed| {
            cycles += 1;
            cycle_events.publish(HarnessEvent::AllocationCycle { run, elapsed });
        });
        (cycles, result)
    });

    let cycles = match stress.await {
        Ok((_, Ok(completed))) => completed,
        Ok((cycles, Err(err))) => {
            warn!("memory allocation check failed: {:#}", err);
            cycles
        }
        Err(err) => {
            let reason = if err.is_panic() {
                panic_message(err.into_panic())
            } else {
                err.to_string()
            };
            return Err(HarnessError::StepAborted {
                step: "alloc".to_string(),
                reason,
            });
        }
    };

    let elapsed = start.elapsed();
    info!("memory allocation completed {} runs ({:?})", cycles, elapsed);
    events.publish(HarnessEvent::AllocationFinished { cycles, elapsed });
    Ok(())
}

async fn run_media(
    board: Arc<dyn Board>,
    target: MediaTarget,
    context: DiagnosticContext,
    events: &EventLog,
) -> Result<(), HarnessError> {
    info!("{}", section(&format!("media {}", target.identifier)));

    let identifier = target.identifier.clone();
    let read_chunk = target.read_chunk;
    let start = Instant::now();

    let passed = match tokio::task::spawn_blocking(move || board.test_media(&target)).await {
        Ok(Ok(())) => {
            info!("{} completed ({:?})", identifier, start.elapsed());
            true
        }
        Ok(Err(err)) => {
            log_harness_error(&err, "media check");
            false
        }
        Err(err) => {
            let reason = if err.is_panic() {
                panic_message(err.into_panic())
            } else {
                err.to_string()
            };
            return Err(HarnessError::StepAborted {
                step: format!("media {}", identifier),
                reason,
            });
        }
    };

    events.publish(HarnessEvent::MediaTested {
        target: identifier,
        read_chunk,
        context,
        passed,
    });
    Ok(())
}
