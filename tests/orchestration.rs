//! End-to-end orchestration tests
//!
//! Drive the full probe → concurrent → sequential → device-mode sequence
//! against a recording board and check the observable event order.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use bringup_harness::build_info::BuildInfo;
use bringup_harness::checks::cipher::{CIPHERTEXT, PLAINTEXT};
use bringup_harness::concurrent::UnitOutcome;
use bringup_harness::registry::BASE_CHECKS;
use bringup_harness::sequential::{DiagnosticContext, MediaTarget};
use bringup_harness::{
    Board, DeviceModeHost, EmulatedBoard, HarnessConfig, HarnessError, HarnessEvent, Orchestrator,
    OrchestratorState, SiliconInfo, SocFamily, Terminal,
};

/// What the mock does once the orchestrator hands it device mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DeviceModeBehavior {
    /// Return straight away.
    Return,
    /// Re-run the checks from the USB side, then return.
    Rerun,
    /// Fail to bring the device stack up.
    Refuse,
}

/// Physical board that records every media read and device-mode entry.
struct MockBoard {
    family: SocFamily,
    device_mode: DeviceModeBehavior,
    missing_card: Option<&'static str>,
    panic_on_media: bool,
    cipher_panics_after: Option<usize>,
    media_calls: Mutex<Vec<(String, usize)>>,
    device_mode_entries: AtomicUsize,
    cipher_calls: AtomicUsize,
}

impl MockBoard {
    fn new(family: SocFamily, device_mode: DeviceModeBehavior) -> Self {
        Self {
            family,
            device_mode,
            missing_card: None,
            panic_on_media: false,
            cipher_panics_after: None,
            media_calls: Mutex::new(Vec::new()),
            device_mode_entries: AtomicUsize::new(0),
            cipher_calls: AtomicUsize::new(0),
        }
    }

    fn with_missing_card(mut self, identifier: &'static str) -> Self {
        self.missing_card = Some(identifier);
        self
    }

    fn panicking_on_media(mut self) -> Self {
        self.panic_on_media = true;
        self
    }

    fn with_cipher_panic_after(mut self, calls: usize) -> Self {
        self.cipher_panics_after = Some(calls);
        self
    }

    fn media_calls(&self) -> Vec<(String, usize)> {
        self.media_calls.lock().unwrap().clone()
    }

    fn device_mode_entries(&self) -> usize {
        self.device_mode_entries.load(Ordering::SeqCst)
    }
}

impl Board for MockBoard {
    fn silicon(&self) -> SiliconInfo {
        SiliconInfo {
            model: self.family.to_string(),
            family: self.family,
            revision_major: 1,
            revision_minor: 0,
            native: true,
        }
    }

    fn cpu_frequency_hz(&self) -> u64 {
        900_000_000
    }

    fn set_cpu_frequency_mhz(&self, _mhz: u32) -> Result<(), HarnessError> {
        Ok(())
    }

    fn test_media(&self, target: &MediaTarget) -> Result<(), HarnessError> {
        self.media_calls
            .lock()
            .unwrap()
            .push((target.identifier.clone(), target.read_chunk));

        if self.panic_on_media {
            panic!("usdhc controller wedged");
        }
        if self.missing_card == Some(target.identifier.as_str()) {
            return Err(HarnessError::MediaIo {
                target: target.identifier.clone(),
                reason: "no card detected".to_string(),
            });
        }
        Ok(())
    }

    fn cipher_cbc_encrypt(
        &self,
        _key: &[u8; 16],
        _iv: &[u8; 16],
        data: &[u8],
    ) -> Result<Vec<u8>, HarnessError> {
        let calls = self.cipher_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.cipher_panics_after.is_some_and(|limit| calls > limit) {
            panic!("dcp channel stalled");
        }
        if data.len() % 16 != 0 {
            return Err(HarnessError::Cipher {
                reason: format!("{} bytes is not a whole number of blocks", data.len()),
            });
        }
        if data == PLAINTEXT {
            Ok(CIPHERTEXT.to_vec())
        } else {
            Ok(data.to_vec())
        }
    }

    fn serve_device_mode(&self, host: DeviceModeHost) -> Result<(), HarnessError> {
        self.device_mode_entries.fetch_add(1, Ordering::SeqCst);
        assert!(host.capabilities().supports_device_mode());
        match self.device_mode {
            DeviceModeBehavior::Return => Ok(()),
            DeviceModeBehavior::Rerun => host.rerun_diagnostics(),
            DeviceModeBehavior::Refuse => Err(HarnessError::Unsupported {
                feature: "usb otg phy".to_string(),
            }),
        }
    }
}

fn quick_config() -> HarnessConfig {
    let mut config = HarnessConfig::default();
    config.verbose = false;
    config.timing.sleep_ms = 5;
    config.rng.throughput_draws = 20;
    config.alloc.fill_bytes = 256 * 1024;
    config
}

fn test_build() -> BuildInfo {
    BuildInfo {
        build: "ci",
        revision: "deadbeef",
        rustc: "rustc",
    }
}

fn position(events: &[HarnessEvent], pred: impl Fn(&HarnessEvent) -> bool) -> Option<usize> {
    events.iter().position(pred)
}

fn launched(events: &[HarnessEvent]) -> Vec<String> {
    events
        .iter()
        .filter_map(|event| match event {
            HarnessEvent::UnitLaunched { name } => Some(name.clone()),
            _ => None,
        })
        .collect()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn emulated_run_skips_hardware_and_says_goodbye() {
    let board = Arc::new(EmulatedBoard::new(SocFamily::Imx6ULL, 396_000_000));
    let mut orchestrator = Orchestrator::new(board, quick_config(), test_build()).unwrap();
    let events = orchestrator.events();

    let terminal = orchestrator.run().await.unwrap();
    assert!(matches!(terminal, Terminal::Complete { .. }));
    assert_eq!(orchestrator.state(), OrchestratorState::Idle);

    let recent = events.snapshot().recent;
    assert_eq!(launched(&recent), BASE_CHECKS.to_vec());
    assert!(recent.iter().any(|event| matches!(
        event,
        HarnessEvent::AllocationStarted { runs: 9, .. }
    )));
    let cycles = recent
        .iter()
        .filter(|event| matches!(event, HarnessEvent::AllocationCycle { .. }))
        .count();
    assert_eq!(cycles, 9);
    assert!(recent.iter().any(|event| matches!(
        event,
        HarnessEvent::AllocationFinished { cycles: 9, .. }
    )));
    assert!(!recent
        .iter()
        .any(|event| matches!(event, HarnessEvent::MediaTested { .. })));
    assert!(!recent
        .iter()
        .any(|event| matches!(event, HarnessEvent::DeviceModeEntered)));
    assert!(matches!(recent.last(), Some(HarnessEvent::Goodbye { .. })));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_phase_drains_before_allocation() {
    let board = Arc::new(EmulatedBoard::default());
    let mut orchestrator = Orchestrator::new(board, quick_config(), test_build()).unwrap();
    let events = orchestrator.events();
    orchestrator.run().await.unwrap();

    let recent = events.snapshot().recent;
    let released =
        position(&recent, |e| matches!(e, HarnessEvent::ConcurrentReleased { .. })).unwrap();
    let alloc = position(&recent, |e| matches!(e, HarnessEvent::AllocationStarted { .. })).unwrap();
    let last_completion = recent
        .iter()
        .rposition(|e| matches!(e, HarnessEvent::UnitCompleted { .. }))
        .unwrap();

    assert!(last_completion < released);
    assert!(released < alloc);

    let states: Vec<_> = recent
        .iter()
        .filter_map(|e| match e {
            HarnessEvent::StateChanged { state } => Some(*state),
            _ => None,
        })
        .collect();
    assert_eq!(
        states,
        vec![
            OrchestratorState::Probing,
            OrchestratorState::ConcurrentPhase,
            OrchestratorState::SequentialPhase,
            OrchestratorState::Idle,
        ]
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn cipher_capable_board_enters_device_mode() {
    let board = Arc::new(MockBoard::new(SocFamily::Imx6ULL, DeviceModeBehavior::Return));
    let mut orchestrator =
        Orchestrator::new(board.clone(), quick_config(), test_build()).unwrap();
    let events = orchestrator.events();

    let terminal = orchestrator.run().await.unwrap();
    assert_eq!(terminal, Terminal::DeviceMode);
    assert_eq!(orchestrator.state(), OrchestratorState::DeviceModeService);
    assert_eq!(board.device_mode_entries(), 1);

    let recent = events.snapshot().recent;
    let units = launched(&recent);
    assert_eq!(units.len(), BASE_CHECKS.len() + 1);
    assert_eq!(units.iter().filter(|name| *name == "dcp").count(), 1);
    assert!(!recent.iter().any(|e| matches!(e, HarnessEvent::Goodbye { .. })));

    // The cipher unit passed against the board's engine.
    assert!(recent.iter().any(|e| matches!(
        e,
        HarnessEvent::UnitCompleted { name, outcome: UnitOutcome::Passed, .. }
            if name == "dcp"
    )));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn media_chunk_grows_after_device_mode() {
    let board = Arc::new(MockBoard::new(SocFamily::Imx6UL, DeviceModeBehavior::Rerun));
    let config = quick_config();
    let b1 = config.media.pre_device_mode_read_chunk;
    let b2 = config.media.post_device_mode_read_chunk;
    assert!(b1 < b2);

    let mut orchestrator = Orchestrator::new(board.clone(), config, test_build()).unwrap();
    let events = orchestrator.events();
    let terminal = orchestrator.run().await.unwrap();
    assert_eq!(terminal, Terminal::DeviceMode);

    assert_eq!(
        board.media_calls(),
        vec![
            ("usdhc1".to_string(), b1),
            ("usdhc2".to_string(), b1),
            ("usdhc1".to_string(), b2),
            ("usdhc2".to_string(), b2),
        ]
    );

    let recent = events.snapshot().recent;
    let first_pass: Vec<_> = launched(&recent)
        .into_iter()
        .take(BASE_CHECKS.len())
        .collect();
    assert_eq!(first_pass, BASE_CHECKS.to_vec());
    assert!(!first_pass.iter().any(|name| name == "dcp"));

    let entered = position(&recent, |e| matches!(e, HarnessEvent::DeviceModeEntered)).unwrap();
    let post_media = position(&recent, |e| {
        matches!(
            e,
            HarnessEvent::MediaTested {
                context: DiagnosticContext::PostDeviceMode,
                ..
            }
        )
    })
    .unwrap();
    assert!(entered < post_media);

    let alloc_done =
        position(&recent, |e| matches!(e, HarnessEvent::AllocationFinished { .. })).unwrap();
    let first_media = position(&recent, |e| matches!(e, HarnessEvent::MediaTested { .. })).unwrap();
    assert!(alloc_done < first_media);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn non_device_mode_board_runs_media_then_idles() {
    let board = Arc::new(MockBoard::new(SocFamily::Imx6Q, DeviceModeBehavior::Rerun));
    let mut orchestrator =
        Orchestrator::new(board.clone(), quick_config(), test_build()).unwrap();

    let terminal = orchestrator.run().await.unwrap();

    assert!(matches!(terminal, Terminal::Complete { .. }));
    assert_eq!(board.device_mode_entries(), 0);
    assert_eq!(board.media_calls().len(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn missing_card_does_not_stop_next_target() {
    let board = Arc::new(
        MockBoard::new(SocFamily::Imx6Q, DeviceModeBehavior::Return).with_missing_card("usdhc1"),
    );
    let mut orchestrator =
        Orchestrator::new(board.clone(), quick_config(), test_build()).unwrap();
    let events = orchestrator.events();

    let terminal = orchestrator.run().await.unwrap();
    assert!(matches!(terminal, Terminal::Complete { .. }));

    let results: Vec<_> = events
        .snapshot()
        .recent
        .into_iter()
        .filter_map(|e| match e {
            HarnessEvent::MediaTested { target, passed, .. } => Some((target, passed)),
            _ => None,
        })
        .collect();
    assert_eq!(
        results,
        vec![("usdhc1".to_string(), false), ("usdhc2".to_string(), true)]
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn media_panic_aborts_the_run() {
    let board =
        Arc::new(MockBoard::new(SocFamily::Imx6Q, DeviceModeBehavior::Return).panicking_on_media());
    let mut orchestrator =
        Orchestrator::new(board.clone(), quick_config(), test_build()).unwrap();
    let events = orchestrator.events();

    let err = orchestrator.run().await.unwrap_err();

    assert!(matches!(
        err,
        HarnessError::StepAborted { ref step, ref reason }
            if step == "media usdhc1" && reason == "usdhc controller wedged"
    ));
    assert!(err.is_fatal());
    // The first target aborts the phase before the second one is tried.
    assert_eq!(board.media_calls().len(), 1);
    assert_eq!(orchestrator.state(), OrchestratorState::SequentialPhase);
    assert!(!events
        .snapshot()
        .recent
        .iter()
        .any(|e| matches!(e, HarnessEvent::Goodbye { .. })));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn refused_device_mode_is_fatal() {
    let board = Arc::new(MockBoard::new(SocFamily::Imx6UL, DeviceModeBehavior::Refuse));
    let mut orchestrator =
        Orchestrator::new(board.clone(), quick_config(), test_build()).unwrap();

    let err = orchestrator.run().await.unwrap_err();

    assert!(matches!(
        err,
        HarnessError::DeviceMode { ref reason } if reason.contains("usb otg phy")
    ));
    assert_eq!(board.device_mode_entries(), 1);
    assert_eq!(orchestrator.state(), OrchestratorState::DeviceModeService);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn check_abort_during_rerun_is_passed_through() {
    // The first pass runs the cipher once; the rerun from device mode stalls it.
    let board = Arc::new(
        MockBoard::new(SocFamily::Imx6ULL, DeviceModeBehavior::Rerun).with_cipher_panic_after(1),
    );
    let mut orchestrator =
        Orchestrator::new(board.clone(), quick_config(), test_build()).unwrap();

    let err = orchestrator.run().await.unwrap_err();

    assert_eq!(
        err,
        HarnessError::CheckAborted {
            name: "dcp".to_string(),
            reason: "dcp channel stalled".to_string(),
        }
    );
    assert_eq!(board.device_mode_entries(), 1);
}
