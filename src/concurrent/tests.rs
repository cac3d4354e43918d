use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::bail;

use super::*;

fn signal(name: &str) -> CompletionSignal {
    CompletionSignal {
        name: name.to_string(),
        elapsed: Duration::ZERO,
        outcome: UnitOutcome::Passed,
    }
}

#[tokio::test]
async fn barrier_releases_after_exact_count() {
    let mut barrier = CompletionBarrier::new(2);
    let first = barrier.signaller().unwrap();
    let second = barrier.signaller().unwrap();

    first.signal(signal("a"));
    second.signal(signal("b"));

    assert!(barrier.recv().await.unwrap().is_some());
    assert!(barrier.recv().await.unwrap().is_some());
    assert!(barrier.recv().await.unwrap().is_none());
    assert_eq!(barrier.received(), barrier.expected());
}

#[tokio::test]
async fn barrier_reports_lost_signal() {
    let mut barrier = CompletionBarrier::new(2);
    let first = barrier.signaller().unwrap();
    let second = barrier.signaller().unwrap();

    first.signal(signal("a"));
    drop(second);

    assert!(barrier.recv().await.unwrap().is_some());
    assert_eq!(
        barrier.recv().await.unwrap_err(),
        HarnessError::SignalLost {
            launched: 2,
            received: 1
        }
    );
}

#[tokio::test]
async fn barrier_stops_issuing_after_wait_starts() {
    let mut barrier = CompletionBarrier::new(0);
    assert!(barrier.recv().await.unwrap().is_none());
    assert!(barrier.signaller().is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn every_unit_runs_before_release() {
    let ran = Arc::new(AtomicUsize::new(0));
    let units = (0..5)
        .map(|i| {
            let ran = ran.clone();
            CheckUnit::blocking(&format!("unit-{i}"), "unit", move || {
                std::thread::sleep(Duration::from_millis(5));
                ran.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
        })
        .collect();

    let events = EventLog::default();
    let report = run_concurrent_phase(units, &events).await.unwrap();

    assert_eq!(report.launched, 5);
    assert_eq!(ran.load(Ordering::SeqCst), 5);
    assert!(matches!(
        events.snapshot().recent.last(),
        Some(HarnessEvent::ConcurrentReleased { units: 5, .. })
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn failing_unit_still_signals() {
    let units = vec![
        CheckUnit::blocking("ok", "ok", || Ok(())),
        CheckUnit::blocking("broken", "broken", || bail!("card not present")),
        CheckUnit::future("async-broken", "async", async { bail!("timer lost") }),
    ];

    let events = EventLog::default();
    let report = run_concurrent_phase(units, &events).await.unwrap();
    assert_eq!(report.launched, 3);

    let failed: Vec<_> = events
        .snapshot()
        .recent
        .into_iter()
        .filter_map(|event| match event {
            HarnessEvent::UnitCompleted {
                name,
                outcome: UnitOutcome::Failed(reason),
                ..
            } => Some((name, reason)),
            _ => None,
        })
        .collect();
    assert_eq!(failed.len(), 2);
    assert!(failed
        .iter()
        .any(|(name, reason)| name == "broken" && reason.contains("card not present")));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn panicking_unit_is_fatal() {
    let units = vec![
        CheckUnit::blocking("steady", "steady", || Ok(())),
        CheckUnit::blocking("crash", "crash", || panic!("bus fault")),
    ];

    let err = run_concurrent_phase(units, &EventLog::default())
        .await
        .unwrap_err();
    assert_eq!(
        err,
        HarnessError::CheckAborted {
            name: "crash".to_string(),
            reason: "bus fault".to_string()
        }
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn panicking_async_unit_is_fatal() {
    let units = vec![CheckUnit::future("async-crash", "crash", async {
        panic!("{}", String::from("stack overflow"))
    })];

    let err = run_concurrent_phase(units, &EventLog::default())
        .await
        .unwrap_err();
    assert!(matches!(err, HarnessError::CheckAborted { ref reason, .. } if reason == "stack overflow"));
}

#[tokio::test]
async fn empty_registry_releases_immediately() {
    let report = run_concurrent_phase(Vec::new(), &EventLog::default())
        .await
        .unwrap();
    assert_eq!(report.launched, 0);
}
