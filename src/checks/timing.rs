//! Timer wake-up and sleep duration checks.

use std::time::{Duration, Instant};

use anyhow::{bail, Result};
use log::info;

/// Arm a runtime timer and verify it does not fire early.
pub async fn timer(period: Duration) -> Result<()> {
    info!("waking up timer after {:?}", period);

    let start = Instant::now();
    tokio::time::sleep_until(tokio::time::Instant::now() + period).await;
    let woke = start.elapsed();

    info!("woke up after {:?}", woke);
    if woke < period {
        bail!("timer fired early: {:?} < {:?}", woke, period);
    }
    Ok(())
}

/// Block the calling thread and verify the measured duration.
pub fn sleep(period: Duration) -> Result<()> {
    info!("sleeping {:?}", period);

    let start = Instant::now();
    std::thread::sleep(period);
    let slept = start.elapsed();

    info!("slept {:?} ({:?})", period, slept);
    if slept < period {
        bail!("woke early: {:?} < {:?}", slept, period);
    }
    Ok(())
}
