//! Randomness quality and throughput check.

use std::time::Instant;

use anyhow::{bail, Context, Result};
use log::info;
use rand::rngs::OsRng;
use rand::RngCore;

use crate::config::RngConfig;

/// Print a few OS-random samples, then time a burst of draws.
///
/// Every draw fills a buffer owned by this call, so concurrent checks never
/// share one.
pub fn run(config: &RngConfig) -> Result<()> {
    let mut sample = vec![0u8; config.sample_size];

    for _ in 0..config.samples_logged {
        OsRng
            .try_fill_bytes(&mut sample)
            .context("reading OS random source")?;
        if sample.iter().all(|&b| b == 0) {
            bail!("random source returned an all-zero sample");
        }
        info!("{}", hex::encode(&sample));
    }

    let start = Instant::now();
    for _ in 0..config.throughput_draws {
        let mut draw = vec![0u8; config.sample_size];
        OsRng
            .try_fill_bytes(&mut draw)
            .context("reading OS random source")?;
    }

    info!(
        "retrieved {} random bytes in {:?}",
        config.sample_size * config.throughput_draws,
        start.elapsed()
    );
    Ok(())
}
