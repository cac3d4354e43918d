//! Memory allocation stress.

use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use log::info;

use crate::sequential::AllocationRunSpec;

/// Fill and free `spec.chunk_count` chunks of `spec.chunk_size` bytes,
/// `spec.runs` times in a row.
///
/// `on_cycle` is called with the run number and its duration after each
/// completed fill/free cycle. Returns the number of completed cycles.
pub fn stress<F>(spec: &AllocationRunSpec, mut on_cycle: F) -> Result<usize>
where
    F: FnMut(usize, Duration),
{
    let mut completed = 0;
    for run in 1..=spec.runs {
        let start = Instant::now();
        let pattern = run as u8;

        let mut chunks: Vec<Vec<u8>> = Vec::with_capacity(spec.chunk_count);
        for index in 0..spec.chunk_count {
            let mut chunk = Vec::new();
            chunk.try_reserve_exact(spec.chunk_size).with_context(|| {
                format!(
                    "run {}: allocating chunk {} of {} bytes",
                    run, index, spec.chunk_size
                )
            })?;
            chunk.resize(spec.chunk_size, pattern);
            chunks.push(chunk);
        }

        let filled: usize = std::hint::black_box(&chunks).iter().map(Vec::len).sum();
        drop(chunks);

        let elapsed = start.elapsed();
        info!(
            "alloc run {}/{}: {} chunks of {} bytes ({} bytes) in {:?}",
            run, spec.runs, spec.chunk_count, spec.chunk_size, filled, elapsed
        );
        completed += 1;
        on_cycle(run, elapsed);
    }
    Ok(completed)
}
