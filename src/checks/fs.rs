//! Filesystem round-trip checks.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use log::info;

const MESSAGE: &str = "Hello from the bring-up harness filesystem check\n";
const DIR_ENTRIES: usize = 3;

/// File and directory checks in a private scratch directory.
pub fn run() -> Result<()> {
    let scratch = scratch_dir()?;
    let result = test_file(&scratch).and_then(|()| test_dir(&scratch));
    let _ = fs::remove_dir_all(&scratch);
    result
}

fn scratch_dir() -> Result<PathBuf> {
    let dir = std::env::temp_dir().join(format!(
        "bringup-fs-{}-{:016x}",
        std::process::id(),
        rand::random::<u64>()
    ));
    fs::create_dir_all(&dir)
        .with_context(|| format!("creating scratch directory {}", dir.display()))?;
    Ok(dir)
}

fn test_file(scratch: &Path) -> Result<()> {
    let path = scratch.join("tamago.txt");

    fs::write(&path, MESSAGE).with_context(|| format!("writing {}", path.display()))?;
    let read = fs::read_to_string(&path).with_context(|| format!("reading {}", path.display()))?;

    if read != MESSAGE {
        bail!(
            "read back {} bytes that differ from the {} written",
            read.len(),
            MESSAGE.len()
        );
    }

    info!("read {} ({} bytes)", path.display(), read.len());
    Ok(())
}

fn test_dir(scratch: &Path) -> Result<()> {
    let dir = scratch.join("dir");
    fs::create_dir(&dir).with_context(|| format!("creating {}", dir.display()))?;

    for i in 0..DIR_ENTRIES {
        let path = dir.join(format!("entry-{i}.txt"));
        fs::write(&path, format!("entry {i}\n"))
            .with_context(|| format!("writing {}", path.display()))?;
    }

    let mut names = Vec::new();
    for entry in fs::read_dir(&dir).with_context(|| format!("listing {}", dir.display()))? {
        names.push(entry?.file_name().to_string_lossy().into_owned());
    }
    names.sort();

    if names.len() != DIR_ENTRIES {
        bail!("expected {} entries, found {:?}", DIR_ENTRIES, names);
    }

    info!("listed {}: {}", dir.display(), names.join(" "));
    Ok(())
}
