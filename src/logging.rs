//! Console log sink.
//!
//! One sequential stream, one event per line, no timestamps or levels. The
//! verbosity toggle swaps the whole sink between stdout and a discard writer.

use tracing::Level;
use tracing_subscriber::fmt::writer::BoxMakeWriter;

/// Install the global subscriber. Later calls are no-ops.
pub fn init(verbose: bool) {
    let writer = if verbose {
        BoxMakeWriter::new(std::io::stdout)
    } else {
        BoxMakeWriter::new(std::io::sink)
    };

    let _ = tracing_subscriber::fmt()
        .with_max_level(Level::INFO)
        .with_writer(writer)
        .without_time()
        .with_level(false)
        .with_target(false)
        .try_init();
}

/// `-- title ---...` section header padded to the console width.
pub fn section(title: &str) -> String {
    const WIDTH: usize = 70;
    let head = format!("-- {} ", title);
    let pad = WIDTH.saturating_sub(head.chars().count());
    format!("{}{}", head, "-".repeat(pad))
}
