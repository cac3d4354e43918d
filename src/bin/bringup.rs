use std::process::ExitCode;
use std::sync::Arc;

use bringup_harness::build_info::BuildInfo;
use bringup_harness::error::log_harness_error;
use bringup_harness::{logging, Board, EmulatedBoard, HarnessConfig, Orchestrator, Terminal};

fn main() -> ExitCode {
    let load = HarnessConfig::load();
    logging::init(load.config.verbose);
    load.log();
    let config = load.config;

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(err) => {
            eprintln!("bringup error: failed to start runtime: {err}");
            return ExitCode::from(1);
        }
    };

    let board: Arc<dyn Board> = Arc::new(EmulatedBoard::default());
    let mut orchestrator = match Orchestrator::new(board, config, BuildInfo::current()) {
        Ok(orchestrator) => orchestrator,
        Err(err) => {
            log_harness_error(&err, "startup");
            return ExitCode::from(1);
        }
    };

    match runtime.block_on(orchestrator.run()) {
        Ok(Terminal::Complete { .. }) | Ok(Terminal::DeviceMode) => ExitCode::SUCCESS,
        Err(err) => {
            log_harness_error(&err, "orchestrator");
            // A wedged or panicked unit may still hold a worker.
            runtime.shutdown_background();
            ExitCode::from(1)
        }
    }
}
