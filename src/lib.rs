// Bring-up Harness Core
// Capability-gated diagnostic orchestration for freshly booted boards

// Module declarations
pub mod board;
pub mod build_info;
pub mod capability;
pub mod checks;
pub mod concurrent;
pub mod config;
pub mod error;
pub mod logging;
pub mod orchestrator;
pub mod registry;
pub mod sequential;
pub mod telemetry;

// Re-exports for convenience
pub use board::{Board, EmulatedBoard, SiliconInfo, SocFamily};
pub use capability::{CapabilityRecord, Environment};
pub use config::{ConfigLoad, HarnessConfig};
pub use error::{ErrorCode, HarnessError};
pub use orchestrator::{DeviceModeHost, Orchestrator, OrchestratorState, Terminal};
pub use telemetry::{EventLog, HarnessEvent};
