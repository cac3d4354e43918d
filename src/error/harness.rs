// Harness error types

use crate::error::ErrorCode;
use log::error;
use std::fmt;

/// Log a harness error with structured context
///
/// The line carries the numeric code, the component and the message so a
/// console scraper can pick failures out of the sequential log stream.
pub fn log_harness_error(err: &HarnessError, context: &str) {
    error!(
        "Harness error in {}: code={}, component={}, message={}",
        context,
        err.code(),
        err.component(),
        err.message()
    );
}

/// Errors raised by the orchestration engine and its board seam.
///
/// Error code range: 3001-3009
#[derive(Debug, Clone, PartialEq)]
pub enum HarnessError {
    /// The board refused a CPU clock change
    ClockAdjust { mhz: u32, reason: String },

    /// The board does not provide the requested facility
    Unsupported { feature: String },

    /// Storage media check failed
    MediaIo { target: String, reason: String },

    /// Hardware cipher produced an unexpected result or failed
    Cipher { reason: String },

    /// A concurrent check terminated abnormally
    CheckAborted { name: String, reason: String },

    /// Fewer completion signals arrived than units were launched
    SignalLost { launched: usize, received: usize },

    /// The device-mode service failed
    DeviceMode { reason: String },

    /// Harness configuration is invalid
    InvalidConfig { reason: String },

    /// A sequential step terminated abnormally
    StepAborted { step: String, reason: String },
}

impl HarnessError {
    fn component(&self) -> &'static str {
        match self {
            HarnessError::ClockAdjust { .. } => "CapabilityProbe",
            HarnessError::Unsupported { .. } => "Board",
            HarnessError::MediaIo { .. } | HarnessError::StepAborted { .. } => "SequentialPhase",
            HarnessError::Cipher { .. } => "Board",
            HarnessError::CheckAborted { .. } | HarnessError::SignalLost { .. } => {
                "ConcurrentPhase"
            }
            HarnessError::DeviceMode { .. } => "DeviceMode",
            HarnessError::InvalidConfig { .. } => "Config",
        }
    }

    /// Whether the error must terminate the whole process.
    pub fn is_fatal(&self) -> bool {
        match self {
            HarnessError::CheckAborted { .. }
            | HarnessError::SignalLost { .. }
            | HarnessError::DeviceMode { .. }
            | HarnessError::StepAborted { .. } => true,
            HarnessError::ClockAdjust { .. }
            | HarnessError::Unsupported { .. }
            | HarnessError::MediaIo { .. }
            | HarnessError::Cipher { .. }
            | HarnessError::InvalidConfig { .. } => false,
        }
    }
}

impl ErrorCode for HarnessError {
    fn code(&self) -> i32 {
        match self {
            HarnessError::ClockAdjust { .. } => 3001,
            HarnessError::Unsupported { .. } => 3002,
            HarnessError::MediaIo { .. } => 3003,
            HarnessError::Cipher { .. } => 3004,
            HarnessError::CheckAborted { .. } => 3005,
            HarnessError::SignalLost { .. } => 3006,
            HarnessError::DeviceMode { .. } => 3007,
            HarnessError::InvalidConfig { .. } => 3008,
            HarnessError::StepAborted { .. } => 3009,
        }
    }

    fn message(&self) -> String {
        match self {
            HarnessError::ClockAdjust { mhz, reason } => {
                format!("error setting ARM frequency to {} MHz: {}", mhz, reason)
            }
            HarnessError::Unsupported { feature } => {
                format!("{} not supported on this board", feature)
            }
            HarnessError::MediaIo { target, reason } => {
                format!("media {} failed: {}", target, reason)
            }
            HarnessError::Cipher { reason } => format!("hardware cipher failed: {}", reason),
            HarnessError::CheckAborted { name, reason } => {
                format!("check {} aborted: {}", name, reason)
            }
            HarnessError::SignalLost { launched, received } => format!(
                "completion barrier lost signals: launched {}, received {}",
                launched, received
            ),
            HarnessError::DeviceMode { reason } => format!("device mode failed: {}", reason),
            HarnessError::InvalidConfig { reason } => format!("invalid configuration: {}", reason),
            HarnessError::StepAborted { step, reason } => {
                format!("sequential step {} aborted: {}", step, reason)
            }
        }
    }
}

impl fmt::Display for HarnessError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "HarnessError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for HarnessError {}
