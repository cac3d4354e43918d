//! Capability probe and the gates derived from it.
//!
//! The probe runs once before any phase and yields an immutable
//! [`CapabilityRecord`]. Every conditional decision in the harness is made by
//! one of the gate methods below, each an exhaustive match over
//! `(Environment, SocFamily)`.

use crate::board::{Board, SocFamily};
use crate::config::HarnessConfig;
use crate::error::ErrorCode;

/// Whether the harness runs on the physical part or under emulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Physical,
    Emulated,
}

/// Immutable snapshot of hardware identity, shared read-only by all phases.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapabilityRecord {
    pub environment: Environment,
    pub variant: SocFamily,
    pub frequency_hz: u64,
    pub model: String,
}

impl CapabilityRecord {
    pub fn new(environment: Environment, variant: SocFamily, frequency_hz: u64) -> Self {
        Self {
            environment,
            variant,
            frequency_hz,
            model: variant.to_string(),
        }
    }

    pub fn is_physical_hardware(&self) -> bool {
        matches!(self.environment, Environment::Physical)
    }

    pub fn frequency_mhz(&self) -> u64 {
        self.frequency_hz / 1_000_000
    }

    /// Hardware-accelerated cipher check is registered.
    pub fn has_hw_cipher(&self) -> bool {
        match (self.environment, self.variant) {
            (Environment::Physical, SocFamily::Imx6ULL) => true,
            (
                Environment::Physical,
                SocFamily::Imx6Q
                | SocFamily::Imx6DL
                | SocFamily::Imx6SoloLite
                | SocFamily::Imx6UL
                | SocFamily::Unknown,
            ) => false,
            (Environment::Emulated, _) => false,
        }
    }

    /// Storage media checks run in the sequential phase.
    pub fn runs_media_checks(&self) -> bool {
        match self.environment {
            Environment::Physical => true,
            Environment::Emulated => false,
        }
    }

    /// USB device-mode service is entered after the diagnostic battery.
    pub fn supports_device_mode(&self) -> bool {
        match (self.environment, self.variant) {
            (Environment::Physical, SocFamily::Imx6UL | SocFamily::Imx6ULL) => true,
            (
                Environment::Physical,
                SocFamily::Imx6Q | SocFamily::Imx6DL | SocFamily::Imx6SoloLite | SocFamily::Unknown,
            ) => false,
            (Environment::Emulated, _) => false,
        }
    }
}

/// Query the board once and build the capability record.
///
/// On physical hardware the CPU clock is raised to `config.target_cpu_mhz`
/// first. A refused clock change is logged and the probe continues with
/// whatever frequency the board reports. Calling this again re-requests the
/// same clock and yields an equal record.
pub fn probe(board: &dyn Board, config: &HarnessConfig) -> CapabilityRecord {
    let silicon = board.silicon();

    if !silicon.native {
        let mut record = CapabilityRecord::new(
            Environment::Emulated,
            silicon.family,
            board.cpu_frequency_hz(),
        );
        record.model = silicon.model;
        return record;
    }

    if let Err(err) = board.set_cpu_frequency_mhz(config.target_cpu_mhz) {
        log::warn!("WARNING: error setting ARM frequency: {}", err.message());
    }

    let mut record =
        CapabilityRecord::new(Environment::Physical, silicon.family, board.cpu_frequency_hz());
    record.model = silicon.model;

    log::info!(
        "imx6_soc: {} ({:#x}, {}.{}) @ {} MHz - native:{}",
        record.model,
        silicon.family.code(),
        silicon.revision_major,
        silicon.revision_minor,
        record.frequency_mhz(),
        silicon.native
    );

    record
}
