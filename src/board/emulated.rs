use crate::error::HarnessError;
use crate::orchestrator::DeviceModeHost;
use crate::sequential::MediaTarget;

use super::{Board, SiliconInfo, SocFamily};

/// Host stub board used when no physical part is present.
///
/// Reports a fixed emulated identity and rejects every hardware-only
/// facility, so the capability gates keep the harness away from them.
pub struct EmulatedBoard {
    family: SocFamily,
    frequency_hz: u64,
}

impl EmulatedBoard {
    pub fn new(family: SocFamily, frequency_hz: u64) -> Self {
        Self {
            family,
            frequency_hz,
        }
    }

    fn unsupported(feature: &str) -> HarnessError {
        HarnessError::Unsupported {
            feature: format!("{} (emulated board)", feature),
        }
    }
}

impl Default for EmulatedBoard {
    fn default() -> Self {
        Self::new(SocFamily::Imx6Q, 792_000_000)
    }
}

impl Board for EmulatedBoard {
    fn silicon(&self) -> SiliconInfo {
        SiliconInfo {
            model: self.family.to_string(),
            family: self.family,
            revision_major: 0,
            revision_minor: 0,
            native: false,
        }
    }

    fn cpu_frequency_hz(&self) -> u64 {
        self.frequency_hz
    }

    fn set_cpu_frequency_mhz(&self, _mhz: u32) -> Result<(), HarnessError> {
        Err(Self::unsupported("clock control"))
    }

    fn test_media(&self, target: &MediaTarget) -> Result<(), HarnessError> {
        Err(Self::unsupported(&format!("media {}", target.identifier)))
    }

    fn cipher_cbc_encrypt(
        &self,
        _key: &[u8; 16],
        _iv: &[u8; 16],
        _data: &[u8],
    ) -> Result<Vec<u8>, HarnessError> {
        Err(Self::unsupported("hardware cipher"))
    }

    fn serve_device_mode(&self, _host: DeviceModeHost) -> Result<(), HarnessError> {
        Err(Self::unsupported("USB device mode"))
    }
}
