//! Board abstraction consumed by the orchestration engine.
//!
//! Silicon identification, clock control, storage media, the hardware cipher
//! and the USB device-mode stack all live behind [`Board`]. The harness only
//! consumes them; bringing the hardware up is the board implementation's job.

use std::fmt;

use crate::error::HarnessError;
use crate::orchestrator::DeviceModeHost;
use crate::sequential::MediaTarget;

mod emulated;
pub use emulated::EmulatedBoard;

/// Closed set of SoC variants the harness knows how to gate on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SocFamily {
    Imx6Q,
    Imx6DL,
    Imx6SoloLite,
    Imx6UL,
    Imx6ULL,
    Unknown,
}

impl SocFamily {
    /// Silicon family code as reported by the anatop DIGPROG register.
    pub fn code(self) -> u32 {
        match self {
            SocFamily::Imx6SoloLite => 0x60,
            SocFamily::Imx6DL => 0x61,
            SocFamily::Imx6Q => 0x63,
            SocFamily::Imx6UL => 0x64,
            SocFamily::Imx6ULL => 0x65,
            SocFamily::Unknown => 0x00,
        }
    }
}

impl fmt::Display for SocFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SocFamily::Imx6Q => "i.MX6Q",
            SocFamily::Imx6DL => "i.MX6DL",
            SocFamily::Imx6SoloLite => "i.MX6SL",
            SocFamily::Imx6UL => "i.MX6UL",
            SocFamily::Imx6ULL => "i.MX6ULL",
            SocFamily::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// Identity read from the silicon at probe time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiliconInfo {
    pub model: String,
    pub family: SocFamily,
    pub revision_major: u8,
    pub revision_minor: u8,
    /// Running on the physical part rather than an emulator
    pub native: bool,
}

/// Trait implemented by board support packages.
///
/// Every method is blocking; the engine moves calls that may take long onto
/// blocking worker threads.
pub trait Board: Send + Sync {
    fn silicon(&self) -> SiliconInfo;

    fn cpu_frequency_hz(&self) -> u64;

    fn set_cpu_frequency_mhz(&self, mhz: u32) -> Result<(), HarnessError>;

    /// Read `target.byte_count` bytes in `target.read_chunk` sized transfers.
    fn test_media(&self, target: &MediaTarget) -> Result<(), HarnessError>;

    /// AES-128-CBC through the on-chip crypto engine.
    fn cipher_cbc_encrypt(
        &self,
        key: &[u8; 16],
        iv: &[u8; 16],
        data: &[u8],
    ) -> Result<Vec<u8>, HarnessError>;

    /// Run the USB device-mode service loop.
    ///
    /// On hardware this does not return while the host stays attached. A
    /// return of `Ok(())` means the service ended and the process has
    /// nothing left to do.
    fn serve_device_mode(&self, host: DeviceModeHost) -> Result<(), HarnessError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_family_codes() {
        assert_eq!(SocFamily::Imx6Q.code(), 0x63);
        assert_eq!(SocFamily::Imx6UL.code(), 0x64);
        assert_eq!(SocFamily::Imx6ULL.code(), 0x65);
        assert_eq!(SocFamily::Unknown.code(), 0x00);
    }

    #[test]
    fn test_family_display() {
        assert_eq!(SocFamily::Imx6ULL.to_string(), "i.MX6ULL");
        assert_eq!(SocFamily::Unknown.to_string(), "unknown");
    }
}
