//! Build-time identity and the startup banner.

use crate::capability::CapabilityRecord;

/// Identity strings injected by `build.rs`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildInfo {
    pub build: &'static str,
    pub revision: &'static str,
    pub rustc: &'static str,
}

impl BuildInfo {
    pub fn current() -> Self {
        Self {
            build: env!("BRINGUP_BUILD"),
            revision: env!("BRINGUP_REVISION"),
            rustc: env!("BRINGUP_RUSTC"),
        }
    }
}

/// Compose the banner logged once at startup.
///
/// `linux/aarch64 (rustc 1.xx) • <revision> <build> • i.MX6ULL 900 MHz`
pub fn banner(info: &BuildInfo, caps: &CapabilityRecord) -> String {
    let mut banner = format!(
        "{}/{} ({}) • {} {}",
        std::env::consts::OS,
        std::env::consts::ARCH,
        info.rustc,
        info.revision,
        info.build
    );
    banner.push_str(&format!(" • {} {} MHz", caps.model, caps.frequency_mhz()));
    if !caps.is_physical_hardware() {
        banner.push_str(" (emulated)");
    }
    banner
}
