// Build script for build-time identity strings
//
// The startup banner carries a build identifier and a revision identifier.
// Both are taken from the environment of the build:
//   BUILD=2026-10-18 REVISION=$(git rev-parse --short HEAD) cargo build
//
// Missing values become empty strings.

use std::process::Command;

fn main() {
    println!("cargo:rerun-if-env-changed=BUILD");
    println!("cargo:rerun-if-env-changed=REVISION");
    println!("cargo:rerun-if-env-changed=BRINGUP_CONFIG");

    let build = std::env::var("BUILD").unwrap_or_default();
    let revision = std::env::var("REVISION").unwrap_or_default();
    println!("cargo:rustc-env=BRINGUP_BUILD={build}");
    println!("cargo:rustc-env=BRINGUP_REVISION={revision}");

    let rustc = std::env::var("RUSTC").unwrap_or_else(|_| "rustc".to_string());
    let version = Command::new(rustc)
        .arg("--version")
        .output()
        .ok()
        .filter(|output| output.status.success())
        .and_then(|output| String::from_utf8(output.stdout).ok())
        .map(|version| version.trim().to_string())
        .unwrap_or_else(|| "unknown".to_string());
    println!("cargo:rustc-env=BRINGUP_RUSTC={version}");
}
