//! Host detection

use kiln_errors::{Error, PlatformError};
use kiln_events::{AppEvent, PlatformEvent};
use kiln_types::{OsFamily, PlatformInfo};

use sysinfo::System;

use crate::core::PlatformContext;

/// OS family this binary was compiled for
#[must_use]
pub fn current_family() -> OsFamily {
    if cfg!(target_os = "macos") {
        OsFamily::Macos
    } else if cfg!(target_os = "linux") {
        OsFamily::Linux
    } else {
        OsFamily::Other
    }
}

/// Describe the running host without spawning anything
///
/// The release version is the OS product version on macOS (`14.5`) and the
/// kernel release elsewhere (`6.8.0` from `6.8.0-45-generic`).
///
/// # Errors
///
/// Returns an error if the host does not report a usable version.
pub fn detect_host(ctx: &PlatformContext) -> Result<PlatformInfo, Error> {
    let family = current_family();
    let raw = match family {
        OsFamily::Macos => System::os_version(),
        OsFamily::Linux | OsFamily::Other => System::kernel_version(),
    };
    let info = host_info(family, raw.as_deref())?;

    tracing::debug!(host = %info, "detected host");
    ctx.emit_event(AppEvent::Platform(PlatformEvent::HostDetected {
        family: info.family.to_string(),
        version: info.version.clone(),
        arch: info.arch.clone(),
    }));
    Ok(info)
}

fn host_info(family: OsFamily, raw: Option<&str>) -> Result<PlatformInfo, PlatformError> {
    let version = raw
        .and_then(parse_version)
        .ok_or_else(|| PlatformError::HostDetectionFailed {
            message: format!("no {family} release version reported"),
        })?;
    Ok(PlatformInfo::new(family, version, std::env::consts::ARCH))
}

/// Leading dotted-numeric part of the first line, e.g. `6.8.0` from `6.8.0-45-generic`
fn parse_version(raw: &str) -> Option<String> {
    let line = raw.lines().next()?.trim();
    let numeric: String = line
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    let numeric = numeric.trim_end_matches('.');
    if numeric.is_empty() {
        None
    } else {
        Some(numeric.to_string())
    }
}
