// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Process-wide readiness of the native attribute syscalls
//!
//! The hosting application calls [`ensure_ready`] once at startup. Attribute
//! operations over the native capability refuse to run before that has
//! succeeded; they never initialize on first use.

use crate::error::InitError;
use std::sync::OnceLock;

/// Facts established by the startup probe
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Platform {
    pub os: &'static str,
}

static READY: OnceLock<Result<Platform, InitError>> = OnceLock::new();

/// Probe the syscall surface once; later calls return the cached outcome.
pub fn ensure_ready() -> Result<&'static Platform, InitError> {
    READY.get_or_init(probe).as_ref().map_err(Clone::clone)
}

/// Whether a previous [`ensure_ready`] call succeeded.
pub fn is_ready() -> bool {
    matches!(READY.get(), Some(Ok(_)))
}

#[cfg(target_os = "macos")]
fn probe() -> Result<Platform, InitError> {
    use crate::errno::Errno;
    use crate::options::XattrOptions;
    use crate::sys::{XattrSys, macos::MacosXattrSys};
    use crate::target::RawTarget;

    let root = RawTarget::Path(std::ffi::CString::from(c"/"));
    match MacosXattrSys.list(&root, &mut [], XattrOptions::empty()) {
        Err(errno) if errno == Errno::ENOSYS => {
            tracing::error!(%errno, "listxattr probe failed");
            Err(InitError::ProbeFailed(errno))
        }
        _ => {
            tracing::debug!("xattr syscalls available");
            Ok(Platform { os: "macos" })
        }
    }
}

#[cfg(not(target_os = "macos"))]
fn probe() -> Result<Platform, InitError> {
    tracing::error!(os = std::env::consts::OS, "no xattr syscall binding for this platform");
    Err(InitError::UnsupportedPlatform)
}
