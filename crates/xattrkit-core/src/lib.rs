// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Extended attribute access for BSD-derived kernels
//!
//! A thin, stateless layer over `getxattr`, `setxattr`, `removexattr` and
//! `listxattr` (plus their descriptor forms) that takes care of argument
//! marshalling, buffer sizing, symlink options and errno translation.
//!
//! ```ignore
//! use xattrkit_core::{AttributeAccess, XattrOptions, ensure_ready};
//!
//! ensure_ready()?;
//! let access = AttributeAccess::native()?;
//! access.set_str("/tmp/file", "user.note", "hello", XattrOptions::empty())?;
//! assert_eq!(access.get("/tmp/file", "user.note", XattrOptions::empty())?, b"hello");
//! ```

pub mod access;
pub mod errno;
pub mod error;
pub mod init;
pub mod options;
pub mod sys;
pub mod target;
pub mod testing;

pub use access::{AccessConfig, AttributeAccess, DEFAULT_MAX_RANGE_RETRIES};
pub use errno::Errno;
pub use error::{InitError, XattrError, XattrErrorKind, XattrOp, XattrResult};
pub use init::{Platform, ensure_ready, is_ready};
pub use options::{ParseOptionError, XattrOptions};
pub use sys::{SIZE_BITS_UNLIMITED, XattrSys};
pub use target::{RawTarget, Target};

#[cfg(target_os = "macos")]
pub use sys::macos::MacosXattrSys;
