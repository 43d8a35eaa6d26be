// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Attribute operations over an [`XattrSys`] capability
//!
//! Every operation accepts anything convertible into a [`Target`], so the
//! path-addressed and descriptor-addressed forms share one code path:
//!
//! ```ignore
//! access.get(Path::new("/tmp/f"), "user.tag", XattrOptions::empty())?;
//! access.get(file.as_fd(), "user.tag", XattrOptions::NOFOLLOW)?;
//! ```
//!
//! `get` and `list` probe the size first and then read. If another process
//! changes the attribute in between, a shrunk value comes back truncated to
//! what the kernel wrote, and a grown one makes the read fail with `ERANGE`,
//! in which case the probe/read pair is replayed a bounded number of times.
//! The kernel offers no atomic "read whatever size it is" call, so no other
//! coordination is attempted.

use crate::errno::Errno;
use crate::error::{XattrError, XattrErrorKind, XattrOp, XattrResult};
use crate::options::XattrOptions;
use crate::sys::XattrSys;
use crate::target::{RawTarget, Target, encode_name};
use std::ffi::CString;
use tracing::{debug, trace, warn};

pub const DEFAULT_MAX_RANGE_RETRIES: u32 = 8;

/// Tunables for [`AttributeAccess`]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AccessConfig {
    /// How often a probe/read pair is replayed after `ERANGE`
    pub max_range_retries: u32,
}

impl Default for AccessConfig {
    fn default() -> Self {
        Self {
            max_range_retries: DEFAULT_MAX_RANGE_RETRIES,
        }
    }
}

/// Stateless front end to the attribute syscalls
#[derive(Clone, Debug, Default)]
pub struct AttributeAccess<S> {
    sys: S,
    config: AccessConfig,
}

#[cfg(target_os = "macos")]
impl AttributeAccess<crate::sys::macos::MacosXattrSys> {
    /// Access backed by the real kernel.
    ///
    /// Fails with [`crate::InitError::NotReady`] unless [`crate::ensure_ready`]
    /// has already succeeded in this process.
    pub fn native() -> Result<Self, crate::InitError> {
        Self::native_with_config(AccessConfig::default())
    }

    pub fn native_with_config(config: AccessConfig) -> Result<Self, crate::InitError> {
        if !crate::init::is_ready() {
            return Err(crate::InitError::NotReady);
        }
        Ok(Self::with_config(crate::sys::macos::MacosXattrSys, config))
    }
}

fn marshal_target(op: XattrOp, target: Target<'_>) -> XattrResult<RawTarget> {
    RawTarget::encode(target).map_err(|errno| XattrError::new(op, errno))
}

fn marshal(op: XattrOp, target: Target<'_>, name: &str) -> XattrResult<(RawTarget, CString)> {
    let raw = marshal_target(op, target)?;
    let c_name = encode_name(name).map_err(|errno| XattrError::new(op, errno))?;
    Ok((raw, c_name))
}

/// Split a NUL-separated name buffer as filled by `listxattr(2)`.
fn split_names(buf: &[u8]) -> XattrResult<Vec<String>> {
    buf.split(|&b| b == 0)
        .filter(|chunk| !chunk.is_empty())
        .map(|chunk| {
            String::from_utf8(chunk.to_vec())
                .map_err(|_| XattrError::new(XattrOp::List, Errno::EINVAL))
        })
        .collect()
}

impl<S: XattrSys> AttributeAccess<S> {
    pub fn new(sys: S) -> Self {
        Self::with_config(sys, AccessConfig::default())
    }

    pub fn with_config(sys: S, config: AccessConfig) -> Self {
        Self { sys, config }
    }

    pub fn sys(&self) -> &S {
        &self.sys
    }

    pub fn config(&self) -> AccessConfig {
        self.config
    }

    fn fail(&self, op: XattrOp, target: Target<'_>, errno: Errno) -> XattrError {
        let err = XattrError::new(op, errno);
        debug!(%target, errno = errno.raw(), kind = ?err.kind(), "{} failed", op);
        err
    }

    /// Read the full value of `name`.
    ///
    /// A zero-length value is returned as an empty vector after a single
    /// size probe.
    pub fn get<'a>(
        &self,
        target: impl Into<Target<'a>>,
        name: &str,
        options: XattrOptions,
    ) -> XattrResult<Vec<u8>> {
        let target = target.into();
        let (raw, c_name) = marshal(XattrOp::Get, target, name)?;
        trace!(%target, name, %options, "getxattr");

        let mut replays = 0;
        loop {
            let len = self
                .sys
                .get(&raw, &c_name, &mut [], options)
                .map_err(|errno| self.fail(XattrOp::Get, target, errno))?;
            if len == 0 {
                return Ok(Vec::new());
            }

            let mut buf = vec![0u8; len];
            match self.sys.get(&raw, &c_name, &mut buf, options) {
                Ok(read) => {
                    buf.truncate(read.min(len));
                    return Ok(buf);
                }
                Err(errno) if errno == Errno::ERANGE && replays < self.config.max_range_retries => {
                    replays += 1;
                    warn!(
                        %target,
                        name,
                        probed = len,
                        replays,
                        "value grew between probe and read"
                    );
                }
                Err(errno) => return Err(self.fail(XattrOp::Get, target, errno)),
            }
        }
    }

    /// Write `value` in one call. Without `CREATE` or `REPLACE` this is an upsert.
    pub fn set<'a>(
        &self,
        target: impl Into<Target<'a>>,
        name: &str,
        value: &[u8],
        options: XattrOptions,
    ) -> XattrResult<()> {
        let target = target.into();
        let (raw, c_name) = marshal(XattrOp::Set, target, name)?;
        trace!(%target, name, len = value.len(), %options, "setxattr");
        self.sys
            .set(&raw, &c_name, value, options)
            .map_err(|errno| self.fail(XattrOp::Set, target, errno))
    }

    /// [`Self::set`] with a text value stored as its UTF-8 bytes.
    pub fn set_str<'a>(
        &self,
        target: impl Into<Target<'a>>,
        name: &str,
        value: &str,
        options: XattrOptions,
    ) -> XattrResult<()> {
        self.set(target, name, value.as_bytes(), options)
    }

    /// Delete `name`.
    ///
    /// With `force`, a missing target or a missing attribute counts as
    /// success, like `rm -f`. Every other failure still propagates.
    pub fn remove<'a>(
        &self,
        target: impl Into<Target<'a>>,
        name: &str,
        options: XattrOptions,
        force: bool,
    ) -> XattrResult<()> {
        let target = target.into();
        let (raw, c_name) = marshal(XattrOp::Remove, target, name)?;
        trace!(%target, name, %options, force, "removexattr");
        match self.sys.remove(&raw, &c_name, options) {
            Ok(()) => Ok(()),
            Err(errno) => {
                let err = self.fail(XattrOp::Remove, target, errno);
                if force && err.is_absent() {
                    debug!(%target, name, errno = errno.raw(), "forced remove ignores absence");
                    return Ok(());
                }
                Err(err)
            }
        }
    }

    /// Attribute names in kernel order; empty when the target has none.
    pub fn list<'a>(
        &self,
        target: impl Into<Target<'a>>,
        options: XattrOptions,
    ) -> XattrResult<Vec<String>> {
        let target = target.into();
        let raw = marshal_target(XattrOp::List, target)?;
        trace!(%target, %options, "listxattr");

        let mut replays = 0;
        loop {
            let len = self
                .sys
                .list(&raw, &mut [], options)
                .map_err(|errno| self.fail(XattrOp::List, target, errno))?;
            if len == 0 {
                return Ok(Vec::new());
            }

            let mut buf = vec![0u8; len];
            match self.sys.list(&raw, &mut buf, options) {
                Ok(read) => return split_names(&buf[..read.min(len)]),
                Err(errno) if errno == Errno::ERANGE && replays < self.config.max_range_retries => {
                    replays += 1;
                    warn!(%target, probed = len, replays, "name list grew between probe and read");
                }
                Err(errno) => return Err(self.fail(XattrOp::List, target, errno)),
            }
        }
    }

    /// Value length of `name`, using only the size-probe form of `getxattr(2)`.
    pub fn size<'a>(
        &self,
        target: impl Into<Target<'a>>,
        name: &str,
        options: XattrOptions,
    ) -> XattrResult<u64> {
        let target = target.into();
        let (raw, c_name) = marshal(XattrOp::Size, target, name)?;
        trace!(%target, name, %options, "sizexattr");
        self.sys
            .get(&raw, &c_name, &mut [], options)
            .map(|len| len as u64)
            .map_err(|errno| self.fail(XattrOp::Size, target, errno))
    }

    /// Whether `name` is present.
    ///
    /// Only `ENOATTR` maps to `false`; a missing target, a permission problem
    /// or an invalid name is returned as an error.
    pub fn exists<'a>(
        &self,
        target: impl Into<Target<'a>>,
        name: &str,
        options: XattrOptions,
    ) -> XattrResult<bool> {
        match self.size(target, name, options) {
            Ok(_) => Ok(true),
            Err(err) if err.kind() == XattrErrorKind::AttributeNotFound => Ok(false),
            Err(err) => Err(err),
        }
    }

    /// Bits the filesystem uses to store attribute sizes; 0 means no support
    /// and [`crate::SIZE_BITS_UNLIMITED`] that the filesystem reports no limit.
    pub fn size_bits<'a>(&self, target: impl Into<Target<'a>>) -> XattrResult<i64> {
        let target = target.into();
        let raw = marshal_target(XattrOp::SizeBits, target)?;
        trace!(%target, "xattrsizebits");
        self.sys
            .size_bits(&raw)
            .map_err(|errno| self.fail(XattrOp::SizeBits, target, errno))
    }
}
