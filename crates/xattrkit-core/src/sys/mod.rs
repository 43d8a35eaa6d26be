// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! OS capability interface for the extended attribute syscalls
//!
//! One method per syscall family. Every implementation must read errno
//! inside the method, directly after its single underlying call, and hand it
//! back in the `Err` arm. Callers never consult ambient errno afterwards.

#[cfg(target_os = "macos")]
pub mod macos;

use crate::errno::Errno;
use crate::options::XattrOptions;
use crate::target::RawTarget;
use std::ffi::CStr;
use std::sync::Arc;

/// Size width reported when `pathconf` answers -1 without an errno, i.e.
/// the filesystem imposes no limit beyond a 64-bit `off_t`.
pub const SIZE_BITS_UNLIMITED: i64 = 64;

/// Interpret a `pathconf`-style return value together with the errno read
/// right after the call (errno having been cleared before it).
#[cfg_attr(not(target_os = "macos"), allow(dead_code))]
pub(crate) fn size_bits_result(ret: i64, errno: Errno) -> Result<i64, Errno> {
    match ret {
        -1 if errno.raw() == 0 => Ok(SIZE_BITS_UNLIMITED),
        r if r < 0 => Err(errno),
        r => Ok(r),
    }
}

#[cfg_attr(test, mockall::automock)]
pub trait XattrSys: Send + Sync {
    /// `getxattr(2)` / `fgetxattr(2)`; an empty `buf` asks for the value size
    fn get(
        &self,
        target: &RawTarget,
        name: &CStr,
        buf: &mut [u8],
        options: XattrOptions,
    ) -> Result<usize, Errno>;

    /// `setxattr(2)` / `fsetxattr(2)`
    fn set(
        &self,
        target: &RawTarget,
        name: &CStr,
        value: &[u8],
        options: XattrOptions,
    ) -> Result<(), Errno>;

    /// `removexattr(2)` / `fremovexattr(2)`
    fn remove(
        &self,
        target: &RawTarget,
        name: &CStr,
        options: XattrOptions,
    ) -> Result<(), Errno>;

    /// `listxattr(2)` / `flistxattr(2)`; an empty `buf` asks for the list size
    fn list(
        &self,
        target: &RawTarget,
        buf: &mut [u8],
        options: XattrOptions,
    ) -> Result<usize, Errno>;

    /// `pathconf(2)` / `fpathconf(2)` with `_PC_XATTR_SIZE_BITS`; 0 means no
    /// attribute support, [`SIZE_BITS_UNLIMITED`] that no limit is reported
    fn size_bits(&self, target: &RawTarget) -> Result<i64, Errno>;
}

impl<S: XattrSys + ?Sized> XattrSys for Arc<S> {
    fn get(
        &self,
        target: &RawTarget,
        name: &CStr,
        buf: &mut [u8],
        options: XattrOptions,
    ) -> Result<usize, Errno> {
        (**self).get(target, name, buf, options)
    }

    fn set(
        &self,
        target: &RawTarget,
        name: &CStr,
        value: &[u8],
        options: XattrOptions,
    ) -> Result<(), Errno> {
        (**self).set(target, name, value, options)
    }

    fn remove(
        &self,
        target: &RawTarget,
        name: &CStr,
        options: XattrOptions,
    ) -> Result<(), Errno> {
        (**self).remove(target, name, options)
    }

    fn list(
        &self,
        target: &RawTarget,
        buf: &mut [u8],
        options: XattrOptions,
    ) -> Result<usize, Errno> {
        (**self).list(target, buf, options)
    }

    fn size_bits(&self, target: &RawTarget) -> Result<i64, Errno> {
        (**self).size_bits(target)
    }
}
