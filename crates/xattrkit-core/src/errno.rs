// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Kernel error codes interpreted by the attribute layer
//!
//! The values are the XNU (`bsd/sys/errno.h`) numbers. They are spelled out
//! rather than taken from `libc` so the in-memory kernel double reports the
//! same codes on every host the test-suite runs on.

use std::fmt;

/// A kernel error code captured right after a failed syscall.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Errno(pub i32);

impl Errno {
    pub const EPERM: Errno = Errno(1);
    pub const ENOENT: Errno = Errno(2);
    pub const EIO: Errno = Errno(5);
    pub const E2BIG: Errno = Errno(7);
    pub const EBADF: Errno = Errno(9);
    pub const ENOMEM: Errno = Errno(12);
    pub const EACCES: Errno = Errno(13);
    pub const EFAULT: Errno = Errno(14);
    pub const EEXIST: Errno = Errno(17);
    pub const ENOTDIR: Errno = Errno(20);
    pub const EINVAL: Errno = Errno(22);
    pub const ENOSPC: Errno = Errno(28);
    pub const EROFS: Errno = Errno(30);
    pub const ERANGE: Errno = Errno(34);
    pub const ENOTSUP: Errno = Errno(45);
    pub const ELOOP: Errno = Errno(62);
    pub const ENOSYS: Errno = Errno(78);
    pub const ENAMETOOLONG: Errno = Errno(63);
    pub const ENOATTR: Errno = Errno(93);

    /// Read the calling thread's errno.
    ///
    /// Only valid on the line directly following the failed call; anything
    /// in between (logging, allocation) may overwrite it.
    pub fn last() -> Self {
        Errno(std::io::Error::last_os_error().raw_os_error().unwrap_or(Self::EIO.0))
    }

    pub fn raw(self) -> i32 {
        self.0
    }

    /// Human readable text for the code, as `strerror(3)` on XNU prints it.
    pub fn description(self) -> String {
        let text = match self {
            Errno::EPERM => "Operation not permitted",
            Errno::ENOENT => "No such file or directory",
            Errno::EIO => "Input/output error",
            Errno::E2BIG => "Argument list too long",
            Errno::EBADF => "Bad file descriptor",
            Errno::ENOMEM => "Cannot allocate memory",
            Errno::EACCES => "Permission denied",
            Errno::EFAULT => "Bad address",
            Errno::EEXIST => "File exists",
            Errno::ENOTDIR => "Not a directory",
            Errno::EINVAL => "Invalid argument",
            Errno::ENOSPC => "No space left on device",
            Errno::EROFS => "Read-only file system",
            Errno::ERANGE => "Result too large",
            Errno::ENOTSUP => "Operation not supported",
            Errno::ELOOP => "Too many levels of symbolic links",
            Errno::ENOSYS => "Function not implemented",
            Errno::ENAMETOOLONG => "File name too long",
            Errno::ENOATTR => "Attribute not found",
            other => {
                let host = std::io::Error::from_raw_os_error(other.0).to_string();
                // std appends " (os error N)"; the message carries the number separately
                return match host.rfind(" (os error ") {
                    Some(idx) => host[..idx].to_string(),
                    None => host,
                };
            }
        };
        text.to_string()
    }
}

impl fmt::Display for Errno {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
