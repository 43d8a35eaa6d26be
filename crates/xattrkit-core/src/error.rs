// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Error types for xattrkit

use crate::errno::Errno;
use std::fmt;
use std::io;

/// Attribute operation that produced a failure
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum XattrOp {
    Get,
    Set,
    Remove,
    List,
    Size,
    SizeBits,
}

impl XattrOp {
    pub fn as_str(self) -> &'static str {
        match self {
            XattrOp::Get => "getxattr",
            XattrOp::Set => "setxattr",
            XattrOp::Remove => "removexattr",
            XattrOp::List => "listxattr",
            XattrOp::Size => "sizexattr(getxattr)",
            XattrOp::SizeBits => "xattrsizebits(pathconf)",
        }
    }
}

impl fmt::Display for XattrOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coarse classification of a kernel failure
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum XattrErrorKind {
    /// The target path (or a component of it) does not exist
    NotFound,
    /// The target exists but carries no attribute with that name
    AttributeNotFound,
    /// Empty or malformed name, illegal option bits, oversized value
    InvalidArgument,
    PermissionDenied,
    /// `CREATE` was requested and the name is already present
    AlreadyExists,
    /// The filesystem or object does not support extended attributes
    NotSupported,
    /// Anything else the kernel reports
    Io,
}

impl XattrErrorKind {
    pub fn from_errno(errno: Errno) -> Self {
        match errno {
            Errno::ENOENT | Errno::ENOTDIR => XattrErrorKind::NotFound,
            Errno::ENOATTR => XattrErrorKind::AttributeNotFound,
            Errno::EINVAL | Errno::ENAMETOOLONG | Errno::E2BIG => XattrErrorKind::InvalidArgument,
            Errno::EACCES | Errno::EPERM | Errno::EROFS => XattrErrorKind::PermissionDenied,
            Errno::EEXIST => XattrErrorKind::AlreadyExists,
            Errno::ENOTSUP => XattrErrorKind::NotSupported,
            _ => XattrErrorKind::Io,
        }
    }
}

/// Failure of a single attribute syscall
///
/// The rendered message always contains ` errno: <N> ` so callers that only
/// see the text can still recover the code.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct XattrError {
    op: XattrOp,
    errno: Errno,
    message: String,
}

impl XattrError {
    pub fn new(op: XattrOp, errno: Errno) -> Self {
        let message = format!(
            "(native) {} failure: errno: {} ({})",
            op,
            errno,
            errno.description()
        );
        Self { op, errno, message }
    }

    pub fn op(&self) -> XattrOp {
        self.op
    }

    pub fn errno(&self) -> Errno {
        self.errno
    }

    pub fn raw_os_error(&self) -> i32 {
        self.errno.raw()
    }

    pub fn kind(&self) -> XattrErrorKind {
        XattrErrorKind::from_errno(self.errno)
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// True when the failure only says the target or the attribute is absent.
    pub fn is_absent(&self) -> bool {
        matches!(
            self.kind(),
            XattrErrorKind::NotFound | XattrErrorKind::AttributeNotFound
        )
    }
}

impl From<XattrError> for io::Error {
    fn from(err: XattrError) -> Self {
        io::Error::from_raw_os_error(err.raw_os_error())
    }
}

pub type XattrResult<T> = Result<T, XattrError>;

/// Failure to establish the process-wide readiness state
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum InitError {
    #[error("extended attribute syscalls are not available on this platform")]
    UnsupportedPlatform,
    #[error("extended attribute syscall probe failed: errno: {0} ")]
    ProbeFailed(Errno),
    #[error("xattrkit::ensure_ready() has not been called")]
    NotReady,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_embeds_parseable_errno() {
        let err = XattrError::new(XattrOp::Get, Errno::ENOATTR);
        assert!(err.message().contains(" errno: 93 "));
        assert!(err.to_string().starts_with("(native) getxattr failure"));
        assert_eq!(err.raw_os_error(), 93);
    }

    #[test]
    fn kinds_follow_errno() {
        let cases = [
            (Errno::ENOENT, XattrErrorKind::NotFound),
            (Errno::ENOATTR, XattrErrorKind::AttributeNotFound),
            (Errno::EINVAL, XattrErrorKind::InvalidArgument),
            (Errno::E2BIG, XattrErrorKind::InvalidArgument),
            (Errno::EACCES, XattrErrorKind::PermissionDenied),
            (Errno::EEXIST, XattrErrorKind::AlreadyExists),
            (Errno::ENOTSUP, XattrErrorKind::NotSupported),
            (Errno::EIO, XattrErrorKind::Io),
            (Errno(9999), XattrErrorKind::Io),
        ];
        for (errno, kind) in cases {
            assert_eq!(XattrErrorKind::from_errno(errno), kind, "errno {errno}");
        }
    }

    #[test]
    fn absent_covers_target_and_attribute() {
        assert!(XattrError::new(XattrOp::Remove, Errno::ENOENT).is_absent());
        assert!(XattrError::new(XattrOp::Remove, Errno::ENOATTR).is_absent());
        assert!(!XattrError::new(XattrOp::Remove, Errno::EINVAL).is_absent());
    }

    #[test]
    fn converts_to_io_error_with_code() {
        let io_err: io::Error = XattrError::new(XattrOp::Set, Errno::EEXIST).into();
        assert_eq!(io_err.raw_os_error(), Some(17));
    }
}
