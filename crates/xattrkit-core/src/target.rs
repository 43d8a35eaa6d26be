// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Attribute targets and the marshalling into syscall arguments

use crate::errno::Errno;
use std::ffi::CString;
use std::fmt;
use std::os::fd::{AsRawFd, BorrowedFd, RawFd};
use std::path::{Path, PathBuf};

/// What an attribute operation applies to
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Target<'a> {
    /// Resolved by path; symlinks are followed unless `NOFOLLOW` is set
    Path(&'a Path),
    /// An open descriptor; validity is checked by the kernel
    Descriptor(RawFd),
}

impl<'a> From<&'a Path> for Target<'a> {
    fn from(path: &'a Path) -> Self {
        Target::Path(path)
    }
}

impl<'a> From<&'a PathBuf> for Target<'a> {
    fn from(path: &'a PathBuf) -> Self {
        Target::Path(path.as_path())
    }
}

impl<'a> From<&'a str> for Target<'a> {
    fn from(path: &'a str) -> Self {
        Target::Path(Path::new(path))
    }
}

impl<'a> From<BorrowedFd<'a>> for Target<'a> {
    fn from(fd: BorrowedFd<'a>) -> Self {
        Target::Descriptor(fd.as_raw_fd())
    }
}

impl<'a> From<&'a std::fs::File> for Target<'a> {
    fn from(file: &'a std::fs::File) -> Self {
        Target::Descriptor(file.as_raw_fd())
    }
}

impl fmt::Display for Target<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Path(path) => write!(f, "{}", path.display()),
            Target::Descriptor(fd) => write!(f, "fd:{}", fd),
        }
    }
}

/// A target encoded for the C boundary
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RawTarget {
    Path(CString),
    Descriptor(RawFd),
}

impl RawTarget {
    /// Encode a target as a NUL-terminated UTF-8 path or a bare descriptor.
    ///
    /// Paths that are not UTF-8 or contain an interior NUL are rejected with
    /// `EINVAL`. The empty path goes through; the kernel answers `ENOENT`.
    pub fn encode(target: Target<'_>) -> Result<Self, Errno> {
        match target {
            Target::Path(path) => {
                let text = path.to_str().ok_or(Errno::EINVAL)?;
                let c_path = CString::new(text.as_bytes()).map_err(|_| Errno::EINVAL)?;
                Ok(RawTarget::Path(c_path))
            }
            Target::Descriptor(fd) => Ok(RawTarget::Descriptor(fd)),
        }
    }
}

/// Encode an attribute name as a NUL-terminated UTF-8 string.
///
/// The empty name is passed through so the kernel can reject it.
pub fn encode_name(name: &str) -> Result<CString, Errno> {
    CString::new(name.as_bytes()).map_err(|_| Errno::EINVAL)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_utf8_paths() {
        let raw = RawTarget::encode(Target::from("/tmp/ünïcödé")).unwrap();
        let expected = CString::new("/tmp/ünïcödé").unwrap();
        assert_eq!(raw, RawTarget::Path(expected));
    }

    #[test]
    fn empty_path_is_left_to_the_kernel() {
        let raw = RawTarget::encode(Target::from("")).unwrap();
        assert_eq!(raw, RawTarget::Path(CString::default()));
    }

    #[test]
    fn interior_nul_is_invalid() {
        assert_eq!(RawTarget::encode(Target::from("/tmp/a\0b")), Err(Errno::EINVAL));
        assert_eq!(encode_name("a\0b"), Err(Errno::EINVAL));
    }

    #[test]
    fn non_utf8_path_is_invalid() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let path = Path::new(OsStr::from_bytes(b"/tmp/\xff\xfe"));
        assert_eq!(RawTarget::encode(Target::Path(path)), Err(Errno::EINVAL));
    }

    #[test]
    fn descriptors_pass_through() {
        assert_eq!(RawTarget::encode(Target::Descriptor(7)), Ok(RawTarget::Descriptor(7)));
        assert_eq!(Target::Descriptor(7).to_string(), "fd:7");
    }

    #[test]
    fn empty_name_is_encoded() {
        assert_eq!(encode_name("").unwrap().as_bytes(), b"");
    }
}
