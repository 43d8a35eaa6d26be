// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Option bits accepted by the attribute syscalls (`xnu/bsd/sys/xattr.h`)

use std::fmt;

bitflags::bitflags! {
    /// Option mask passed verbatim to the kernel.
    ///
    /// Unknown bits are retained; the kernel, not this layer, decides
    /// which combinations are legal.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
    pub struct XattrOptions: u32 {
        /// Operate on a symbolic link itself instead of its target
        const NOFOLLOW = 0x0001;
        /// Fail if the attribute already exists
        const CREATE = 0x0002;
        /// Fail if the attribute does not exist
        const REPLACE = 0x0004;
        /// Expose the HFS compression attributes to get/list
        const SHOW_COMPRESSION = 0x0020;
    }
}

impl XattrOptions {
    /// Build a mask from a raw integer, keeping bits this crate has no name for.
    pub fn from_raw(bits: u32) -> Self {
        Self::from_bits_retain(bits)
    }

    /// Value handed to the C `options` argument.
    pub fn as_c_int(self) -> libc::c_int {
        self.bits() as libc::c_int
    }

    /// Parse a comma separated list such as `nofollow,create`.
    pub fn parse_list(list: &str) -> Result<Self, ParseOptionError> {
        let mut options = XattrOptions::empty();
        for item in list.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            options |= XattrOptions::parse_name(item)?;
        }
        Ok(options)
    }

    /// Parse a single option name; case and `_`/`-` are not significant.
    pub fn parse_name(s: &str) -> Result<Self, ParseOptionError> {
        match s.to_ascii_lowercase().replace('_', "-").as_str() {
            "nofollow" | "no-follow" => Ok(XattrOptions::NOFOLLOW),
            "create" => Ok(XattrOptions::CREATE),
            "replace" => Ok(XattrOptions::REPLACE),
            "showcompression" | "show-compression" => Ok(XattrOptions::SHOW_COMPRESSION),
            _ => Err(ParseOptionError(s.to_string())),
        }
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown xattr option '{0}' (expected nofollow, create, replace or show-compression)")]
pub struct ParseOptionError(pub String);

impl fmt::Display for XattrOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#06x}", self.bits())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bits_match_kernel_constants() {
        assert_eq!(XattrOptions::NOFOLLOW.bits(), 0x0001);
        assert_eq!(XattrOptions::CREATE.bits(), 0x0002);
        assert_eq!(XattrOptions::REPLACE.bits(), 0x0004);
        assert_eq!(XattrOptions::SHOW_COMPRESSION.bits(), 0x0020);
    }

    #[cfg(target_os = "macos")]
    #[test]
    fn bits_match_host_headers() {
        assert_eq!(XattrOptions::NOFOLLOW.as_c_int(), libc::XATTR_NOFOLLOW);
        assert_eq!(XattrOptions::CREATE.as_c_int(), libc::XATTR_CREATE);
        assert_eq!(XattrOptions::REPLACE.as_c_int(), libc::XATTR_REPLACE);
    }

    #[test]
    fn unknown_bits_survive() {
        let raw = i32::MAX as u32;
        assert_eq!(XattrOptions::from_raw(raw).bits(), raw);
        assert_eq!(XattrOptions::from_raw(raw).as_c_int(), i32::MAX);
    }

    #[test]
    fn parses_lists() {
        assert_eq!(
            XattrOptions::parse_list("nofollow, show_compression").unwrap(),
            XattrOptions::NOFOLLOW | XattrOptions::SHOW_COMPRESSION
        );
        assert_eq!(XattrOptions::parse_list("").unwrap(), XattrOptions::empty());
        assert!(XattrOptions::parse_list("create,bogus").is_err());
    }

    #[test]
    fn display_is_hex() {
        assert_eq!((XattrOptions::NOFOLLOW | XattrOptions::CREATE).to_string(), "0x0003");
    }
}
