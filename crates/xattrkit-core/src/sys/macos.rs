// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

use super::XattrSys;
use crate::errno::Errno;
use crate::options::XattrOptions;
use crate::target::RawTarget;
use std::ffi::CStr;

// From <sys/unistd.h>; not exported by libc for apple targets
const PC_XATTR_SIZE_BITS: libc::c_int = 26;

/// Direct `libc` bindings to the XNU attribute syscalls
#[derive(Clone, Copy, Debug, Default)]
pub struct MacosXattrSys;

fn out_buffer(buf: &mut [u8]) -> (*mut libc::c_void, libc::size_t) {
    if buf.is_empty() {
        (std::ptr::null_mut(), 0)
    } else {
        (buf.as_mut_ptr() as *mut libc::c_void, buf.len())
    }
}

impl XattrSys for MacosXattrSys {
    fn get(
        &self,
        target: &RawTarget,
        name: &CStr,
        buf: &mut [u8],
        options: XattrOptions,
    ) -> Result<usize, Errno> {
        let (ptr, len) = out_buffer(buf);
        let flags = options.as_c_int();
        let ret = match target {
            RawTarget::Path(path) => unsafe {
                libc::getxattr(path.as_ptr(), name.as_ptr(), ptr, len, 0, flags)
            },
            RawTarget::Descriptor(fd) => unsafe {
                libc::fgetxattr(*fd, name.as_ptr(), ptr, len, 0, flags)
            },
        };
        if ret < 0 {
            return Err(Errno::last());
        }
        Ok(ret as usize)
    }

    fn set(
        &self,
        target: &RawTarget,
        name: &CStr,
        value: &[u8],
        options: XattrOptions,
    ) -> Result<(), Errno> {
        let ptr = value.as_ptr() as *const libc::c_void;
        let flags = options.as_c_int();
        let ret = match target {
            RawTarget::Path(path) => unsafe {
                libc::setxattr(path.as_ptr(), name.as_ptr(), ptr, value.len(), 0, flags)
            },
            RawTarget::Descriptor(fd) => unsafe {
                libc::fsetxattr(*fd, name.as_ptr(), ptr, value.len(), 0, flags)
            },
        };
        if ret != 0 {
            return Err(Errno::last());
        }
        Ok(())
    }

    fn remove(
        &self,
        target: &RawTarget,
        name: &CStr,
        options: XattrOptions,
    ) -> Result<(), Errno> {
        let flags = options.as_c_int();
        let ret = match target {
            RawTarget::Path(path) => unsafe {
                libc::removexattr(path.as_ptr(), name.as_ptr(), flags)
            },
            RawTarget::Descriptor(fd) => unsafe {
                libc::fremovexattr(*fd, name.as_ptr(), flags)
            },
        };
        if ret != 0 {
            return Err(Errno::last());
        }
        Ok(())
    }

    fn list(
        &self,
        target: &RawTarget,
        buf: &mut [u8],
        options: XattrOptions,
    ) -> Result<usize, Errno> {
        let (ptr, len) = out_buffer(buf);
        let flags = options.as_c_int();
        let ret = match target {
            RawTarget::Path(path) => unsafe {
                libc::listxattr(path.as_ptr(), ptr as *mut libc::c_char, len, flags)
            },
            RawTarget::Descriptor(fd) => unsafe {
                libc::flistxattr(*fd, ptr as *mut libc::c_char, len, flags)
            },
        };
        if ret < 0 {
            return Err(Errno::last());
        }
        Ok(ret as usize)
    }

    fn size_bits(&self, target: &RawTarget) -> Result<i64, Errno> {
        // pathconf may return -1 without touching errno
        unsafe { *libc::__error() = 0 };
        let ret = match target {
            RawTarget::Path(path) => unsafe { libc::pathconf(path.as_ptr(), PC_XATTR_SIZE_BITS) },
            RawTarget::Descriptor(fd) => unsafe { libc::fpathconf(*fd, PC_XATTR_SIZE_BITS) },
        };
        let errno = if ret < 0 { Errno::last() } else { Errno(0) };
        super::size_bits_result(i64::from(ret), errno)
    }
}
