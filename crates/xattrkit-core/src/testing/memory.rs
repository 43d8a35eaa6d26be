// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! In-memory stand-in for the XNU attribute syscalls
//!
//! Models just enough of the kernel to exercise the attribute layer without
//! touching a real filesystem: files, symlinks that carry their own
//! attributes, descriptors, per-object access modes, filesystems without
//! attribute support, hidden compression attributes, and the checks the
//! kernel performs on names, options and buffer sizes. Validation happens
//! in kernel order: option bits, target lookup, object checks, name, then
//! the operation itself.

use crate::errno::Errno;
use crate::options::XattrOptions;
use crate::sys::XattrSys;
use crate::target::RawTarget;
use std::collections::HashMap;
use std::ffi::CStr;
use std::os::fd::RawFd;
use std::os::unix::ffi::OsStrExt;
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// `XATTR_MAXNAMELEN` from `<sys/xattr.h>`
pub const MAX_NAME_LEN: usize = 127;
/// Default per-value limit; larger values fail with `E2BIG`
pub const DEFAULT_MAX_VALUE_SIZE: usize = 128 * 1024;
const MAX_SYMLINK_HOPS: usize = 32;
const FIRST_FD: RawFd = 1000;
const SUPPORTED_BITS: u32 = 0x0001 | 0x0002 | 0x0004 | 0x0020;
const COMPRESSION_NAMES: [&str; 2] = ["com.apple.decmpfs", "com.apple.ResourceFork"];

/// How a simulated object reacts to callers
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Access {
    #[default]
    ReadWrite,
    /// Reads succeed, writes fail with `EACCES`
    ReadOnly,
    /// Every operation fails with `EACCES`
    Denied,
}

#[derive(Clone, Debug)]
struct Node {
    attrs: Vec<(String, Vec<u8>)>,
    access: Access,
    supports_xattr: bool,
    compressed: bool,
}

impl Node {
    fn new() -> Self {
        Self {
            attrs: Vec::new(),
            access: Access::ReadWrite,
            supports_xattr: true,
            compressed: false,
        }
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.attrs.iter().position(|(n, _)| n == name)
    }

    fn hides(&self, name: &str, options: XattrOptions) -> bool {
        self.compressed
            && !options.contains(XattrOptions::SHOW_COMPRESSION)
            && COMPRESSION_NAMES.contains(&name)
    }

    /// NUL-terminated names as `listxattr(2)` lays them out.
    fn name_list(&self, options: XattrOptions) -> Vec<u8> {
        let mut names = Vec::new();
        for (name, _) in self.attrs.iter().filter(|(n, _)| !self.hides(n, options)) {
            names.extend_from_slice(name.as_bytes());
            names.push(0);
        }
        names
    }
}

/// Change applied to the listed object right after a list size probe
#[derive(Clone, Debug)]
enum ListMutation {
    Insert(String, Vec<u8>),
    Remove(String),
}

impl ListMutation {
    fn apply(self, node: &mut Node) {
        match self {
            ListMutation::Insert(name, value) => match node.position(&name) {
                Some(idx) => node.attrs[idx].1 = value,
                None => node.attrs.push((name, value)),
            },
            ListMutation::Remove(name) => node.attrs.retain(|(n, _)| *n != name),
        }
    }
}

type NodeId = usize;

#[derive(Clone, Debug)]
enum Entry {
    File(NodeId),
    Symlink { target: Vec<u8>, node: NodeId },
}

#[derive(Debug, Default)]
struct State {
    entries: HashMap<Vec<u8>, Entry>,
    nodes: Vec<Node>,
    fds: HashMap<RawFd, NodeId>,
    next_fd: RawFd,
    pending_mutations: HashMap<String, Vec<u8>>,
    pending_list_mutations: Vec<ListMutation>,
    syscalls: u64,
}

impl State {
    fn add_node(&mut self) -> NodeId {
        self.nodes.push(Node::new());
        self.nodes.len() - 1
    }

    fn lookup(&self, path: &[u8], nofollow: bool) -> Result<NodeId, Errno> {
        let mut current = path.to_vec();
        for _ in 0..MAX_SYMLINK_HOPS {
            match self.entries.get(&current).ok_or(Errno::ENOENT)? {
                Entry::File(id) => return Ok(*id),
                Entry::Symlink { node, .. } if nofollow => return Ok(*node),
                Entry::Symlink { target, .. } => current = target.clone(),
            }
        }
        Err(Errno::ELOOP)
    }

    fn resolve(&self, target: &RawTarget, options: XattrOptions) -> Result<NodeId, Errno> {
        match target {
            RawTarget::Path(path) => {
                self.lookup(path.as_bytes(), options.contains(XattrOptions::NOFOLLOW))
            }
            RawTarget::Descriptor(fd) => self.fds.get(fd).copied().ok_or(Errno::EBADF),
        }
    }

    /// Shared prologue of every attribute syscall.
    fn enter(
        &mut self,
        target: &RawTarget,
        options: XattrOptions,
        write: bool,
    ) -> Result<NodeId, Errno> {
        self.syscalls += 1;
        if options.bits() & !SUPPORTED_BITS != 0 {
            return Err(Errno::EINVAL);
        }
        let id = self.resolve(target, options)?;
        let node = &self.nodes[id];
        match node.access {
            Access::Denied => return Err(Errno::EACCES),
            Access::ReadOnly if write => return Err(Errno::EACCES),
            _ => {}
        }
        if !node.supports_xattr {
            return Err(Errno::ENOTSUP);
        }
        Ok(id)
    }
}

fn validate_name(name: &CStr) -> Result<&str, Errno> {
    let bytes = name.to_bytes();
    if bytes.is_empty() {
        return Err(Errno::EINVAL);
    }
    if bytes.len() > MAX_NAME_LEN {
        return Err(Errno::ENAMETOOLONG);
    }
    name.to_str().map_err(|_| Errno::EINVAL)
}

fn path_key(path: &Path) -> Vec<u8> {
    path.as_os_str().as_bytes().to_vec()
}

/// In-memory [`XattrSys`] with XNU error semantics
#[derive(Debug)]
pub struct MemoryXattrSys {
    state: Mutex<State>,
    max_value_size: usize,
}

impl Default for MemoryXattrSys {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryXattrSys {
    pub fn new() -> Self {
        Self::with_max_value_size(DEFAULT_MAX_VALUE_SIZE)
    }

    pub fn with_max_value_size(max_value_size: usize) -> Self {
        Self {
            state: Mutex::new(State {
                next_fd: FIRST_FD,
                ..State::default()
            }),
            max_value_size,
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Create an empty regular file; `EEXIST` if the path is taken.
    pub fn create_file(&self, path: impl AsRef<Path>) -> Result<(), Errno> {
        let key = path_key(path.as_ref());
        let mut state = self.state();
        if state.entries.contains_key(&key) {
            return Err(Errno::EEXIST);
        }
        let id = state.add_node();
        state.entries.insert(key, Entry::File(id));
        Ok(())
    }

    /// Create a symbolic link at `link` pointing to `target`.
    pub fn symlink(&self, target: impl AsRef<Path>, link: impl AsRef<Path>) -> Result<(), Errno> {
        let key = path_key(link.as_ref());
        let mut state = self.state();
        if state.entries.contains_key(&key) {
            return Err(Errno::EEXIST);
        }
        let node = state.add_node();
        state.entries.insert(
            key,
            Entry::Symlink {
                target: path_key(target.as_ref()),
                node,
            },
        );
        Ok(())
    }

    /// Remove a directory entry. Open descriptors keep the object alive.
    pub fn unlink(&self, path: impl AsRef<Path>) -> Result<(), Errno> {
        let key = path_key(path.as_ref());
        self.state().entries.remove(&key).map(|_| ()).ok_or(Errno::ENOENT)
    }

    /// Open `path`, following symlinks unless `nofollow`.
    pub fn open(&self, path: impl AsRef<Path>, nofollow: bool) -> Result<RawFd, Errno> {
        let key = path_key(path.as_ref());
        let mut state = self.state();
        let id = state.lookup(&key, nofollow)?;
        let fd = state.next_fd;
        state.next_fd += 1;
        state.fds.insert(fd, id);
        Ok(fd)
    }

    pub fn close(&self, fd: RawFd) -> Result<(), Errno> {
        self.state().fds.remove(&fd).map(|_| ()).ok_or(Errno::EBADF)
    }

    fn update_node(
        &self,
        path: &Path,
        nofollow: bool,
        update: impl FnOnce(&mut Node),
    ) -> Result<(), Errno> {
        let key = path_key(path);
        let mut state = self.state();
        let id = state.lookup(&key, nofollow)?;
        update(&mut state.nodes[id]);
        Ok(())
    }

    pub fn set_access(&self, path: impl AsRef<Path>, access: Access) -> Result<(), Errno> {
        self.update_node(path.as_ref(), true, |node| node.access = access)
    }

    /// Make the object behave as if it lived on a filesystem without xattrs.
    pub fn set_xattr_support(&self, path: impl AsRef<Path>, supported: bool) -> Result<(), Errno> {
        self.update_node(path.as_ref(), true, |node| node.supports_xattr = supported)
    }

    /// Hide the HFS compression attributes unless `SHOW_COMPRESSION` is passed.
    pub fn set_compressed(&self, path: impl AsRef<Path>, compressed: bool) -> Result<(), Errno> {
        self.update_node(path.as_ref(), true, |node| node.compressed = compressed)
    }

    /// After the next successful size probe of `name`, replace its value
    /// with `value` as a concurrent writer would.
    pub fn mutate_after_probe(&self, name: &str, value: &[u8]) {
        self.state().pending_mutations.insert(name.to_string(), value.to_vec());
    }

    /// After the next list size probe, add `name` to the listed object.
    pub fn insert_after_list_probe(&self, name: &str, value: &[u8]) {
        self.state()
            .pending_list_mutations
            .push(ListMutation::Insert(name.to_string(), value.to_vec()));
    }

    /// After the next list size probe, drop `name` from the listed object.
    pub fn remove_after_list_probe(&self, name: &str) {
        self.state()
            .pending_list_mutations
            .push(ListMutation::Remove(name.to_string()));
    }

    /// Number of attribute syscalls served so far.
    pub fn syscall_count(&self) -> u64 {
        self.state().syscalls
    }
}

impl XattrSys for MemoryXattrSys {
    fn get(
        &self,
        target: &RawTarget,
        name: &CStr,
        buf: &mut [u8],
        options: XattrOptions,
    ) -> Result<usize, Errno> {
        let mut state = self.state();
        let id = state.enter(target, options, false)?;
        let name = validate_name(name)?;
        let node = &state.nodes[id];
        if node.hides(name, options) {
            return Err(Errno::ENOATTR);
        }
        let idx = node.position(name).ok_or(Errno::ENOATTR)?;
        let len = node.attrs[idx].1.len();

        if buf.is_empty() {
            if let Some(value) = state.pending_mutations.remove(name) {
                state.nodes[id].attrs[idx].1 = value;
            }
            return Ok(len);
        }
        let value = &node.attrs[idx].1;
        if buf.len() < value.len() {
            return Err(Errno::ERANGE);
        }
        buf[..value.len()].copy_from_slice(value);
        Ok(value.len())
    }

    fn set(
        &self,
        target: &RawTarget,
        name: &CStr,
        value: &[u8],
        options: XattrOptions,
    ) -> Result<(), Errno> {
        let mut state = self.state();
        let id = state.enter(target, options, true)?;
        let name = validate_name(name)?;
        if options.contains(XattrOptions::CREATE | XattrOptions::REPLACE) {
            return Err(Errno::EINVAL);
        }
        if value.len() > self.max_value_size {
            return Err(Errno::E2BIG);
        }
        let node = &mut state.nodes[id];
        match node.position(name) {
            Some(_) if options.contains(XattrOptions::CREATE) => Err(Errno::EEXIST),
            Some(idx) => {
                node.attrs[idx].1 = value.to_vec();
                Ok(())
            }
            None if options.contains(XattrOptions::REPLACE) => Err(Errno::ENOATTR),
            None => {
                node.attrs.push((name.to_string(), value.to_vec()));
                Ok(())
            }
        }
    }

    fn remove(
        &self,
        target: &RawTarget,
        name: &CStr,
        options: XattrOptions,
    ) -> Result<(), Errno> {
        let mut state = self.state();
        let id = state.enter(target, options, true)?;
        let name = validate_name(name)?;
        let node = &mut state.nodes[id];
        let idx = node.position(name).ok_or(Errno::ENOATTR)?;
        node.attrs.remove(idx);
        Ok(())
    }

    fn list(
        &self,
        target: &RawTarget,
        buf: &mut [u8],
        options: XattrOptions,
    ) -> Result<usize, Errno> {
        let mut state = self.state();
        let id = state.enter(target, options, false)?;
        let names = state.nodes[id].name_list(options);

        if buf.is_empty() {
            let pending = std::mem::take(&mut state.pending_list_mutations);
            for mutation in pending {
                mutation.apply(&mut state.nodes[id]);
            }
            return Ok(names.len());
        }
        if buf.len() < names.len() {
            return Err(Errno::ERANGE);
        }
        buf[..names.len()].copy_from_slice(&names);
        Ok(names.len())
    }

    fn size_bits(&self, target: &RawTarget) -> Result<i64, Errno> {
        let mut state = self.state();
        state.syscalls += 1;
        let id = state.resolve(target, XattrOptions::empty())?;
        let node = &state.nodes[id];
        if node.access == Access::Denied {
            return Err(Errno::EACCES);
        }
        Ok(if node.supports_xattr { 64 } else { 0 })
    }
}
