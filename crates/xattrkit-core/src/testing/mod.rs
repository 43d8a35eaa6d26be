// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Test doubles for the OS capability interface
//!
//! [`MemoryXattrSys`] lets callers run the full attribute layer against a
//! simulated kernel, on any host.

pub mod memory;

pub use memory::{Access, MemoryXattrSys};
