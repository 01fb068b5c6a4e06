// Copyright (c) The socktest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

#![warn(missing_docs)]

//! Core functionality for [socktest](https://crates.io/crates/socktest): a
//! conformance harness for socket-API backends with wildly different defect
//! profiles.
//!
//! The engine aggregates test outcomes into run and category counters,
//! classifies failures against a version-gated known-issue catalog, and fans
//! every event out to a compact paginated dashboard and a complete TAP log.

pub mod catalog;
pub mod errors;
mod helpers;
mod pager;
pub mod reporter;
pub mod runner;
pub mod signal;
pub mod version;
mod write_str;

pub use pager::Pager;
pub use write_str::WriteStr;
