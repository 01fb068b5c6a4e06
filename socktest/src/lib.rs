// Copyright (c) The socktest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! A conformance test harness for socket-API backends.
//!
//! For the core engine (result aggregation, known-issue classification,
//! output sinks), see the `socktest-runner` crate.

#![warn(missing_docs)]

mod dispatch;
mod errors;
mod output;
mod suite;

#[doc(hidden)]
pub use dispatch::*;
#[doc(hidden)]
pub use errors::*;
