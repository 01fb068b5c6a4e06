// Copyright (c) The socktest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Result aggregation and reporting.
//!
//! The reporter assigns test ids, classifies outcomes against the active
//! known-issue profile, keeps run and category counters, and fans each
//! [`TestEvent`](events::TestEvent) out to two sinks: a compact human
//! dashboard and a structured TAP log.

mod displayer;
pub mod events;
mod helpers;
mod imp;
mod structured;

pub use imp::{
    CategoryStats, DashboardOutput, LogOutput, Reporter, ReporterBuilder, RunStats, RunStatus,
};
