// Copyright (c) The socktest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{
    catalog::IssueKind,
    reporter::imp::{CategoryStats, RunStats, RunStatus},
    version::DetectedVersion,
};

/// A test event.
///
/// Events are produced by the [`Reporter`](crate::reporter::Reporter) as
/// outcomes arrive and fanned out to both output sinks: the complete
/// structured log and the compact dashboard. Each sink decides for itself how
/// much of an event to render.
#[derive(Clone, Debug)]
pub struct TestEvent {
    /// The kind of test event this is.
    pub kind: TestEventKind,
}

/// The kind of test event this is.
///
/// Forms part of [`TestEvent`].
#[derive(Clone, Debug)]
pub enum TestEventKind {
    /// The run started. Always the first event.
    RunStarted {
        /// The backend identification string, if one was available.
        backend_ident: Option<String>,

        /// The display name of the matched backend profile, if any.
        backend_name: Option<String>,

        /// The version detected from the identification string, if a profile
        /// matched.
        detected_version: Option<DetectedVersion>,

        /// Where the structured log is being written, for display purposes.
        log_path: Option<String>,
    },

    /// A category scope was opened.
    CategoryStarted {
        /// The category name.
        name: String,
    },

    /// A test ran and its outcome was recorded.
    TestFinished {
        /// The sequential test id, starting at 1.
        test_id: u32,

        /// Whether the test's condition held.
        passed: bool,

        /// The human description of the check.
        description: String,

        /// A known-issue annotation, present when a version-eligible catalog
        /// entry matched. For failures this is only ever a
        /// [`IssueKind::Failure`] match; a failure on a cataloged crash is
        /// deliberately left unannotated and counts as unexpected.
        known: Option<KnownAnnotation>,
    },

    /// A test was skipped.
    TestSkipped {
        /// The sequential test id, starting at 1.
        test_id: u32,

        /// Why the test was skipped.
        reason: String,
    },

    /// A log-only diagnostic message.
    Diag {
        /// The message.
        message: String,
    },

    /// A notable result, shown on the dashboard under the category summary as
    /// well as in the log.
    Note {
        /// The message.
        message: String,
    },

    /// A category scope was closed.
    CategoryFinished {
        /// The category name.
        name: String,

        /// The category's counters, already folded into the run totals.
        stats: CategoryStats,
    },

    /// The run was fatally aborted.
    RunBailed {
        /// Why the run was aborted.
        reason: String,
    },

    /// The run finished. Always the last event.
    RunFinished {
        /// The totals for the run.
        stats: RunStats,

        /// The overall status.
        status: RunStatus,

        /// The number of tests recorded, for the trailing plan line.
        test_count: u32,
    },
}

/// A known-issue match attached to a recorded outcome.
#[derive(Clone, Debug)]
pub struct KnownAnnotation {
    /// The classification of the matched entry.
    pub kind: IssueKind,

    /// The display name of the backend profile the entry belongs to.
    pub backend: String,

    /// The entry's reason text.
    pub reason: String,
}
