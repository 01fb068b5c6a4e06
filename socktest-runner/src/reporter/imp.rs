// Copyright (c) The socktest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Receives test outcomes, owns the run counters, and drives both output
//! sinks.
//!
//! The main structure in this module is [`Reporter`].

use crate::{
    catalog::{ActiveProfile, IssueKind},
    errors::WriteEventError,
    pager::Pager,
    reporter::{
        displayer::DisplayReporter,
        events::{KnownAnnotation, TestEvent, TestEventKind},
        structured::LogReporter,
    },
};
use camino::Utf8PathBuf;

/// Counters for a whole run.
///
/// `total == passed + failed + known` holds after every aggregator call.
/// Skipped tests are counted as passing (they are non-failures) and tracked
/// separately in `skipped`.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct RunStats {
    /// The number of tests recorded or skipped.
    pub total: usize,

    /// The number of tests that passed, including skips.
    pub passed: usize,

    /// The number of unexpected failures.
    pub failed: usize,

    /// The number of failures matching a known-issue entry.
    pub known: usize,

    /// The number of tests that were skipped.
    pub skipped: usize,
}

impl RunStats {
    fn fold(&mut self, category: CategoryStats) {
        self.total += category.total;
        self.passed += category.passed;
        self.failed += category.failed;
        self.known += category.known;
        self.skipped += category.skipped;
    }

    fn record(&mut self, outcome: Outcome) {
        self.total += 1;
        match outcome {
            Outcome::Passed => self.passed += 1,
            Outcome::KnownFailure => self.known += 1,
            Outcome::UnexpectedFailure => self.failed += 1,
            Outcome::Skipped => {
                self.passed += 1;
                self.skipped += 1;
            }
        }
    }
}

/// Counters for a single category scope.
///
/// Reset when the scope opens; folded into the run totals and discarded when
/// it closes.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct CategoryStats {
    /// The number of tests recorded or skipped in this category.
    pub total: usize,

    /// The number of tests that passed, including skips.
    pub passed: usize,

    /// The number of unexpected failures.
    pub failed: usize,

    /// The number of failures matching a known-issue entry.
    pub known: usize,

    /// The number of tests that were skipped.
    pub skipped: usize,
}

impl CategoryStats {
    fn record(&mut self, outcome: Outcome) {
        self.total += 1;
        match outcome {
            Outcome::Passed => self.passed += 1,
            Outcome::KnownFailure => self.known += 1,
            Outcome::UnexpectedFailure => self.failed += 1,
            Outcome::Skipped => {
                self.passed += 1;
                self.skipped += 1;
            }
        }
    }
}

#[derive(Clone, Copy, Debug)]
enum Outcome {
    Passed,
    UnexpectedFailure,
    KnownFailure,
    Skipped,
}

/// The overall status of a finished run, in increasing order of severity.
///
/// Maps to the three-valued process exit status.
#[derive(Clone, Copy, Debug, Eq, Ord, PartialEq, PartialOrd)]
pub enum RunStatus {
    /// The run completed with no unexpected failures. Known failures and
    /// skips do not spoil a clean run.
    Clean,

    /// The run completed, but at least one unexpected failure was recorded.
    UnexpectedFailures,

    /// The run was aborted before completion.
    Aborted,
}

/// Where the dashboard is written.
pub enum DashboardOutput<'a> {
    /// Produce output on the terminal (standard output).
    Terminal,

    /// Write output to an in-memory buffer. Used by tests.
    Buffer(&'a mut String),
}

/// Where the structured log is written.
pub enum LogOutput<'a> {
    /// Append to the file at this path, created at startup.
    File(Utf8PathBuf),

    /// Write output to an in-memory buffer. Used by tests.
    Buffer(&'a mut String),

    /// Discard the log.
    Null,
}

/// Reporter builder.
#[derive(Clone, Debug, Default)]
pub struct ReporterBuilder {
    verbose: bool,
    colorize: bool,
    paginate: bool,
}

impl ReporterBuilder {
    /// Set to true to print one dashboard line per individual test.
    pub fn set_verbose(&mut self, verbose: bool) -> &mut Self {
        self.verbose = verbose;
        self
    }

    /// Set to true if the dashboard should colorize output.
    pub fn set_colorize(&mut self, colorize: bool) -> &mut Self {
        self.colorize = colorize;
        self
    }

    /// Set to true to paginate dashboard output against the detected viewport.
    ///
    /// Pagination still disables itself if the dashboard is not a terminal.
    pub fn set_paginate(&mut self, paginate: bool) -> &mut Self {
        self.paginate = paginate;
        self
    }

    /// Creates a new reporter and emits the run header to both sinks.
    pub fn build<'a>(
        &self,
        profile: ActiveProfile<'a>,
        backend_ident: Option<&str>,
        dashboard: DashboardOutput<'a>,
        log: LogOutput<'a>,
    ) -> Result<Reporter<'a>, WriteEventError> {
        let log_path = match &log {
            LogOutput::File(path) => Some(path.to_string()),
            LogOutput::Buffer(_) | LogOutput::Null => None,
        };

        let pager = if self.paginate && matches!(dashboard, DashboardOutput::Terminal) {
            Pager::detect()
        } else {
            Pager::disabled()
        };
        let displayer = DisplayReporter::new(dashboard, self.verbose, self.colorize, pager);
        let log = LogReporter::new(log)?;

        let mut reporter = Reporter {
            profile,
            next_test_id: 1,
            run_stats: RunStats::default(),
            folded: RunStats::default(),
            category: None,
            bailed: false,
            displayer,
            log,
        };

        reporter.write_event(TestEvent {
            kind: TestEventKind::RunStarted {
                backend_ident: backend_ident.map(str::to_owned),
                backend_name: profile.backend_name().map(str::to_owned),
                detected_version: profile.version(),
                log_path,
            },
        })?;

        Ok(reporter)
    }
}

struct CategoryScope {
    name: String,
    stats: CategoryStats,
}

/// Aggregates test outcomes and reports them to the dashboard and the
/// structured log.
///
/// One reporter is constructed per run and torn down by
/// [`finish`](Self::finish). All calls happen on a single thread of control;
/// the counters it owns are never shared.
pub struct Reporter<'a> {
    profile: ActiveProfile<'a>,
    /// The id the next `record` or `skip` call will be assigned.
    next_test_id: u32,
    /// Updated on every call, so totals stay valid even if a bail-out lands
    /// mid-category.
    run_stats: RunStats,
    /// Accumulated from closed category scopes (plus out-of-scope outcomes).
    /// Behind `run_stats` by the current category's partial counts.
    folded: RunStats,
    category: Option<CategoryScope>,
    bailed: bool,
    displayer: DisplayReporter<'a>,
    log: LogReporter<'a>,
}

impl<'a> Reporter<'a> {
    /// The id that will be assigned to the next recorded or skipped test.
    ///
    /// Test bodies pass this to [`crash`](Self::crash) before attempting an
    /// operation documented as crash-prone.
    pub fn next_test_id(&self) -> u32 {
        self.next_test_id
    }

    /// Returns the reason the upcoming operation must not be attempted
    /// against the active backend, or `None` if it is safe.
    ///
    /// Side-effect-free: calling this any number of times mutates no
    /// counters. On a match the caller skips the operation (via
    /// [`skip`](Self::skip)) instead of running it.
    pub fn crash(&self, test_id: u32) -> Option<&'a str> {
        self.profile.crash(test_id)
    }

    /// Records one test outcome.
    ///
    /// Assigns the next sequential test id and classifies the outcome against
    /// the known-issue catalog: failures matching a known-failure entry are
    /// counted separately from unexpected failures, and passes matching any
    /// entry are annotated in the log so an improved backend gets noticed. A
    /// failure matching a known-*crash* entry means the caller did not guard
    /// with [`crash`](Self::crash); it is counted as an ordinary unexpected
    /// failure rather than silently excused.
    pub fn record(
        &mut self,
        passed: bool,
        description: impl Into<String>,
    ) -> Result<(), WriteEventError> {
        let test_id = self.assign_test_id();
        let entry = self.profile.check(test_id);

        let known = entry.and_then(|entry| {
            if passed || entry.kind == IssueKind::Failure {
                Some(KnownAnnotation {
                    kind: entry.kind,
                    backend: self
                        .profile
                        .backend_name()
                        .unwrap_or_default()
                        .to_owned(),
                    reason: entry.reason.clone().into_owned(),
                })
            } else {
                None
            }
        });

        let outcome = if passed {
            Outcome::Passed
        } else if known.is_some() {
            Outcome::KnownFailure
        } else {
            Outcome::UnexpectedFailure
        };
        self.update_stats(outcome);

        self.write_event(TestEvent {
            kind: TestEventKind::TestFinished {
                test_id,
                passed,
                description: description.into(),
                known,
            },
        })
    }

    /// Records a skipped test.
    ///
    /// Skips count toward the total but are neither passes in the meaningful
    /// sense nor failures; they always succeed regardless of category-scope
    /// state.
    pub fn skip(&mut self, reason: impl Into<String>) -> Result<(), WriteEventError> {
        let test_id = self.assign_test_id();
        self.update_stats(Outcome::Skipped);

        self.write_event(TestEvent {
            kind: TestEventKind::TestSkipped {
                test_id,
                reason: reason.into(),
            },
        })
    }

    /// Emits a log-only diagnostic line.
    pub fn diag(&mut self, message: impl Into<String>) -> Result<(), WriteEventError> {
        self.write_event(TestEvent {
            kind: TestEventKind::Diag {
                message: message.into(),
            },
        })
    }

    /// Emits a notable result, shown on the dashboard under the category
    /// summary as well as in the log.
    pub fn note(&mut self, message: impl Into<String>) -> Result<(), WriteEventError> {
        self.write_event(TestEvent {
            kind: TestEventKind::Note {
                message: message.into(),
            },
        })
    }

    /// Opens a category scope.
    ///
    /// # Panics
    ///
    /// Panics if a category scope is already open. Scopes never overlap;
    /// calling this from inside a scope is a caller bug, not a state to
    /// reconcile.
    pub fn begin_category(&mut self, name: &str) -> Result<(), WriteEventError> {
        assert!(
            self.category.is_none(),
            "begin_category({name:?}) called while category {:?} is open",
            self.category.as_ref().map(|scope| scope.name.as_str()),
        );

        self.category = Some(CategoryScope {
            name: name.to_owned(),
            stats: CategoryStats::default(),
        });

        self.write_event(TestEvent {
            kind: TestEventKind::CategoryStarted {
                name: name.to_owned(),
            },
        })
    }

    /// Closes the current category scope, folding its counters into the run
    /// totals.
    ///
    /// # Panics
    ///
    /// Panics if no category scope is open.
    pub fn end_category(&mut self) -> Result<(), WriteEventError> {
        let scope = self
            .category
            .take()
            .expect("end_category called without an open category");
        self.folded.fold(scope.stats);

        self.write_event(TestEvent {
            kind: TestEventKind::CategoryFinished {
                name: scope.name,
                stats: scope.stats,
            },
        })
    }

    /// Marks the run as fatally aborted.
    ///
    /// May land mid-category; the final totals then fall back to the running
    /// global counters rather than the not-yet-folded category counters.
    pub fn bail(&mut self, reason: impl Into<String>) -> Result<(), WriteEventError> {
        self.bailed = true;
        self.write_event(TestEvent {
            kind: TestEventKind::RunBailed {
                reason: reason.into(),
            },
        })
    }

    /// Returns true if [`bail`](Self::bail) has been called.
    pub fn bailed(&self) -> bool {
        self.bailed
    }

    /// Returns true if the operator cancelled the run at a pagination prompt.
    pub fn cancel_requested(&self) -> bool {
        self.displayer.cancel_requested()
    }

    /// The running global counters, valid after every call.
    pub fn stats(&self) -> RunStats {
        self.run_stats
    }

    /// Emits the final summary, flushes and closes the structured log, and
    /// returns the overall status.
    pub fn finish(mut self) -> Result<RunStatus, WriteEventError> {
        let status = if self.bailed {
            RunStatus::Aborted
        } else if self.run_stats.failed > 0 {
            RunStatus::UnexpectedFailures
        } else {
            RunStatus::Clean
        };

        // On bail-out the current category was never folded, so report the
        // running counters instead.
        let stats = if self.bailed { self.run_stats } else { self.folded };

        self.write_event(TestEvent {
            kind: TestEventKind::RunFinished {
                stats,
                status,
                test_count: self.next_test_id - 1,
            },
        })?;
        self.log.finish()?;

        Ok(status)
    }

    // ---
    // Helper methods
    // ---

    fn assign_test_id(&mut self) -> u32 {
        let test_id = self.next_test_id;
        self.next_test_id += 1;
        test_id
    }

    fn update_stats(&mut self, outcome: Outcome) {
        self.run_stats.record(outcome);
        match &mut self.category {
            Some(scope) => scope.stats.record(outcome),
            // Outcomes outside any category fold immediately.
            None => self.folded.record(outcome),
        }
    }

    /// Report this test event to both sinks.
    fn write_event(&mut self, event: TestEvent) -> Result<(), WriteEventError> {
        self.displayer.write_event(&event)?;
        self.log.write_event(&event)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        catalog::{BackendProfile, KnownIssueCatalog, KnownIssueEntry},
        version::DetectedVersion,
    };
    use proptest::prelude::*;

    fn acme_catalog() -> KnownIssueCatalog {
        KnownIssueCatalog::new(vec![BackendProfile::new(
            "Acme",
            "Acme",
            vec![
                KnownIssueEntry::crash(3, "event test crashes backend"),
                KnownIssueEntry::failure(5, "sendmsg not implemented"),
                KnownIssueEntry::failure(9, "fixed in 2.0")
                    .with_max_version(DetectedVersion::new(1, 9, 9)),
            ],
        )])
    }

    fn build_reporter<'a>(
        profile: ActiveProfile<'a>,
        dashboard: &'a mut String,
        log: &'a mut String,
    ) -> Reporter<'a> {
        ReporterBuilder::default()
            .build(
                profile,
                Some("Acme 1.0.0"),
                DashboardOutput::Buffer(dashboard),
                LogOutput::Buffer(log),
            )
            .expect("buffer sinks are infallible")
    }

    #[test]
    fn test_ids_are_assigned_sequentially_from_one() {
        let (mut dashboard, mut log) = (String::new(), String::new());
        let mut reporter = build_reporter(ActiveProfile::inactive(), &mut dashboard, &mut log);

        assert_eq!(reporter.next_test_id(), 1);
        reporter.record(true, "first").unwrap();
        assert_eq!(reporter.next_test_id(), 2);
        reporter.skip("guarded").unwrap();
        assert_eq!(reporter.next_test_id(), 3);
        reporter.record(false, "third").unwrap();
        assert_eq!(reporter.next_test_id(), 4);

        // Diagnostics and category scopes do not consume ids.
        reporter.diag("aside").unwrap();
        reporter.begin_category("socket").unwrap();
        assert_eq!(reporter.next_test_id(), 4);
    }

    #[test]
    fn folded_totals_match_running_totals_on_clean_finish() {
        let (mut dashboard, mut log) = (String::new(), String::new());
        let mut reporter = build_reporter(ActiveProfile::inactive(), &mut dashboard, &mut log);

        // One outcome outside any scope, two scopes with outcomes inside.
        reporter.record(true, "preflight").unwrap();
        reporter.begin_category("socket").unwrap();
        reporter.record(true, "a").unwrap();
        reporter.record(false, "b").unwrap();
        reporter.end_category().unwrap();
        reporter.begin_category("sendrecv").unwrap();
        reporter.skip("guarded").unwrap();
        reporter.end_category().unwrap();

        let stats = reporter.stats();
        assert_eq!(
            stats,
            RunStats {
                total: 4,
                passed: 3,
                failed: 1,
                known: 0,
                skipped: 1,
            },
        );

        let status = reporter.finish().unwrap();
        assert_eq!(status, RunStatus::UnexpectedFailures);
        // The final log summary comes from the folded counters, which must
        // agree with the running counters once every scope is closed.
        assert!(
            log.contains("# Results: 3 passed, 1 failed, 0 known, 1 skipped (4 total)"),
            "got: {log}"
        );
        assert!(log.contains("1..4"), "got: {log}");
    }

    #[test]
    fn bail_mid_category_falls_back_to_running_totals() {
        let (mut dashboard, mut log) = (String::new(), String::new());
        let mut reporter = build_reporter(ActiveProfile::inactive(), &mut dashboard, &mut log);

        reporter.begin_category("socket").unwrap();
        reporter.record(true, "a").unwrap();
        reporter.record(true, "b").unwrap();
        reporter.bail("cannot reach test host").unwrap();
        assert!(reporter.bailed());

        // The scope is never closed. Without the fallback the summary would
        // report zero tests.
        let status = reporter.finish().unwrap();
        assert_eq!(status, RunStatus::Aborted);
        assert!(log.contains("Bail out! cannot reach test host"), "got: {log}");
        assert!(
            log.contains("# Results: 2 passed, 0 failed, 0 known, 0 skipped (2 total)"),
            "got: {log}"
        );
    }

    #[test]
    fn known_failure_is_classified_and_annotated() {
        let catalog = acme_catalog();
        let (mut dashboard, mut log) = (String::new(), String::new());
        let profile = catalog.select(Some("Acme 1.0.0"));
        let mut reporter = build_reporter(profile, &mut dashboard, &mut log);

        for _ in 0..4 {
            reporter.record(true, "pass").unwrap();
        }
        // Test 5 matches a known-failure entry.
        reporter.record(false, "sendmsg roundtrip").unwrap();

        let stats = reporter.stats();
        assert_eq!(stats.known, 1);
        assert_eq!(stats.failed, 0);

        let status = reporter.finish().unwrap();
        assert_eq!(status, RunStatus::Clean);
        assert!(
            log.contains("not ok 5 - sendmsg roundtrip  # KNOWN Acme: sendmsg not implemented"),
            "got: {log}"
        );
    }

    #[test]
    fn known_pass_is_annotated_but_counted_as_pass() {
        let catalog = acme_catalog();
        let (mut dashboard, mut log) = (String::new(), String::new());
        let profile = catalog.select(Some("Acme 1.0.0"));
        let mut reporter = build_reporter(profile, &mut dashboard, &mut log);

        for _ in 0..4 {
            reporter.record(true, "pass").unwrap();
        }
        reporter.record(true, "sendmsg roundtrip").unwrap();

        let stats = reporter.stats();
        assert_eq!(stats.passed, 5);
        assert_eq!(stats.known, 0);

        reporter.finish().unwrap();
        assert!(log.contains("# KNOWN-PASS Acme:"), "got: {log}");
    }

    #[test]
    fn unguarded_crash_entry_is_an_unexpected_failure() {
        let catalog = acme_catalog();
        let (mut dashboard, mut log) = (String::new(), String::new());
        let profile = catalog.select(Some("Acme 1.0.0"));
        let mut reporter = build_reporter(profile, &mut dashboard, &mut log);

        reporter.record(true, "a").unwrap();
        reporter.record(true, "b").unwrap();
        // Test 3 has a crash entry; failing it (rather than guarding with
        // `crash` and skipping) must not be excused.
        reporter.record(false, "event delivery").unwrap();

        let stats = reporter.stats();
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.known, 0);

        reporter.finish().unwrap();
        assert!(!log.contains("# KNOWN"), "got: {log}");
    }

    #[test]
    fn crash_guard_is_side_effect_free() {
        let catalog = acme_catalog();
        let (mut dashboard, mut log) = (String::new(), String::new());
        let profile = catalog.select(Some("Acme 1.0.0"));
        let mut reporter = build_reporter(profile, &mut dashboard, &mut log);

        reporter.record(true, "a").unwrap();
        reporter.record(true, "b").unwrap();

        let id = reporter.next_test_id();
        assert_eq!(id, 3);
        let reason = reporter.crash(id).expect("test 3 has a crash entry");
        // Repeated queries change nothing.
        assert_eq!(reporter.crash(id), Some(reason));
        assert_eq!(reporter.next_test_id(), 3);
        assert_eq!(reporter.stats().total, 2);

        reporter.skip(format!("not exercised: {reason}")).unwrap();
        assert_eq!(reporter.stats().skipped, 1);
        assert!(reporter.crash(reporter.next_test_id()).is_none());
    }

    #[test]
    fn version_ceiling_gates_classification() {
        let catalog = acme_catalog();
        let (mut dashboard, mut log) = (String::new(), String::new());
        let profile = catalog.select(Some("Acme 2.0.0"));
        let mut reporter = build_reporter(profile, &mut dashboard, &mut log);

        for _ in 0..8 {
            reporter.record(true, "pass").unwrap();
        }
        // Test 9's entry is ceilinged at 1.9.9, so on 2.0.0 this failure is
        // unexpected.
        reporter.record(false, "fixed upstream").unwrap();
        assert_eq!(reporter.stats().failed, 1);
        assert_eq!(reporter.stats().known, 0);
    }

    #[test]
    #[should_panic(expected = "begin_category")]
    fn nested_category_scopes_panic() {
        let (mut dashboard, mut log) = (String::new(), String::new());
        let mut reporter = build_reporter(ActiveProfile::inactive(), &mut dashboard, &mut log);

        reporter.begin_category("socket").unwrap();
        let _ = reporter.begin_category("sendrecv");
    }

    #[test]
    fn clean_run_with_only_known_and_skips() {
        let catalog = acme_catalog();
        let (mut dashboard, mut log) = (String::new(), String::new());
        let profile = catalog.select(Some("Acme 1.0.0"));
        let mut reporter = build_reporter(profile, &mut dashboard, &mut log);

        reporter.begin_category("socket").unwrap();
        for _ in 0..4 {
            reporter.record(true, "pass").unwrap();
        }
        reporter.record(false, "sendmsg roundtrip").unwrap();
        reporter.skip("not exercised: crashes backend").unwrap();
        reporter.end_category().unwrap();

        let status = reporter.finish().unwrap();
        assert_eq!(status, RunStatus::Clean);
    }

    /// A step in a randomized aggregator workload.
    #[derive(Clone, Debug)]
    enum Step {
        Record { passed: bool },
        Skip,
        BeginCategory,
        EndCategory,
    }

    fn step_strategy() -> impl Strategy<Value = Step> {
        prop_oneof![
            4 => any::<bool>().prop_map(|passed| Step::Record { passed }),
            1 => Just(Step::Skip),
            1 => Just(Step::BeginCategory),
            1 => Just(Step::EndCategory),
        ]
    }

    proptest! {
        /// `total == passed + failed + known` after every aggregator call, in
        /// and out of category scopes.
        #[test]
        fn counter_invariant_holds_after_every_call(steps in prop::collection::vec(step_strategy(), 0..64)) {
            let catalog = acme_catalog();
            let (mut dashboard, mut log) = (String::new(), String::new());
            let profile = catalog.select(Some("Acme 1.0.0"));
            let mut reporter = build_reporter(profile, &mut dashboard, &mut log);

            let mut in_category = false;
            let mut categories = 0u32;
            for step in steps {
                match step {
                    Step::Record { passed } => reporter.record(passed, "step").unwrap(),
                    Step::Skip => reporter.skip("step").unwrap(),
                    Step::BeginCategory if !in_category => {
                        categories += 1;
                        in_category = true;
                        reporter.begin_category(&format!("cat-{categories}")).unwrap();
                    }
                    Step::BeginCategory => {}
                    Step::EndCategory if in_category => {
                        in_category = false;
                        reporter.end_category().unwrap();
                    }
                    Step::EndCategory => {}
                }

                let stats = reporter.stats();
                prop_assert_eq!(stats.total, stats.passed + stats.failed + stats.known);
                prop_assert!(stats.skipped <= stats.passed);
            }

            if in_category {
                reporter.end_category().unwrap();
            }
            let before = reporter.stats();
            reporter.finish().unwrap();
            // With every scope closed, the folded summary in the log must
            // agree with the running counters.
            let summary = format!(
                "# Results: {} passed, {} failed, {} known, {} skipped ({} total)",
                before.passed, before.failed, before.known, before.skipped, before.total,
            );
            prop_assert!(log.contains(&summary), "missing {:?} in {:?}", summary, log);
        }
    }
}
