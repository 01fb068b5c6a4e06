// Copyright (c) The socktest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The structured log sink.
//!
//! Emits TAP version 12: one `ok`/`not ok` line per test with directive
//! comments for known issues and skips, `#` diagnostics, a trailing plan, and
//! a machine-greppable results line. Unlike the dashboard, the log records
//! every test individually regardless of verbosity and is never paginated.

use crate::{
    catalog::IssueKind,
    errors::WriteEventError,
    reporter::{
        events::{TestEvent, TestEventKind},
        imp::LogOutput,
    },
    write_str::WriteStr,
};
use camino::Utf8PathBuf;
use chrono::Local;
use swrite::{swrite, SWrite};
use std::{
    fs::File,
    io::{self, BufWriter},
};

enum LogWriter<'a> {
    File(BufWriter<File>),
    Buffer(&'a mut String),
    Null,
}

impl WriteStr for LogWriter<'_> {
    fn write_str(&mut self, s: &str) -> io::Result<()> {
        match self {
            Self::File(writer) => writer.write_str(s),
            Self::Buffer(buffer) => {
                buffer.push_str(s);
                Ok(())
            }
            Self::Null => Ok(()),
        }
    }

    fn write_str_flush(&mut self) -> io::Result<()> {
        match self {
            Self::File(writer) => writer.write_str_flush(),
            Self::Buffer(_) | Self::Null => Ok(()),
        }
    }
}

pub(crate) struct LogReporter<'a> {
    out: LogWriter<'a>,
    file: Option<Utf8PathBuf>,
}

impl<'a> LogReporter<'a> {
    pub(crate) fn new(output: LogOutput<'a>) -> Result<Self, WriteEventError> {
        let (out, file) = match output {
            LogOutput::File(path) => {
                let file = File::create(&path).map_err(|error| WriteEventError::Fs {
                    file: path.clone(),
                    error,
                })?;
                (LogWriter::File(BufWriter::new(file)), Some(path))
            }
            LogOutput::Buffer(buffer) => (LogWriter::Buffer(buffer), None),
            LogOutput::Null => (LogWriter::Null, None),
        };
        Ok(Self { out, file })
    }

    pub(crate) fn write_event(&mut self, event: &TestEvent) -> Result<(), WriteEventError> {
        self.write_event_impl(event).map_err(|error| self.wrap(error))
    }

    /// Flushes buffered log output. Called once after the final event.
    pub(crate) fn finish(&mut self) -> Result<(), WriteEventError> {
        self.out.write_str_flush().map_err(|error| self.wrap(error))
    }

    fn wrap(&self, error: io::Error) -> WriteEventError {
        match &self.file {
            Some(file) => WriteEventError::Fs {
                file: file.clone(),
                error,
            },
            None => WriteEventError::Io(error),
        }
    }

    fn write_event_impl(&mut self, event: &TestEvent) -> io::Result<()> {
        let out = &mut self.out;

        match &event.kind {
            TestEventKind::RunStarted {
                backend_ident,
                backend_name,
                detected_version,
                ..
            } => {
                writeln_str(out, "TAP version 12")?;
                writeln_str(out, &format!("# socktest {}", env!("CARGO_PKG_VERSION")))?;
                writeln_str(
                    out,
                    &format!("# started: {}", Local::now().format("%Y-%m-%d %H:%M:%S %z")),
                )?;
                match backend_ident {
                    Some(ident) => writeln_str(out, &format!("# backend: {ident}"))?,
                    None => writeln_str(out, "# backend: not available")?,
                }
                if let (Some(name), Some(version)) = (backend_name, detected_version) {
                    writeln_str(out, &format!("# profile: {name}, version {version}"))?;
                }
            }
            TestEventKind::CategoryStarted { name } => {
                writeln_str(out, &format!("# --- {name} ---"))?;
            }
            TestEventKind::TestFinished {
                test_id,
                passed,
                description,
                known,
            } => {
                let mut line = if *passed {
                    format!("ok {test_id} - {description}")
                } else {
                    format!("not ok {test_id} - {description}")
                };
                if let Some(annotation) = known {
                    let directive = match (annotation.kind, *passed) {
                        // A pass on a test with a known-issue entry is worth
                        // flagging: the catalog may be stale.
                        (_, true) => "KNOWN-PASS",
                        (IssueKind::Failure, false) => "KNOWN",
                        // Crash entries never annotate failures; a crash guard
                        // match skips the test instead of running it.
                        (IssueKind::Crash, false) => unreachable!(
                            "crash entries do not annotate executed tests"
                        ),
                    };
                    swrite!(
                        line,
                        "  # {directive} {}: {}",
                        annotation.backend,
                        annotation.reason
                    );
                }
                writeln_str(out, &line)?;
            }
            TestEventKind::TestSkipped { test_id, reason } => {
                writeln_str(out, &format!("ok {test_id} - # SKIP {reason}"))?;
            }
            TestEventKind::Diag { message } | TestEventKind::Note { message } => {
                writeln_str(out, &format!("# {message}"))?;
            }
            TestEventKind::CategoryFinished { .. } => {
                // Per-category summaries are a dashboard concern.
            }
            TestEventKind::RunBailed { reason } => {
                writeln_str(out, &format!("Bail out! {reason}"))?;
            }
            TestEventKind::RunFinished {
                stats, test_count, ..
            } => {
                writeln_str(out, &format!("1..{test_count}"))?;
                writeln_str(
                    out,
                    &format!(
                        "# Results: {} passed, {} failed, {} known, {} skipped ({} total)",
                        stats.passed, stats.failed, stats.known, stats.skipped, stats.total
                    ),
                )?;
            }
        }

        Ok(())
    }
}

fn writeln_str(out: &mut dyn WriteStr, line: &str) -> io::Result<()> {
    out.write_str(line)?;
    out.write_char('\n')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        reporter::{
            events::KnownAnnotation,
            imp::{RunStats, RunStatus},
        },
        version::DetectedVersion,
    };
    use indoc::formatdoc;
    use pretty_assertions::assert_eq;

    fn run_events(events: &[TestEvent]) -> String {
        let mut buffer = String::new();
        {
            let mut log =
                LogReporter::new(LogOutput::Buffer(&mut buffer)).expect("buffer sink is infallible");
            for event in events {
                log.write_event(event).expect("write to buffer succeeds");
            }
            log.finish().expect("flush to buffer succeeds");
        }
        buffer
    }

    #[test]
    fn full_run_log() {
        let output = run_events(&[
            TestEvent {
                kind: TestEventKind::RunStarted {
                    backend_ident: Some("Roadshow 4.360 (22.2.2023)".to_owned()),
                    backend_name: Some("Roadshow".to_owned()),
                    detected_version: Some(DetectedVersion::new(4, 360, 0)),
                    log_path: Some("socktest.log".to_owned()),
                },
            },
            TestEvent {
                kind: TestEventKind::CategoryStarted {
                    name: "socket".to_owned(),
                },
            },
            TestEvent {
                kind: TestEventKind::TestFinished {
                    test_id: 1,
                    passed: true,
                    description: "socket() creates a TCP socket".to_owned(),
                    known: None,
                },
            },
            TestEvent {
                kind: TestEventKind::TestFinished {
                    test_id: 2,
                    passed: false,
                    description: "SO_ERROR is cleared on read".to_owned(),
                    known: Some(KnownAnnotation {
                        kind: IssueKind::Failure,
                        backend: "Roadshow".to_owned(),
                        reason: "SO_ERROR latches until close".to_owned(),
                    }),
                },
            },
            TestEvent {
                kind: TestEventKind::TestSkipped {
                    test_id: 3,
                    reason: "not exercised: crashes backend".to_owned(),
                },
            },
            TestEvent {
                kind: TestEventKind::Diag {
                    message: "peer address 127.0.0.1:7677".to_owned(),
                },
            },
            TestEvent {
                kind: TestEventKind::RunFinished {
                    stats: RunStats {
                        total: 3,
                        passed: 2,
                        failed: 0,
                        known: 1,
                        skipped: 1,
                    },
                    status: RunStatus::Clean,
                    test_count: 3,
                },
            },
        ]);

        // The started-at line carries wall-clock time; drop it before the
        // exact comparison.
        assert!(output.contains("\n# started: "), "got: {output:?}");
        let output: String = output
            .lines()
            .filter(|line| !line.starts_with("# started: "))
            .fold(String::new(), |mut acc, line| {
                acc.push_str(line);
                acc.push('\n');
                acc
            });

        let expected = formatdoc! {"
            TAP version 12
            # socktest {version}
            # backend: Roadshow 4.360 (22.2.2023)
            # profile: Roadshow, version 4.360.0
            # --- socket ---
            ok 1 - socket() creates a TCP socket
            not ok 2 - SO_ERROR is cleared on read  # KNOWN Roadshow: SO_ERROR latches until close
            ok 3 - # SKIP not exercised: crashes backend
            # peer address 127.0.0.1:7677
            1..3
            # Results: 2 passed, 0 failed, 1 known, 1 skipped (3 total)
        ",
            version = env!("CARGO_PKG_VERSION"),
        };
        assert_eq!(output, expected);
    }

    #[test]
    fn no_backend_header() {
        let output = run_events(&[TestEvent {
            kind: TestEventKind::RunStarted {
                backend_ident: None,
                backend_name: None,
                detected_version: None,
                log_path: None,
            },
        }]);

        assert!(output.contains("# backend: not available"), "got: {output:?}");
        assert!(!output.contains("# profile:"), "got: {output:?}");
    }

    #[test]
    fn known_pass_is_flagged() {
        let output = run_events(&[TestEvent {
            kind: TestEventKind::TestFinished {
                test_id: 7,
                passed: true,
                description: "shutdown(SHUT_RDWR) succeeds".to_owned(),
                known: Some(KnownAnnotation {
                    kind: IssueKind::Failure,
                    backend: "UAE bsdsocket".to_owned(),
                    reason: "shutdown is a no-op".to_owned(),
                }),
            },
        }]);

        assert_eq!(
            output,
            "ok 7 - shutdown(SHUT_RDWR) succeeds  # KNOWN-PASS UAE bsdsocket: shutdown is a no-op\n",
        );
    }

    #[test]
    fn bail_out_line() {
        let output = run_events(&[TestEvent {
            kind: TestEventKind::RunBailed {
                reason: "cannot reach test host".to_owned(),
            },
        }]);
        assert_eq!(output, "Bail out! cannot reach test host\n");
    }

    #[test]
    fn category_finished_is_silent() {
        let output = run_events(&[TestEvent {
            kind: TestEventKind::CategoryFinished {
                name: "socket".to_owned(),
                stats: crate::reporter::imp::CategoryStats::default(),
            },
        }]);
        assert_eq!(output, "");
    }

    #[test]
    fn missing_log_file_is_an_fs_error() {
        let path = Utf8PathBuf::from("/nonexistent-socktest-dir/socktest.log");
        let error = LogReporter::new(LogOutput::File(path.clone()))
            .err()
            .expect("creating a log in a missing directory fails");
        match error {
            WriteEventError::Fs { file, .. } => assert_eq!(file, path),
            other => panic!("expected an fs error, got {other:?}"),
        }
    }
}
