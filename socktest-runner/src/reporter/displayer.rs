// Copyright (c) The socktest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The compact human dashboard.
//!
//! By default each category occupies a single line: a dot-padded progress
//! indicator while its tests run, rewritten in place with the result summary
//! when the scope closes, followed by expanded unexpected failures (bounded)
//! and notable results. Verbose mode adds one line per individual test.
//! Every line is accounted to the [`Pager`] before control returns.

use crate::{
    errors::WriteEventError,
    helpers::plural,
    pager::Pager,
    reporter::{
        events::{TestEvent, TestEventKind},
        helpers::Styles,
        imp::DashboardOutput,
    },
    write_str::WriteStr,
};
use owo_colors::OwoColorize;
use std::io::{self, Write};
use swrite::{swrite, SWrite};

/// Category name column width for dot-padding.
const CATEGORY_WIDTH: usize = 23;

/// Maximum unexpected failures to expand per category; the rest are
/// summarized with a pointer at the log.
const MAX_FAILURES_DISPLAY: usize = 16;

/// Maximum notable results shown under a category summary.
const MAX_NOTES_DISPLAY: usize = 8;

enum DashboardWriter<'a> {
    Terminal(io::Stdout),
    Buffer(&'a mut String),
}

impl WriteStr for DashboardWriter<'_> {
    fn write_str(&mut self, s: &str) -> io::Result<()> {
        match self {
            Self::Terminal(stdout) => stdout.write_all(s.as_bytes()),
            Self::Buffer(buffer) => {
                buffer.push_str(s);
                Ok(())
            }
        }
    }

    fn write_str_flush(&mut self) -> io::Result<()> {
        match self {
            Self::Terminal(stdout) => stdout.flush(),
            Self::Buffer(_) => Ok(()),
        }
    }
}

/// Per-category display buffers, reset when a scope opens.
#[derive(Default)]
struct CategoryDisplay {
    /// Unexpected failures to expand at category end, capped at
    /// [`MAX_FAILURES_DISPLAY`].
    failures: Vec<(u32, String)>,

    /// Failures beyond the display cap.
    more_failures: usize,

    /// Notable results, capped at [`MAX_NOTES_DISPLAY`].
    notes: Vec<String>,
}

pub(crate) struct DisplayReporter<'a> {
    out: DashboardWriter<'a>,
    styles: Box<Styles>,
    verbose: bool,
    pager: Pager,
    current: Option<CategoryDisplay>,
}

impl<'a> DisplayReporter<'a> {
    pub(crate) fn new(
        output: DashboardOutput<'a>,
        verbose: bool,
        colorize: bool,
        pager: Pager,
    ) -> Self {
        let mut styles = Box::<Styles>::default();
        if colorize {
            styles.colorize();
        }

        let out = match output {
            DashboardOutput::Terminal => DashboardWriter::Terminal(io::stdout()),
            DashboardOutput::Buffer(buffer) => DashboardWriter::Buffer(buffer),
        };

        Self {
            out,
            styles,
            verbose,
            pager,
            current: None,
        }
    }

    pub(crate) fn cancel_requested(&self) -> bool {
        self.pager.cancel_requested()
    }

    pub(crate) fn write_event(&mut self, event: &TestEvent) -> Result<(), WriteEventError> {
        self.write_event_impl(event).map_err(WriteEventError::Io)
    }

    fn write_event_impl(&mut self, event: &TestEvent) -> io::Result<()> {
        let Self {
            out,
            styles,
            pager,
            current,
            verbose,
        } = self;

        match &event.kind {
            TestEventKind::RunStarted {
                backend_ident,
                log_path,
                ..
            } => {
                let header = match backend_ident {
                    Some(ident) => {
                        format!("socktest {} - {ident}", env!("CARGO_PKG_VERSION"))
                    }
                    None => format!("socktest {}", env!("CARGO_PKG_VERSION")),
                };
                write_line(out, pager, &format!("{}", header.style(styles.header)))?;

                if let Some(path) = log_path {
                    write_line(out, pager, &format!("Log: {path}"))?;
                }
                write_line(out, pager, "")?;
            }
            TestEventKind::CategoryStarted { name } => {
                *current = Some(CategoryDisplay::default());

                // Progress indicator, rewritten in place by CategoryFinished.
                if !*verbose {
                    out.write_str(&category_dots(name))?;
                    out.write_str_flush()?;
                }
            }
            TestEventKind::TestFinished {
                test_id,
                passed,
                description,
                known,
            } => {
                if !*passed && known.is_none() {
                    if let Some(display) = current {
                        if display.failures.len() < MAX_FAILURES_DISPLAY {
                            display.failures.push((*test_id, description.clone()));
                        } else {
                            display.more_failures += 1;
                        }
                    }
                }

                if *verbose {
                    let status = if *passed {
                        format!("{}", "ok   ".style(styles.pass))
                    } else if known.is_some() {
                        format!("{}", "KNOWN".style(styles.known))
                    } else {
                        format!("{}", "FAIL ".style(styles.fail))
                    };
                    write_line(out, pager, &format!("  {test_id:>3} {status} - {description}"))?;
                }
            }
            TestEventKind::TestSkipped { test_id, reason } => {
                if *verbose {
                    let status = format!("{}", "skip ".style(styles.skip));
                    write_line(out, pager, &format!("  {test_id:>3} {status} - {reason}"))?;
                }
            }
            TestEventKind::Diag { .. } => {
                // Log-only.
            }
            TestEventKind::Note { message } => {
                if let Some(display) = current {
                    if display.notes.len() < MAX_NOTES_DISPLAY {
                        display.notes.push(message.clone());
                    }
                }
            }
            TestEventKind::CategoryFinished { name, stats } => {
                let display = current.take().unwrap_or_default();

                // Rewrite the progress indicator line in place.
                if !*verbose {
                    out.write_char('\r')?;
                }

                let ran = stats.passed + stats.failed + stats.known;
                let mut line = category_dots(name);
                swrite!(
                    line,
                    " {}/{} ",
                    stats.passed.style(styles.count),
                    ran.style(styles.count)
                );
                if stats.failed > 0 {
                    swrite!(line, "{}", "FAILED".style(styles.fail));
                } else {
                    swrite!(line, "{}", "passed".style(styles.pass));
                }
                line.push_str(&detail_suffix(stats.failed, stats.known, stats.skipped));
                write_line(out, pager, &line)?;

                for (test_id, description) in &display.failures {
                    let marker = format!("FAIL #{test_id}:");
                    write_line(
                        out,
                        pager,
                        &format!("  {} {description}", marker.style(styles.fail)),
                    )?;
                }
                if display.more_failures > 0 {
                    write_line(
                        out,
                        pager,
                        &format!("  ... and {} more (see log)", display.more_failures),
                    )?;
                }
                for note in &display.notes {
                    write_line(out, pager, &format!("  {note}"))?;
                }
            }
            TestEventKind::RunBailed { reason } => {
                write_line(
                    out,
                    pager,
                    &format!("{} {reason}", "Bail out!".style(styles.fail)),
                )?;
            }
            TestEventKind::RunFinished { stats, .. } => {
                let ran = stats.passed + stats.failed + stats.known;
                let mut line = format!("Results: {}/{} ", stats.passed, ran);
                line.push_str(if stats.failed > 0 { "FAILED" } else { "passed" });
                line.push_str(&detail_suffix(stats.failed, stats.known, stats.skipped));

                write_line(out, pager, "")?;
                write_line(out, pager, &format!("{}", line.style(styles.header)))?;
            }
        }

        Ok(())
    }
}

/// Writes a dashboard line and accounts its screen rows to the pager.
fn write_line(out: &mut dyn WriteStr, pager: &mut Pager, line: &str) -> io::Result<()> {
    out.write_str(line)?;
    out.write_char('\n')?;
    out.write_str_flush()?;

    let visible = strip_ansi_escapes::strip_str(line).chars().count();
    pager.advance(pager.wrap_rows(visible.max(1)), out)
}

/// Dot-pads a category name to the summary column.
fn category_dots(name: &str) -> String {
    let dots = CATEGORY_WIDTH.saturating_sub(name.chars().count()).max(3);
    let mut line = String::with_capacity(name.len() + dots);
    line.push_str(name);
    for _ in 0..dots {
        line.push('.');
    }
    line
}

/// Parenthetical breakdown, printed only when at least one count is non-zero.
fn detail_suffix(failed: usize, known: usize, skipped: usize) -> String {
    if failed == 0 && known == 0 && skipped == 0 {
        return String::new();
    }

    let mut parts = Vec::with_capacity(3);
    if failed > 0 {
        parts.push(format!("{failed} failed"));
    }
    if known > 0 {
        parts.push(format!("{known} known {}", plural::issues_str(known)));
    }
    if skipped > 0 {
        parts.push(format!("{skipped} skipped"));
    }
    format!(" ({})", parts.join(", "))
}
