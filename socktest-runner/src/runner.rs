// Copyright (c) The socktest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Sequences category scopes.
//!
//! Categories run strictly one at a time, in registry order. The runner
//! checks for operator cancellation before opening each scope, so an
//! interrupt (Ctrl-C or a pager prompt answered with Ctrl-C) lands between
//! categories rather than mid-test.

use crate::{errors::WriteEventError, reporter::Reporter, signal::SignalHandler};
use std::{borrow::Cow, fmt};

/// What a category needs from its environment to be runnable.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Tier {
    /// Self-contained: talks only to the local host.
    Loopback,

    /// Requires an external peer host.
    Network,

    /// Meaningful both with and without an external peer.
    Both,
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Loopback => "loopback",
            Self::Network => "network",
            Self::Both => "both",
        };
        f.write_str(s)
    }
}

/// Which registered categories a run covers.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub enum CategoryFilter {
    /// Every registered category.
    #[default]
    All,

    /// A single category, selected by exact name.
    Name(String),

    /// Categories runnable without an external peer.
    Loopback,

    /// Categories that exercise an external peer.
    Network,
}

impl CategoryFilter {
    fn matches(&self, name: &str, tier: Tier) -> bool {
        match self {
            Self::All => true,
            Self::Name(wanted) => name == wanted,
            Self::Loopback => matches!(tier, Tier::Loopback | Tier::Both),
            Self::Network => matches!(tier, Tier::Network | Tier::Both),
        }
    }
}

/// A registered category: a name, an applicability tier, and the test body.
pub struct CategoryEntry<'env> {
    name: Cow<'static, str>,
    tier: Tier,
    #[allow(clippy::type_complexity)]
    run: Box<dyn FnMut(&mut Reporter<'_>) -> Result<(), WriteEventError> + 'env>,
}

impl<'env> CategoryEntry<'env> {
    /// Creates a new registry entry.
    pub fn new(
        name: impl Into<Cow<'static, str>>,
        tier: Tier,
        run: impl FnMut(&mut Reporter<'_>) -> Result<(), WriteEventError> + 'env,
    ) -> Self {
        Self {
            name: name.into(),
            tier,
            run: Box::new(run),
        }
    }

    /// The category name, as selected by [`CategoryFilter::Name`].
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The category's applicability tier.
    pub fn tier(&self) -> Tier {
        self.tier
    }
}

impl fmt::Debug for CategoryEntry<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CategoryEntry")
            .field("name", &self.name)
            .field("tier", &self.tier)
            .finish_non_exhaustive()
    }
}

/// Runs registered categories in order against a [`Reporter`].
pub struct CategoryRunner<'env> {
    entries: Vec<CategoryEntry<'env>>,
    signal_handler: SignalHandler,
}

impl<'env> CategoryRunner<'env> {
    /// Creates a runner over an ordered category registry.
    pub fn new(entries: Vec<CategoryEntry<'env>>, signal_handler: SignalHandler) -> Self {
        Self {
            entries,
            signal_handler,
        }
    }

    /// The registered categories, in run order. Used by list mode.
    pub fn entries(&self) -> impl Iterator<Item = (&str, Tier)> {
        self.entries.iter().map(|entry| (entry.name(), entry.tier))
    }

    /// Runs every category selected by the filter, in registry order.
    ///
    /// Cancellation (an operator interrupt, or Ctrl-C at a pagination prompt)
    /// is observed before each category; on cancellation or on a bail-out
    /// from a test body, the remaining categories are not started. Returns
    /// the number of categories that ran.
    ///
    /// The caller still calls [`Reporter::finish`] afterwards: the final
    /// summary is emitted even when nothing matched or the run bailed.
    pub fn execute(
        &mut self,
        filter: &CategoryFilter,
        reporter: &mut Reporter<'_>,
    ) -> Result<usize, WriteEventError> {
        let Self {
            entries,
            signal_handler,
        } = self;

        let mut ran = 0;
        let mut matched_any = false;
        for entry in entries.iter_mut() {
            if !filter.matches(&entry.name, entry.tier) {
                continue;
            }
            matched_any = true;

            if signal_handler.interrupted() || reporter.cancel_requested() {
                reporter.bail("interrupted by operator")?;
                break;
            }

            ran += 1;
            reporter.begin_category(&entry.name)?;
            (entry.run)(reporter)?;
            if reporter.bailed() {
                // The scope is deliberately left open; the reporter falls
                // back to its running totals.
                break;
            }
            reporter.end_category()?;
        }

        if !matched_any {
            tracing::warn!("no category matched the filter");
            reporter.diag("no category matched the filter")?;
        }

        Ok(ran)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        catalog::ActiveProfile,
        reporter::{DashboardOutput, LogOutput, ReporterBuilder, RunStatus},
        signal::SignalEvent,
    };
    use std::{cell::RefCell, rc::Rc};

    #[test]
    fn categories_run_in_registry_order() {
        let order = Rc::new(RefCell::new(Vec::new()));
        let entries = ["socket", "sendrecv", "dns"]
            .into_iter()
            .map(|name| {
                let order = Rc::clone(&order);
                CategoryEntry::new(name, Tier::Loopback, move |reporter: &mut Reporter<'_>| {
                    order.borrow_mut().push(name);
                    reporter.record(true, "check")
                })
            })
            .collect();

        let (mut dashboard, mut log) = (String::new(), String::new());
        let mut reporter = ReporterBuilder::default()
            .build(
                ActiveProfile::inactive(),
                None,
                DashboardOutput::Buffer(&mut dashboard),
                LogOutput::Buffer(&mut log),
            )
            .unwrap();

        let mut runner = CategoryRunner::new(entries, SignalHandler::noop());
        let ran = runner.execute(&CategoryFilter::All, &mut reporter).unwrap();

        assert_eq!(ran, 3);
        assert_eq!(*order.borrow(), ["socket", "sendrecv", "dns"]);
        assert_eq!(reporter.finish().unwrap(), RunStatus::Clean);
    }

    #[test]
    fn name_filter_selects_one_category() {
        let order = Rc::new(RefCell::new(Vec::new()));
        let entries = ["socket", "sendrecv"]
            .into_iter()
            .map(|name| {
                let order = Rc::clone(&order);
                CategoryEntry::new(name, Tier::Loopback, move |reporter: &mut Reporter<'_>| {
                    order.borrow_mut().push(name);
                    reporter.record(true, "check")
                })
            })
            .collect();

        let (mut dashboard, mut log) = (String::new(), String::new());
        let mut reporter = ReporterBuilder::default()
            .build(
                ActiveProfile::inactive(),
                None,
                DashboardOutput::Buffer(&mut dashboard),
                LogOutput::Buffer(&mut log),
            )
            .unwrap();

        let mut runner = CategoryRunner::new(entries, SignalHandler::noop());
        let ran = runner
            .execute(&CategoryFilter::Name("sendrecv".to_owned()), &mut reporter)
            .unwrap();

        assert_eq!(ran, 1);
        assert_eq!(*order.borrow(), ["sendrecv"]);
    }

    #[test]
    fn tier_filters_include_both() {
        let filter = CategoryFilter::Loopback;
        assert!(filter.matches("a", Tier::Loopback));
        assert!(filter.matches("a", Tier::Both));
        assert!(!filter.matches("a", Tier::Network));

        let filter = CategoryFilter::Network;
        assert!(!filter.matches("a", Tier::Loopback));
        assert!(filter.matches("a", Tier::Both));
        assert!(filter.matches("a", Tier::Network));
    }

    #[test]
    fn bail_stops_remaining_categories() {
        let order = Rc::new(RefCell::new(Vec::new()));
        let entries = vec![
            {
                let order = Rc::clone(&order);
                CategoryEntry::new("first", Tier::Loopback, move |reporter: &mut Reporter<'_>| {
                    order.borrow_mut().push("first");
                    reporter.record(true, "a")?;
                    reporter.record(true, "b")
                })
            },
            {
                let order = Rc::clone(&order);
                CategoryEntry::new("second", Tier::Loopback, move |reporter: &mut Reporter<'_>| {
                    order.borrow_mut().push("second");
                    reporter.record(true, "c")?;
                    reporter.bail("cannot reach test host")
                })
            },
            {
                let order = Rc::clone(&order);
                CategoryEntry::new("third", Tier::Loopback, move |reporter: &mut Reporter<'_>| {
                    order.borrow_mut().push("third");
                    reporter.record(true, "d")
                })
            },
        ];

        let (mut dashboard, mut log) = (String::new(), String::new());
        let mut reporter = ReporterBuilder::default()
            .build(
                ActiveProfile::inactive(),
                None,
                DashboardOutput::Buffer(&mut dashboard),
                LogOutput::Buffer(&mut log),
            )
            .unwrap();

        let mut runner = CategoryRunner::new(entries, SignalHandler::noop());
        let ran = runner.execute(&CategoryFilter::All, &mut reporter).unwrap();

        assert_eq!(ran, 2);
        assert_eq!(*order.borrow(), ["first", "second"]);
        // First category folded, second counted through the running totals.
        let stats = reporter.stats();
        assert_eq!(stats.total, 3);
        assert_eq!(reporter.finish().unwrap(), RunStatus::Aborted);
        assert!(
            log.contains("# Results: 3 passed, 0 failed, 0 known, 0 skipped (3 total)"),
            "got: {log}"
        );
    }

    #[test]
    fn interrupt_observed_between_categories() {
        let (sender, receiver) = crossbeam_channel::bounded(1);
        let order = Rc::new(RefCell::new(Vec::new()));
        let entries = vec![
            {
                let order = Rc::clone(&order);
                let sender = sender.clone();
                CategoryEntry::new("first", Tier::Loopback, move |reporter: &mut Reporter<'_>| {
                    order.borrow_mut().push("first");
                    // The interrupt arrives while this category runs; the
                    // category itself completes.
                    sender.send(SignalEvent::Interrupted).unwrap();
                    reporter.record(true, "a")
                })
            },
            {
                let order = Rc::clone(&order);
                CategoryEntry::new("second", Tier::Loopback, move |reporter: &mut Reporter<'_>| {
                    order.borrow_mut().push("second");
                    reporter.record(true, "b")
                })
            },
        ];

        let (mut dashboard, mut log) = (String::new(), String::new());
        let mut reporter = ReporterBuilder::default()
            .build(
                ActiveProfile::inactive(),
                None,
                DashboardOutput::Buffer(&mut dashboard),
                LogOutput::Buffer(&mut log),
            )
            .unwrap();

        let mut runner =
            CategoryRunner::new(entries, SignalHandler::with_receiver(receiver));
        let ran = runner.execute(&CategoryFilter::All, &mut reporter).unwrap();

        assert_eq!(ran, 1);
        assert_eq!(*order.borrow(), ["first"]);
        assert!(reporter.bailed());
        assert_eq!(reporter.finish().unwrap(), RunStatus::Aborted);
        assert!(log.contains("Bail out! interrupted by operator"), "got: {log}");
    }

    #[test]
    fn no_match_is_surfaced() {
        let entries = vec![CategoryEntry::new(
            "socket",
            Tier::Loopback,
            |reporter: &mut Reporter<'_>| reporter.record(true, "check"),
        )];

        let (mut dashboard, mut log) = (String::new(), String::new());
        let mut reporter = ReporterBuilder::default()
            .build(
                ActiveProfile::inactive(),
                None,
                DashboardOutput::Buffer(&mut dashboard),
                LogOutput::Buffer(&mut log),
            )
            .unwrap();

        let mut runner = CategoryRunner::new(entries, SignalHandler::noop());
        let ran = runner
            .execute(&CategoryFilter::Name("nope".to_owned()), &mut reporter)
            .unwrap();

        assert_eq!(ran, 0);
        assert_eq!(reporter.finish().unwrap(), RunStatus::Clean);
        assert!(log.contains("# no category matched the filter"), "got: {log}");
    }
}
