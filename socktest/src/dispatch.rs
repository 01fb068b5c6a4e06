// Copyright (c) The socktest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{
    errors::{status_exit_code, Result, SocktestExitCode},
    output::{clap_styles, OutputContext, OutputOpts},
    suite::{self, SuiteConfig},
};
use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};
use socktest_runner::{
    catalog::KnownIssueCatalog,
    reporter::{DashboardOutput, LogOutput, ReporterBuilder},
    runner::{CategoryFilter, CategoryRunner},
    signal::SignalHandler,
};
use supports_color::Stream;

/// A conformance test harness for socket-API backends.
#[derive(Debug, Parser)]
#[command(version, styles = clap_styles::style())]
pub struct SocktestApp {
    #[command(flatten)]
    output: OutputOpts,

    #[command(subcommand)]
    command: Command,
}

impl SocktestApp {
    /// Executes the app, returning the process exit code.
    pub fn exec(self) -> Result<i32> {
        let output = self.output.init();
        self.command.exec(output)
    }
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List registered test categories
    List,
    /// Run test categories against the local socket stack
    Run(RunOpts),
}

#[derive(Debug, Args)]
struct RunOpts {
    /// Run only the named category
    #[arg(long, value_name = "NAME", conflicts_with_all = ["loopback", "network"])]
    category: Option<String>,

    /// Run only self-contained categories
    #[arg(long, conflicts_with = "network")]
    loopback: bool,

    /// Run only categories that exercise the helper peer
    #[arg(long)]
    network: bool,

    /// Helper peer host for network-tier categories
    #[arg(long, value_name = "HOST", default_value = "127.0.0.1")]
    host: String,

    /// First port of the helper peer's port range
    #[arg(long, value_name = "PORT", default_value_t = 7677)]
    base_port: u16,

    /// Path of the structured TAP log
    #[arg(long, value_name = "PATH", default_value = "socktest.log")]
    log: Utf8PathBuf,

    /// Discard the structured log
    #[arg(long, conflicts_with = "log")]
    no_log: bool,

    /// Disable dashboard pagination
    #[arg(long)]
    no_page: bool,

    /// Backend identification string used for known-issue matching
    #[arg(long, value_name = "IDENT", env = "SOCKTEST_BACKEND_ID")]
    backend_id: Option<String>,
}

impl Command {
    fn exec(self, output: OutputContext) -> Result<i32> {
        match self {
            Self::List => {
                let config = SuiteConfig::default();
                let runner = CategoryRunner::new(suite::categories(&config), SignalHandler::noop());
                for (name, tier) in runner.entries() {
                    println!("{name:<12} [{tier}]");
                }
                Ok(SocktestExitCode::CLEAN)
            }
            Self::Run(opts) => opts.exec(output),
        }
    }
}

impl RunOpts {
    fn exec(self, output: OutputContext) -> Result<i32> {
        let catalog = KnownIssueCatalog::builtin();
        let profile = catalog.select(self.backend_id.as_deref());
        match (profile.backend_name(), &self.backend_id) {
            (Some(name), _) => {
                tracing::debug!("matched backend profile {name}");
            }
            (None, Some(ident)) => {
                tracing::warn!(
                    "no known-issue profile matches {ident:?}; all failures will be unexpected"
                );
            }
            (None, None) => {}
        }

        // Install the Ctrl-C handler before any category starts.
        let signal_handler = SignalHandler::new()?;

        let config = SuiteConfig {
            host: self.host,
            base_port: self.base_port,
        };

        let log_output = if self.no_log {
            LogOutput::Null
        } else {
            LogOutput::File(self.log)
        };
        let mut reporter = ReporterBuilder::default()
            .set_verbose(output.verbose)
            .set_colorize(output.color.should_colorize(Stream::Stdout))
            .set_paginate(!self.no_page)
            .build(
                profile,
                self.backend_id.as_deref(),
                DashboardOutput::Terminal,
                log_output,
            )?;

        let filter = if let Some(name) = self.category {
            CategoryFilter::Name(name)
        } else if self.loopback {
            CategoryFilter::Loopback
        } else if self.network {
            CategoryFilter::Network
        } else {
            CategoryFilter::All
        };

        let mut runner = CategoryRunner::new(suite::categories(&config), signal_handler);
        runner.execute(&filter, &mut reporter)?;

        let status = reporter.finish()?;
        Ok(status_exit_code(status))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_app() {
        SocktestApp::command().debug_assert();
    }
}
