// Copyright (c) The nunit-repeat Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{
    errors::Result,
    output::{OutputContext, OutputOpts},
    retry::{RetrySession, RunnerCommand},
};
use camino::Utf8PathBuf;
use clap::Parser;
use tracing::debug;

/// Rerun failed NUnit tests and consolidate the results.
///
/// Runs the external runner once, then reruns just the failing cases up to
/// `--max-retries` times, folding each rerun's results into the report at
/// `--results-file`.
#[derive(Debug, Parser)]
#[command(version, about)]
pub struct NunitRepeatApp {
    #[command(flatten)]
    output: OutputOpts,

    /// Maximum number of rerun attempts
    #[arg(long, value_name = "N", default_value_t = 3)]
    max_retries: usize,

    /// Report file the runner writes and reads
    #[arg(long, value_name = "PATH", default_value = "TestResult.xml")]
    results_file: Utf8PathBuf,

    /// File to write the names of failing tests to between attempts
    #[arg(long, value_name = "PATH", default_value = "testlist.txt")]
    test_list: Utf8PathBuf,

    /// The runner command, e.g. `-- nunit3-console Demo.dll`
    #[arg(last = true, required = true, value_name = "RUNNER", num_args = 1..)]
    runner: Vec<String>,
}

impl NunitRepeatApp {
    pub fn init_output(&self) -> OutputContext {
        self.output.init()
    }

    pub fn exec(self, output: OutputContext) -> Result<()> {
        let command = RunnerCommand::new(self.runner)?;
        if output.verbose {
            debug!("runner command: {command}");
            debug!("results file: {}", self.results_file);
        }

        // The first run is always the full suite; the retry loop only sees
        // the report it leaves behind.
        command.run_unfiltered()?;

        let session = RetrySession {
            max_retries: self.max_retries,
            results_file: self.results_file,
            test_list: self.test_list,
        };
        session.execute(|test_list| command.run_filtered(test_list))
    }
}
