// Copyright (c) The nunit-repeat Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{merge::MergeError, output::StderrStyles};
use camino::Utf8PathBuf;
use owo_colors::OwoColorize;
use std::error::Error;
use thiserror::Error;
use tracing::error;

pub(crate) type Result<T, E = ExpectedError> = std::result::Result<T, E>;

/// Documented exit codes for `nunit-repeat` failures.
///
/// Unknown/unexpected failures will always result in exit code 1.
pub enum NunitRepeatExitCode {}

impl NunitRepeatExitCode {
    /// All tests passed, possibly after retries.
    pub const OK: i32 = 0;

    /// A user issue happened while setting up the invocation, reading or
    /// writing reports, or merging reruns.
    pub const SETUP_ERROR: i32 = 96;

    /// One or more tests were still failing when retries ran out.
    pub const TEST_RUN_FAILED: i32 = 100;

    /// The external test runner could not be executed at all.
    pub const RUNNER_EXEC_FAILED: i32 = 102;
}

// Note that the #[error()] strings are mostly placeholder messages -- the
// expected way to print out errors is with the display_to_stderr method.

/// An error expected to occur during a normal `nunit-repeat` invocation.
#[derive(Debug, Error)]
pub enum ExpectedError {
    #[error("no test runner command provided")]
    RunnerCommandMissing,
    #[error("failed to read results file")]
    ReportReadError {
        path: Utf8PathBuf,
        #[source]
        err: std::io::Error,
    },
    #[error("failed to parse results file")]
    ReportParseError {
        path: Utf8PathBuf,
        #[source]
        err: quick_nunit::ParseError,
    },
    #[error("failed to write results file")]
    ReportWriteError {
        path: Utf8PathBuf,
        #[source]
        err: quick_nunit::SerializeError,
    },
    #[error("failed to write test list")]
    TestListWriteError {
        path: Utf8PathBuf,
        #[source]
        err: std::io::Error,
    },
    #[error("failed to execute test runner")]
    RunnerExecFailed {
        command: String,
        #[source]
        err: std::io::Error,
    },
    #[error("rerun results could not be merged")]
    MergeFailed {
        #[source]
        err: MergeError,
    },
    #[error("tests still failing after retries")]
    TestsStillFailing { failing: Vec<String> },
}

impl ExpectedError {
    /// Returns the exit code for the process.
    pub fn process_exit_code(&self) -> i32 {
        match self {
            Self::RunnerCommandMissing
            | Self::ReportReadError { .. }
            | Self::ReportParseError { .. }
            | Self::ReportWriteError { .. }
            | Self::TestListWriteError { .. }
            | Self::MergeFailed { .. } => NunitRepeatExitCode::SETUP_ERROR,
            Self::RunnerExecFailed { .. } => NunitRepeatExitCode::RUNNER_EXEC_FAILED,
            Self::TestsStillFailing { .. } => NunitRepeatExitCode::TEST_RUN_FAILED,
        }
    }

    /// Displays this error to stderr.
    pub fn display_to_stderr(&self, styles: &StderrStyles) {
        let mut next_error = match self {
            Self::RunnerCommandMissing => {
                error!("no test runner command provided after `--`");
                None
            }
            Self::ReportReadError { path, err } => {
                error!("failed to read results file `{}`", path.style(styles.bold));
                Some(err as &dyn Error)
            }
            Self::ReportParseError { path, err } => {
                error!("failed to parse results file `{}`", path.style(styles.bold));
                Some(err as &dyn Error)
            }
            Self::ReportWriteError { path, err } => {
                error!("failed to write results file `{}`", path.style(styles.bold));
                Some(err as &dyn Error)
            }
            Self::TestListWriteError { path, err } => {
                error!("failed to write test list `{}`", path.style(styles.bold));
                Some(err as &dyn Error)
            }
            Self::RunnerExecFailed { command, err } => {
                error!("failed to execute `{}`", command.style(styles.bold));
                Some(err as &dyn Error)
            }
            Self::MergeFailed { err } => {
                error!("rerun results could not be merged into the base report");
                Some(err as &dyn Error)
            }
            Self::TestsStillFailing { failing } => {
                error!(
                    "{} test(s) still failing after retries:",
                    failing.len().style(styles.count)
                );
                for full_name in failing {
                    error!(
                        target: "nunit_repeat::no_heading",
                        "    {}",
                        full_name.style(styles.bold)
                    );
                }
                None
            }
        };

        while let Some(err) = next_error {
            error!(target: "nunit_repeat::no_heading", "  caused by: {}", err);
            next_error = err.source();
        }
    }
}
