// Copyright (c) The nunit-repeat Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The retry loop: run, reload, merge, repeat.

use crate::{
    errors::{ExpectedError, Result},
    merge::merge_rerun,
};
use camino::{Utf8Path, Utf8PathBuf};
use quick_nunit::Report;
use std::fmt;
use tracing::{debug, info};

/// The external runner invocation, as given after `--` on the command line.
#[derive(Clone, Debug)]
pub struct RunnerCommand {
    program: String,
    args: Vec<String>,
}

impl RunnerCommand {
    pub fn new(argv: Vec<String>) -> Result<Self> {
        let mut iter = argv.into_iter();
        let program = iter.next().ok_or(ExpectedError::RunnerCommandMissing)?;
        Ok(Self {
            program,
            args: iter.collect(),
        })
    }

    /// Runs the full suite, without a test list.
    pub fn run_unfiltered(&self) -> Result<()> {
        self.invoke(&self.args)
    }

    /// Runs only the cases named in `test_list`, by appending the runner's
    /// `--testlist` option.
    pub fn run_filtered(&self, test_list: &Utf8Path) -> Result<()> {
        let mut args = self.args.clone();
        args.push("--testlist".to_owned());
        args.push(test_list.to_string());
        self.invoke(&args)
    }

    fn invoke(&self, args: &[String]) -> Result<()> {
        // The runner exits non-zero whenever any test fails; that is the
        // normal case here, so only a spawn failure is an error. The report
        // on disk is the source of truth for what happened.
        let output = duct::cmd(&self.program, args)
            .unchecked()
            .run()
            .map_err(|err| ExpectedError::RunnerExecFailed {
                command: self.to_string(),
                err,
            })?;
        if !output.status.success() {
            debug!("runner exited with {}", output.status);
        }
        Ok(())
    }
}

impl fmt::Display for RunnerCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Drives reruns of failed cases until they all pass or the retry budget is
/// exhausted.
#[derive(Clone, Debug)]
pub struct RetrySession {
    pub max_retries: usize,
    pub results_file: Utf8PathBuf,
    pub test_list: Utf8PathBuf,
}

impl RetrySession {
    /// Runs the retry loop. `run_tests` executes the runner against a test
    /// list file and is expected to overwrite `self.results_file`.
    ///
    /// The consolidated report is written back to `results_file` before
    /// returning, even when failures remain.
    pub fn execute(&self, mut run_tests: impl FnMut(&Utf8Path) -> Result<()>) -> Result<()> {
        let mut report = self.load_report()?;
        let mut remaining = self.max_retries;

        while remaining > 0 && report.has_failures() {
            remaining -= 1;
            let failing = failed_names(&report);
            info!(
                "retrying {} failed test(s), {} attempt(s) left: {}",
                failing.len(),
                remaining,
                failing.join(", ")
            );

            self.write_test_list(&failing)?;
            run_tests(&self.test_list)?;

            let rerun = self.load_report()?;
            let fixed = merge_rerun(&mut report, &rerun)
                .map_err(|err| ExpectedError::MergeFailed { err })?;
            info!("{fixed} test(s) now passing");
        }

        self.persist_report(&report)?;

        if report.has_failures() {
            return Err(ExpectedError::TestsStillFailing {
                failing: failed_names(&report),
            });
        }
        Ok(())
    }

    fn load_report(&self) -> Result<Report> {
        let bytes = fs_err::read(&self.results_file).map_err(|err| {
            ExpectedError::ReportReadError {
                path: self.results_file.clone(),
                err,
            }
        })?;
        Report::parse(bytes.as_slice()).map_err(|err| ExpectedError::ReportParseError {
            path: self.results_file.clone(),
            err,
        })
    }

    fn persist_report(&self, report: &Report) -> Result<()> {
        let mut buf = Vec::new();
        report
            .serialize(&mut buf)
            .and_then(|()| Ok(fs_err::write(&self.results_file, buf)?))
            .map_err(|err| ExpectedError::ReportWriteError {
                path: self.results_file.clone(),
                err,
            })
    }

    // One fullname per line, the format the runner's --testlist expects.
    fn write_test_list(&self, names: &[String]) -> Result<()> {
        let mut contents = names.join("\n");
        contents.push('\n');
        fs_err::write(&self.test_list, contents).map_err(|err| {
            ExpectedError::TestListWriteError {
                path: self.test_list.clone(),
                err,
            }
        })
    }
}

fn failed_names(report: &Report) -> Vec<String> {
    report
        .failed_cases()
        .into_iter()
        .filter_map(|id| report.case(id).map(|case| case.full_name.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino_tempfile::Utf8TempDir;
    use indoc::indoc;
    use pretty_assertions::assert_eq;
    use std::cell::RefCell;

    static FAILING: &str = indoc! {r#"
        <?xml version="1.0" encoding="utf-8"?>
        <test-run result="Failed" passed="1" failed="1" id="1">
          <test-suite result="Failed" passed="1" failed="1" name="A">
            <test-case fullname="Demo.A.Flaky" result="Failed" id="0-1">
              <failure>
                <message><![CDATA[boom]]></message>
              </failure>
            </test-case>
            <test-case fullname="Demo.A.Steady" result="Passed" id="0-2"/>
          </test-suite>
        </test-run>
    "#};

    static RERUN_PASSED: &str = indoc! {r#"
        <?xml version="1.0" encoding="utf-8"?>
        <test-run result="Passed" passed="1" failed="0" id="2">
          <test-suite result="Passed" passed="1" failed="0" name="A">
            <test-case fullname="Demo.A.Flaky" result="Passed" id="0-1"/>
          </test-suite>
        </test-run>
    "#};

    static RERUN_FAILED: &str = indoc! {r#"
        <?xml version="1.0" encoding="utf-8"?>
        <test-run result="Failed" passed="0" failed="1" id="2">
          <test-suite result="Failed" passed="0" failed="1" name="A">
            <test-case fullname="Demo.A.Flaky" result="Failed" id="0-1">
              <failure>
                <message><![CDATA[boom again]]></message>
              </failure>
            </test-case>
          </test-suite>
        </test-run>
    "#};

    struct Fixture {
        dir: Utf8TempDir,
        session: RetrySession,
    }

    impl Fixture {
        fn new(max_retries: usize, initial: &str) -> Self {
            let dir = Utf8TempDir::new().expect("tempdir created");
            let session = RetrySession {
                max_retries,
                results_file: dir.path().join("TestResult.xml"),
                test_list: dir.path().join("testlist.txt"),
            };
            fs_err::write(&session.results_file, initial).expect("seed report written");
            Self { dir, session }
        }

        fn test_list_contents(&self) -> String {
            fs_err::read_to_string(&self.session.test_list).expect("test list readable")
        }

        fn final_report(&self) -> Report {
            let bytes = fs_err::read(&self.session.results_file).expect("report readable");
            Report::parse(bytes.as_slice()).expect("report parses")
        }
    }

    #[test]
    fn stops_as_soon_as_everything_passes() {
        let fixture = Fixture::new(3, FAILING);
        let invocations = RefCell::new(0usize);

        fixture
            .session
            .execute(|test_list| {
                *invocations.borrow_mut() += 1;
                assert_eq!(test_list, fixture.session.test_list);
                fs_err::write(&fixture.session.results_file, RERUN_PASSED)
                    .expect("rerun report written");
                Ok(())
            })
            .expect("session succeeds");

        assert_eq!(*invocations.borrow(), 1);
        assert_eq!(fixture.test_list_contents(), "Demo.A.Flaky\n");

        let report = fixture.final_report();
        assert!(!report.has_failures());
        let run = report.summary(report.root()).expect("run summary");
        assert_eq!((run.passed, run.failed), (2, 0));
    }

    #[test]
    fn exhausting_retries_reports_still_failing_and_persists() {
        let fixture = Fixture::new(2, FAILING);
        let invocations = RefCell::new(0usize);

        let err = fixture
            .session
            .execute(|_| {
                *invocations.borrow_mut() += 1;
                fs_err::write(&fixture.session.results_file, RERUN_FAILED)
                    .expect("rerun report written");
                Ok(())
            })
            .unwrap_err();

        assert_eq!(*invocations.borrow(), 2);
        assert!(matches!(
            err,
            ExpectedError::TestsStillFailing { failing } if failing == ["Demo.A.Flaky"]
        ));

        // The consolidated report is written even on failure, and retains
        // the original failure message since the reruns never passed.
        let report = fixture.final_report();
        assert!(report.has_failures());
        let flaky = report.failed_cases()[0];
        assert_eq!(report.case(flaky).expect("case").full_name, "Demo.A.Flaky");
    }

    #[test]
    fn a_clean_initial_report_skips_the_runner_entirely() {
        let fixture = Fixture::new(3, RERUN_PASSED);

        fixture
            .session
            .execute(|_| panic!("runner must not be invoked"))
            .expect("session succeeds");

        // No test list was ever written.
        assert!(!fixture.dir.path().join("testlist.txt").exists());
    }

    #[test]
    fn zero_retries_only_consolidates() {
        let fixture = Fixture::new(0, FAILING);

        let err = fixture
            .session
            .execute(|_| panic!("runner must not be invoked"))
            .unwrap_err();
        assert!(matches!(err, ExpectedError::TestsStillFailing { .. }));
    }

    #[test]
    fn runner_command_requires_a_program() {
        assert!(matches!(
            RunnerCommand::new(Vec::new()),
            Err(ExpectedError::RunnerCommandMissing)
        ));
    }

    #[test]
    fn runner_command_display_joins_argv() {
        let command = RunnerCommand::new(vec![
            "nunit3-console".to_owned(),
            "Demo.dll".to_owned(),
            "--where".to_owned(),
            "cat == Slow".to_owned(),
        ])
        .expect("non-empty argv");
        assert_eq!(command.to_string(), "nunit3-console Demo.dll --where cat == Slow");
    }
}
