// Copyright (c) The nunit-repeat Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use pretty_assertions::assert_eq;
use quick_nunit::{NodeData, ParentIndex, Report, TestResult};

static MOCK_REPORT: &str = include_str!("fixtures/mock_failing_tests.xml");

#[test]
fn parses_mock_failing_tests_report() {
    let report = Report::parse(MOCK_REPORT.as_bytes()).expect("fixture parses");

    let run = report.summary(report.root()).expect("root is a test-run");
    assert_eq!(run.result, TestResult::Failed);
    assert_eq!((run.passed, run.failed), (1, 2));
    assert_eq!(run.extra["testcasecount"], "3");

    let cases = report.test_cases();
    assert_eq!(cases.len(), 3);

    let failed: Vec<&str> = report
        .failed_cases()
        .into_iter()
        .map(|id| report.case(id).expect("case").full_name.as_str())
        .collect();
    assert_eq!(
        failed,
        [
            "MockFailingTests.UnitTest1.FailUntil(\"counter2.txt\",2)",
            "MockFailingTests.UnitTest1.FailUntil(\"counter3.txt\",3)",
        ]
    );
    assert!(report.has_failures());

    // Failure details made it through, newlines and all.
    let failure = report.node(report.failed_cases()[0]).children[0];
    let NodeData::Failure(failure) = &report.node(failure).data else {
        panic!("expected failure node");
    };
    assert_eq!(
        failure.message.as_deref(),
        Some("  Expected: 0\n  But was:  1\n")
    );
    assert!(
        failure
            .stack_trace
            .as_deref()
            .expect("stack trace present")
            .contains("FailUntil(String fileName, Int32 retries)")
    );
}

#[test]
fn canonical_serialization_round_trips() {
    let report = Report::parse(MOCK_REPORT.as_bytes()).expect("fixture parses");
    let output = report.to_string().expect("fixture serializes");
    assert_eq!(output, MOCK_REPORT);
}

#[test]
fn parent_index_spans_the_whole_fixture() {
    let report = Report::parse(MOCK_REPORT.as_bytes()).expect("fixture parses");
    let index = ParentIndex::build(&report);

    // Every case walks up through suites only, ending at the run.
    for case in report.test_cases() {
        let mut cursor = index.parent_of(case);
        let mut suites = 0;
        while let Some(id) = cursor {
            match &report.node(id).data {
                NodeData::Suite(_) => suites += 1,
                NodeData::Run(_) => break,
                other => panic!("unexpected ancestor {other:?}"),
            }
            cursor = index.parent_of(id);
        }
        assert_eq!(suites, 3);
        assert_eq!(cursor, Some(report.root()));
    }
}
