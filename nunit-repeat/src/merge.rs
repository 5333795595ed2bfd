// Copyright (c) The nunit-repeat Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Merge a rerun's results back into the base report.

use quick_nunit::{NodeId, ParentIndex, ReplaceCaseError, Report, TestResult};
use thiserror::Error;

/// An error produced while merging a rerun report into the base report.
///
/// These indicate a broken contract with the external runner, not a
/// transient condition; the retry loop aborts on them.
#[derive(Debug, Error)]
pub enum MergeError {
    /// A failed case from the base report has no match in the rerun report.
    #[error("test case `{full_name}` not found in the rerun report")]
    CaseNotFound { full_name: String },

    /// A failed case matched several rerun cases; `fullname` is supposed to
    /// be unique within one report.
    #[error("test case `{full_name}` matched {count} cases in the rerun report")]
    AmbiguousCase { full_name: String, count: usize },

    /// The matched rerun node could not replace the base case.
    #[error(transparent)]
    Replace(#[from] ReplaceCaseError),
}

/// Finds the single case named `full_name` in a rerun report.
///
/// The rerun was asked to execute exactly the listed cases, one each, so
/// zero or multiple matches mean the runner executed something other than
/// what was requested.
pub fn find_corresponding_case(rerun: &Report, full_name: &str) -> Result<NodeId, MergeError> {
    let matches: Vec<NodeId> = rerun
        .test_cases()
        .into_iter()
        .filter(|&id| {
            rerun
                .case(id)
                .is_some_and(|case| case.full_name == full_name)
        })
        .collect();
    match matches.as_slice() {
        [id] => Ok(*id),
        [] => Err(MergeError::CaseNotFound {
            full_name: full_name.to_owned(),
        }),
        _ => Err(MergeError::AmbiguousCase {
            full_name: full_name.to_owned(),
            count: matches.len(),
        }),
    }
}

/// Merges rerun results into `base`.
///
/// Every case that was failing in `base` and passed on the rerun has its
/// content replaced with the rerun's, and the counters of every suite above
/// it plus the run root are corrected. Cases that failed again are left
/// untouched and remain candidates for the next round. Returns the number of
/// cases that flipped to passed.
pub fn merge_rerun(base: &mut Report, rerun: &Report) -> Result<usize, MergeError> {
    // The parent index is scoped to this pass. Replacement keeps node ids
    // stable, so it stays valid while the tree is edited underneath it.
    let index = ParentIndex::build(base);
    let mut fixed = 0;

    // failed_cases is an owned snapshot: iteration is unaffected by the
    // replacements below.
    for target in base.failed_cases() {
        let Some(case) = base.case(target) else {
            continue;
        };
        let full_name = case.full_name.clone();
        let source = find_corresponding_case(rerun, &full_name)?;
        let passed = rerun
            .case(source)
            .is_some_and(|case| case.result == TestResult::Passed);
        if !passed {
            continue;
        }
        base.replace_case(target, rerun, source)?;
        base.propagate_rerun_pass(&index, target);
        fixed += 1;
    }
    Ok(fixed)
}
