// Copyright (c) The nunit-repeat Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{
    errors::{ParseError, ReplaceCaseError, SerializeError},
    parse::parse_report,
    serialize::serialize_report,
};
use indexmap::map::IndexMap;
use std::{fmt, io};

/// Identifies a node within a [`Report`]'s arena.
///
/// Node ids are stable for the lifetime of a report: replacing a case's
/// content in place does not change its id, which is what allows a
/// [`ParentIndex`] built beforehand to stay usable afterwards.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct NodeId(u32);

impl NodeId {
    pub(crate) fn new(index: usize) -> Self {
        NodeId(index as u32)
    }

    /// Returns the arena slot for this id.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// An NUnit 3 test report: a `test-run` root with nested `test-suite`
/// elements, `test-case` leaves, `failure` annotations and a verbatim
/// passthrough for anything else NUnit writes.
///
/// Nodes live in an arena indexed by [`NodeId`]; slot 0 is always the
/// `test-run` root for reports produced by [`Report::parse`]. Subtrees made
/// unreachable by [`Report::replace_case`] are left in the arena and simply
/// never serialized.
#[derive(Clone, Debug)]
pub struct Report {
    nodes: Vec<ReportNode>,
}

impl Report {
    pub(crate) fn empty() -> Self {
        Report { nodes: Vec::new() }
    }

    /// Parses a report from XML bytes.
    ///
    /// Fails with [`ParseError`] if the input is not a well-formed `test-run`
    /// tree: wrong root element, missing `passed`/`failed`/`result` on a run
    /// or suite, missing `fullname` on a case, or truncated XML.
    pub fn parse(input: &[u8]) -> Result<Self, ParseError> {
        parse_report(input)
    }

    /// Serializes this report to the given writer.
    pub fn serialize(&self, writer: impl io::Write) -> Result<(), SerializeError> {
        serialize_report(self, writer)
    }

    /// Serializes this report to a string.
    pub fn to_string(&self) -> Result<String, SerializeError> {
        let mut buf: Vec<u8> = vec![];
        self.serialize(&mut buf)?;
        String::from_utf8(buf)
            .map_err(|err| quick_xml::Error::NonDecodable(Some(err.utf8_error())).into())
    }

    /// Returns the id of the `test-run` root.
    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    /// Returns the node with the given id.
    ///
    /// # Panics
    ///
    /// Panics if `id` did not come from this report.
    pub fn node(&self, id: NodeId) -> &ReportNode {
        &self.nodes[id.index()]
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut ReportNode {
        &mut self.nodes[id.index()]
    }

    /// Returns the number of arena slots, including unreachable ones.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub(crate) fn push_node(&mut self, data: NodeData) -> NodeId {
        let id = NodeId::new(self.nodes.len());
        self.nodes.push(ReportNode {
            data,
            children: Vec::new(),
        });
        id
    }

    /// Returns the case payload for `id`, or `None` if the node is not a
    /// `test-case`.
    pub fn case(&self, id: NodeId) -> Option<&Case> {
        match &self.node(id).data {
            NodeData::Case(case) => Some(case),
            _ => None,
        }
    }

    /// Returns the aggregate payload for `id`, or `None` if the node is not
    /// a `test-run` or `test-suite`.
    pub fn summary(&self, id: NodeId) -> Option<&Summary> {
        match &self.node(id).data {
            NodeData::Run(summary) | NodeData::Suite(summary) => Some(summary),
            _ => None,
        }
    }

    /// Returns all `test-case` nodes reachable from the root, in document
    /// order. The returned list is an owned snapshot, safe to iterate while
    /// the tree is mutated.
    pub fn test_cases(&self) -> Vec<NodeId> {
        let mut cases = Vec::new();
        if self.nodes.is_empty() {
            return cases;
        }
        let mut stack = vec![self.root()];
        while let Some(id) = stack.pop() {
            match &self.node(id).data {
                NodeData::Case(_) => cases.push(id),
                _ => stack.extend(self.node(id).children.iter().rev().copied()),
            }
        }
        cases
    }

    /// Returns a snapshot of the cases currently marked `Failed`, in
    /// document order.
    pub fn failed_cases(&self) -> Vec<NodeId> {
        self.test_cases()
            .into_iter()
            .filter(|&id| {
                self.case(id)
                    .is_some_and(|case| case.result == TestResult::Failed)
            })
            .collect()
    }

    /// Returns true if any case anywhere in the tree is marked `Failed`.
    pub fn has_failures(&self) -> bool {
        !self.failed_cases().is_empty()
    }

    /// Replaces `target`'s content (result, attributes, children) with that
    /// of `source_case` from another report, keeping `target`'s position in
    /// the tree.
    ///
    /// `target`'s id is unchanged, so a [`ParentIndex`] built before the
    /// replacement still resolves its ancestors. The old subtree under
    /// `target` becomes unreachable; the arena does not reclaim it.
    pub fn replace_case(
        &mut self,
        target: NodeId,
        source: &Report,
        source_case: NodeId,
    ) -> Result<(), ReplaceCaseError> {
        let data = match &source.node(source_case).data {
            NodeData::Case(case) => case.clone(),
            _ => return Err(ReplaceCaseError::SourceNotACase),
        };
        if !matches!(self.node(target).data, NodeData::Case(_)) {
            return Err(ReplaceCaseError::TargetNotACase);
        }
        let children: Vec<NodeId> = source
            .node(source_case)
            .children
            .iter()
            .map(|&child| self.graft_from(source, child))
            .collect();
        let node = self.node_mut(target);
        node.data = NodeData::Case(data);
        node.children = children;
        Ok(())
    }

    /// Deep-copies a subtree of `source` into this report's arena, returning
    /// the id of the copied root.
    fn graft_from(&mut self, source: &Report, id: NodeId) -> NodeId {
        let children: Vec<NodeId> = source
            .node(id)
            .children
            .iter()
            .map(|&child| self.graft_from(source, child))
            .collect();
        let new_id = self.push_node(source.node(id).data.clone());
        self.node_mut(new_id).children = children;
        new_id
    }

    /// Adjusts a run or suite after exactly one of its descendant cases
    /// flipped from failed to passed on a rerun: `failed` is decremented,
    /// `passed` incremented, and once `failed` reaches zero the node's result
    /// becomes `Passed` and any `failure` annotations attached directly to it
    /// are removed.
    ///
    /// No-op for nodes that are not a run or suite.
    pub fn record_rerun_pass(&mut self, id: NodeId) {
        let summary = match &mut self.node_mut(id).data {
            NodeData::Run(summary) | NodeData::Suite(summary) => summary,
            _ => return,
        };
        summary.failed = summary.failed.saturating_sub(1);
        summary.passed += 1;
        if summary.failed > 0 {
            return;
        }
        summary.result = TestResult::Passed;
        let children = std::mem::take(&mut self.node_mut(id).children);
        let children = children
            .into_iter()
            .filter(|&child| !matches!(self.node(child).data, NodeData::Failure(_)))
            .collect();
        self.node_mut(id).children = children;
    }

    /// Propagates a single failed-to-passed flip from `case` up the tree:
    /// every contiguous `test-suite` ancestor is adjusted via
    /// [`record_rerun_pass`](Self::record_rerun_pass), then the walk
    /// continues upward until the `test-run` node, which is adjusted exactly
    /// once — even when the case had no suite ancestors at all.
    ///
    /// Silently does nothing beyond the suites if no run ancestor is
    /// reachable, as can happen for a subtree detached from the index.
    pub fn propagate_rerun_pass(&mut self, index: &ParentIndex, case: NodeId) {
        let mut cursor = index.parent_of(case);
        while let Some(id) = cursor {
            if !matches!(self.node(id).data, NodeData::Suite(_)) {
                break;
            }
            self.record_rerun_pass(id);
            cursor = index.parent_of(id);
        }
        while let Some(id) = cursor {
            if matches!(self.node(id).data, NodeData::Run(_)) {
                self.record_rerun_pass(id);
                return;
            }
            cursor = index.parent_of(id);
        }
    }
}

/// A single node in a [`Report`]'s tree.
#[derive(Clone, Debug)]
pub struct ReportNode {
    /// The node's typed payload.
    pub data: NodeData,

    /// Child nodes, in document order.
    pub children: Vec<NodeId>,
}

/// The payload of a [`ReportNode`], keyed by element tag.
#[derive(Clone, Debug)]
pub enum NodeData {
    /// The `test-run` root.
    Run(Summary),

    /// A `test-suite` element. Suites nest arbitrarily.
    Suite(Summary),

    /// A `test-case` leaf.
    Case(Case),

    /// A `failure` annotation. NUnit attaches these both to failed cases and
    /// to the suites and run above them.
    Failure(Failure),

    /// Any other element (`command-line`, `environment`, `settings`,
    /// `properties`, `output`, `reason`, ...), preserved verbatim.
    Other(Raw),
}

/// Aggregate state shared by the `test-run` root and `test-suite` elements.
#[derive(Clone, Debug)]
pub struct Summary {
    /// The number of descendant cases that passed.
    pub passed: u64,

    /// The number of descendant cases that failed.
    pub failed: u64,

    /// The element's overall result.
    pub result: TestResult,

    /// All other attributes (`id`, `total`, `testcasecount`,
    /// `inconclusive`, ...), in document order. Never interpreted, only
    /// written back out.
    pub extra: IndexMap<String, String>,
}

/// A single executed test.
#[derive(Clone, Debug)]
pub struct Case {
    /// The fully qualified test name. Unique within one report; reruns are
    /// matched against it.
    pub full_name: String,

    /// The case's result.
    pub result: TestResult,

    /// All other attributes (`id`, `name`, `methodname`, `duration`, ...),
    /// in document order.
    pub extra: IndexMap<String, String>,
}

/// A `failure` annotation: the message and stack trace NUnit records for a
/// failed case, and echoes on the suites above it.
#[derive(Clone, Debug, Default)]
pub struct Failure {
    /// The failure message, from the `message` child element.
    pub message: Option<String>,

    /// The stack trace, from the `stack-trace` child element.
    pub stack_trace: Option<String>,
}

/// An element this crate does not interpret, carried through unchanged.
#[derive(Clone, Debug)]
pub struct Raw {
    /// The element's tag name.
    pub name: String,

    /// The element's attributes, in document order.
    pub attrs: IndexMap<String, String>,

    /// The element's text payload, if any.
    pub text: Option<RawText>,
}

/// Text content of a [`Raw`] element, remembering whether it was a CDATA
/// section so it round-trips the way NUnit wrote it.
#[derive(Clone, Debug)]
pub struct RawText {
    /// The decoded text.
    pub value: String,

    /// True if the text was a CDATA section.
    pub cdata: bool,
}

/// The result recorded on a run, suite or case.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum TestResult {
    /// The element passed.
    Passed,

    /// The element failed.
    Failed,

    /// Any other status (`Skipped`, `Inconclusive`, `Warning`, ...). Passed
    /// through unmodified and never counted by the merge logic.
    Other(String),
}

impl TestResult {
    pub(crate) fn from_attr(value: &str) -> Self {
        match value {
            "Passed" => TestResult::Passed,
            "Failed" => TestResult::Failed,
            other => TestResult::Other(other.to_owned()),
        }
    }

    /// Returns the status as NUnit spells it in the `result` attribute.
    pub fn as_str(&self) -> &str {
        match self {
            TestResult::Passed => "Passed",
            TestResult::Failed => "Failed",
            TestResult::Other(other) => other,
        }
    }
}

impl fmt::Display for TestResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A side table mapping each node to its immediate container.
///
/// NUnit reports only encode downward edges, while counter propagation needs
/// to walk upward. The index is built fresh from a report snapshot and lives
/// outside the [`Report`] itself, so it cannot leak into serialized output;
/// dropping it at the end of a merge pass is all the cleanup there is.
///
/// Nodes grafted into the arena after the index was built have no entry and
/// read back as detached.
#[derive(Clone, Debug)]
pub struct ParentIndex {
    parents: Vec<Option<NodeId>>,
}

impl ParentIndex {
    /// Walks the tree depth-first and records every node's parent.
    pub fn build(report: &Report) -> Self {
        let mut parents = vec![None; report.node_count()];
        if report.node_count() > 0 {
            let mut stack = vec![report.root()];
            while let Some(id) = stack.pop() {
                for &child in &report.node(id).children {
                    parents[child.index()] = Some(id);
                    stack.push(child);
                }
            }
        }
        ParentIndex { parents }
    }

    /// Returns the parent of `id`, or `None` for the root and for nodes
    /// unknown to this index.
    pub fn parent_of(&self, id: NodeId) -> Option<NodeId> {
        self.parents.get(id.index()).copied().flatten()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;

    static NESTED: &str = indoc! {r#"
        <?xml version="1.0" encoding="utf-8"?>
        <test-run result="Failed" passed="1" failed="1" id="2">
          <test-suite result="Failed" passed="1" failed="1" name="Outer">
            <failure>
              <message><![CDATA[One or more child tests had errors]]></message>
            </failure>
            <test-suite result="Failed" passed="0" failed="1" name="Inner">
              <test-case fullname="Outer.Inner.A" result="Failed" id="1-1">
                <failure>
                  <message><![CDATA[boom]]></message>
                </failure>
              </test-case>
            </test-suite>
            <test-suite result="Passed" passed="1" failed="0" name="Calm">
              <test-case fullname="Outer.Calm.B" result="Passed" id="1-2"/>
            </test-suite>
          </test-suite>
        </test-run>
    "#};

    static RERUN: &str = indoc! {r#"
        <?xml version="1.0" encoding="utf-8"?>
        <test-run result="Passed" passed="1" failed="0" id="3">
          <test-suite result="Passed" passed="1" failed="0" name="Inner">
            <test-case fullname="Outer.Inner.A" result="Passed" id="1-1">
              <output><![CDATA[second time lucky]]></output>
            </test-case>
          </test-suite>
        </test-run>
    "#};

    fn failed_case(report: &Report) -> NodeId {
        *report
            .failed_cases()
            .first()
            .expect("report has a failed case")
    }

    fn rerun_case(rerun: &Report) -> NodeId {
        *rerun.test_cases().first().expect("rerun has a case")
    }

    #[test]
    fn parent_index_resolves_ancestors() {
        let report = Report::parse(NESTED.as_bytes()).expect("report parses");
        let index = ParentIndex::build(&report);

        assert_eq!(index.parent_of(report.root()), None);

        let case = failed_case(&report);
        let inner = index.parent_of(case).expect("case has a parent");
        assert_eq!(report.summary(inner).expect("suite").extra["name"], "Inner");
        let outer = index.parent_of(inner).expect("suite has a parent");
        assert_eq!(report.summary(outer).expect("suite").extra["name"], "Outer");
        assert_eq!(index.parent_of(outer), Some(report.root()));
    }

    #[test]
    fn replace_case_keeps_identity_and_position() {
        let mut report = Report::parse(NESTED.as_bytes()).expect("report parses");
        let rerun = Report::parse(RERUN.as_bytes()).expect("rerun parses");

        let target = failed_case(&report);
        let index = ParentIndex::build(&report);
        let parent_before = index.parent_of(target);

        report
            .replace_case(target, &rerun, rerun_case(&rerun))
            .expect("replacement succeeds");

        let case = report.case(target).expect("target is still a case");
        assert_eq!(case.result, TestResult::Passed);
        assert_eq!(case.full_name, "Outer.Inner.A");
        // The index keys on node ids, so the swapped node keeps its parent.
        assert_eq!(index.parent_of(target), parent_before);
        // The grafted output child is reachable from the target.
        let child = report.node(target).children[0];
        match &report.node(child).data {
            NodeData::Other(raw) => assert_eq!(raw.name, "output"),
            other => panic!("expected output element, got {other:?}"),
        }
    }

    #[test]
    fn replace_case_rejects_non_case_nodes() {
        let mut report = Report::parse(NESTED.as_bytes()).expect("report parses");
        let rerun = Report::parse(RERUN.as_bytes()).expect("rerun parses");

        let root = report.root();
        assert!(matches!(
            report.replace_case(root, &rerun, rerun_case(&rerun)),
            Err(ReplaceCaseError::TargetNotACase)
        ));

        let target = failed_case(&report);
        let rerun_root = rerun.root();
        assert!(matches!(
            report.replace_case(target, &rerun, rerun_root),
            Err(ReplaceCaseError::SourceNotACase)
        ));
        // The failed target was left untouched.
        assert_eq!(
            report.case(target).expect("still a case").result,
            TestResult::Failed
        );
    }

    #[test]
    fn propagation_adjusts_every_ancestor_once() {
        let mut report = Report::parse(NESTED.as_bytes()).expect("report parses");
        let rerun = Report::parse(RERUN.as_bytes()).expect("rerun parses");

        let target = failed_case(&report);
        let index = ParentIndex::build(&report);
        report
            .replace_case(target, &rerun, rerun_case(&rerun))
            .expect("replacement succeeds");
        report.propagate_rerun_pass(&index, target);

        let inner = index.parent_of(target).expect("inner suite");
        let outer = index.parent_of(inner).expect("outer suite");
        let root = report.root();

        for (id, passed) in [(inner, 1), (outer, 2), (root, 2)] {
            let summary = report.summary(id).expect("aggregate node");
            assert_eq!(summary.failed, 0, "failed count at {id:?}");
            assert_eq!(summary.passed, passed, "passed count at {id:?}");
            assert_eq!(summary.result, TestResult::Passed);
        }

        // The outer suite's failure annotation is gone now that it has no
        // failed descendants.
        let outer_children = &report.node(outer).children;
        assert!(
            outer_children
                .iter()
                .all(|&child| !matches!(report.node(child).data, NodeData::Failure(_))),
            "failure annotation should have been removed"
        );

        // The sibling suite was never touched.
        let calm = *outer_children
            .iter()
            .find(|&&child| {
                report
                    .summary(child)
                    .is_some_and(|summary| summary.extra["name"] == "Calm")
            })
            .expect("sibling suite present");
        let calm_summary = report.summary(calm).expect("suite");
        assert_eq!((calm_summary.passed, calm_summary.failed), (1, 0));

        assert!(!report.has_failures());
    }

    #[test]
    fn record_rerun_pass_ignores_leaf_nodes() {
        let mut report = Report::parse(NESTED.as_bytes()).expect("report parses");
        let case = failed_case(&report);
        report.record_rerun_pass(case);
        assert_eq!(
            report.case(case).expect("still a case").result,
            TestResult::Failed
        );
    }
}
