// Copyright (c) The nunit-repeat Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Serialize a [`Report`].
//!
//! Output is canonical rather than byte-preserving: the typed attributes
//! (`result`, counters, `fullname`) come first, then the passthrough
//! attributes in their original order. Serializing the same tree twice
//! always yields identical bytes.

use crate::{
    errors::SerializeError,
    report::{Case, Failure, NodeData, NodeId, Raw, RawText, Report, Summary},
};
use quick_xml::{
    events::{BytesCData, BytesDecl, BytesEnd, BytesStart, BytesText, Event},
    Writer,
};
use std::io;

pub(crate) const TEST_RUN_TAG: &str = "test-run";
pub(crate) const TEST_SUITE_TAG: &str = "test-suite";
pub(crate) const TEST_CASE_TAG: &str = "test-case";
pub(crate) const FAILURE_TAG: &str = "failure";
pub(crate) const MESSAGE_TAG: &str = "message";
pub(crate) const STACK_TRACE_TAG: &str = "stack-trace";

pub(crate) const RESULT_ATTR: &str = "result";
pub(crate) const PASSED_ATTR: &str = "passed";
pub(crate) const FAILED_ATTR: &str = "failed";
pub(crate) const FULLNAME_ATTR: &str = "fullname";

pub(crate) fn serialize_report(
    report: &Report,
    writer: impl io::Write,
) -> Result<(), SerializeError> {
    let mut xml = Writer::new_with_indent(writer, b' ', 2);

    let decl = BytesDecl::new("1.0", Some("utf-8"), None);
    xml.write_event(Event::Decl(decl))?;

    if report.node_count() > 0 {
        serialize_node(report, report.root(), &mut xml)?;
    }

    // Add a trailing newline.
    let mut inner = xml.into_inner();
    inner.write_all(b"\n")?;
    Ok(())
}

fn serialize_node<W: io::Write>(
    report: &Report,
    id: NodeId,
    writer: &mut Writer<W>,
) -> Result<(), SerializeError> {
    let node = report.node(id);
    match &node.data {
        NodeData::Run(summary) => {
            serialize_aggregate(report, TEST_RUN_TAG, summary, &node.children, writer)
        }
        NodeData::Suite(summary) => {
            serialize_aggregate(report, TEST_SUITE_TAG, summary, &node.children, writer)
        }
        NodeData::Case(case) => serialize_case(report, case, &node.children, writer),
        NodeData::Failure(failure) => serialize_failure(failure, writer),
        NodeData::Other(raw) => serialize_raw(report, raw, &node.children, writer),
    }
}

fn serialize_aggregate<W: io::Write>(
    report: &Report,
    tag: &'static str,
    summary: &Summary,
    children: &[NodeId],
    writer: &mut Writer<W>,
) -> Result<(), SerializeError> {
    let Summary {
        passed,
        failed,
        result,
        extra,
    } = summary;

    let mut tag_start = BytesStart::new(tag);
    tag_start.push_attribute((RESULT_ATTR, result.as_str()));
    tag_start.push_attribute((PASSED_ATTR, passed.to_string().as_str()));
    tag_start.push_attribute((FAILED_ATTR, failed.to_string().as_str()));
    for (k, v) in extra {
        tag_start.push_attribute((k.as_str(), v.as_str()));
    }

    write_element(report, tag_start, tag, children, None, writer)
}

fn serialize_case<W: io::Write>(
    report: &Report,
    case: &Case,
    children: &[NodeId],
    writer: &mut Writer<W>,
) -> Result<(), SerializeError> {
    let Case {
        full_name,
        result,
        extra,
    } = case;

    let mut tag_start = BytesStart::new(TEST_CASE_TAG);
    tag_start.push_attribute((FULLNAME_ATTR, full_name.as_str()));
    tag_start.push_attribute((RESULT_ATTR, result.as_str()));
    for (k, v) in extra {
        tag_start.push_attribute((k.as_str(), v.as_str()));
    }

    write_element(report, tag_start, TEST_CASE_TAG, children, None, writer)
}

fn serialize_failure<W: io::Write>(
    failure: &Failure,
    writer: &mut Writer<W>,
) -> Result<(), SerializeError> {
    let tag_start = BytesStart::new(FAILURE_TAG);
    if failure.message.is_none() && failure.stack_trace.is_none() {
        writer.write_event(Event::Empty(tag_start))?;
        return Ok(());
    }

    writer.write_event(Event::Start(tag_start))?;
    if let Some(message) = &failure.message {
        serialize_detail(MESSAGE_TAG, message, writer)?;
    }
    if let Some(stack_trace) = &failure.stack_trace {
        serialize_detail(STACK_TRACE_TAG, stack_trace, writer)?;
    }
    writer.write_event(Event::End(BytesEnd::new(FAILURE_TAG)))?;
    Ok(())
}

// Failure details are CDATA sections, the way the NUnit engine writes them.
fn serialize_detail<W: io::Write>(
    tag: &'static str,
    value: &str,
    writer: &mut Writer<W>,
) -> Result<(), SerializeError> {
    writer.write_event(Event::Start(BytesStart::new(tag)))?;
    writer.write_event(Event::CData(BytesCData::new(value)))?;
    writer.write_event(Event::End(BytesEnd::new(tag)))?;
    Ok(())
}

fn serialize_raw<W: io::Write>(
    report: &Report,
    raw: &Raw,
    children: &[NodeId],
    writer: &mut Writer<W>,
) -> Result<(), SerializeError> {
    let mut tag_start = BytesStart::new(raw.name.as_str());
    for (k, v) in &raw.attrs {
        tag_start.push_attribute((k.as_str(), v.as_str()));
    }
    write_element(report, tag_start, &raw.name, children, raw.text.as_ref(), writer)
}

fn write_element<W: io::Write>(
    report: &Report,
    tag_start: BytesStart<'_>,
    tag: &str,
    children: &[NodeId],
    text: Option<&RawText>,
    writer: &mut Writer<W>,
) -> Result<(), SerializeError> {
    if children.is_empty() && text.is_none() {
        writer.write_event(Event::Empty(tag_start))?;
        return Ok(());
    }

    writer.write_event(Event::Start(tag_start))?;
    if let Some(text) = text {
        if text.cdata {
            writer.write_event(Event::CData(BytesCData::new(text.value.as_str())))?;
        } else {
            writer.write_event(Event::Text(BytesText::new(text.value.as_str())))?;
        }
    }
    for &child in children {
        serialize_node(report, child, writer)?;
    }
    writer.write_event(Event::End(BytesEnd::new(tag)))?;
    Ok(())
}
