// Copyright (c) The nunit-repeat Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Parse NUnit XML into a [`Report`].

use crate::{
    errors::ParseError,
    report::{Case, Failure, NodeData, NodeId, Raw, RawText, Report, Summary, TestResult},
    serialize::{
        FAILED_ATTR, FAILURE_TAG, FULLNAME_ATTR, MESSAGE_TAG, PASSED_ATTR, RESULT_ATTR,
        STACK_TRACE_TAG, TEST_CASE_TAG, TEST_RUN_TAG, TEST_SUITE_TAG,
    },
};
use indexmap::map::IndexMap;
use quick_xml::{
    events::{BytesStart, Event},
    Reader,
};

/// An entry on the open-element stack.
///
/// `message` and `stack-trace` inside a `failure` element fill the failure's
/// fields rather than becoming nodes of their own, so they get a dedicated
/// frame kind.
#[derive(Clone, Copy)]
enum Frame {
    Node(NodeId),
    FailureDetail { failure: NodeId, field: DetailField },
}

#[derive(Clone, Copy)]
enum DetailField {
    Message,
    StackTrace,
}

impl DetailField {
    fn tag(self) -> &'static str {
        match self {
            DetailField::Message => MESSAGE_TAG,
            DetailField::StackTrace => STACK_TRACE_TAG,
        }
    }
}

pub(crate) fn parse_report(input: &[u8]) -> Result<Report, ParseError> {
    let mut reader = Reader::from_reader(input);
    reader.trim_text(true);

    let mut report = Report::empty();
    let mut stack: Vec<Frame> = Vec::new();
    let mut seen_root = false;
    let mut buf = Vec::new();

    loop {
        buf.clear();
        match reader.read_event_into(&mut buf)? {
            Event::Decl(_) | Event::Comment(_) | Event::PI(_) | Event::DocType(_) => {}
            Event::Start(start) => {
                let frame = open_element(&mut report, &stack, &start, &mut seen_root)?;
                stack.push(frame);
            }
            Event::Empty(start) => {
                // Open and immediately close; the frame carries no state that
                // outlives the element.
                open_element(&mut report, &stack, &start, &mut seen_root)?;
            }
            Event::Text(text) => {
                append_text(&mut report, &stack, text.unescape()?.into_owned(), false);
            }
            Event::CData(cdata) => {
                let value = std::str::from_utf8(&cdata.into_inner())?.to_owned();
                append_text(&mut report, &stack, value, true);
            }
            Event::End(_) => {
                stack.pop();
            }
            Event::Eof => break,
        }
    }

    if let Some(frame) = stack.last() {
        return Err(ParseError::UnexpectedEof {
            tag: frame_tag(&report, frame),
        });
    }
    if !seen_root {
        return Err(ParseError::NoRootElement);
    }
    Ok(report)
}

fn open_element(
    report: &mut Report,
    stack: &[Frame],
    start: &BytesStart<'_>,
    seen_root: &mut bool,
) -> Result<Frame, ParseError> {
    let tag = std::str::from_utf8(start.name().as_ref())?.to_owned();

    match stack.last() {
        Some(&Frame::Node(parent))
            if matches!(report.node(parent).data, NodeData::Failure(_)) =>
        {
            let field = match tag.as_str() {
                MESSAGE_TAG => DetailField::Message,
                STACK_TRACE_TAG => DetailField::StackTrace,
                _ => {
                    return Err(ParseError::UnexpectedElement {
                        tag,
                        parent: FAILURE_TAG,
                    });
                }
            };
            return Ok(Frame::FailureDetail {
                failure: parent,
                field,
            });
        }
        Some(&Frame::FailureDetail { field, .. }) => {
            return Err(ParseError::UnexpectedElement {
                tag,
                parent: field.tag(),
            });
        }
        _ => {}
    }

    let attrs = collect_attrs(start)?;
    let data = match tag.as_str() {
        TEST_RUN_TAG => NodeData::Run(parse_summary(TEST_RUN_TAG, attrs)?),
        TEST_SUITE_TAG => NodeData::Suite(parse_summary(TEST_SUITE_TAG, attrs)?),
        TEST_CASE_TAG => NodeData::Case(parse_case(attrs)?),
        FAILURE_TAG => NodeData::Failure(Failure::default()),
        _ => NodeData::Other(Raw {
            name: tag.clone(),
            attrs,
            text: None,
        }),
    };

    match stack.last() {
        Some(&Frame::Node(parent)) => {
            let id = report.push_node(data);
            report.node_mut(parent).children.push(id);
            Ok(Frame::Node(id))
        }
        Some(&Frame::FailureDetail { .. }) => unreachable!("handled above"),
        None => {
            if *seen_root {
                return Err(ParseError::UnexpectedElement {
                    tag,
                    parent: "document",
                });
            }
            if !matches!(data, NodeData::Run(_)) {
                return Err(ParseError::UnexpectedRoot { tag });
            }
            *seen_root = true;
            Ok(Frame::Node(report.push_node(data)))
        }
    }
}

fn append_text(report: &mut Report, stack: &[Frame], value: String, cdata: bool) {
    match stack.last() {
        Some(&Frame::FailureDetail { failure, field }) => {
            if let NodeData::Failure(detail) = &mut report.node_mut(failure).data {
                let slot = match field {
                    DetailField::Message => &mut detail.message,
                    DetailField::StackTrace => &mut detail.stack_trace,
                };
                match slot {
                    Some(existing) => existing.push_str(&value),
                    None => *slot = Some(value),
                }
            }
        }
        Some(&Frame::Node(id)) => {
            if let NodeData::Other(raw) = &mut report.node_mut(id).data {
                match &mut raw.text {
                    Some(text) => text.value.push_str(&value),
                    None => raw.text = Some(RawText { value, cdata }),
                }
            }
            // Text under runs, suites and cases is indentation whitespace;
            // trim_text already dropped most of it and the rest is ignored.
        }
        None => {}
    }
}

fn collect_attrs(start: &BytesStart<'_>) -> Result<IndexMap<String, String>, ParseError> {
    let mut attrs = IndexMap::new();
    for attr in start.attributes() {
        let attr = attr.map_err(quick_xml::Error::from)?;
        let key = std::str::from_utf8(attr.key.as_ref())?.to_owned();
        let value = attr.unescape_value()?.into_owned();
        attrs.insert(key, value);
    }
    Ok(attrs)
}

fn parse_summary(
    tag: &'static str,
    mut attrs: IndexMap<String, String>,
) -> Result<Summary, ParseError> {
    let result = take_result(tag, &mut attrs)?;
    let passed = take_counter(tag, &mut attrs, PASSED_ATTR)?;
    let failed = take_counter(tag, &mut attrs, FAILED_ATTR)?;
    Ok(Summary {
        passed,
        failed,
        result,
        extra: attrs,
    })
}

fn parse_case(mut attrs: IndexMap<String, String>) -> Result<Case, ParseError> {
    let full_name =
        attrs
            .shift_remove(FULLNAME_ATTR)
            .ok_or(ParseError::MissingAttribute {
                tag: TEST_CASE_TAG,
                attribute: FULLNAME_ATTR,
            })?;
    let result = take_result(TEST_CASE_TAG, &mut attrs)?;
    Ok(Case {
        full_name,
        result,
        extra: attrs,
    })
}

fn take_result(
    tag: &'static str,
    attrs: &mut IndexMap<String, String>,
) -> Result<TestResult, ParseError> {
    let value = attrs
        .shift_remove(RESULT_ATTR)
        .ok_or(ParseError::MissingAttribute {
            tag,
            attribute: RESULT_ATTR,
        })?;
    Ok(TestResult::from_attr(&value))
}

fn take_counter(
    tag: &'static str,
    attrs: &mut IndexMap<String, String>,
    attribute: &'static str,
) -> Result<u64, ParseError> {
    let value = attrs
        .shift_remove(attribute)
        .ok_or(ParseError::MissingAttribute { tag, attribute })?;
    value
        .parse()
        .map_err(|source| ParseError::InvalidCounter {
            tag,
            attribute,
            value,
            source,
        })
}

fn frame_tag(report: &Report, frame: &Frame) -> String {
    match frame {
        Frame::Node(id) => match &report.node(*id).data {
            NodeData::Run(_) => TEST_RUN_TAG.to_owned(),
            NodeData::Suite(_) => TEST_SUITE_TAG.to_owned(),
            NodeData::Case(_) => TEST_CASE_TAG.to_owned(),
            NodeData::Failure(_) => FAILURE_TAG.to_owned(),
            NodeData::Other(raw) => raw.name.clone(),
        },
        Frame::FailureDetail { field, .. } => field.tag().to_owned(),
    }
}
