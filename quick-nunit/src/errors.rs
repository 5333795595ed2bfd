// Copyright (c) The nunit-repeat Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::str::Utf8Error;
use thiserror::Error;

/// An error that occurs while parsing an NUnit report.
///
/// Returned by [`Report::parse`](crate::Report::parse). Any input that is not
/// a well-formed `test-run` tree is rejected with one of these variants.
#[derive(Debug, Error)]
pub enum ParseError {
    /// The underlying XML was malformed.
    #[error("error reading report XML")]
    Xml(#[from] quick_xml::Error),

    /// A tag or attribute name was not valid UTF-8.
    #[error("report XML is not valid UTF-8")]
    InvalidUtf8(#[from] Utf8Error),

    /// The document contained no elements at all.
    #[error("report contains no root element")]
    NoRootElement,

    /// The root element was not a `test-run`.
    #[error("unexpected root element `{tag}`, expected `test-run`")]
    UnexpectedRoot {
        /// The tag that was found instead.
        tag: String,
    },

    /// A required attribute was missing.
    #[error("`{tag}` element is missing the `{attribute}` attribute")]
    MissingAttribute {
        /// The element's tag.
        tag: &'static str,
        /// The attribute that was expected.
        attribute: &'static str,
    },

    /// An aggregate counter attribute did not hold a non-negative integer.
    #[error("invalid value `{value}` for `{attribute}` on `{tag}`")]
    InvalidCounter {
        /// The element's tag.
        tag: &'static str,
        /// The counter attribute.
        attribute: &'static str,
        /// The value that failed to parse.
        value: String,
        /// The underlying parse error.
        #[source]
        source: std::num::ParseIntError,
    },

    /// An element appeared somewhere the NUnit format does not allow it.
    #[error("unexpected `{tag}` element inside `{parent}`")]
    UnexpectedElement {
        /// The offending tag.
        tag: String,
        /// The tag of the enclosing element.
        parent: &'static str,
    },

    /// The document ended with elements still open.
    #[error("unexpected end of input with `{tag}` still open")]
    UnexpectedEof {
        /// The innermost unclosed tag.
        tag: String,
    },
}

/// An error that occurs while serializing a [`Report`](crate::Report).
///
/// Returned by [`Report::serialize`](crate::Report::serialize) and
/// [`Report::to_string`](crate::Report::to_string).
#[derive(Debug, Error)]
#[error("error serializing NUnit report")]
pub struct SerializeError {
    #[from]
    inner: quick_xml::Error,
}

impl From<std::io::Error> for SerializeError {
    fn from(err: std::io::Error) -> Self {
        SerializeError {
            inner: quick_xml::Error::Io(std::sync::Arc::new(err)),
        }
    }
}

/// An error that occurs when replacing a test case's content in place.
///
/// Returned by [`Report::replace_case`](crate::Report::replace_case) when one
/// of the nodes involved is not actually a `test-case`.
#[derive(Debug, Error)]
pub enum ReplaceCaseError {
    /// The node being replaced is not a test case.
    #[error("replacement target is not a test case")]
    TargetNotACase,

    /// The node providing the new content is not a test case.
    #[error("replacement source is not a test case")]
    SourceNotACase,
}
