// Copyright (c) The nunit-repeat Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Read, edit and write NUnit 3 XML test reports in Rust.
//!
//! The centerpiece is [`Report`], an arena-backed tree of the elements that
//! make up a `TestResult.xml` file: a `test-run` root, nested `test-suite`
//! elements, `test-case` leaves, `failure` annotations, and a verbatim
//! passthrough for everything else. [`ParentIndex`] provides the upward
//! traversal NUnit's format doesn't encode, so aggregate pass/fail counters
//! can be corrected after individual cases are re-run.

mod errors;
mod parse;
mod report;
mod serialize;

pub use errors::*;
pub use report::*;
