// Copyright (c) The nunit-repeat Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Retry failed NUnit tests until they pass or retries run out.
//!
//! `nunit-repeat` wraps an NUnit console runner: it runs the suite once,
//! then repeatedly re-runs just the failing tests via the runner's
//! `--testlist` mechanism, merging each rerun's XML results back into the
//! base report. The final `TestResult.xml` reflects the best-known outcome
//! of every test, with suite and run counters corrected to match.

mod dispatch;
mod errors;
mod merge;
mod output;
mod retry;

pub use dispatch::NunitRepeatApp;
pub use errors::*;
pub use merge::*;
pub use output::{OutputContext, StderrStyles};
pub use retry::*;
