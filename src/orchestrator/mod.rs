//! Reporting-session orchestration.
//!
//! This module owns the run state machine (start/pass/fail/end) and the end-of-session
//! pipeline that publishes or discards the remote run. The CLI layer feeds runner events in
//! and presents the resulting report.

mod controller;
mod finalize;

pub(crate) use controller::{RunOrchestrator, RunState};
pub(crate) use finalize::{FinalizeReport, Step};
