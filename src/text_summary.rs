//! Console text for the host-facing reporter.
//!
//! Per-test lines mirror a spec-style reporter; the session summary announces where the
//! results went or why they did not.

use crate::model::RunnerEvent;
use crate::orchestrator::{FinalizeReport, Step};

const HEADER: &str = "(TestRail Reporter)";
const NO_MATCH_WARNING: &str =
    "No testcases were matched. Ensure that your tests are declared correctly and matches Cxxx";

/// Pre-formatted lines for text output, split by destination stream.
pub(crate) struct TextSummary {
    pub lines: Vec<String>,
    pub warnings: Vec<String>,
}

/// Spec-style line for a finished test.
pub(crate) fn spec_line(event: &RunnerEvent) -> Option<String> {
    match event {
        RunnerEvent::Pass(t) => Some(match t.duration {
            Some(ms) => format!("  ✓ {} ({ms}ms)", t.title),
            None => format!("  ✓ {}", t.title),
        }),
        RunnerEvent::Fail(t) => Some(match t.err.as_ref().map(|e| e.message()) {
            Some(msg) if !msg.is_empty() => format!("  ✗ {}\n      {msg}", t.title),
            _ => format!("  ✗ {}", t.title),
        }),
        RunnerEvent::Start | RunnerEvent::End => None,
    }
}

/// Summarize a finalized session.
pub(crate) fn build_text_summary(report: &FinalizeReport) -> TextSummary {
    let mut lines = vec![String::new(), HEADER.to_string()];
    let mut warnings = Vec::new();

    if report.discarded() {
        warnings.push(NO_MATCH_WARNING.to_string());
        if report.completed.contains(&Step::DeleteRun) {
            lines.push(" - Removed the empty TestRail run".to_string());
        }
    }
    if let Some(url) = report.run_url.as_deref() {
        lines.push(format!(" - Results are published to {url}"));
    }
    if let Some(failure) = report.failure.as_ref() {
        warnings.push(format!("TestRail {} failed: {}", failure.step, failure.reason));
    }

    lines.push(format!(
        "TestRail: {} result(s) for {} case(s), {} test(s) without a case reference",
        report.results, report.cases, report.unmatched
    ));

    TextSummary { lines, warnings }
}
