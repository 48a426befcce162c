//! End-of-session pipeline.
//!
//! Finalization is a fixed sequence of named steps run in order; the first failure stops the
//! sequence and is recorded in the report. Remote failures never escape as errors.

use crate::model::RunDescriptor;
use crate::testrail::{RemoteError, RemoteRunClient, RunTransport};
use std::error::Error as _;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Step {
    /// Resolved by the create task spawned at `start`; fails when no run exists.
    CreateRun,
    UpdateRun,
    PublishResults,
    CloseRun,
    DeleteRun,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Step::CreateRun => "create run",
            Step::UpdateRun => "update run",
            Step::PublishResults => "publish results",
            Step::CloseRun => "close run",
            Step::DeleteRun => "delete run",
        })
    }
}

const PUBLISH_PIPELINE: [Step; 4] = [
    Step::CreateRun,
    Step::UpdateRun,
    Step::PublishResults,
    Step::CloseRun,
];
const DISCARD_PIPELINE: [Step; 2] = [Step::CreateRun, Step::DeleteRun];

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct StepFailure {
    pub step: Step,
    pub reason: String,
}

/// What finalization did, for presentation layers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct FinalizeReport {
    pub results: usize,
    pub cases: usize,
    pub unmatched: usize,
    pub completed: Vec<Step>,
    pub failure: Option<StepFailure>,
    pub run_url: Option<String>,
}

impl FinalizeReport {
    /// True when no result matched a case and the run was slated for deletion.
    pub fn discarded(&self) -> bool {
        self.results == 0
    }

    pub fn step_failed(step: Step, reason: String) -> Self {
        Self {
            failure: Some(StepFailure { step, reason }),
            ..Default::default()
        }
    }
}

/// Render an error together with its source chain.
fn describe(err: &RemoteError) -> String {
    let mut out = err.to_string();
    let mut source = err.source();
    while let Some(s) = source {
        out.push_str(": ");
        out.push_str(&s.to_string());
        source = s.source();
    }
    out
}

/// Publish `run` (or delete it when empty) through `client`.
pub(crate) async fn finalize_run<T: RunTransport>(
    client: &mut RemoteRunClient<T>,
    run: &RunDescriptor,
) -> FinalizeReport {
    let case_ids = run.case_ids();
    let mut report = FinalizeReport {
        results: run.results().len(),
        cases: case_ids.len(),
        ..Default::default()
    };

    let steps: &[Step] = if report.discarded() {
        tracing::warn!("no test title references a TestRail case (Cxxx); deleting the empty run");
        &DISCARD_PIPELINE
    } else {
        &PUBLISH_PIPELINE
    };

    for &step in steps {
        let outcome = match step {
            Step::CreateRun => client.handle().map(drop).ok_or(RemoteError::NoRun),
            Step::UpdateRun => {
                client
                    .update(&run.name, &run.description, &case_ids)
                    .await
            }
            Step::PublishResults => client
                .publish_results(run.results())
                .await
                .map(|url| report.run_url = Some(url)),
            Step::CloseRun => client.close().await,
            Step::DeleteRun => client.delete().await,
        };
        match outcome {
            Ok(()) => report.completed.push(step),
            Err(e) => {
                let reason = describe(&e);
                tracing::error!(%step, error = %reason, "TestRail step failed, skipping the rest");
                report.failure = Some(StepFailure { step, reason });
                break;
            }
        }
    }
    report
}
