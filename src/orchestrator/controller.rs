//! Run lifecycle controller.
//!
//! Consumes runner events in arrival order and owns the accumulated results. The remote run
//! is created in a background task at `start` so results keep accumulating while the request
//! is in flight; `end` waits for that task before finalizing.

use super::finalize::{finalize_run, FinalizeReport, Step};
use crate::case_id::extract_case_ids;
use crate::model::{RunDescriptor, RunnerEvent, Status, TestInfo};
use crate::testrail::{RemoteRunClient, RunTransport};
use time::OffsetDateTime;
use tokio::task::JoinHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RunState {
    Idle,
    Running,
    Finalizing,
    Terminal,
}

pub(crate) struct RunOrchestrator<T> {
    state: RunState,
    build_number: String,
    run_label: String,
    client: Option<RemoteRunClient<T>>,
    creating: Option<JoinHandle<RemoteRunClient<T>>>,
    run: RunDescriptor,
    unmatched: usize,
}

impl<T: RunTransport> RunOrchestrator<T> {
    pub fn new(client: RemoteRunClient<T>, build_number: String, run_label: String) -> Self {
        Self {
            state: RunState::Idle,
            build_number,
            run_label,
            client: Some(client),
            creating: None,
            run: RunDescriptor::default(),
            unmatched: 0,
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn run(&self) -> &RunDescriptor {
        &self.run
    }

    /// Route one runner event. Yields the finalize report once `end` has been handled.
    pub async fn handle(&mut self, event: RunnerEvent) -> Option<FinalizeReport> {
        match event {
            RunnerEvent::Start => {
                let now = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());
                self.start(now);
                None
            }
            RunnerEvent::Pass(test) => {
                self.record(&test, Status::Passed);
                None
            }
            RunnerEvent::Fail(test) => {
                self.record(&test, Status::Failed);
                None
            }
            RunnerEvent::End => self.finish().await,
        }
    }

    /// Name the run and start creating it remotely.
    pub fn start(&mut self, at: OffsetDateTime) {
        if self.state != RunState::Idle {
            tracing::debug!(state = ?self.state, "ignoring start");
            return;
        }
        let Some(mut client) = self.client.take() else {
            return;
        };
        self.run = RunDescriptor::for_build(&self.build_number, &self.run_label, at);
        let name = self.run.name.clone();
        let description = self.run.description.clone();
        self.creating = Some(tokio::spawn(async move {
            if let Err(e) = client.create(&name, &description).await {
                tracing::error!(error = %e, "failed to create TestRail run");
            }
            client
        }));
        self.state = RunState::Running;
    }

    fn record(&mut self, test: &TestInfo, status: Status) {
        if self.state != RunState::Running {
            tracing::debug!(title = %test.title, state = ?self.state, "ignoring result");
            return;
        }
        let case_ids = extract_case_ids(&test.title);
        if case_ids.is_empty() {
            self.unmatched += 1;
            return;
        }
        let comment = match status {
            Status::Failed => test
                .err
                .as_ref()
                .map(|e| e.message().to_string())
                .unwrap_or_default(),
            _ => format!("Execution time: {}ms", test.duration.unwrap_or(0)),
        };
        tracing::debug!(title = %test.title, ?case_ids, ?status, "recorded result");
        self.run.record(&case_ids, status, &comment);
    }

    /// Finalize the remote run: publish when anything matched, delete otherwise.
    pub async fn finish(&mut self) -> Option<FinalizeReport> {
        if self.state != RunState::Running {
            tracing::debug!(state = ?self.state, "ignoring end");
            return None;
        }
        self.state = RunState::Finalizing;

        let client = match self.creating.take() {
            Some(task) => match task.await {
                Ok(client) => Some(client),
                Err(e) => {
                    tracing::error!(error = %e, "TestRail run creation task failed");
                    None
                }
            },
            None => self.client.take(),
        };

        let mut report = match client {
            Some(mut client) => {
                let report = finalize_run(&mut client, &self.run).await;
                self.client = Some(client);
                report
            }
            None => {
                let mut report =
                    FinalizeReport::step_failed(Step::CreateRun, "run creation task was lost".into());
                report.results = self.run.results().len();
                report.cases = self.run.case_ids().len();
                report
            }
        };
        report.unmatched = self.unmatched;
        self.state = RunState::Terminal;
        Some(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TestError;
    use crate::testrail::fake::{test_config, CallLog, RecordingTransport};
    use std::time::Duration;

    fn orchestrator(transport: RecordingTransport) -> RunOrchestrator<RecordingTransport> {
        RunOrchestrator::new(
            RemoteRunClient::new(transport, test_config()),
            "1234".into(),
            "TA UI E2E".into(),
        )
    }

    fn passed(title: &str, duration: u64) -> RunnerEvent {
        RunnerEvent::Pass(TestInfo {
            title: title.into(),
            duration: Some(duration),
            err: None,
        })
    }

    fn failed(title: &str, message: &str) -> RunnerEvent {
        RunnerEvent::Fail(TestInfo {
            title: title.into(),
            duration: None,
            err: Some(TestError::Message(message.into())),
        })
    }

    async fn drive(
        orch: &mut RunOrchestrator<RecordingTransport>,
        events: Vec<RunnerEvent>,
    ) -> Option<FinalizeReport> {
        let mut last = None;
        for ev in events {
            last = orch.handle(ev).await;
        }
        last
    }

    fn setup(run_id: u64) -> (RecordingTransport, CallLog) {
        RecordingTransport::new(run_id)
    }

    #[tokio::test]
    async fn passing_test_records_duration() {
        let (transport, _log) = setup(1);
        let mut orch = orchestrator(transport);
        drive(&mut orch, vec![RunnerEvent::Start, passed("Login succeeds C123", 42)]).await;

        let results = orch.run().results();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].case_id, 123);
        assert_eq!(results[0].status, Status::Passed);
        assert_eq!(results[0].comment, "Execution time: 42ms");
        assert_eq!(orch.state(), RunState::Running);
    }

    #[tokio::test]
    async fn failing_test_records_message() {
        let (transport, _log) = setup(1);
        let mut orch = orchestrator(transport);
        drive(
            &mut orch,
            vec![RunnerEvent::Start, failed("Checkout C9", "expected 200 but got 500")],
        )
        .await;

        let results = orch.run().results();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].status, Status::Failed);
        assert_eq!(results[0].comment, "expected 200 but got 500");
    }

    #[tokio::test]
    async fn untracked_titles_are_dropped() {
        let (transport, _log) = setup(1);
        let mut orch = orchestrator(transport);
        drive(
            &mut orch,
            vec![RunnerEvent::Start, failed("No reference here", "x"), passed("Nor here", 1)],
        )
        .await;
        assert!(orch.run().results().is_empty());
        assert_eq!(orch.unmatched, 2);
    }

    #[tokio::test]
    async fn multiple_references_fan_out() {
        let (transport, _log) = setup(1);
        let mut orch = orchestrator(transport);
        drive(&mut orch, vec![RunnerEvent::Start, passed("C1 and C2 scenario", 7)]).await;

        let results = orch.run().results();
        let ids: Vec<u64> = results.iter().map(|r| r.case_id).collect();
        assert_eq!(ids, vec![1, 2]);
        assert!(results.iter().all(|r| r.status == Status::Passed));
        assert!(results.iter().all(|r| r.comment == "Execution time: 7ms"));
    }

    #[tokio::test]
    async fn full_session_publishes_and_closes() {
        let (transport, log) = setup(40);
        let mut orch = orchestrator(transport);
        let report = drive(
            &mut orch,
            vec![
                RunnerEvent::Start,
                passed("C1 login", 5),
                failed("C2 logout", "nope"),
                passed("C1 login again", 6),
                passed("untracked", 1),
                RunnerEvent::End,
            ],
        )
        .await
        .unwrap();

        assert_eq!(
            log.endpoints(),
            vec!["add_run/1", "update_run/40", "add_results_for_cases/40", "close_run/40"]
        );
        assert_eq!(log.body(1).unwrap()["case_ids"], serde_json::json!([1, 2]));
        assert_eq!(
            log.body(2).unwrap()["results"],
            serde_json::json!([
                { "case_id": 1, "status_id": 1, "comment": "Execution time: 5ms" },
                { "case_id": 2, "status_id": 5, "comment": "nope" },
                { "case_id": 1, "status_id": 1, "comment": "Execution time: 6ms" },
            ])
        );
        assert_eq!((report.results, report.cases, report.unmatched), (3, 2, 1));
        assert!(report.failure.is_none());
        assert_eq!(orch.state(), RunState::Terminal);
    }

    #[tokio::test]
    async fn empty_session_deletes_the_run() {
        let (transport, log) = setup(40);
        let mut orch = orchestrator(transport);
        let report = drive(
            &mut orch,
            vec![RunnerEvent::Start, passed("no refs", 1), RunnerEvent::End],
        )
        .await
        .unwrap();

        assert_eq!(log.endpoints(), vec!["add_run/1", "delete_run/40"]);
        assert!(report.discarded());
        assert_eq!(report.unmatched, 1);
    }

    #[tokio::test]
    async fn update_failure_suppresses_publish_and_close() {
        let (transport, log) = setup(40);
        let mut orch = orchestrator(transport.failing_on("update_run"));
        let report = drive(
            &mut orch,
            vec![RunnerEvent::Start, passed("C5", 1), RunnerEvent::End],
        )
        .await
        .unwrap();

        assert_eq!(log.endpoints(), vec!["add_run/1", "update_run/40"]);
        assert_eq!(report.failure.unwrap().step, Step::UpdateRun);
        assert_eq!(orch.state(), RunState::Terminal);
    }

    #[tokio::test]
    async fn failed_create_skips_every_remote_step() {
        let (transport, log) = setup(40);
        let mut orch = orchestrator(transport.failing_on("add_run"));
        let report = drive(
            &mut orch,
            vec![RunnerEvent::Start, passed("C5", 1), RunnerEvent::End],
        )
        .await
        .unwrap();

        assert_eq!(log.endpoints(), vec!["add_run/1"]);
        assert_eq!(report.failure.unwrap().step, Step::CreateRun);
    }

    #[tokio::test]
    async fn results_accumulate_while_create_is_pending() {
        let (transport, log) = setup(40);
        let mut orch = orchestrator(transport.with_create_delay(Duration::from_millis(50)));
        orch.handle(RunnerEvent::Start).await;
        orch.handle(passed("C3 quick", 1)).await;
        orch.handle(failed("C4 quick", "bad")).await;
        assert_eq!(orch.run().results().len(), 2);

        let report = orch.handle(RunnerEvent::End).await.unwrap();
        assert!(report.failure.is_none());
        assert_eq!(
            log.endpoints(),
            vec!["add_run/1", "update_run/40", "add_results_for_cases/40", "close_run/40"]
        );
    }

    #[tokio::test]
    async fn events_outside_a_running_session_are_ignored() {
        let (transport, log) = setup(40);
        let mut orch = orchestrator(transport);

        orch.handle(passed("C1 early", 1)).await;
        assert!(orch.handle(RunnerEvent::End).await.is_none());
        assert_eq!(orch.state(), RunState::Idle);
        assert!(orch.run().results().is_empty());

        drive(&mut orch, vec![RunnerEvent::Start, passed("C1", 1), RunnerEvent::End]).await;
        orch.handle(RunnerEvent::Start).await;
        orch.handle(passed("C2 late", 1)).await;
        assert!(orch.handle(RunnerEvent::End).await.is_none());

        assert_eq!(orch.run().results().len(), 1);
        assert_eq!(log.endpoints().iter().filter(|e| e.starts_with("add_run")).count(), 1);
    }

    #[tokio::test]
    async fn run_is_named_from_build_number() {
        let (transport, log) = setup(40);
        let mut orch = orchestrator(transport);
        orch.start(time::macros::datetime!(2024-01-02 03:04 UTC));
        orch.finish().await;

        assert_eq!(
            orch.run().name,
            "2024-01-02, 03:04 (+00:00) , TA UI E2E, Travis Build: #1234"
        );
        assert_eq!(log.body(0).unwrap()["description"], "Travis Build Number: 1234");
    }
}
