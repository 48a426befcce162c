use super::{Endpoint, RemoteError, RunTransport};
use crate::config::TestRailConfig;
use crate::model::CaseResult;
use serde::Deserialize;
use serde_json::json;

/// Id the service assigned to the created run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunHandle(pub u64);

#[derive(Deserialize)]
struct CreatedRun {
    id: u64,
}

/// Proxy for the single run this process reports into.
///
/// Holds no handle until `create` succeeds. `close` and `delete` are terminal: once either
/// succeeds every further operation fails without touching the network.
pub struct RemoteRunClient<T> {
    transport: T,
    cfg: TestRailConfig,
    handle: Option<RunHandle>,
    finished: bool,
}

impl<T: RunTransport> RemoteRunClient<T> {
    pub fn new(transport: T, cfg: TestRailConfig) -> Self {
        Self {
            transport,
            cfg,
            handle: None,
            finished: false,
        }
    }

    pub fn handle(&self) -> Option<RunHandle> {
        self.handle
    }

    fn active_run(&self) -> Result<u64, RemoteError> {
        match self.handle {
            None => Err(RemoteError::NoRun),
            Some(RunHandle(id)) if self.finished => Err(RemoteError::RunFinished(id)),
            Some(RunHandle(id)) => Ok(id),
        }
    }

    /// Create the run covering the whole suite.
    pub async fn create(&mut self, name: &str, description: &str) -> Result<RunHandle, RemoteError> {
        if let Some(RunHandle(id)) = self.handle {
            return Err(RemoteError::AlreadyCreated(id));
        }
        let endpoint = Endpoint::AddRun {
            project_id: self.cfg.project_id,
        };
        let body = json!({
            "suite_id": self.cfg.suite_id,
            "name": name,
            "description": description,
            "milestone_id": self.cfg.milestone_id,
            "include_all": true,
        });
        let resp = self.transport.post(&endpoint, Some(body)).await?;
        let created: CreatedRun =
            serde_json::from_value(resp).map_err(|e| RemoteError::Decode {
                endpoint: endpoint.to_string(),
                reason: e.to_string(),
            })?;
        let handle = RunHandle(created.id);
        self.handle = Some(handle);
        tracing::info!(run_id = created.id, "created TestRail run");
        Ok(handle)
    }

    /// Narrow the run to the listed cases.
    pub async fn update(
        &self,
        name: &str,
        description: &str,
        case_ids: &[u64],
    ) -> Result<(), RemoteError> {
        let run_id = self.active_run()?;
        let body = json!({
            "suite_id": self.cfg.suite_id,
            "name": name,
            "description": description,
            "include_all": false,
            "case_ids": case_ids,
        });
        self.transport
            .post(&Endpoint::UpdateRun { run_id }, Some(body))
            .await?;
        tracing::info!(run_id, cases = case_ids.len(), "updated TestRail run");
        Ok(())
    }

    /// Publish results and return the browser link to the run.
    pub async fn publish_results(&self, results: &[CaseResult]) -> Result<String, RemoteError> {
        let run_id = self.active_run()?;
        let body = json!({ "results": results });
        self.transport
            .post(&Endpoint::AddResultsForCases { run_id }, Some(body))
            .await?;
        tracing::info!(run_id, results = results.len(), "published results");
        Ok(self.cfg.run_url(run_id))
    }

    pub async fn close(&mut self) -> Result<(), RemoteError> {
        let run_id = self.active_run()?;
        self.transport.post(&Endpoint::CloseRun { run_id }, None).await?;
        self.finished = true;
        tracing::info!(run_id, "closed TestRail run");
        Ok(())
    }

    pub async fn delete(&mut self) -> Result<(), RemoteError> {
        let run_id = self.active_run()?;
        self.transport.post(&Endpoint::DeleteRun { run_id }, None).await?;
        self.finished = true;
        tracing::info!(run_id, "deleted TestRail run");
        Ok(())
    }
}
