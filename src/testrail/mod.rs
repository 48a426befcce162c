//! TestRail run lifecycle: the stateful run client and the transport it talks through.

mod client;
#[cfg(test)]
pub(crate) mod fake;
mod http;

pub use client::RemoteRunClient;
pub use http::HttpTransport;

use std::fmt;
use std::future::Future;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("request to {endpoint} failed")]
    Transport {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{endpoint} returned HTTP {status}: {body}")]
    Status {
        endpoint: String,
        status: u16,
        body: String,
    },
    #[error("unexpected response from {endpoint}: {reason}")]
    Decode { endpoint: String, reason: String },
    #[error("no TestRail run has been created")]
    NoRun,
    #[error("TestRail run {0} is already finished")]
    RunFinished(u64),
    #[error("TestRail run {0} already exists")]
    AlreadyCreated(u64),
}

/// API v2 endpoints used over a run's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    AddRun { project_id: u64 },
    UpdateRun { run_id: u64 },
    AddResultsForCases { run_id: u64 },
    CloseRun { run_id: u64 },
    DeleteRun { run_id: u64 },
}

impl Endpoint {
    pub fn name(&self) -> &'static str {
        match self {
            Endpoint::AddRun { .. } => "add_run",
            Endpoint::UpdateRun { .. } => "update_run",
            Endpoint::AddResultsForCases { .. } => "add_results_for_cases",
            Endpoint::CloseRun { .. } => "close_run",
            Endpoint::DeleteRun { .. } => "delete_run",
        }
    }

    fn target(&self) -> u64 {
        match *self {
            Endpoint::AddRun { project_id } => project_id,
            Endpoint::UpdateRun { run_id }
            | Endpoint::AddResultsForCases { run_id }
            | Endpoint::CloseRun { run_id }
            | Endpoint::DeleteRun { run_id } => run_id,
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.name(), self.target())
    }
}

/// Sends one authenticated POST to the API. An empty response body decodes to `Null`.
pub trait RunTransport: Send + Sync + 'static {
    fn post(
        &self,
        endpoint: &Endpoint,
        body: Option<serde_json::Value>,
    ) -> impl Future<Output = Result<serde_json::Value, RemoteError>> + Send;
}
