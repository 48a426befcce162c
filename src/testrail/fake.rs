//! In-memory transport that records every request and fails on demand.

use super::{Endpoint, RemoteError, RunTransport};
use crate::config::TestRailConfig;
use serde_json::{json, Value};
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub(crate) fn test_config() -> TestRailConfig {
    TestRailConfig {
        domain: "acme.testrail.io".into(),
        username: "ci@acme.io".into(),
        password: "secret".into(),
        project_id: 1,
        milestone_id: 2,
        suite_id: 3,
    }
}

#[derive(Debug, Clone)]
struct Call {
    endpoint: Endpoint,
    body: Option<Value>,
}

/// Shared view of the requests a `RecordingTransport` has seen.
#[derive(Clone, Default)]
pub(crate) struct CallLog(Arc<Mutex<Vec<Call>>>);

impl CallLog {
    pub fn endpoints(&self) -> Vec<String> {
        self.0.lock().unwrap().iter().map(|c| c.endpoint.to_string()).collect()
    }

    pub fn body(&self, index: usize) -> Option<Value> {
        self.0.lock().unwrap()[index].body.clone()
    }

    pub fn len(&self) -> usize {
        self.0.lock().unwrap().len()
    }
}

pub(crate) struct RecordingTransport {
    log: CallLog,
    run_id: Option<u64>,
    fail_on: Option<&'static str>,
    create_delay: Option<Duration>,
}

impl RecordingTransport {
    pub fn new(run_id: u64) -> (Self, CallLog) {
        let log = CallLog::default();
        let transport = Self {
            log: log.clone(),
            run_id: Some(run_id),
            fail_on: None,
            create_delay: None,
        };
        (transport, log)
    }

    /// Answer requests to the named endpoint with HTTP 500.
    pub fn failing_on(mut self, endpoint: &'static str) -> Self {
        self.fail_on = Some(endpoint);
        self
    }

    /// Answer `add_run` with a body lacking `id`.
    pub fn without_run_id(mut self) -> Self {
        self.run_id = None;
        self
    }

    pub fn with_create_delay(mut self, delay: Duration) -> Self {
        self.create_delay = Some(delay);
        self
    }
}

impl RunTransport for RecordingTransport {
    fn post(
        &self,
        endpoint: &Endpoint,
        body: Option<Value>,
    ) -> impl Future<Output = Result<Value, RemoteError>> + Send {
        self.log.0.lock().unwrap().push(Call {
            endpoint: *endpoint,
            body,
        });
        let is_create = matches!(endpoint, Endpoint::AddRun { .. });
        let result = if self.fail_on == Some(endpoint.name()) {
            Err(RemoteError::Status {
                endpoint: endpoint.to_string(),
                status: 500,
                body: "scripted failure".into(),
            })
        } else if is_create {
            Ok(self.run_id.map_or_else(|| json!({}), |id| json!({ "id": id })))
        } else {
            Ok(Value::Null)
        };
        let delay = self.create_delay.filter(|_| is_create);
        async move {
            if let Some(d) = delay {
                tokio::time::sleep(d).await;
            }
            result
        }
    }
}
