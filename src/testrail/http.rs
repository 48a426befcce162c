use super::{Endpoint, RemoteError, RunTransport};
use crate::config::TestRailConfig;
use anyhow::{Context, Result};
use reqwest::header::CONTENT_TYPE;
use std::future::Future;

/// reqwest-backed transport: HTTP Basic auth, JSON bodies, one request per call.
pub struct HttpTransport {
    http: reqwest::Client,
    base_url: String,
    username: String,
    password: String,
}

impl HttpTransport {
    pub fn new(cfg: &TestRailConfig) -> Result<Self> {
        Self::with_base_url(cfg.api_base(), cfg)
    }

    pub fn with_base_url(base_url: String, cfg: &TestRailConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(format!("testrail-reporter/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            http,
            base_url,
            username: cfg.username.clone(),
            password: cfg.password.clone(),
        })
    }
}

impl RunTransport for HttpTransport {
    fn post(
        &self,
        endpoint: &Endpoint,
        body: Option<serde_json::Value>,
    ) -> impl Future<Output = Result<serde_json::Value, RemoteError>> + Send {
        let url = format!("{}/{}", self.base_url, endpoint);
        let mut req = self
            .http
            .post(url)
            .basic_auth(&self.username, Some(&self.password))
            .header(CONTENT_TYPE, "application/json");
        if let Some(body) = body {
            req = req.json(&body);
        }
        let endpoint = endpoint.to_string();

        async move {
            tracing::debug!(%endpoint, "POST");
            let resp = req.send().await.map_err(|source| RemoteError::Transport {
                endpoint: endpoint.clone(),
                source,
            })?;
            let status = resp.status();
            let text = resp.text().await.map_err(|source| RemoteError::Transport {
                endpoint: endpoint.clone(),
                source,
            })?;
            if !status.is_success() {
                return Err(RemoteError::Status {
                    endpoint,
                    status: status.as_u16(),
                    body: text,
                });
            }
            if text.trim().is_empty() {
                return Ok(serde_json::Value::Null);
            }
            serde_json::from_str(&text).map_err(|e| RemoteError::Decode {
                endpoint,
                reason: e.to_string(),
            })
        }
    }
}
