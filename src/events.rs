//! Runner event intake.
//!
//! Events arrive as newline-delimited JSON in mocha's `json-stream` shape:
//! `["pass", {"title": "...", "duration": 42}]`. Event names other than start, pass, fail and
//! end are skipped.

use crate::model::RunnerEvent;
use anyhow::{Context, Result};
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::mpsc;

/// Parse one line. Blank lines and unhandled event names yield `None`.
pub fn parse_event_line(line: &str) -> Result<Option<RunnerEvent>> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let (name, payload): (String, serde_json::Value) =
        serde_json::from_str(line).context("expected a [name, payload] event")?;
    let event = match name.as_str() {
        "start" => RunnerEvent::Start,
        "pass" => RunnerEvent::Pass(
            serde_json::from_value(payload).context("invalid pass event payload")?,
        ),
        "fail" => RunnerEvent::Fail(
            serde_json::from_value(payload).context("invalid fail event payload")?,
        ),
        "end" => RunnerEvent::End,
        _ => return Ok(None),
    };
    Ok(Some(event))
}

async fn pump<R: AsyncRead + Unpin>(reader: R, tx: mpsc::UnboundedSender<RunnerEvent>) -> Result<()> {
    let mut lines = BufReader::new(reader).lines();
    let mut line_no = 0usize;
    while let Some(line) = lines.next_line().await.context("failed to read runner events")? {
        line_no += 1;
        match parse_event_line(&line) {
            Ok(Some(ev)) => {
                if tx.send(ev).is_err() {
                    break;
                }
            }
            Ok(None) => {}
            Err(e) => {
                let reason = format!("{e:#}");
                tracing::warn!(line = line_no, error = %reason, "skipping malformed event");
            }
        }
    }
    Ok(())
}

/// Read events from `input` (stdin when `None`) on a background task.
pub fn spawn_event_reader(
    input: Option<PathBuf>,
) -> (
    mpsc::UnboundedReceiver<RunnerEvent>,
    tokio::task::JoinHandle<Result<()>>,
) {
    let (tx, rx) = mpsc::unbounded_channel::<RunnerEvent>();
    let handle = tokio::spawn(async move {
        match input {
            Some(path) => {
                let file = tokio::fs::File::open(&path)
                    .await
                    .with_context(|| format!("failed to open {}", path.display()))?;
                pump(file, tx).await
            }
            None => pump(tokio::io::stdin(), tx).await,
        }
    });
    (rx, handle)
}
