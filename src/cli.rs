use crate::config::{ConfigError, ReporterOptions, Settings};
use crate::events::spawn_event_reader;
use crate::orchestrator::{RunOrchestrator, RunState};
use crate::testrail::{HttpTransport, RemoteRunClient};
use anyhow::{Context, Result};
use clap::Parser;
use std::io::Write;
use std::path::PathBuf;
use tokio::sync::mpsc;

/// Output line routing for stdout/stderr writer.
enum OutputLine {
    Stdout(String),
    Stderr(String),
}

/// Spawn a blocking writer for stdout/stderr to avoid blocking async tasks.
fn spawn_output_writer() -> (
    mpsc::UnboundedSender<OutputLine>,
    tokio::task::JoinHandle<()>,
) {
    let (tx, mut rx) = mpsc::unbounded_channel::<OutputLine>();
    let handle = tokio::task::spawn_blocking(move || {
        let stdout = std::io::stdout();
        let stderr = std::io::stderr();
        let mut out = std::io::LineWriter::new(stdout.lock());
        let mut err = std::io::LineWriter::new(stderr.lock());

        while let Some(line) = rx.blocking_recv() {
            match line {
                OutputLine::Stdout(msg) => {
                    let _ = writeln!(out, "{}", msg);
                }
                OutputLine::Stderr(msg) => {
                    let _ = writeln!(err, "{}", msg);
                }
            }
        }

        let _ = out.flush();
        let _ = err.flush();
    });
    (tx, handle)
}

#[derive(Debug, Parser, Clone)]
#[command(
    name = "testrail-reporter",
    version,
    about = "Publish test runner results (mocha json-stream events) to a TestRail run"
)]
pub struct Cli {
    /// Read runner events from this file instead of stdin
    #[arg(long)]
    pub input: Option<PathBuf>,

    /// JSON file holding `reporterOptions` (cypress.json layout) or the bare options object
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// CI build number; reporting to TestRail is enabled only when set
    #[arg(long, env = "TRAVIS_BUILD_NUMBER")]
    pub build_number: Option<String>,

    /// TestRail host, e.g. example.testrail.io
    #[arg(long, env = "TESTRAIL_DOMAIN")]
    pub domain: Option<String>,

    #[arg(long, env = "TESTRAIL_USERNAME")]
    pub username: Option<String>,

    /// Password or API key
    #[arg(long, env = "TESTRAIL_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    #[arg(long, env = "TESTRAIL_PROJECT_ID")]
    pub project_id: Option<u64>,

    #[arg(long, env = "TESTRAIL_MILESTONE_ID")]
    pub milestone_id: Option<u64>,

    #[arg(long, env = "TESTRAIL_SUITE_ID")]
    pub suite_id: Option<u64>,

    /// Label placed in the run name between the timestamp and the build number
    #[arg(long, default_value = "TA UI E2E")]
    pub run_label: String,

    /// Suppress per-test lines; TestRail messages are still printed
    #[arg(long)]
    pub silent: bool,

    /// Debug-level diagnostics on stderr
    #[arg(short, long)]
    pub verbose: bool,

    /// Errors only on stderr
    #[arg(short, long)]
    pub quiet: bool,
}

impl Cli {
    fn flag_options(&self) -> ReporterOptions {
        ReporterOptions {
            domain: self.domain.clone(),
            username: self.username.clone(),
            password: self.password.clone(),
            project_id: self.project_id,
            milestone_id: self.milestone_id,
            suite_id: self.suite_id,
        }
    }

    /// File options overlaid with flags; `None` when neither supplied anything.
    fn collect_options(&self) -> Result<Option<ReporterOptions>, ConfigError> {
        let file = self
            .config
            .as_deref()
            .map(ReporterOptions::from_file)
            .transpose()?;
        let flags = self.flag_options();
        Ok(match file {
            Some(file) => Some(file.merge(flags)),
            None if flags.is_empty() => None,
            None => Some(flags),
        })
    }
}

/// Resolve activation once. Options are only read when a build number is present.
pub fn build_settings(args: &Cli) -> Result<Settings, ConfigError> {
    let has_build = args
        .build_number
        .as_deref()
        .is_some_and(|b| !b.trim().is_empty());
    let options = if has_build {
        args.collect_options()?
    } else {
        None
    };
    Settings::resolve(args.build_number.clone(), args.run_label.clone(), options)
}

pub async fn run(args: Cli) -> Result<()> {
    let settings = build_settings(&args)?;

    let mut reporter = match settings.testrail.clone() {
        Some(testrail) if settings.enabled => {
            let transport = HttpTransport::new(&testrail)?;
            tracing::info!(build = %settings.build_number, domain = %testrail.domain, "TestRail reporting enabled");
            Some(RunOrchestrator::new(
                RemoteRunClient::new(transport, testrail),
                settings.build_number.clone(),
                settings.run_label.clone(),
            ))
        }
        _ => {
            tracing::info!("no build number set, TestRail reporting disabled");
            None
        }
    };

    let (out_tx, out_handle) = spawn_output_writer();
    let (mut evt_rx, reader) = spawn_event_reader(args.input.clone());

    while let Some(ev) = evt_rx.recv().await {
        if !args.silent {
            if let Some(line) = crate::text_summary::spec_line(&ev) {
                let _ = out_tx.send(OutputLine::Stdout(line));
            }
        }
        let Some(orchestrator) = reporter.as_mut() else {
            continue;
        };
        if let Some(report) = orchestrator.handle(ev).await {
            let summary = crate::text_summary::build_text_summary(&report);
            for line in summary.lines {
                let _ = out_tx.send(OutputLine::Stdout(line));
            }
            for warning in summary.warnings {
                let _ = out_tx.send(OutputLine::Stderr(warning));
            }
        }
    }

    if let Some(orchestrator) = reporter.as_ref() {
        if orchestrator.state() == RunState::Running {
            tracing::warn!(
                results = orchestrator.run().results().len(),
                "event stream closed before `end`, the TestRail run was left open"
            );
        }
    }

    drop(out_tx);
    let _ = out_handle.await;

    reader.await.context("event reader task failed")??;
    Ok(())
}
