use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Args;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use cutover_core::CutoverConfig;
use cutover_gcloud::GcloudPlatform;
use cutover_health::{cancel_on, probe_client, shutdown_signal};
use cutover_rollout::{Controller, GateDecision, RunReport, Severity};

use crate::commands::append_to;
use crate::settings::{self, ImageArgs, ProbeArgs, TargetArgs};

#[derive(Args, Debug)]
pub struct DeployArgs {
    #[command(flatten)]
    pub target: TargetArgs,
    #[command(flatten)]
    pub image: ImageArgs,
    #[command(flatten)]
    pub probe: ProbeArgs,

    /// workflow_run event payload. When present the trigger gate decides
    /// whether to deploy.
    #[arg(long, env = "GITHUB_EVENT_PATH")]
    pub event: Option<PathBuf>,
    /// Deploy on events that carry no upstream workflow run.
    #[arg(long)]
    pub allow_manual: bool,
    /// Ignore the event payload and deploy unconditionally.
    #[arg(long)]
    pub no_gate: bool,

    /// Also write the JSON run report to this file.
    #[arg(long)]
    pub report: Option<PathBuf>,
    /// Append a markdown summary to this file.
    #[arg(long, env = "GITHUB_STEP_SUMMARY")]
    pub summary: Option<PathBuf>,
}

pub async fn run(args: DeployArgs, config: Option<CutoverConfig>) -> Result<ExitCode> {
    let config = config.as_ref();

    let mut head_sha = None;
    match (&args.event, args.no_gate) {
        (Some(path), false) => {
            let event = settings::load_event(path)?;
            match settings::gate(config, args.allow_manual).evaluate(&event) {
                GateDecision::Run { head_sha: sha } => head_sha = sha,
                GateDecision::Skip { reason } => {
                    let (target, _) = settings::resolve_target(&args.target, config)?;
                    info!(service = %target, %reason, "deploy skipped");
                    let report = RunReport::skipped(&target, &reason);
                    emit(&report, &args)?;
                    return Ok(ExitCode::from(report.exit_code()));
                }
            }
        }
        (Some(_), true) => info!("gate bypassed with --no-gate"),
        (None, _) => debug!("no event payload, gate not evaluated"),
    }

    let settings = settings::deploy_settings(
        &args.target,
        &args.image,
        &args.probe,
        config,
        head_sha.as_deref(),
    )?;

    let platform = GcloudPlatform::new().with_project(settings.project.clone());
    info!(gcloud = platform.binary(), project = ?settings.project, "using gcloud platform");
    let client = probe_client().context("building probe HTTP client")?;
    let controller = Controller::new(platform, client);

    let (cancel_tx, cancel_rx) = watch::channel(false);
    let signals = cancel_on(shutdown_signal(), cancel_tx);

    let result = controller.run(&settings.request, cancel_rx).await;
    signals.abort();

    match &result {
        Ok(outcome) => info!(
            revision = %outcome.revision,
            digest = %outcome.digest(),
            "deploy succeeded"
        ),
        Err(e) if e.severity() >= Severity::Critical => {
            error!(error = %e, "deploy run left an unverified revision serving")
        }
        Err(e) => warn!(error = %e, outcome = %e.kind(), "deploy run failed"),
    }

    let report = RunReport::from_result(&settings.request, &result);
    emit(&report, &args)?;
    Ok(ExitCode::from(report.exit_code()))
}

/// Print the report and copy it wherever the flags ask.
fn emit(report: &RunReport, args: &DeployArgs) -> Result<()> {
    let json = report.to_json()?;
    println!("{json}");

    if let Some(path) = &args.report {
        std::fs::write(path, format!("{json}\n"))
            .with_context(|| format!("writing report {}", path.display()))?;
    }
    if let Some(path) = &args.summary {
        append_to(path, &report.to_markdown())?;
    }
    Ok(())
}
