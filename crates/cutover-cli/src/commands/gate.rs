use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::Args;
use serde_json::json;

use cutover_core::CutoverConfig;
use cutover_rollout::GateDecision;

use crate::commands::append_to;
use crate::settings;

#[derive(Args, Debug)]
pub struct GateArgs {
    /// workflow_run event payload.
    #[arg(long, env = "GITHUB_EVENT_PATH")]
    pub event: PathBuf,
    /// Pass events that carry no upstream workflow run.
    #[arg(long)]
    pub allow_manual: bool,
    /// Step outputs file; receives `run=` and `head_sha=` lines.
    #[arg(long, env = "GITHUB_OUTPUT")]
    pub output: Option<PathBuf>,
}

pub fn run(args: GateArgs, config: Option<&CutoverConfig>) -> Result<ExitCode> {
    let event = settings::load_event(&args.event)?;
    let decision = settings::gate(config, args.allow_manual).evaluate(&event);

    let summary = match &decision {
        GateDecision::Run { head_sha } => json!({ "run": true, "head_sha": head_sha }),
        GateDecision::Skip { reason } => json!({ "run": false, "reason": reason }),
    };
    println!("{}", serde_json::to_string_pretty(&summary)?);

    if let Some(path) = &args.output {
        append_to(path, &step_outputs(&decision))?;
    }
    Ok(ExitCode::SUCCESS)
}

fn step_outputs(decision: &GateDecision) -> String {
    match decision {
        GateDecision::Run { head_sha } => {
            format!("run=true\nhead_sha={}\n", head_sha.as_deref().unwrap_or(""))
        }
        GateDecision::Skip { .. } => "run=false\n".to_string(),
    }
}
