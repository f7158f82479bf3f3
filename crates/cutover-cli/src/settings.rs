//! Merge cutover.toml with command-line flags. Flags win.

use std::path::Path;

use anyhow::{Context, Result, bail};
use clap::Args;
use tracing::debug;

use cutover_core::{CutoverConfig, GateConfig, ImageRef, ProbeConfig, ServiceTarget};
use cutover_health::ProbePolicy;
use cutover_rollout::{DeployRequest, Gate, WorkflowEvent};

pub const DEFAULT_CONFIG: &str = "cutover.toml";

/// Read the config file. An explicitly named file must exist; the default
/// one is optional.
pub fn load_config(path: Option<&Path>) -> Result<Option<CutoverConfig>> {
    match path {
        Some(path) => CutoverConfig::from_file(path)
            .with_context(|| format!("reading {}", path.display()))
            .map(Some),
        None => {
            let path = Path::new(DEFAULT_CONFIG);
            if path.is_file() {
                CutoverConfig::from_file(path)
                    .with_context(|| format!("reading {}", path.display()))
                    .map(Some)
            } else {
                debug!("no {DEFAULT_CONFIG} found, using flags only");
                Ok(None)
            }
        }
    }
}

/// The Cloud Run service to act on.
#[derive(Args, Debug, Clone, Default)]
pub struct TargetArgs {
    /// Cloud Run service name.
    #[arg(long, env = "CUTOVER_SERVICE")]
    pub service: Option<String>,
    /// Cloud Run region.
    #[arg(long, env = "CUTOVER_REGION")]
    pub region: Option<String>,
    /// GCP project passed to every gcloud call.
    #[arg(long, env = "CUTOVER_PROJECT")]
    pub project: Option<String>,
}

/// Which image to deploy.
#[derive(Args, Debug, Clone, Default)]
pub struct ImageArgs {
    /// Full image reference, tag or digest form.
    #[arg(long, conflicts_with = "tag")]
    pub image: Option<String>,
    /// Tag under the configured [image] repository. Defaults to the
    /// upstream run's head SHA.
    #[arg(long)]
    pub tag: Option<String>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct ProbeArgs {
    /// Path probed on the new revision.
    #[arg(long)]
    pub health_path: Option<String>,
    /// Per-attempt timeout, e.g. 5s.
    #[arg(long)]
    pub probe_timeout: Option<String>,
    #[arg(long)]
    pub probe_attempts: Option<u32>,
    /// Pause between attempts, e.g. 10s.
    #[arg(long)]
    pub probe_delay: Option<String>,
}

/// Service target and project, flags over file.
pub fn resolve_target(
    args: &TargetArgs,
    config: Option<&CutoverConfig>,
) -> Result<(ServiceTarget, Option<String>)> {
    let file = config.map(|c| &c.service);
    let Some(service) = args.service.clone().or_else(|| file.map(|s| s.name.clone())) else {
        bail!("no service given: pass --service or set [service] name in {DEFAULT_CONFIG}");
    };
    let Some(region) = args.region.clone().or_else(|| file.map(|s| s.region.clone())) else {
        bail!("no region given: pass --region or set [service] region in {DEFAULT_CONFIG}");
    };
    let project = args
        .project
        .clone()
        .or_else(|| file.and_then(|s| s.project.clone()));
    Ok((ServiceTarget::new(service, region), project))
}

/// The image reference to deploy. `head_sha` is the fallback tag.
pub fn resolve_image(
    args: &ImageArgs,
    config: Option<&CutoverConfig>,
    head_sha: Option<&str>,
) -> Result<ImageRef> {
    if let Some(image) = &args.image {
        return ImageRef::parse(image).with_context(|| format!("invalid --image {image}"));
    }

    let Some(repo) = config.and_then(|c| c.image.as_ref()) else {
        bail!("no image given: pass --image, or configure [image] and pass --tag");
    };
    let Some(tag) = args.tag.as_deref().or(head_sha) else {
        bail!("no tag given: pass --tag or run from a workflow_run event with a head SHA");
    };
    repo.image_for_tag(tag)
        .with_context(|| format!("invalid image for tag {tag}"))
}

/// Health path and retry policy.
pub fn resolve_probe(args: &ProbeArgs, config: Option<&CutoverConfig>) -> Result<(String, ProbePolicy)> {
    let mut probe = config.map(|c| c.probe.clone()).unwrap_or_else(ProbeConfig::default);
    if let Some(path) = &args.health_path {
        probe.path = path.clone();
    }
    if let Some(timeout) = &args.probe_timeout {
        probe.timeout = timeout.clone();
    }
    if let Some(attempts) = args.probe_attempts {
        probe.attempts = attempts;
    }
    if let Some(delay) = &args.probe_delay {
        probe.delay = delay.clone();
    }
    let policy = ProbePolicy::from_config(&probe).context("invalid probe settings")?;
    Ok((probe.path, policy))
}

pub fn gate(config: Option<&CutoverConfig>, allow_manual: bool) -> Gate {
    let gate = config.map(|c| c.gate.clone()).unwrap_or_else(GateConfig::default);
    Gate::from_config(&gate).allow_manual(allow_manual)
}

pub fn load_event(path: &Path) -> Result<WorkflowEvent> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("reading event payload {}", path.display()))?;
    WorkflowEvent::from_json(&json).with_context(|| format!("parsing {}", path.display()))
}

pub struct DeploySettings {
    pub request: DeployRequest,
    pub project: Option<String>,
}

pub fn deploy_settings(
    target: &TargetArgs,
    image: &ImageArgs,
    probe: &ProbeArgs,
    config: Option<&CutoverConfig>,
    head_sha: Option<&str>,
) -> Result<DeploySettings> {
    let (target, project) = resolve_target(target, config)?;
    let image = resolve_image(image, config, head_sha)?;
    let (health_path, probe) = resolve_probe(probe, config)?;
    Ok(DeploySettings {
        request: DeployRequest {
            image,
            target,
            health_path,
            probe,
        },
        project,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn config() -> CutoverConfig {
        let mut cfg = CutoverConfig::scaffold("sre-demo", "asia-northeast1", Some("proj"));
        cfg.probe.attempts = 4;
        cfg
    }

    #[test]
    fn config_fills_missing_flags() {
        let cfg = config();
        let s = deploy_settings(
            &TargetArgs::default(),
            &ImageArgs::default(),
            &ProbeArgs::default(),
            Some(&cfg),
            Some("abc123"),
        )
        .unwrap();

        assert_eq!(s.request.target, ServiceTarget::new("sre-demo", "asia-northeast1"));
        assert_eq!(s.project.as_deref(), Some("proj"));
        assert_eq!(
            s.request.image.to_string(),
            "asia-northeast1-docker.pkg.dev/proj/sre-demo/sre-demo:abc123"
        );
        assert_eq!(s.request.health_path, "/health");
        assert_eq!(s.request.probe.attempts, 4);
        assert_eq!(s.request.probe.delay, Duration::from_secs(10));
    }

    #[test]
    fn flags_override_config() {
        let cfg = config();
        let target = TargetArgs {
            service: Some("other".into()),
            region: None,
            project: Some("p2".into()),
        };
        let image = ImageArgs {
            image: None,
            tag: Some("v2".into()),
        };
        let probe = ProbeArgs {
            health_path: Some("/healthz".into()),
            probe_timeout: Some("2s".into()),
            probe_attempts: None,
            probe_delay: Some("500ms".into()),
        };
        let s = deploy_settings(&target, &image, &probe, Some(&cfg), Some("abc123")).unwrap();

        assert_eq!(s.request.target.service, "other");
        assert_eq!(s.request.target.region, "asia-northeast1");
        assert_eq!(s.project.as_deref(), Some("p2"));
        assert_eq!(s.request.image.tag.as_deref(), Some("v2"));
        assert_eq!(s.request.health_path, "/healthz");
        assert_eq!(s.request.probe.timeout, Duration::from_secs(2));
        assert_eq!(s.request.probe.delay, Duration::from_millis(500));
    }

    #[test]
    fn flags_alone_are_enough() {
        let target = TargetArgs {
            service: Some("app".into()),
            region: Some("us-central1".into()),
            project: None,
        };
        let image = ImageArgs {
            image: Some("gcr.io/p/app:abc".into()),
            tag: None,
        };
        let s = deploy_settings(&target, &image, &ProbeArgs::default(), None, None).unwrap();
        assert_eq!(s.request.image.to_string(), "gcr.io/p/app:abc");
        assert!(s.project.is_none());
    }

    #[test]
    fn missing_pieces_are_reported() {
        let err = resolve_target(&TargetArgs::default(), None).unwrap_err();
        assert!(err.to_string().contains("--service"));

        let err = resolve_image(&ImageArgs::default(), None, Some("abc")).unwrap_err();
        assert!(err.to_string().contains("--image"));

        let cfg = config();
        let err = resolve_image(&ImageArgs::default(), Some(&cfg), None).unwrap_err();
        assert!(err.to_string().contains("--tag"));
    }

    #[test]
    fn bad_probe_flags_fail() {
        let probe = ProbeArgs {
            probe_attempts: Some(0),
            ..ProbeArgs::default()
        };
        assert!(resolve_probe(&probe, None).is_err());

        let probe = ProbeArgs {
            probe_delay: Some("soon".into()),
            ..ProbeArgs::default()
        };
        assert!(resolve_probe(&probe, None).is_err());
    }

    #[test]
    fn explicit_config_must_exist() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_config(Some(&dir.path().join("missing.toml"))).is_err());

        let path = dir.path().join("cutover.toml");
        std::fs::write(&path, config().to_toml_string().unwrap()).unwrap();
        assert_eq!(load_config(Some(&path)).unwrap(), Some(config()));
    }

    #[test]
    fn event_file_is_parsed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("event.json");
        std::fs::write(
            &path,
            r#"{"workflow_run":{"conclusion":"success","head_branch":"main","head_sha":"abc123"}}"#,
        )
        .unwrap();
        let event = load_event(&path).unwrap();
        assert!(gate(None, false).evaluate(&event).should_run());
    }
}
