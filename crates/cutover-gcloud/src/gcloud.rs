//! `gcloud`-backed platform.
//!
//! Commands issued, all with `--format=json`:
//! - `artifacts docker images describe <image>` for digest resolution
//! - `run services describe <service> --region <r>` for URL and traffic
//! - `run deploy <service> --image <name@digest> --region <r>`
//! - `run services update-traffic <service> --to-revisions <rev>=100`
//!
//! The binary is `$CUTOVER_GCLOUD` when set, else `gcloud` from `$PATH`.

use serde::Deserialize;
use tracing::{debug, info, warn};

use cutover_core::{
    Digest, ImageRef, PinnedImage, RevisionName, ServiceStatus, ServiceTarget, TrafficSplit,
    TrafficTarget,
};
use cutover_rollout::{Platform, PlatformError, PlatformErrorKind, PlatformFuture};

use crate::runner::{CommandRunner, SystemRunner};

/// Environment variable overriding the gcloud binary.
pub const GCLOUD_ENV: &str = "CUTOVER_GCLOUD";

/// The gcloud binary to invoke.
pub fn find_gcloud() -> String {
    match std::env::var(GCLOUD_ENV) {
        Ok(path) if !path.trim().is_empty() => {
            debug!(%path, "using gcloud from {GCLOUD_ENV}");
            path
        }
        _ => "gcloud".to_string(),
    }
}

pub struct GcloudPlatform<R = SystemRunner> {
    runner: R,
    binary: String,
    project: Option<String>,
}

impl GcloudPlatform<SystemRunner> {
    pub fn new() -> Self {
        Self::with_runner(SystemRunner)
    }
}

impl Default for GcloudPlatform<SystemRunner> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: CommandRunner> GcloudPlatform<R> {
    pub fn with_runner(runner: R) -> Self {
        Self {
            runner,
            binary: find_gcloud(),
            project: None,
        }
    }

    pub fn with_binary(mut self, binary: impl Into<String>) -> Self {
        self.binary = binary.into();
        self
    }

    /// Pass `--project` on every call instead of relying on the active
    /// gcloud configuration.
    pub fn with_project(mut self, project: Option<String>) -> Self {
        self.project = project;
        self
    }

    pub fn binary(&self) -> &str {
        &self.binary
    }

    async fn invoke(&self, mut args: Vec<String>) -> Result<String, PlatformError> {
        if let Some(project) = &self.project {
            args.push("--project".to_string());
            args.push(project.clone());
        }
        args.push("--format=json".to_string());

        debug!(binary = %self.binary, args = %args.join(" "), "invoking gcloud");
        let output = self.runner.run(&self.binary, &args).await.map_err(|e| {
            PlatformError::new(
                PlatformErrorKind::Unavailable,
                format!("could not run {}: {e}", self.binary),
            )
        })?;

        if output.success {
            Ok(output.stdout)
        } else {
            let err = classify_stderr(&output.stderr);
            warn!(code = ?output.code, kind = %err.kind, "gcloud call failed");
            Err(err)
        }
    }

    async fn resolve(&self, image: &ImageRef) -> Result<Digest, PlatformError> {
        let stdout = self
            .invoke(args(&["artifacts", "docker", "images", "describe", &image.to_string()]))
            .await?;
        let described: ImageDescription = parse_json(&stdout, "image description")?;
        let digest = Digest::parse(&described.image_summary.digest)
            .map_err(|e| PlatformError::new(PlatformErrorKind::Malformed, e.to_string()))?;
        info!(%image, %digest, "resolved image digest");
        Ok(digest)
    }

    async fn status(&self, target: &ServiceTarget) -> Result<ServiceStatus, PlatformError> {
        let stdout = self
            .invoke(args(&[
                "run",
                "services",
                "describe",
                &target.service,
                "--region",
                &target.region,
                "--platform",
                "managed",
            ]))
            .await?;
        let service: ServiceJson = parse_json(&stdout, "service description")?;
        service.status.into_status()
    }

    async fn create_revision(
        &self,
        target: &ServiceTarget,
        image: &PinnedImage,
    ) -> Result<RevisionName, PlatformError> {
        let stdout = self
            .invoke(args(&[
                "run",
                "deploy",
                &target.service,
                "--image",
                &image.to_string(),
                "--region",
                &target.region,
                "--platform",
                "managed",
                "--quiet",
            ]))
            .await?;

        // Older gcloud releases print nothing useful on deploy; fall back to
        // asking the service what it just created. The new revision may not
        // be ready yet, so latest-created wins over latest-ready.
        let from_output = serde_json::from_str::<ServiceJson>(&stdout)
            .ok()
            .and_then(|s| s.status.created_revision());
        let revision = match from_output {
            Some(rev) => rev,
            None => {
                let status = self.status(target).await?;
                status.latest_created.or(status.latest_ready).ok_or_else(|| {
                    PlatformError::new(
                        PlatformErrorKind::Malformed,
                        format!("deploy of {} reported no revision", target.service),
                    )
                })?
            }
        };
        info!(service = %target.service, %revision, "revision created");
        Ok(revision)
    }

    async fn route_all(
        &self,
        target: &ServiceTarget,
        revision: &RevisionName,
    ) -> Result<(), PlatformError> {
        self.invoke(args(&[
            "run",
            "services",
            "update-traffic",
            &target.service,
            "--region",
            &target.region,
            "--platform",
            "managed",
            "--to-revisions",
            &format!("{revision}=100"),
            "--quiet",
        ]))
        .await?;
        info!(service = %target.service, %revision, "traffic routed 100%");
        Ok(())
    }
}

impl<R: CommandRunner> Platform for GcloudPlatform<R> {
    fn resolve_digest<'a>(&'a self, image: &'a ImageRef) -> PlatformFuture<'a, Digest> {
        Box::pin(self.resolve(image))
    }

    fn describe<'a>(&'a self, target: &'a ServiceTarget) -> PlatformFuture<'a, ServiceStatus> {
        Box::pin(self.status(target))
    }

    fn deploy<'a>(
        &'a self,
        target: &'a ServiceTarget,
        image: &'a PinnedImage,
    ) -> PlatformFuture<'a, RevisionName> {
        Box::pin(self.create_revision(target, image))
    }

    fn set_traffic<'a>(
        &'a self,
        target: &'a ServiceTarget,
        revision: &'a RevisionName,
    ) -> PlatformFuture<'a, ()> {
        Box::pin(self.route_all(target, revision))
    }
}

fn args(parts: &[&str]) -> Vec<String> {
    parts.iter().map(|s| s.to_string()).collect()
}

fn parse_json<'de, T: Deserialize<'de>>(stdout: &'de str, what: &str) -> Result<T, PlatformError> {
    serde_json::from_str(stdout).map_err(|e| {
        PlatformError::new(
            PlatformErrorKind::Malformed,
            format!("unreadable {what}: {e}"),
        )
    })
}

/// Map gcloud's stderr onto an error kind. The message is the first
/// `ERROR:` line, or the last non-empty line when there is none.
pub fn classify_stderr(stderr: &str) -> PlatformError {
    let lower = stderr.to_ascii_lowercase();
    let kind = if lower.contains("permission_denied")
        || lower.contains("permission denied")
        || lower.contains("does not have permission")
        || lower.contains("unauthenticated")
    {
        PlatformErrorKind::PermissionDenied
    } else if lower.contains("not_found")
        || lower.contains("not found")
        || lower.contains("could not be found")
        || lower.contains("cannot find")
    {
        PlatformErrorKind::NotFound
    } else if lower.contains("unavailable")
        || lower.contains("deadline exceeded")
        || lower.contains("timed out")
        || lower.contains("connection")
    {
        PlatformErrorKind::Unavailable
    } else {
        PlatformErrorKind::Rejected
    };

    let lines: Vec<&str> = stderr.lines().map(str::trim).filter(|l| !l.is_empty()).collect();
    let message = lines
        .iter()
        .find(|l| l.starts_with("ERROR:"))
        .or(lines.last())
        .map(|l| l.to_string())
        .unwrap_or_else(|| "gcloud exited with an error and no output".to_string());

    PlatformError::new(kind, message)
}

#[derive(Debug, Deserialize)]
struct ImageDescription {
    #[serde(alias = "imageSummary")]
    image_summary: ImageSummary,
}

#[derive(Debug, Deserialize)]
struct ImageSummary {
    digest: String,
}

#[derive(Debug, Default, Deserialize)]
struct ServiceJson {
    #[serde(default)]
    status: ServiceStatusJson,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ServiceStatusJson {
    url: Option<String>,
    #[serde(default)]
    traffic: Vec<TrafficJson>,
    latest_ready_revision_name: Option<String>,
    latest_created_revision_name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TrafficJson {
    revision_name: Option<String>,
    percent: Option<u8>,
    #[serde(default)]
    latest_revision: bool,
}

impl ServiceStatusJson {
    fn created_revision(&self) -> Option<RevisionName> {
        self.latest_created_revision_name
            .as_deref()
            .or(self.latest_ready_revision_name.as_deref())
            .map(RevisionName::from)
    }

    fn into_status(self) -> Result<ServiceStatus, PlatformError> {
        let latest_ready = self.latest_ready_revision_name.map(RevisionName::from);
        let latest_created = self.latest_created_revision_name.map(RevisionName::from);

        let mut targets = Vec::new();
        for entry in self.traffic {
            // A `latestRevision: true` entry names no revision; it follows
            // whatever is latest ready.
            let revision = match (entry.revision_name, entry.latest_revision) {
                (Some(name), _) => RevisionName::from(name),
                (None, true) => match &latest_ready {
                    Some(rev) => rev.clone(),
                    None => continue,
                },
                (None, false) => continue,
            };
            let target = TrafficTarget::new(revision, entry.percent.unwrap_or(0))
                .map_err(|e| PlatformError::new(PlatformErrorKind::Malformed, e.to_string()))?;
            targets.push(target);
        }
        let traffic = TrafficSplit::new(targets)
            .map_err(|e| PlatformError::new(PlatformErrorKind::Malformed, e.to_string()))?;

        Ok(ServiceStatus {
            url: self.url,
            traffic,
            latest_ready,
            latest_created,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::VecDeque;
    use std::sync::Mutex;

    use crate::runner::{RunFuture, ToolOutput};

    /// Answers invocations from a queue and records their arguments.
    #[derive(Default)]
    struct ScriptedRunner {
        replies: Mutex<VecDeque<ToolOutput>>,
        seen: Mutex<Vec<Vec<String>>>,
    }

    impl ScriptedRunner {
        fn new(replies: Vec<ToolOutput>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                seen: Mutex::default(),
            }
        }
    }

    impl CommandRunner for ScriptedRunner {
        fn run<'a>(&'a self, program: &'a str, args: &'a [String]) -> RunFuture<'a> {
            Box::pin(async move {
                assert_eq!(program, "gcloud-test");
                self.seen.lock().unwrap().push(args.to_vec());
                Ok(self
                    .replies
                    .lock()
                    .unwrap()
                    .pop_front()
                    .expect("unexpected gcloud call"))
            })
        }
    }

    fn platform(replies: Vec<ToolOutput>) -> GcloudPlatform<ScriptedRunner> {
        GcloudPlatform::with_runner(ScriptedRunner::new(replies)).with_binary("gcloud-test")
    }

    fn calls(p: &GcloudPlatform<ScriptedRunner>) -> Vec<Vec<String>> {
        p.runner.seen.lock().unwrap().clone()
    }

    fn target() -> ServiceTarget {
        ServiceTarget::new("app", "asia-northeast1")
    }

    const DIGEST: &str = "sha256:deadbeef00000000000000000000000000000000000000000000000000000000";

    const DESCRIBE: &str = r#"{
        "metadata": {"name": "app"},
        "status": {
            "url": "https://app-xyz.a.run.app",
            "latestReadyRevisionName": "app-00002-def",
            "latestCreatedRevisionName": "app-00002-def",
            "traffic": [
                {"revisionName": "app-00001-abc", "percent": 90},
                {"latestRevision": true, "percent": 10},
                {"revisionName": "app-00000-old", "tag": "canary"}
            ]
        }
    }"#;

    #[tokio::test]
    async fn resolves_digest_from_image_summary() {
        let p = platform(vec![
            ToolOutput::ok(format!(
                r#"{{"image_summary":{{"digest":"{DIGEST}","fully_qualified_digest":"x"}}}}"#
            )),
            ToolOutput::ok(format!(r#"{{"imageSummary":{{"digest":"{DIGEST}"}}}}"#)),
        ]);
        let image = ImageRef::parse("asia-northeast1-docker.pkg.dev/p/r/app:abc123").unwrap();

        assert_eq!(p.resolve_digest(&image).await.unwrap().as_str(), DIGEST);
        assert_eq!(p.resolve_digest(&image).await.unwrap().as_str(), DIGEST);
        assert_eq!(
            calls(&p)[0],
            args(&[
                "artifacts",
                "docker",
                "images",
                "describe",
                "asia-northeast1-docker.pkg.dev/p/r/app:abc123",
                "--format=json",
            ])
        );
    }

    #[tokio::test]
    async fn garbage_digest_is_malformed() {
        let p = platform(vec![ToolOutput::ok(r#"{"imageSummary":{"digest":"latest"}}"#)]);
        let image = ImageRef::parse("gcr.io/p/app:abc").unwrap();
        let err = p.resolve_digest(&image).await.unwrap_err();
        assert_eq!(err.kind, PlatformErrorKind::Malformed);
    }

    #[tokio::test]
    async fn describe_maps_traffic() {
        let p = platform(vec![ToolOutput::ok(DESCRIBE)]).with_project(Some("proj".into()));
        let status = p.describe(&target()).await.unwrap();

        assert_eq!(status.url.as_deref(), Some("https://app-xyz.a.run.app"));
        assert_eq!(status.latest_ready, Some(RevisionName::from("app-00002-def")));
        assert_eq!(status.latest_created, Some(RevisionName::from("app-00002-def")));
        assert_eq!(status.traffic.serving(), Some(&RevisionName::from("app-00001-abc")));
        assert_eq!(status.traffic.percent_for(&"app-00002-def".into()), 10);
        assert_eq!(status.traffic.percent_for(&"app-00000-old".into()), 0);
        assert_eq!(status.traffic.total(), 100);

        let call = &calls(&p)[0];
        assert_eq!(&call[..3], &args(&["run", "services", "describe"])[..]);
        assert!(call.windows(2).any(|w| w == ["--project", "proj"]));
        assert!(call.windows(2).any(|w| w == ["--region", "asia-northeast1"]));
    }

    #[tokio::test]
    async fn deploy_passes_pinned_image_and_reads_revision() {
        let p = platform(vec![ToolOutput::ok(DESCRIBE)]);
        let pinned = ImageRef::parse("gcr.io/p/app:abc123")
            .unwrap()
            .pin(Digest::parse(DIGEST).unwrap());

        let rev = p.deploy(&target(), &pinned).await.unwrap();
        assert_eq!(rev.as_str(), "app-00002-def");

        let call = &calls(&p)[0];
        assert!(call.windows(2).any(|w| w[0] == "--image" && w[1] == format!("gcr.io/p/app@{DIGEST}")));
        assert!(!call.iter().any(|a| a.contains(":abc123")));
        assert!(call.contains(&"--quiet".to_string()));
    }

    #[tokio::test]
    async fn deploy_falls_back_to_describe() {
        let p = platform(vec![ToolOutput::ok(""), ToolOutput::ok(DESCRIBE)]);
        let pinned = ImageRef::parse("gcr.io/p/app:abc123")
            .unwrap()
            .pin(Digest::parse(DIGEST).unwrap());

        let rev = p.deploy(&target(), &pinned).await.unwrap();
        assert_eq!(rev.as_str(), "app-00002-def");
        assert_eq!(calls(&p).len(), 2);
    }

    #[tokio::test]
    async fn deploy_fallback_prefers_revision_not_yet_ready() {
        let describe = r#"{
            "status": {
                "url": "https://app-xyz.a.run.app",
                "latestReadyRevisionName": "app-00001-abc",
                "latestCreatedRevisionName": "app-00002-def",
                "traffic": [{"revisionName": "app-00001-abc", "percent": 100}]
            }
        }"#;
        let p = platform(vec![ToolOutput::ok("Deploying..."), ToolOutput::ok(describe)]);
        let pinned = ImageRef::parse("gcr.io/p/app:abc123")
            .unwrap()
            .pin(Digest::parse(DIGEST).unwrap());

        let rev = p.deploy(&target(), &pinned).await.unwrap();
        assert_eq!(rev.as_str(), "app-00002-def");
    }

    #[tokio::test]
    async fn set_traffic_sends_single_revision() {
        let p = platform(vec![ToolOutput::ok("{}")]);
        p.set_traffic(&target(), &"app-00001-abc".into()).await.unwrap();

        let call = &calls(&p)[0];
        assert_eq!(&call[..3], &args(&["run", "services", "update-traffic"])[..]);
        assert!(call.windows(2).any(|w| w == ["--to-revisions", "app-00001-abc=100"]));
    }

    #[tokio::test]
    async fn failure_is_classified() {
        let p = platform(vec![ToolOutput::failed(
            1,
            "ERROR: (gcloud.run.services.update-traffic) PERMISSION_DENIED: Permission 'run.services.update' denied\n",
        )]);
        let err = p.set_traffic(&target(), &"r".into()).await.unwrap_err();
        assert_eq!(err.kind, PlatformErrorKind::PermissionDenied);
        assert!(err.message.starts_with("ERROR: (gcloud.run.services.update-traffic)"));
    }

    #[test]
    fn classify_kinds() {
        let kind = |s: &str| classify_stderr(s).kind;
        assert_eq!(
            kind("ERROR: (gcloud.run.services.describe) Cannot find service [app]"),
            PlatformErrorKind::NotFound
        );
        assert_eq!(
            kind("ERROR: NOT_FOUND: Requested entity was not found."),
            PlatformErrorKind::NotFound
        );
        assert_eq!(
            kind("ERROR: gcloud crashed (ConnectionError): connection reset"),
            PlatformErrorKind::Unavailable
        );
        assert_eq!(
            kind("ERROR: Revision 'app-00003' is not ready and cannot serve traffic."),
            PlatformErrorKind::Rejected
        );
        assert_eq!(classify_stderr("").message, "gcloud exited with an error and no output");
    }

    #[test]
    fn env_override_wins() {
        // SAFETY: the only test touching this variable.
        unsafe { std::env::set_var(GCLOUD_ENV, "/opt/google/bin/gcloud") };
        assert_eq!(find_gcloud(), "/opt/google/bin/gcloud");
        unsafe { std::env::remove_var(GCLOUD_ENV) };
        assert_eq!(find_gcloud(), "gcloud");
    }
}
