//! Deploy controller — pins, deploys, verifies, and reverts.
//!
//! One run is strictly sequential:
//!
//! 1. resolve the tag to a digest (fatal on failure, nothing changed)
//! 2. record which revision serves traffic right now
//! 3. deploy the digest (fatal on failure, traffic did not move)
//! 4. look up the live URL; if traffic stayed pinned to an older revision,
//!    route 100% to the new one
//! 5. probe the health path with a bounded retry policy
//! 6. on probe failure, route 100% back to the revision from step 2
//!
//! Cancellation is honoured up to step 3. Once the deploy is issued the
//! run always reaches a settled traffic split before returning.

use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use cutover_core::{Digest, ImageRef, PinnedImage, RevisionName, ServiceTarget, TrafficSplit};
use cutover_health::{
    ProbePolicy, ProbeReport, ProbeResult, is_cancelled, join_url, probe_until_healthy,
};

use crate::error::{DeployError, ProbeFailureCause, RollbackStatus};
use crate::lock::DeployLocks;
use crate::platform::{Platform, PlatformError, PlatformErrorKind};

/// Everything needed for one deploy run.
#[derive(Debug, Clone)]
pub struct DeployRequest {
    pub image: ImageRef,
    pub target: ServiceTarget,
    pub health_path: String,
    pub probe: ProbePolicy,
}

/// A verified deploy.
#[derive(Debug, Clone)]
pub struct DeployOutcome {
    pub image: PinnedImage,
    pub revision: RevisionName,
    /// The revision that served before this deploy, if any.
    pub previous: Option<RevisionName>,
    pub url: String,
    pub probe: ProbeReport,
}

impl DeployOutcome {
    pub fn digest(&self) -> &Digest {
        self.image.digest()
    }
}

/// Runs the deploy-and-rollback procedure against a [`Platform`].
pub struct Controller<P> {
    platform: P,
    client: reqwest::Client,
    locks: DeployLocks,
}

impl<P: Platform> Controller<P> {
    pub fn new(platform: P, client: reqwest::Client) -> Self {
        Self {
            platform,
            client,
            locks: DeployLocks::new(),
        }
    }

    pub fn platform(&self) -> &P {
        &self.platform
    }

    /// Run the procedure. Runs against the same service are serialized.
    pub async fn run(
        &self,
        req: &DeployRequest,
        cancel: watch::Receiver<bool>,
    ) -> Result<DeployOutcome, DeployError> {
        let _guard = self.locks.acquire(&req.target).await;
        self.run_locked(req, cancel).await
    }

    async fn run_locked(
        &self,
        req: &DeployRequest,
        mut cancel: watch::Receiver<bool>,
    ) -> Result<DeployOutcome, DeployError> {
        let target = &req.target;
        info!(service = %target.service, region = %target.region, image = %req.image, "deploy run starting");

        if is_cancelled(&cancel) {
            return Err(DeployError::Cancelled);
        }

        // 1. Tag → digest.
        let digest = self.resolve_digest(&req.image).await?;
        let pinned = req.image.pin(digest.clone());
        info!(image = %pinned, digest = digest.short(), "image pinned to digest");

        // 2. Record the serving revision before anything moves.
        let previous = self.serving_revision(target).await?;

        if is_cancelled(&cancel) {
            info!("cancelled before deploy");
            return Err(DeployError::Cancelled);
        }

        // 3. Deploy. From here on the run settles traffic before returning.
        let revision = self
            .platform
            .deploy(target, &pinned)
            .await
            .map_err(|source| {
                error!(service = %target.service, error = %source, "deploy rejected");
                DeployError::Deploy {
                    service: target.service.clone(),
                    digest: digest.clone(),
                    source,
                }
            })?;
        info!(%revision, previous = ?previous.as_ref().map(RevisionName::as_str), digest = digest.short(), "revision deployed");

        // 4. Live URL. A service whose traffic was pinned by an earlier
        // rollback keeps serving the pinned revision after a deploy.
        let base = match self.platform.describe(target).await {
            Ok(status) => {
                if !status.traffic.is_single(&revision) {
                    self.promote(target, &digest, &revision, &status.traffic)
                        .await?;
                }
                if status.url.is_none() {
                    warn!(service = %target.service, "platform reported no service URL");
                }
                status.url
            }
            Err(e) => {
                warn!(service = %target.service, error = %e, "could not resolve service URL");
                None
            }
        };

        // 5. Probe.
        let (url, report, cause) = match base {
            Some(base) => {
                let url = join_url(&base, &req.health_path);
                let report =
                    probe_until_healthy(&self.client, &url, &req.probe, &mut cancel).await;
                let cause = if report.cancelled {
                    ProbeFailureCause::Cancelled
                } else {
                    ProbeFailureCause::Exhausted
                };
                (url, report, cause)
            }
            None => (String::new(), ProbeReport::default(), ProbeFailureCause::NoServiceUrl),
        };

        if report.healthy() {
            info!(%revision, %url, attempts = report.attempt_count(), "deploy verified healthy");
            return Ok(DeployOutcome {
                image: pinned,
                revision,
                previous,
                url,
                probe: report,
            });
        }

        // 6. Revert.
        warn!(%revision, %cause, "new revision failed verification");
        Err(self
            .roll_back(target, digest, revision, previous, cause, report.attempts)
            .await)
    }

    async fn resolve_digest(&self, image: &ImageRef) -> Result<Digest, DeployError> {
        let resolved = self.platform.resolve_digest(image).await.map_err(|source| {
            error!(%image, error = %source, "digest resolution failed");
            DeployError::DigestResolution {
                image: image.to_string(),
                source,
            }
        })?;

        // A reference that already names a digest must agree with the registry.
        if let Some(expected) = &image.digest {
            if *expected != resolved {
                return Err(DeployError::DigestResolution {
                    image: image.to_string(),
                    source: PlatformError::new(
                        PlatformErrorKind::Malformed,
                        format!("registry returned {resolved}, reference names {expected}"),
                    ),
                });
            }
        }
        Ok(resolved)
    }

    /// The revision holding the largest share before the deploy. A service
    /// that does not exist yet has none.
    async fn serving_revision(
        &self,
        target: &ServiceTarget,
    ) -> Result<Option<RevisionName>, DeployError> {
        match self.platform.describe(target).await {
            Ok(status) => {
                if status.traffic.live().count() > 1 {
                    warn!(traffic = %status.traffic, "traffic already split across revisions");
                }
                debug!(traffic = %status.traffic, "pre-deploy traffic recorded");
                Ok(status.traffic.serving().cloned())
            }
            Err(e) if e.kind == PlatformErrorKind::NotFound => {
                info!(service = %target.service, "service not found, treating as first deploy");
                Ok(None)
            }
            Err(source) => {
                error!(service = %target.service, error = %source, "could not describe service");
                Err(DeployError::Describe {
                    service: target.service.clone(),
                    source,
                })
            }
        }
    }

    /// Route all traffic to a freshly deployed revision that the platform
    /// left without it. On failure traffic is where it was before the run.
    async fn promote(
        &self,
        target: &ServiceTarget,
        digest: &Digest,
        revision: &RevisionName,
        traffic: &TrafficSplit,
    ) -> Result<(), DeployError> {
        warn!(%revision, %traffic, "new revision is not serving all traffic, routing it");
        self.platform
            .set_traffic(target, revision)
            .await
            .map_err(|source| {
                error!(%revision, error = %source, "could not route traffic to new revision");
                DeployError::Promote {
                    digest: digest.clone(),
                    revision: revision.clone(),
                    source,
                }
            })?;
        info!(%revision, "new revision serving 100%");
        Ok(())
    }

    async fn roll_back(
        &self,
        target: &ServiceTarget,
        digest: Digest,
        revision: RevisionName,
        previous: Option<RevisionName>,
        cause: ProbeFailureCause,
        attempts: Vec<ProbeResult>,
    ) -> DeployError {
        let Some(previous) = previous.filter(|p| *p != revision) else {
            error!(%revision, "no prior revision to roll back to, unhealthy revision stays live");
            return DeployError::ProbeFailure {
                digest,
                revision,
                cause,
                attempts,
                rollback: RollbackStatus::NoPriorRevision,
            };
        };

        warn!(from = %revision, to = %previous, "rolling back traffic");
        match self.platform.set_traffic(target, &previous).await {
            Ok(()) => {
                warn!(%previous, "rollback complete, previous revision serving 100%");
                DeployError::ProbeFailure {
                    digest,
                    revision,
                    cause,
                    attempts,
                    rollback: RollbackStatus::RolledBack { to: previous },
                }
            }
            Err(source) => {
                error!(%revision, %previous, error = %source, "rollback failed, unhealthy revision still serving");
                DeployError::RollbackFailure {
                    digest,
                    revision,
                    previous,
                    attempts,
                    source,
                }
            }
        }
    }
}
