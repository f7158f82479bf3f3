//! The seam between the controller and the run platform.
//!
//! Everything with an external effect (registry lookups, deploys, traffic
//! changes) goes through [`Platform`], so the decision procedure can be
//! exercised against a recording fake.

use std::fmt;
use std::future::Future;
use std::pin::Pin;

use serde::Serialize;
use thiserror::Error;

use cutover_core::{Digest, ImageRef, PinnedImage, RevisionName, ServiceStatus, ServiceTarget};

/// Boxed future returned by platform operations.
pub type PlatformFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, PlatformError>> + Send + 'a>>;

/// Broad classes of platform failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlatformErrorKind {
    NotFound,
    PermissionDenied,
    Unavailable,
    /// The platform refused the request (quota, policy, invalid service definition).
    Rejected,
    /// The platform answered with something we could not interpret.
    Malformed,
}

impl fmt::Display for PlatformErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::NotFound => "not found",
            Self::PermissionDenied => "permission denied",
            Self::Unavailable => "unavailable",
            Self::Rejected => "rejected",
            Self::Malformed => "malformed response",
        };
        f.write_str(s)
    }
}

/// An error reported by a platform operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct PlatformError {
    pub kind: PlatformErrorKind,
    pub message: String,
}

impl PlatformError {
    pub fn new(kind: PlatformErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// Operations the deploy procedure needs from the registry and run platform.
pub trait Platform: Send + Sync {
    /// Resolve an image reference to its content digest.
    fn resolve_digest<'a>(&'a self, image: &'a ImageRef) -> PlatformFuture<'a, Digest>;

    /// Current URL, traffic split, and latest ready revision of a service.
    fn describe<'a>(&'a self, target: &'a ServiceTarget) -> PlatformFuture<'a, ServiceStatus>;

    /// Create a revision running `image`. The platform routes all traffic
    /// to it once ready.
    fn deploy<'a>(
        &'a self,
        target: &'a ServiceTarget,
        image: &'a PinnedImage,
    ) -> PlatformFuture<'a, RevisionName>;

    /// Route 100% of traffic to `revision` and 0% to every other revision.
    fn set_traffic<'a>(
        &'a self,
        target: &'a ServiceTarget,
        revision: &'a RevisionName,
    ) -> PlatformFuture<'a, ()>;
}

impl<P: Platform + ?Sized> Platform for std::sync::Arc<P> {
    fn resolve_digest<'a>(&'a self, image: &'a ImageRef) -> PlatformFuture<'a, Digest> {
        (**self).resolve_digest(image)
    }

    fn describe<'a>(&'a self, target: &'a ServiceTarget) -> PlatformFuture<'a, ServiceStatus> {
        (**self).describe(target)
    }

    fn deploy<'a>(
        &'a self,
        target: &'a ServiceTarget,
        image: &'a PinnedImage,
    ) -> PlatformFuture<'a, RevisionName> {
        (**self).deploy(target, image)
    }

    fn set_traffic<'a>(
        &'a self,
        target: &'a ServiceTarget,
        revision: &'a RevisionName,
    ) -> PlatformFuture<'a, ()> {
        (**self).set_traffic(target, revision)
    }
}
