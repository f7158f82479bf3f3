//! Services, revisions, and traffic splits on the run platform.
//!
//! A service owns an ordered set of immutable revisions. Its traffic split
//! assigns each revision a share between 0 and 100 percent.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

/// A deployable service in a region.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ServiceTarget {
    pub service: String,
    pub region: String,
}

impl ServiceTarget {
    pub fn new(service: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            region: region.into(),
        }
    }

    /// Key used to serialize concurrent runs (`region/service`).
    pub fn key(&self) -> String {
        format!("{}/{}", self.region, self.service)
    }
}

impl fmt::Display for ServiceTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.service, self.region)
    }
}

/// Name of an immutable service revision, e.g. `app-00042-xyz`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RevisionName(String);

impl RevisionName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RevisionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RevisionName {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// One entry of a traffic split.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrafficTarget {
    pub revision: RevisionName,
    pub percent: u8,
}

impl TrafficTarget {
    pub fn new(revision: impl Into<RevisionName>, percent: u8) -> CoreResult<Self> {
        let revision = revision.into();
        if percent > 100 {
            return Err(CoreError::InvalidTraffic(format!(
                "{revision} has {percent}%"
            )));
        }
        Ok(Self { revision, percent })
    }
}

impl From<String> for RevisionName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Allocation of traffic across a service's revisions, in platform order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrafficSplit {
    targets: Vec<TrafficTarget>,
}

impl TrafficSplit {
    /// Build a split. Entries naming the same revision are merged; the
    /// total may not exceed 100%.
    pub fn new(targets: Vec<TrafficTarget>) -> CoreResult<Self> {
        let mut merged: Vec<TrafficTarget> = Vec::with_capacity(targets.len());
        for t in targets {
            match merged.iter_mut().find(|m| m.revision == t.revision) {
                Some(existing) => existing.percent = existing.percent.saturating_add(t.percent),
                None => merged.push(t),
            }
        }

        let split = Self { targets: merged };
        if split.total() > 100 {
            return Err(CoreError::InvalidTraffic(format!(
                "split totals {}%",
                split.total()
            )));
        }
        Ok(split)
    }

    /// All traffic on one revision.
    pub fn single(revision: RevisionName) -> Self {
        Self {
            targets: vec![TrafficTarget {
                revision,
                percent: 100,
            }],
        }
    }

    pub fn total(&self) -> u16 {
        self.targets.iter().map(|t| u16::from(t.percent)).sum()
    }

    /// The revision holding the largest share. Ties go to the earlier entry.
    pub fn serving(&self) -> Option<&RevisionName> {
        let mut best: Option<&TrafficTarget> = None;
        for t in self.targets.iter().filter(|t| t.percent > 0) {
            if best.is_none_or(|b| t.percent > b.percent) {
                best = Some(t);
            }
        }
        best.map(|t| &t.revision)
    }

    pub fn percent_for(&self, revision: &RevisionName) -> u8 {
        self.targets
            .iter()
            .find(|t| &t.revision == revision)
            .map_or(0, |t| t.percent)
    }

    /// Revisions with a nonzero share.
    pub fn live(&self) -> impl Iterator<Item = &RevisionName> {
        self.targets
            .iter()
            .filter(|t| t.percent > 0)
            .map(|t| &t.revision)
    }

    /// True if `revision` receives all traffic.
    pub fn is_single(&self, revision: &RevisionName) -> bool {
        self.percent_for(revision) == 100
    }
}

impl fmt::Display for TrafficSplit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.targets.is_empty() {
            return f.write_str("<none>");
        }
        let parts: Vec<String> = self
            .targets
            .iter()
            .map(|t| format!("{}={}%", t.revision, t.percent))
            .collect();
        f.write_str(&parts.join(","))
    }
}

/// Observed state of a service on the platform.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceStatus {
    /// Public URL, once the platform has assigned one.
    pub url: Option<String>,
    pub traffic: TrafficSplit,
    pub latest_ready: Option<RevisionName>,
    /// Newest revision created, ready or not.
    pub latest_created: Option<RevisionName>,
}
