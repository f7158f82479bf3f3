//! cutover.toml configuration parser.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::duration::parse_duration;
use crate::error::{CoreError, CoreResult};
use crate::image::ImageRef;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CutoverConfig {
    pub service: ServiceConfig,
    pub image: Option<ImageConfig>,
    #[serde(default)]
    pub probe: ProbeConfig,
    #[serde(default)]
    pub gate: GateConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub name: String,
    pub region: String,
    pub project: Option<String>,
}

/// Where published images live. Combined with a commit SHA tag to form
/// the reference handed to the deploy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageConfig {
    pub registry: String,
    pub repository: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeConfig {
    #[serde(default = "default_probe_path")]
    pub path: String,
    #[serde(default = "default_probe_timeout")]
    pub timeout: String,
    #[serde(default = "default_probe_attempts")]
    pub attempts: u32,
    #[serde(default = "default_probe_delay")]
    pub delay: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateConfig {
    /// Only publish runs from this branch trigger a deploy.
    #[serde(default = "default_trunk")]
    pub trunk: String,
    /// Required conclusion of the upstream publish run.
    #[serde(default = "default_conclusion")]
    pub conclusion: String,
}

fn default_probe_path() -> String {
    "/health".to_string()
}

fn default_probe_timeout() -> String {
    "5s".to_string()
}

fn default_probe_attempts() -> u32 {
    3
}

fn default_probe_delay() -> String {
    "10s".to_string()
}

fn default_trunk() -> String {
    "main".to_string()
}

fn default_conclusion() -> String {
    "success".to_string()
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            path: default_probe_path(),
            timeout: default_probe_timeout(),
            attempts: default_probe_attempts(),
            delay: default_probe_delay(),
        }
    }
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            trunk: default_trunk(),
            conclusion: default_conclusion(),
        }
    }
}

impl ProbeConfig {
    pub fn timeout(&self) -> CoreResult<Duration> {
        parse_duration(&self.timeout).ok_or_else(|| CoreError::InvalidDuration(self.timeout.clone()))
    }

    pub fn delay(&self) -> CoreResult<Duration> {
        parse_duration(&self.delay).ok_or_else(|| CoreError::InvalidDuration(self.delay.clone()))
    }
}

impl ImageConfig {
    /// Reference for an image published under `tag` (usually a commit SHA).
    pub fn image_for_tag(&self, tag: &str) -> CoreResult<ImageRef> {
        ImageRef::tagged(&self.registry, &self.repository, tag)
    }
}

impl CutoverConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: CutoverConfig = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Scaffold a minimal cutover.toml for a Cloud Run service.
    pub fn scaffold(service: &str, region: &str, project: Option<&str>) -> Self {
        let image = project.map(|p| ImageConfig {
            registry: format!("{region}-docker.pkg.dev"),
            repository: format!("{p}/{service}/{service}"),
        });
        CutoverConfig {
            service: ServiceConfig {
                name: service.to_string(),
                region: region.to_string(),
                project: project.map(str::to_string),
            },
            image,
            probe: ProbeConfig::default(),
            gate: GateConfig::default(),
        }
    }
}
