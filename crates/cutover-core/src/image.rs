//! Container image references.
//!
//! An image is named by `registry/repository` and addressed either by a
//! mutable tag (`:abc123`) or by an immutable content digest
//! (`@sha256:...`). Deploys only ever accept the digest form: the
//! [`PinnedImage`] type can only be built from a resolved [`Digest`].

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

const SHA256_PREFIX: &str = "sha256:";

/// Content-addressed image digest, `sha256:<64 lowercase hex>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Digest(String);

impl Digest {
    pub fn parse(s: &str) -> CoreResult<Self> {
        let s = s.trim();
        let hex_part = s
            .strip_prefix(SHA256_PREFIX)
            .ok_or_else(|| CoreError::InvalidDigest(s.to_string()))?;

        let is_lower = !hex_part.bytes().any(|b| b.is_ascii_uppercase());
        match hex::decode(hex_part) {
            Ok(bytes) if bytes.len() == 32 && is_lower => Ok(Self(s.to_string())),
            _ => Err(CoreError::InvalidDigest(s.to_string())),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Abbreviated form for log lines (`sha256:deadbeef1234`).
    pub fn short(&self) -> &str {
        &self.0[..SHA256_PREFIX.len() + 12]
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Digest {
    type Err = CoreError;

    fn from_str(s: &str) -> CoreResult<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Digest {
    type Error = CoreError;

    fn try_from(s: String) -> CoreResult<Self> {
        Self::parse(&s)
    }
}

impl From<Digest> for String {
    fn from(d: Digest) -> Self {
        d.0
    }
}

/// A parsed image reference: `[registry/]repository[:tag][@digest]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRef {
    pub registry: Option<String>,
    pub repository: String,
    pub tag: Option<String>,
    pub digest: Option<Digest>,
}

impl ImageRef {
    pub fn parse(s: &str) -> CoreResult<Self> {
        let s = s.trim();
        let invalid = || CoreError::InvalidImage(s.to_string());

        let (name, digest) = match s.split_once('@') {
            Some((name, digest)) => (name, Some(Digest::parse(digest)?)),
            None => (s, None),
        };

        // A ':' after the last '/' is a tag; before it, a registry port.
        let (name, tag) = match name.rsplit_once(':') {
            Some((repo, tag)) if !tag.contains('/') => (repo, Some(tag)),
            _ => (name, None),
        };
        if tag.is_some_and(str::is_empty) {
            return Err(invalid());
        }

        let (registry, repository) = match name.split_once('/') {
            Some((first, rest))
                if first.contains('.') || first.contains(':') || first == "localhost" =>
            {
                (Some(first.to_string()), rest)
            }
            _ => (None, name),
        };

        if repository.is_empty()
            || repository.starts_with('/')
            || repository.ends_with('/')
            || repository.contains(char::is_whitespace)
        {
            return Err(invalid());
        }

        Ok(Self {
            registry,
            repository: repository.to_string(),
            tag: tag.map(str::to_string),
            digest,
        })
    }

    /// Build a tagged reference from its parts.
    pub fn tagged(registry: &str, repository: &str, tag: &str) -> CoreResult<Self> {
        Self::parse(&format!("{registry}/{repository}:{tag}"))
    }

    /// `registry/repository`, without tag or digest.
    pub fn name(&self) -> String {
        match &self.registry {
            Some(registry) => format!("{registry}/{}", self.repository),
            None => self.repository.clone(),
        }
    }

    /// Pin this image to a resolved digest. Any tag is dropped.
    pub fn pin(&self, digest: Digest) -> PinnedImage {
        PinnedImage {
            name: self.name(),
            digest,
        }
    }
}

impl fmt::Display for ImageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())?;
        if let Some(tag) = &self.tag {
            write!(f, ":{tag}")?;
        }
        if let Some(digest) = &self.digest {
            write!(f, "@{digest}")?;
        }
        Ok(())
    }
}

impl FromStr for ImageRef {
    type Err = CoreError;

    fn from_str(s: &str) -> CoreResult<Self> {
        Self::parse(s)
    }
}

/// An image addressed only by its content digest. The sole form a deploy
/// accepts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PinnedImage {
    name: String,
    digest: Digest,
}

impl PinnedImage {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn digest(&self) -> &Digest {
        &self.digest
    }
}

impl fmt::Display for PinnedImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.name, self.digest)
    }
}
