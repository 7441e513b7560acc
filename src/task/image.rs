//! Container image references
//!
//! Handles `[registry/][namespace/]repository[:tag][@digest]`. A first path
//! segment counts as a registry host when it contains a `.` or a `:` and is
//! followed by at least one more segment, so `my.ns/app` is read as registry
//! `my.ns` with repository `app`.

use serde::Serialize;
use std::fmt;

/// Tag published when the image name carries none
pub const DEFAULT_TAG: &str = "latest";

/// A parsed image reference
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct ImageReference {
    /// Registry host, with port when given
    pub registry: Option<String>,
    /// Repository path, namespaces included
    pub repository: String,
    /// Tag, verbatim
    pub tag: Option<String>,
    /// Digest, verbatim
    pub digest: Option<String>,
}

impl ImageReference {
    /// Parses an image reference
    ///
    /// Parsing never fails; an empty input gives an empty repository.
    #[must_use]
    pub fn parse(input: &str) -> Self {
        let input = input.trim();

        let (rest, digest) = match input.split_once('@') {
            Some((before, after)) => (before, non_empty(after)),
            None => (input, None),
        };

        // A colon followed by a slash belongs to a registry port.
        let (path, tag) = match rest.rsplit_once(':') {
            Some((before, after)) if !after.contains('/') => (before, non_empty(after)),
            _ => (rest, None),
        };

        let (registry, repository) = match path.split_once('/') {
            Some((first, remainder)) if is_registry_host(first) => {
                (Some(first.to_string()), remainder.to_string())
            }
            _ => (None, path.to_string()),
        };

        Self {
            registry,
            repository,
            tag,
            digest,
        }
    }

    /// Fills in `registry` when the reference names none
    #[must_use]
    pub fn with_default_registry(mut self, registry: &str) -> Self {
        if self.registry.is_none() {
            self.registry = Some(registry.to_string());
        }
        self
    }

    /// Pins a floating reference to the runtime version
    ///
    /// A reference without tag and digest gets the tag `<version>`, or
    /// `<version>-<family>` when a family is given. References that already
    /// carry a tag or digest are returned unchanged.
    #[must_use]
    pub fn with_runtime_tag(mut self, version: &str, family: &str) -> Self {
        if self.tag.is_none() && self.digest.is_none() {
            self.tag = Some(if family.is_empty() {
                version.to_string()
            } else {
                format!("{version}-{family}")
            });
        }
        self
    }

    /// Tag to publish, `latest` when none was given
    #[must_use]
    pub fn resolved_tag(&self) -> &str {
        self.tag.as_deref().unwrap_or(DEFAULT_TAG)
    }

    /// Registry host, empty when unknown
    #[must_use]
    pub fn registry_or_empty(&self) -> &str {
        self.registry.as_deref().unwrap_or("")
    }

    /// `registry/repository@digest`, dropping the tag
    #[must_use]
    pub fn pinned(&self, digest: &str) -> String {
        match &self.registry {
            Some(registry) => format!("{registry}/{}@{digest}", self.repository),
            None => format!("{}@{digest}", self.repository),
        }
    }
}

impl fmt::Display for ImageReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(registry) = &self.registry {
            write!(f, "{registry}/")?;
        }
        write!(f, "{}", self.repository)?;
        if let Some(tag) = &self.tag {
            write!(f, ":{tag}")?;
        }
        if let Some(digest) = &self.digest {
            write!(f, "@{digest}")?;
        }
        Ok(())
    }
}

fn is_registry_host(segment: &str) -> bool {
    segment.contains('.') || segment.contains(':')
}

fn non_empty(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_string())
}

/// Reduces a build tool version to `major.minor`
///
/// `9.0.100` becomes `9.0`; versions with fewer components are kept.
#[must_use]
pub fn runtime_version(tool_version: &str) -> String {
    let first_line = tool_version.lines().next().unwrap_or("").trim();
    let mut parts = first_line.splitn(3, '.');
    match (parts.next(), parts.next()) {
        (Some(major), Some(minor)) => format!("{major}.{minor}"),
        _ => first_line.to_string(),
    }
}
