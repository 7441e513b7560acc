//! Publish command assembly
//!
//! The build tool distinguishes a property passed with an empty value from an
//! absent one, so every slot below is always emitted. Argument groups are kept
//! keyed by [`ArgGroup`] and flattened in its declaration order; callers can
//! set groups in any order.

use super::image::ImageReference;
use super::parameters::PropertyList;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

/// Property the build tool reports the image digest through
pub const DIGEST_PROPERTY: &str = "GeneratedContainerDigest";

/// Target that builds and pushes the container image
pub const PUBLISH_TARGET: &str = "/t:PublishContainer";

/// Argument groups, in emission order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum ArgGroup {
    Verb,
    BuildProperties,
    DigestOutput,
    Verbosity,
    ImageName,
    BaseImage,
    Target,
    Project,
}

/// The assembled build tool argument vector
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct PublishCommand {
    args: Vec<String>,
}

impl PublishCommand {
    /// Starts a command publishing `image`, with the digest written to `digest_file`
    #[must_use]
    pub fn builder(digest_file: &Path, image: &ImageReference) -> PublishCommandBuilder {
        PublishCommandBuilder::new(digest_file, image)
    }

    /// Arguments, in order
    #[must_use]
    pub fn args(&self) -> &[String] {
        &self.args
    }
}

impl fmt::Display for PublishCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&shell_words::join(&self.args))
    }
}

/// Builder for [`PublishCommand`]
#[derive(Debug, Clone)]
pub struct PublishCommandBuilder {
    groups: BTreeMap<ArgGroup, Vec<String>>,
}

impl PublishCommandBuilder {
    fn new(digest_file: &Path, image: &ImageReference) -> Self {
        let mut builder = Self {
            groups: BTreeMap::new(),
        };
        builder.set(ArgGroup::Verb, vec!["publish".to_string()]);
        builder.set(
            ArgGroup::DigestOutput,
            vec![
                format!("--getProperty:{DIGEST_PROPERTY}"),
                format!("--getResultOutputFile:{}", digest_file.display()),
            ],
        );
        builder.set(
            ArgGroup::ImageName,
            vec![
                format!("-p:ContainerRegistry={}", image.registry_or_empty()),
                format!("-p:ContainerRepository={}", image.repository),
                "-p:ContainerImageTag=".to_string(),
                format!("-p:ContainerImageTags={}", image.resolved_tag()),
            ],
        );
        builder.set(ArgGroup::Target, vec![PUBLISH_TARGET.to_string()]);
        builder
            .verbosity("")
            .project("")
    }

    fn set(&mut self, group: ArgGroup, args: Vec<String>) {
        self.groups.insert(group, args);
    }

    /// User supplied properties, each passed as `-p:<entry>`
    #[must_use]
    pub fn build_properties(mut self, props: &PropertyList) -> Self {
        let args = props.iter().map(|p| format!("-p:{p}")).collect();
        self.set(ArgGroup::BuildProperties, args);
        self
    }

    /// Verbosity passed as `-v <value>`, even when empty
    #[must_use]
    pub fn verbosity(mut self, verbosity: &str) -> Self {
        self.set(
            ArgGroup::Verbosity,
            vec!["-v".to_string(), verbosity.to_string()],
        );
        self
    }

    /// Base image override, read by the props file at `targets`
    #[must_use]
    pub fn base_image(mut self, targets: &Path, base_image: &ImageReference, family: &str) -> Self {
        self.set(
            ArgGroup::BaseImage,
            vec![
                format!("-p:CustomBeforeDirectoryBuildProps={}", targets.display()),
                format!("-p:BASE_IMAGE={base_image}"),
                format!("-p:ContainerFamily={family}"),
            ],
        );
        self
    }

    /// Project path, the last argument, possibly empty
    #[must_use]
    pub fn project(mut self, project: &str) -> Self {
        self.set(ArgGroup::Project, vec![project.to_string()]);
        self
    }

    /// Flattens the groups into the final argument vector
    #[must_use]
    pub fn build(self) -> PublishCommand {
        PublishCommand {
            args: self.groups.into_values().flatten().collect(),
        }
    }
}
