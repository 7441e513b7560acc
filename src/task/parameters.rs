//! Task parameter decoding
//!
//! The orchestrator hands every declared parameter to the task as an
//! environment variable, and the two list parameters as positional arguments
//! after `--`:
//!
//! ```text
//! dotnet-publish-image -- --env-vars ENV1=VAL1 --build-props Prop1=Value1 Prop2="A;B"
//! ```
//!
//! Decoding happens once, up front, and fails on the first invalid entry.
//! Nothing downstream looks at the raw strings again.

use super::errors::ValidationError;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Environment variable names of the task parameters
pub mod names {
    /// Name of the image to publish
    pub const IMAGE_NAME: &str = "PARAM_IMAGE_NAME";
    /// Base image override
    pub const BASE_IMAGE: &str = "PARAM_BASE_IMAGE";
    /// Build tool verbosity
    pub const VERBOSITY: &str = "PARAM_VERBOSITY";
    /// Project file to publish
    pub const PROJECT: &str = "PARAM_PROJECT";
    /// Newline separated build properties
    pub const BUILD_PROPS: &str = "PARAM_BUILD_PROPS";
    /// Script run before publishing
    pub const PRE_PUBLISH_SCRIPT: &str = "PARAM_PRE_PUBLISH_SCRIPT";
    /// Image the task runs in
    pub const SDK_IMAGE: &str = "PARAM_SDK_IMAGE";
    /// Namespace of the task run
    pub const NAMESPACE: &str = "CurrentKubernetesNamespace";
    /// Workspace holding the sources
    pub const SOURCE_WORKSPACE: &str = "SOURCE";
    /// Workspace holding registry credentials
    pub const DOCKERCONFIG_WORKSPACE: &str = "DOCKERCONFIG";
}

/// Positional switch that starts the environment variable list
pub const ENV_VARS_SWITCH: &str = "--env-vars";

/// Positional switch that starts the build property list
pub const BUILD_PROPS_SWITCH: &str = "--build-props";

/// A workspace the orchestrator may or may not have mounted
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Workspace {
    path: Option<PathBuf>,
}

impl Workspace {
    /// Creates a bound workspace at `path`
    #[must_use]
    pub fn bound(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
        }
    }

    /// Creates an unbound workspace
    #[must_use]
    pub fn unbound() -> Self {
        Self::default()
    }

    /// Reads `WORKSPACE_<NAME>_BOUND` and `WORKSPACE_<NAME>_PATH`
    fn decode<F>(lookup: &F, name: &str) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let bound = lookup(&format!("WORKSPACE_{name}_BOUND")).is_some_and(|v| v == "true");
        if !bound {
            return Self::unbound();
        }
        let path = lookup(&format!("WORKSPACE_{name}_PATH")).unwrap_or_default();
        Self::bound(path)
    }

    /// Mount path, if the workspace is bound
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

/// Ordered `key=value` properties destined for the build tool
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(transparent)]
pub struct PropertyList(Vec<String>);

impl PropertyList {
    /// Creates an empty list
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an entry after checking its quoting
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::UnquotedSemicolon`] when the entry contains a
    /// `;` outside a double-quoted span.
    pub fn push(&mut self, entry: impl Into<String>) -> Result<(), ValidationError> {
        let entry = entry.into();
        if has_unquoted_semicolon(&entry) {
            return Err(ValidationError::UnquotedSemicolon(entry));
        }
        self.0.push(entry);
        Ok(())
    }

    /// Iterates over the entries in declaration order
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// Value of the last entry whose key is `key`
    #[must_use]
    pub fn last_value(&self, key: &str) -> Option<&str> {
        self.iter()
            .rev()
            .filter_map(|entry| entry.split_once('='))
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v)
    }

    /// Number of entries
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if the list has no entries
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

fn has_unquoted_semicolon(entry: &str) -> bool {
    let mut quoted = false;
    for c in entry.chars() {
        match c {
            '"' => quoted = !quoted,
            ';' if !quoted => return true,
            _ => {}
        }
    }
    false
}

/// An environment variable exported to the build tool
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnvVar {
    /// Variable name
    pub name: String,
    /// Variable value, verbatim
    pub value: String,
}

impl FromStr for EnvVar {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('=') {
            Some((name, value)) if !name.is_empty() => Ok(Self {
                name: name.to_string(),
                value: value.to_string(),
            }),
            _ => Err(ValidationError::InvalidEnvVar(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum ListKind {
    EnvVars,
    BuildProps,
}

/// Decoded task parameters
///
/// Absent optional parameters decode to empty strings.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TaskParameters {
    /// Image to publish, as given
    pub image_name: String,
    /// Base image override, as given
    pub base_image: String,
    /// Build tool verbosity
    pub verbosity: String,
    /// Project path passed to the build tool
    pub project: String,
    /// Properties passed to the build tool
    pub build_props: PropertyList,
    /// Variables exported to the build tool
    pub env_vars: Vec<EnvVar>,
    /// Script run before publishing
    pub pre_publish_script: String,
    /// Image the task runs in, used to find the default registry
    pub sdk_image: String,
    /// Namespace of the task run
    pub namespace: String,
    /// Source workspace; the build runs inside it when bound
    pub source: Workspace,
    /// Credentials workspace
    pub dockerconfig: Workspace,
}

impl TaskParameters {
    /// Decodes parameters from the process environment
    ///
    /// # Errors
    ///
    /// Returns the first [`ValidationError`] found.
    pub fn from_env(positional: &[String]) -> Result<Self, ValidationError> {
        Self::decode(|name| std::env::var(name).ok(), positional)
    }

    /// Decodes parameters using `lookup` to read named values
    ///
    /// # Errors
    ///
    /// Returns the first [`ValidationError`] found.
    pub fn decode<F>(lookup: F, positional: &[String]) -> Result<Self, ValidationError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let scalar = |name: &str| lookup(name).unwrap_or_default();

        let mut build_props = PropertyList::new();
        for line in scalar(names::BUILD_PROPS).lines() {
            if !line.is_empty() {
                build_props.push(line)?;
            }
        }

        let mut env_vars = Vec::new();
        let mut current = None;
        for token in positional {
            match (token.as_str(), current) {
                (ENV_VARS_SWITCH, _) => current = Some(ListKind::EnvVars),
                (BUILD_PROPS_SWITCH, _) => current = Some(ListKind::BuildProps),
                (value, Some(ListKind::EnvVars)) => env_vars.push(value.parse()?),
                (value, Some(ListKind::BuildProps)) => build_props.push(value)?,
                (value, None) => {
                    return Err(ValidationError::UnexpectedArgument(value.to_string()));
                }
            }
        }

        Ok(Self {
            image_name: scalar(names::IMAGE_NAME),
            base_image: scalar(names::BASE_IMAGE),
            verbosity: scalar(names::VERBOSITY),
            project: scalar(names::PROJECT),
            build_props,
            env_vars,
            pre_publish_script: scalar(names::PRE_PUBLISH_SCRIPT),
            sdk_image: scalar(names::SDK_IMAGE),
            namespace: scalar(names::NAMESPACE),
            source: Workspace::decode(&lookup, names::SOURCE_WORKSPACE),
            dockerconfig: Workspace::decode(&lookup, names::DOCKERCONFIG_WORKSPACE),
        })
    }

    /// Container family selected through the `ContainerFamily` build property
    #[must_use]
    pub fn container_family(&self) -> &str {
        self.build_props.last_value("ContainerFamily").unwrap_or("")
    }
}

#[cfg(test)]
#[path = "parameters_tests.rs"]
mod parameters_tests;
