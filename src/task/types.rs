//! Task outcome types

use super::parameters::EnvVar;
use super::publish::PublishCommand;
use serde::Serialize;
use std::path::PathBuf;

/// Outcome of a successful publish
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishResult {
    /// Digest reported by the build tool
    pub digest: String,
    /// `registry/repository@digest`
    pub image_with_digest: String,
}

/// What a run would execute, reported by a dry run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct PublishPlan {
    /// Build tool executable
    pub program: String,
    /// Publish arguments
    pub args: PublishCommand,
    /// Directory the build runs in
    pub working_dir: PathBuf,
    /// Variables exported to the build tool
    pub env_vars: Vec<EnvVar>,
}

impl PublishPlan {
    /// Renders the plan as pretty JSON
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
