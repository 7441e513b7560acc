//! Configuration management
//!
//! Fixed task policy: where results go, which build tool and shell to run.
//! Task parameters are decoded separately by [`crate::task::TaskParameters`].

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Overrides the results directory
pub const RESULTS_DIR_VAR: &str = "PUBLISH_TASK_RESULTS_DIR";
/// Overrides the build tool executable
pub const BUILD_TOOL_VAR: &str = "PUBLISH_TASK_BUILD_TOOL";
/// Overrides the shell used for the pre-publish script
pub const SHELL_VAR: &str = "PUBLISH_TASK_SHELL";
/// Enables logging with the given filter
pub const LOG_VAR: &str = "PUBLISH_TASK_LOG";

/// Task configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskConfig {
    /// Directory the orchestrator reads results from
    pub results_dir: PathBuf,
    /// File the build tool writes the digest to
    pub digest_file: PathBuf,
    /// Props file overriding the base image
    pub base_image_targets: PathBuf,
    /// Home directory receiving the credential link
    pub home_dir: PathBuf,
    /// Build tool executable, looked up on `PATH` when not absolute
    pub build_tool: String,
    /// Shell running the pre-publish script
    pub shell: String,
    /// Registry used when the SDK image names none
    pub fallback_registry: String,
    /// Log filter; logging is off when unset
    pub log_level: Option<String>,
}

impl Default for TaskConfig {
    fn default() -> Self {
        Self {
            results_dir: PathBuf::from("/tekton/results"),
            digest_file: PathBuf::from("/tmp/IMAGE_DIGEST"),
            base_image_targets: PathBuf::from("/tmp/OverrideBaseImage.targets"),
            home_dir: PathBuf::from("/"),
            build_tool: "dotnet".to_string(),
            shell: "bash".to_string(),
            fallback_registry: "docker.io".to_string(),
            log_level: None,
        }
    }
}

impl TaskConfig {
    /// Loads the configuration from the process environment
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Loads the configuration using `lookup` to read variables
    #[must_use]
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let set = |name: &str| lookup(name).filter(|v| !v.is_empty());
        let defaults = Self::default();

        Self {
            results_dir: set(RESULTS_DIR_VAR).map_or(defaults.results_dir, PathBuf::from),
            home_dir: set("HOME").map_or(defaults.home_dir, PathBuf::from),
            build_tool: set(BUILD_TOOL_VAR).unwrap_or(defaults.build_tool),
            shell: set(SHELL_VAR).unwrap_or(defaults.shell),
            log_level: set(LOG_VAR).or_else(|| set("RUST_LOG")),
            ..defaults
        }
    }
}
