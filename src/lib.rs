//! # dotnet-publish-image
//!
//! Publishes a .NET project as a container image from a CI task step.
//!
//! A run goes through these steps in order, stopping at the first failure:
//!
//! 1. decode the task parameters ([`task::TaskParameters`])
//! 2. link registry credentials from the `dockerconfig` workspace
//!    ([`infrastructure::CredentialResolver`])
//! 3. run the pre-publish script with fail-fast suspended
//!    ([`executor::PreScriptRunner`])
//! 4. build and run `dotnet publish` ([`task::PublishCommand`])
//! 5. read the digest and write the `IMAGE_DIGEST` and `IMAGE` results
//!    ([`infrastructure::ResultWriter`])
//!
//! [`TaskRunner`] drives the whole sequence.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod executor;
pub mod infrastructure;
pub mod task;

// Re-export commonly used types
pub use executor::{BuildTool, DotnetCli, ExecutionContext, PreScriptRunner, TaskRunner};
pub use infrastructure::{CredentialResolver, ResultWriter, TaskConfig};
pub use task::{
    ImageReference, PublishCommand, PublishPlan, PublishResult, TaskError, TaskParameters,
    ValidationError,
};

/// Version of the dotnet-publish-image crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
