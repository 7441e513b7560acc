//! Publish task domain types and logic

pub mod errors;
pub mod image;
pub mod parameters;
pub mod publish;
pub mod types;

pub use errors::{TaskError, ValidationError};
pub use image::{DEFAULT_TAG, ImageReference, runtime_version};
pub use parameters::{EnvVar, PropertyList, TaskParameters, Workspace};
pub use publish::{PublishCommand, PublishCommandBuilder};
pub use types::{PublishPlan, PublishResult};
