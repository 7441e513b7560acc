//! Infrastructure layer
//!
//! This module contains the task's filesystem integrations and ambient setup.

pub mod config;
pub mod credentials;
mod logging;
pub mod results;

pub use config::TaskConfig;
pub use credentials::CredentialResolver;
pub use logging::init_logging;
pub use results::ResultWriter;
