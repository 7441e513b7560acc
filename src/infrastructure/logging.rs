//! Logging configuration
//!
//! Initializes tracing for the task. Output goes to stderr; stdout belongs to
//! the pre-publish script and the build tool.

/// Initializes logging with the specified filter
pub fn init_logging(level: &str) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));

    // A second initialization in the same process is not an error.
    let _ = fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_line_number(true)
        .try_init();
}
