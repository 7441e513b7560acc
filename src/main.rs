//! dotnet-publish-image - publishes a .NET project as a container image
//!
//! Runs as a CI task step. Parameters come from `PARAM_*` environment
//! variables and workspace bindings; environment variables and build
//! properties follow `--` as `--env-vars` and `--build-props` sections.
//!
//! ```bash
//! PARAM_IMAGE_NAME=quay.io/acme/app:1.0 PARAM_PROJECT=src/App.csproj \
//!     dotnet-publish-image -- --build-props Configuration=Release
//!
//! # Show what would run
//! dotnet-publish-image --dry-run
//! ```
//!
//! On success the image digest and the pinned image reference are written
//! to the results directory as `IMAGE_DIGEST` and `IMAGE`.

use std::process::ExitCode;

mod cli;

fn main() -> ExitCode {
    match cli::run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let (message, code) = cli::report(&e);
            if let Some(message) = message {
                eprintln!("{message}");
            }
            ExitCode::from(code)
        }
    }
}
