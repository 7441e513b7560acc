//! Digest extraction and task results
//!
//! The build tool writes the generated digest to a file; the task turns it
//! into two result files the orchestrator reads back.

use crate::task::{ImageReference, PublishResult, TaskError};
use once_cell::sync::Lazy;
use regex::Regex;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Result file holding the raw digest
pub const IMAGE_DIGEST_RESULT: &str = "IMAGE_DIGEST";

/// Result file holding `registry/repository@digest`
pub const IMAGE_RESULT: &str = "IMAGE";

static DIGEST_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9]+:[A-Za-z0-9]+$").expect("digest pattern is valid"));

/// Removes a digest left behind by an earlier run
///
/// # Errors
///
/// Returns an IO error if the file exists but cannot be removed
pub fn clear_digest(path: &Path) -> Result<(), TaskError> {
    match fs::remove_file(path) {
        Err(e) if e.kind() != ErrorKind::NotFound => Err(e.into()),
        _ => Ok(()),
    }
}

/// Reads and checks the digest written by the build tool
///
/// # Errors
///
/// Returns [`TaskError::MissingDigest`] when the file is absent and
/// [`TaskError::InvalidDigest`] when its content is not `<algorithm>:<value>`.
pub fn read_digest(path: &Path) -> Result<String, TaskError> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Err(TaskError::MissingDigest {
                path: path.display().to_string(),
            });
        }
        Err(e) => return Err(e.into()),
    };

    let digest = content.trim();
    if !DIGEST_PATTERN.is_match(digest) {
        return Err(TaskError::InvalidDigest {
            value: digest.to_string(),
        });
    }
    Ok(digest.to_string())
}

/// Builds the result for `image` published with `digest`
#[must_use]
pub fn publish_result(image: &ImageReference, digest: &str) -> PublishResult {
    PublishResult {
        digest: digest.to_string(),
        image_with_digest: image.pinned(digest),
    }
}

/// Writes results into the orchestrator's results directory
#[derive(Debug, Clone)]
pub struct ResultWriter {
    dir: PathBuf,
}

impl ResultWriter {
    /// Creates a writer for `dir`
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Writes `IMAGE_DIGEST` and `IMAGE`, without trailing newlines
    ///
    /// # Errors
    ///
    /// Returns an IO error if a file cannot be written
    pub fn write(&self, result: &PublishResult) -> Result<(), TaskError> {
        fs::create_dir_all(&self.dir)?;
        fs::write(self.dir.join(IMAGE_DIGEST_RESULT), &result.digest)?;
        fs::write(self.dir.join(IMAGE_RESULT), &result.image_with_digest)?;
        tracing::info!(
            digest = %result.digest,
            image = %result.image_with_digest,
            "Wrote task results"
        );
        Ok(())
    }
}
