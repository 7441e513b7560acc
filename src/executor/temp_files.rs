//! Scratch files used during a task run
//!
//! - the private directory a pre-publish script reports its final shell
//!   state into
//! - the MSBuild props file that overrides the container base image

use crate::task::TaskError;
use std::collections::BTreeMap;
use std::ffi::{OsStr, OsString};
use std::fs;
use std::io::ErrorKind;
use std::os::unix::ffi::OsStrExt;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Props file imported before `Directory.Build.props` when a base image is set
pub const BASE_IMAGE_TARGETS: &str = r#"<Project>
  <PropertyGroup>
    <ContainerBaseImage>$(BASE_IMAGE)</ContainerBaseImage>
  </PropertyGroup>
</Project>
"#;

/// Writes the base image props file to `path`
///
/// # Errors
///
/// Returns an IO error if the file cannot be written
pub fn write_base_image_targets(path: &Path) -> Result<(), TaskError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, BASE_IMAGE_TARGETS)?;
    Ok(())
}

/// Directory and exported environment a shell ended with
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellSnapshot {
    /// Final working directory
    pub cwd: PathBuf,
    /// Final exported environment
    pub env: BTreeMap<OsString, OsString>,
}

/// Private directory a shell writes its final state into
///
/// Removed when dropped.
#[derive(Debug)]
pub struct ShellState {
    dir: TempDir,
}

impl ShellState {
    /// Creates an empty state directory
    ///
    /// # Errors
    ///
    /// Returns an IO error if the directory cannot be created
    pub fn new() -> Result<Self, TaskError> {
        let dir = tempfile::Builder::new()
            .prefix("publish-task-shell-")
            .tempdir()?;
        Ok(Self { dir })
    }

    fn cwd_file(&self) -> PathBuf {
        self.dir.path().join("cwd")
    }

    fn env_file(&self) -> PathBuf {
        self.dir.path().join("env")
    }

    /// Shell lines recording the state, ending the shell successfully
    ///
    /// Runs after the `eval` of a user script, so it is only reached when the
    /// script falls through without exiting the shell.
    #[must_use]
    pub fn trailer(&self) -> String {
        let cwd = self.cwd_file();
        let env = self.env_file();
        format!(
            "\npwd > {} && env -0 > {}\nexit 0\n",
            shell_words::quote(&cwd.to_string_lossy()),
            shell_words::quote(&env.to_string_lossy()),
        )
    }

    /// Reads the recorded state
    ///
    /// Returns `None` when the trailer never ran.
    ///
    /// # Errors
    ///
    /// Returns an IO error if a recorded file cannot be read
    pub fn read(&self) -> Result<Option<ShellSnapshot>, TaskError> {
        let cwd = match fs::read(self.cwd_file()) {
            Ok(cwd) => cwd,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let env = match fs::read(self.env_file()) {
            Ok(raw) => parse_env(&raw),
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        Ok(Some(ShellSnapshot {
            cwd: PathBuf::from(OsStr::from_bytes(cwd.strip_suffix(b"\n").unwrap_or(&cwd))),
            env,
        }))
    }
}

/// Parses NUL separated `NAME=VALUE` records, keeping their bytes
fn parse_env(raw: &[u8]) -> BTreeMap<OsString, OsString> {
    raw.split(|b| *b == 0)
        .filter_map(|record| {
            let eq = record.iter().position(|b| *b == b'=')?;
            let (name, value) = (&record[..eq], &record[eq + 1..]);
            (!name.is_empty()).then(|| {
                (
                    OsStr::from_bytes(name).to_os_string(),
                    OsStr::from_bytes(value).to_os_string(),
                )
            })
        })
        .collect()
}
