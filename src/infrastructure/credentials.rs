//! Registry credentials from the `dockerconfig` workspace
//!
//! The workspace may provide either a `config.json` or a `.dockerconfigjson`
//! file. The selected file is linked to `~/.config/containers/auth.json`,
//! where the build tool looks for registry auth.

use crate::task::{TaskError, Workspace};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Credential file names accepted in the workspace
pub const CONFIG_FILE_NAMES: [&str; 2] = ["config.json", ".dockerconfigjson"];

/// Link location, relative to the home directory
pub const AUTH_FILE: &str = ".config/containers/auth.json";

/// Publishes workspace credentials at the well-known location
#[derive(Debug, Clone)]
pub struct CredentialResolver {
    link: PathBuf,
}

impl CredentialResolver {
    /// Creates a resolver linking into `home_dir`
    #[must_use]
    pub fn new(home_dir: &Path) -> Self {
        Self {
            link: home_dir.join(AUTH_FILE),
        }
    }

    /// Location of the credential link
    #[must_use]
    pub fn link_path(&self) -> &Path {
        &self.link
    }

    /// Selects the credential file in `dir`
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::CredentialConflict`] when both names are present.
    pub fn select(dir: &Path) -> Result<Option<PathBuf>, TaskError> {
        let found: Vec<PathBuf> = CONFIG_FILE_NAMES
            .iter()
            .map(|name| dir.join(name))
            .filter(|path| path.is_file())
            .collect();

        match found.as_slice() {
            [] => Ok(None),
            [single] => Ok(Some(single.clone())),
            _ => Err(TaskError::CredentialConflict),
        }
    }

    /// Links the workspace's credential file, if any
    ///
    /// Returns the linked file. An unbound workspace or one without
    /// credentials is not an error.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::CredentialConflict`] on ambiguous credentials and
    /// [`TaskError::CredentialLinkExists`] when the link location is taken.
    pub fn resolve(&self, workspace: &Workspace) -> Result<Option<PathBuf>, TaskError> {
        let Some(dir) = workspace.path() else {
            return Ok(None);
        };
        let Some(selected) = Self::select(dir)? else {
            tracing::debug!(workspace = %dir.display(), "No registry credentials provided");
            return Ok(None);
        };

        self.link_to(&selected)?;
        tracing::info!(
            source = %selected.display(),
            link = %self.link.display(),
            "Linked registry credentials"
        );
        Ok(Some(selected))
    }

    fn link_to(&self, target: &Path) -> Result<(), TaskError> {
        let exists = || TaskError::CredentialLinkExists {
            path: self.link.display().to_string(),
        };

        match std::fs::read_link(&self.link) {
            Ok(current) if current == target => return Ok(()),
            Ok(_) => return Err(exists()),
            Err(_) if self.link.symlink_metadata().is_ok() => return Err(exists()),
            Err(_) => {}
        }

        if let Some(parent) = self.link.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::os::unix::fs::symlink(target, &self.link).map_err(|e| match e.kind() {
            ErrorKind::AlreadyExists => exists(),
            _ => TaskError::from(e),
        })
    }
}
