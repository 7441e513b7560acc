//! Build tool seam and execution context

use super::temp_files::ShellSnapshot;
use crate::task::{PublishCommand, TaskError};
use std::collections::BTreeMap;
use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};

/// Shell bookkeeping variables that never carry user state
const SHELL_BOOKKEEPING: [&str; 4] = ["PWD", "OLDPWD", "SHLVL", "_"];

/// Trait for the executable that publishes the image
#[allow(clippy::missing_errors_doc)]
pub trait BuildTool {
    /// Executable name or path
    fn program(&self) -> &str;

    /// Version reported by `--version`, trimmed
    fn version(&self, context: &ExecutionContext) -> Result<String, TaskError>;

    /// Runs the publish command and returns its exit code
    fn run(&self, command: &PublishCommand, context: &ExecutionContext) -> Result<i32, TaskError>;
}

/// Process state shared by the steps of one task run
///
/// Holds the working directory and environment every child process starts
/// with, and the fail-fast flag that decides whether a failing step ends the
/// run.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    /// Environment variables, byte for byte as inherited or exported
    pub env: BTreeMap<OsString, OsString>,

    /// Current working directory
    pub cwd: PathBuf,

    fail_fast: bool,
}

impl ExecutionContext {
    /// Creates a context from the current process
    #[must_use]
    pub fn new() -> Self {
        Self::with_state(
            std::env::vars_os(),
            std::env::current_dir().unwrap_or_default(),
        )
    }

    /// Creates a context with the given environment and directory
    #[must_use]
    pub fn with_state<K, V>(env: impl IntoIterator<Item = (K, V)>, cwd: impl Into<PathBuf>) -> Self
    where
        K: Into<OsString>,
        V: Into<OsString>,
    {
        Self {
            env: env.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
            cwd: cwd.into(),
            fail_fast: true,
        }
    }

    /// Returns true when a failing step ends the run
    #[must_use]
    pub fn fail_fast(&self) -> bool {
        self.fail_fast
    }

    /// Runs `f` with fail-fast suspended
    ///
    /// Fail-fast is switched back on afterwards, whatever its state before.
    pub fn isolated<R>(&mut self, f: impl FnOnce(&mut Self) -> R) -> R {
        let previous = self.fail_fast;
        self.fail_fast = false;
        tracing::debug!(previous, "Fail-fast suspended");

        let result = f(self);

        self.fail_fast = true;
        tracing::debug!("Fail-fast restored");
        result
    }

    /// Sets an environment variable
    pub fn set_env(&mut self, key: impl Into<OsString>, value: impl Into<OsString>) {
        self.env.insert(key.into(), value.into());
    }

    /// Value of an environment variable
    #[must_use]
    pub fn var(&self, key: &str) -> Option<&OsStr> {
        self.env.get(OsStr::new(key)).map(OsString::as_os_str)
    }

    /// Sets the current working directory
    pub fn set_cwd(&mut self, path: impl Into<PathBuf>) {
        self.cwd = path.into();
    }

    /// Working directory
    #[must_use]
    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    /// Adopts the directory and exported variables a shell ended with
    pub fn apply(&mut self, snapshot: ShellSnapshot) {
        let keep = |key: &OsStr| !SHELL_BOOKKEEPING.iter().any(|name| key == *name);

        self.env
            .retain(|key, _| !keep(key.as_os_str()) || snapshot.env.contains_key(key));
        for (key, value) in snapshot.env {
            if keep(key.as_os_str()) {
                self.env.insert(key, value);
            }
        }
        self.cwd = snapshot.cwd;
    }

    /// Turns a step's exit code into an error when fail-fast is on
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::BuildFailed`] for a non-zero code under fail-fast.
    pub fn check(&self, code: i32) -> Result<(), TaskError> {
        if code != 0 && self.fail_fast {
            return Err(TaskError::BuildFailed { code });
        }
        if code != 0 {
            tracing::warn!(code, "Step failed with fail-fast suspended");
        }
        Ok(())
    }
}

impl Default for ExecutionContext {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context() -> ExecutionContext {
        ExecutionContext::with_state(
            [
                ("HOME", "/home/task"),
                ("SHLVL", "1"),
                ("GONE", "x"),
            ],
            "/workspace",
        )
    }

    #[test]
    fn test_fail_fast_on_by_default() {
        assert!(context().fail_fast());
    }

    #[test]
    fn test_isolated_suspends_and_restores() {
        let mut ctx = context();
        let inside = ctx.isolated(|ctx| ctx.fail_fast());
        assert!(!inside);
        assert!(ctx.fail_fast());
    }

    #[test]
    fn test_isolated_restores_on_error() {
        let mut ctx = context();
        let result: Result<(), TaskError> =
            ctx.isolated(|_| Err(TaskError::PreScriptExited { code: 3 }));
        assert!(result.is_err());
        assert!(ctx.fail_fast());
    }

    #[test]
    fn test_check_respects_fail_fast() {
        let mut ctx = context();
        assert_eq!(ctx.check(0), Ok(()));
        assert_eq!(ctx.check(4), Err(TaskError::BuildFailed { code: 4 }));
        assert_eq!(ctx.isolated(|ctx| ctx.check(4)), Ok(()));
    }

    #[test]
    fn test_apply_snapshot() {
        let mut ctx = context();
        ctx.apply(ShellSnapshot {
            cwd: PathBuf::from("/"),
            env: BTreeMap::from([
                ("HOME".into(), "/home/task".into()),
                ("NEW".into(), "value".into()),
                ("PWD".into(), "/".into()),
            ]),
        });

        assert_eq!(ctx.cwd(), Path::new("/"));
        assert_eq!(ctx.var("NEW"), Some(OsStr::new("value")));
        assert_eq!(ctx.var("GONE"), None);
        assert_eq!(ctx.var("PWD"), None);
        assert_eq!(ctx.var("SHLVL"), Some(OsStr::new("1")));
    }

    #[test]
    fn test_non_utf8_values_are_kept() {
        use std::os::unix::ffi::OsStrExt;

        let raw = OsStr::from_bytes(b"caf\xe9");
        let mut ctx = context();
        ctx.set_env("LATIN1", raw);
        assert_eq!(ctx.var("LATIN1"), Some(raw));
    }
}
