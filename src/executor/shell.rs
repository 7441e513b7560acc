//! Pre-publish script execution
//!
//! The script runs in a child shell with fail-fast suspended: failing
//! commands do not stop it, only an explicit `exit` does. When the script
//! falls through, the directory it ended in and the variables it exported
//! carry over into the build step.
//!
//! The script is handed to the shell as `$1` and evaluated, never spliced
//! into the shell's own source, so nothing it leaves open (a trailing `\`,
//! an unterminated here-document) can reach the lines after it:
//!
//! ```text
//! bash -c 'set +e
//! eval "$1"
//! pwd > <state>/cwd && env -0 > <state>/env
//! exit 0' pre-publish-script <user script>
//! ```
//!
//! A script that exits the shell never reaches the trailer, which is how an
//! explicit `exit 0` is told apart from falling through.

use super::temp_files::ShellState;
use super::traits::ExecutionContext;
use crate::task::TaskError;
use std::os::unix::process::ExitStatusExt;
use std::process::{Command, ExitStatus};

/// `$0` of the shell running the script, shown in its error messages
const SCRIPT_NAME: &str = "pre-publish-script";

/// Converts a child's exit status into the code the task exits with
///
/// A child killed by a signal maps to `128 + signal`, as shells report it.
#[must_use]
pub fn exit_code(status: ExitStatus) -> i32 {
    status
        .code()
        .unwrap_or_else(|| 128 + status.signal().unwrap_or(0))
}

/// Maps a spawn failure of `program`
pub(crate) fn spawn_error(program: &str, err: &std::io::Error) -> TaskError {
    TaskError::Spawn {
        program: program.to_string(),
        reason: err.to_string(),
    }
}

/// Runs the pre-publish script inside an isolated execution context
#[derive(Debug, Clone)]
pub struct PreScriptRunner {
    shell: String,
}

impl PreScriptRunner {
    /// Creates a runner using `shell` (invoked as `<shell> -c`)
    #[must_use]
    pub fn new(shell: impl Into<String>) -> Self {
        Self {
            shell: shell.into(),
        }
    }

    /// Runs `script`; an empty script is a no-op
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::PreScriptExited`] when the script exits the shell,
    /// whatever the code, and [`TaskError::Spawn`] if the shell cannot start.
    pub fn run(&self, script: &str, context: &mut ExecutionContext) -> Result<(), TaskError> {
        if script.is_empty() {
            return Ok(());
        }
        context.isolated(|context| self.run_block(script, context))
    }

    fn run_block(&self, script: &str, context: &mut ExecutionContext) -> Result<(), TaskError> {
        let state = ShellState::new()?;
        let errexit = if context.fail_fast() { "set -e" } else { "set +e" };
        let block = format!("{errexit}\neval \"$1\"{}", state.trailer());

        tracing::info!(shell = %self.shell, cwd = %context.cwd().display(), "Running pre-publish script");

        let status = Command::new(&self.shell)
            .arg("-c")
            .arg(&block)
            .arg(SCRIPT_NAME)
            .arg(script)
            .current_dir(context.cwd())
            .env_clear()
            .envs(&context.env)
            .status()
            .map_err(|e| spawn_error(&self.shell, &e))?;

        let Some(snapshot) = state.read()? else {
            let code = exit_code(status);
            tracing::info!(code, "Pre-publish script exited the task");
            return Err(TaskError::PreScriptExited { code });
        };

        tracing::debug!(cwd = %snapshot.cwd.display(), "Pre-publish script completed");
        context.apply(snapshot);
        Ok(())
    }
}
