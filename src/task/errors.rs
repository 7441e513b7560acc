//! Error types for the publish task

use thiserror::Error;

/// Errors that end a task run
///
/// Every variant maps to a single process exit code; see [`TaskError::exit_code`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TaskError {
    /// A task parameter could not be decoded
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The credentials workspace contains both accepted file names
    #[error(
        "'dockerconfig' workspace provides multiple config files.\nThe config must provided using a single '.dockerconfigjson' or a single 'config.json' file."
    )]
    CredentialConflict,

    /// Something unrelated already occupies the credential link location
    #[error("Credential link '{path}' already exists.")]
    CredentialLinkExists {
        /// Location of the existing entry.
        path: String,
    },

    /// The pre-publish script terminated the shell itself
    #[error("Pre-publish script exited with code {code}")]
    PreScriptExited {
        /// Exit code of the script's shell.
        code: i32,
    },

    /// The build tool returned a non-zero exit code
    #[error("Build tool failed with exit code {code}")]
    BuildFailed {
        /// Exit code returned by the build tool.
        code: i32,
    },

    /// The build tool could not report its version
    #[error("Unable to determine the build tool version: {0}")]
    VersionProbe(String),

    /// A child process could not be started
    #[error("failed to start '{program}': {reason}")]
    Spawn {
        /// Program that failed to start.
        program: String,
        /// Operating system error.
        reason: String,
    },

    /// The build finished without writing a digest
    #[error("Image digest file '{path}' was not written by the build.")]
    MissingDigest {
        /// Where the digest was expected.
        path: String,
    },

    /// The digest written by the build has an unexpected shape
    #[error("Invalid image digest: '{value}'.")]
    InvalidDigest {
        /// The rejected digest text.
        value: String,
    },

    /// IO error occurred
    #[error("IO error: {0}")]
    Io(String),
}

impl From<std::io::Error> for TaskError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl TaskError {
    /// Exit code the task process terminates with
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::PreScriptExited { code } | Self::BuildFailed { code } => *code,
            Self::Spawn { .. } => 127,
            _ => 1,
        }
    }

    /// Returns true when the failure was already reported by a child process
    ///
    /// Silent errors print nothing; the child's own output explains them.
    #[must_use]
    pub fn is_silent(&self) -> bool {
        matches!(self, Self::PreScriptExited { .. } | Self::BuildFailed { .. })
    }
}

/// Errors raised while decoding task parameters
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// A build property contains a semicolon outside double quotes
    #[error(
        "Invalid BUILD_PROPS property: '{0}'.\nTo assign a list of values, the values must be enclosed with double quotes. For example: MyProperty=\"Value1;Value2\"."
    )]
    UnquotedSemicolon(String),

    /// An environment variable entry is not `NAME=VALUE`
    #[error("Invalid ENV_VARS value: '{0}'. Expected NAME=VALUE.")]
    InvalidEnvVar(String),

    /// A positional value appeared before any list switch
    #[error("Unexpected argument '{0}'.")]
    UnexpectedArgument(String),
}
