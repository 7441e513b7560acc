//! Task execution layer
//!
//! This module runs the task's steps as local processes.

mod local;
mod shell;
mod temp_files;
mod traits;

pub use local::{DotnetCli, TaskRunner};
pub use shell::{PreScriptRunner, exit_code};
pub use temp_files::{BASE_IMAGE_TARGETS, ShellSnapshot, ShellState, write_base_image_targets};
pub use traits::{BuildTool, ExecutionContext};
