use super::shell::{PreScriptRunner, exit_code, spawn_error};
use super::temp_files::write_base_image_targets;
use super::traits::{BuildTool, ExecutionContext};
use crate::infrastructure::results::{ResultWriter, clear_digest, publish_result, read_digest};
use crate::infrastructure::{CredentialResolver, TaskConfig};
use crate::task::{
    ImageReference, PublishCommand, PublishPlan, PublishResult, TaskError, TaskParameters,
    runtime_version,
};
use std::process::Command;

/// The `dotnet` CLI, run as a local process
#[derive(Debug, Clone)]
pub struct DotnetCli {
    program: String,
}

impl DotnetCli {
    /// Creates a build tool running `program`
    #[must_use]
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn command(&self, context: &ExecutionContext) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.current_dir(context.cwd());
        cmd.env_clear();
        cmd.envs(&context.env);
        cmd
    }
}

impl BuildTool for DotnetCli {
    fn program(&self) -> &str {
        &self.program
    }

    fn version(&self, context: &ExecutionContext) -> Result<String, TaskError> {
        let output = self
            .command(context)
            .arg("--version")
            .output()
            .map_err(|e| spawn_error(&self.program, &e))?;

        if !output.status.success() {
            return Err(TaskError::VersionProbe(format!(
                "'{} --version' exited with code {}: {}",
                self.program,
                exit_code(output.status),
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    fn run(&self, command: &PublishCommand, context: &ExecutionContext) -> Result<i32, TaskError> {
        tracing::debug!(
            program = %self.program,
            command = %command,
            cwd = %context.cwd().display(),
            "Executing build tool"
        );

        let status = self
            .command(context)
            .args(command.args())
            .status()
            .map_err(|e| spawn_error(&self.program, &e))?;
        Ok(exit_code(status))
    }
}

/// Runs the publish task: credentials, pre-script, build, results
#[derive(Debug, Clone)]
pub struct TaskRunner<T = DotnetCli> {
    config: TaskConfig,
    tool: T,
}

impl TaskRunner<DotnetCli> {
    /// Creates a runner using the configured `dotnet` executable
    #[must_use]
    pub fn new(config: TaskConfig) -> Self {
        let tool = DotnetCli::new(config.build_tool.clone());
        Self { config, tool }
    }
}

impl<T: BuildTool> TaskRunner<T> {
    /// Creates a runner with a specific build tool
    #[must_use]
    pub fn with_tool(config: TaskConfig, tool: T) -> Self {
        Self { config, tool }
    }

    /// Runs the task and writes its results
    ///
    /// Steps run strictly in sequence; the first failing step ends the run
    /// and no result files are written.
    ///
    /// # Errors
    ///
    /// Returns the [`TaskError`] of the failing step.
    pub fn run(&self, params: &TaskParameters) -> Result<PublishResult, TaskError> {
        let _span = tracing::info_span!("publish", namespace = %params.namespace).entered();
        let mut context = self.context(params);

        CredentialResolver::new(&self.config.home_dir).resolve(&params.dockerconfig)?;

        let image = self.image_name(params);

        PreScriptRunner::new(&self.config.shell)
            .run(&params.pre_publish_script, &mut context)?;

        for var in &params.env_vars {
            context.set_env(&var.name, &var.value);
        }

        let command = self.publish_command(params, &image, &context)?;
        if !params.base_image.is_empty() {
            write_base_image_targets(&self.config.base_image_targets)?;
        }

        clear_digest(&self.config.digest_file)?;
        tracing::info!(image = %image, "Publishing image");
        let code = self.tool.run(&command, &context)?;
        context.check(code)?;

        let digest = read_digest(&self.config.digest_file)?;
        let result = publish_result(&image, &digest);
        ResultWriter::new(&self.config.results_dir).write(&result)?;
        Ok(result)
    }

    /// Reports what [`run`][Self::run] would execute, without side effects
    ///
    /// The build tool is only asked for its version, and only when a base
    /// image must be pinned to it.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::VersionProbe`] or [`TaskError::Spawn`] when the
    /// version cannot be determined.
    pub fn dry_run(&self, params: &TaskParameters) -> Result<PublishPlan, TaskError> {
        let mut context = self.context(params);
        for var in &params.env_vars {
            context.set_env(&var.name, &var.value);
        }

        let image = self.image_name(params);
        let command = self.publish_command(params, &image, &context)?;

        Ok(PublishPlan {
            program: self.tool.program().to_string(),
            args: command,
            working_dir: context.cwd().to_path_buf(),
            env_vars: params.env_vars.clone(),
        })
    }

    fn context(&self, params: &TaskParameters) -> ExecutionContext {
        let mut context = ExecutionContext::new();
        if let Some(source) = params.source.path() {
            context.set_cwd(source);
        }
        context
    }

    /// Registry of the SDK image, or the configured fallback
    fn default_registry(&self, params: &TaskParameters) -> String {
        ImageReference::parse(&params.sdk_image)
            .registry
            .unwrap_or_else(|| self.config.fallback_registry.clone())
    }

    fn image_name(&self, params: &TaskParameters) -> ImageReference {
        ImageReference::parse(&params.image_name).with_default_registry(&self.default_registry(params))
    }

    fn publish_command(
        &self,
        params: &TaskParameters,
        image: &ImageReference,
        context: &ExecutionContext,
    ) -> Result<PublishCommand, TaskError> {
        let mut builder = PublishCommand::builder(&self.config.digest_file, image)
            .build_properties(&params.build_props)
            .verbosity(&params.verbosity)
            .project(&params.project);

        if !params.base_image.is_empty() {
            let family = params.container_family();
            let version = runtime_version(&self.tool.version(context)?);
            let base_image = ImageReference::parse(&params.base_image)
                .with_default_registry(&self.default_registry(params))
                .with_runtime_tag(&version, family);
            tracing::debug!(base_image = %base_image, version = %version, "Resolved base image");
            builder = builder.base_image(&self.config.base_image_targets, &base_image, family);
        }

        Ok(builder.build())
    }
}

#[cfg(test)]
#[path = "local_tests.rs"]
mod local_tests;
