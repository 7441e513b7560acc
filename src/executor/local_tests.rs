//! Tests for the task runner
//!
//! Most tests stand a shell script in for `dotnet`: it answers `--version`
//! with `9.0` and otherwise runs the test's body.

use super::*;
use crate::infrastructure::results::{IMAGE_DIGEST_RESULT, IMAGE_RESULT};
use crate::task::parameters::names;
use pretty_assertions::assert_eq;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const SDK_IMAGE: &str = "test-image-registry.svc:5000/dotnet-images/sdk";

struct Fixture {
    dir: TempDir,
    config: TaskConfig,
}

impl Fixture {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let home = dir.path().join("home");
        fs::create_dir(&home).unwrap();
        let config = TaskConfig {
            results_dir: dir.path().join("results"),
            digest_file: dir.path().join("IMAGE_DIGEST"),
            base_image_targets: dir.path().join("OverrideBaseImage.targets"),
            home_dir: home,
            build_tool: dir.path().join("dotnet").display().to_string(),
            shell: "bash".to_string(),
            ..TaskConfig::default()
        };
        fs::create_dir(&config.results_dir).unwrap();
        Self { dir, config }
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    fn log(&self) -> PathBuf {
        self.path("log")
    }

    fn log_lines(&self) -> Vec<String> {
        fs::read_to_string(self.log())
            .unwrap_or_default()
            .lines()
            .map(str::to_string)
            .collect()
    }

    /// Writes the stub build tool
    fn stub(&self, body: &str) {
        let script = format!(
            "#!/bin/sh\nif [ \"$1\" = \"--version\" ]; then echo \"9.0\" && exit 0; fi\n{body}\n"
        );
        let path = PathBuf::from(&self.config.build_tool);
        fs::write(&path, script).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    }

    /// Stub body writing `digest` and exiting with `code`
    fn publishing_stub(&self, digest: &str, code: i32) {
        self.stub(&format!(
            "echo '{digest}' > '{}'\nexit {code}",
            self.config.digest_file.display()
        ));
    }

    /// Stub body recording its arguments, one per line
    fn recording_stub(&self) {
        self.stub(&format!(
            "for arg in \"$@\"; do printf '%s\\n' \"$arg\"; done >> '{}'\necho 'sha256:deadbeef' > '{}'",
            self.log().display(),
            self.config.digest_file.display()
        ));
    }

    fn runner(&self) -> TaskRunner {
        TaskRunner::new(self.config.clone())
    }

    fn result_entries(&self) -> usize {
        fs::read_dir(&self.config.results_dir).unwrap().count()
    }
}

fn params(vars: &[(&str, &str)], positional: &[&str]) -> TaskParameters {
    let mut map: HashMap<String, String> = HashMap::from([
        (names::SDK_IMAGE.to_string(), SDK_IMAGE.to_string()),
        (names::NAMESPACE.to_string(), "test-namespace".to_string()),
    ]);
    for (k, v) in vars {
        map.insert((*k).to_string(), (*v).to_string());
    }
    let positional: Vec<String> = positional.iter().map(|a| (*a).to_string()).collect();
    TaskParameters::decode(|name| map.get(name).cloned(), &positional).unwrap()
}

#[test]
fn test_results_are_written() {
    for image_name in [
        "quay.io/username/image-name:latest",
        "quay.io/username/image-name",
    ] {
        let fixture = Fixture::new();
        fixture.publishing_stub("sha256:82xyza4f", 0);

        let result = fixture
            .runner()
            .run(&params(&[(names::IMAGE_NAME, image_name)], &[]))
            .unwrap();

        assert_eq!(result.digest, "sha256:82xyza4f");
        let results = &fixture.config.results_dir;
        assert_eq!(
            fs::read_to_string(results.join(IMAGE_DIGEST_RESULT)).unwrap(),
            "sha256:82xyza4f"
        );
        assert_eq!(
            fs::read_to_string(results.join(IMAGE_RESULT)).unwrap(),
            "quay.io/username/image-name@sha256:82xyza4f"
        );
        assert_eq!(fixture.result_entries(), 2);
    }
}

#[test]
fn test_default_registry_comes_from_sdk_image() {
    let fixture = Fixture::new();
    fixture.publishing_stub("sha256:deadbeef", 0);

    let result = fixture
        .runner()
        .run(&params(&[(names::IMAGE_NAME, "ns/app")], &[]))
        .unwrap();
    assert_eq!(
        result.image_with_digest,
        "test-image-registry.svc:5000/ns/app@sha256:deadbeef"
    );
}

#[test]
fn test_build_failure_propagates_code() {
    let fixture = Fixture::new();
    fixture.publishing_stub("sha256:deadbeef", 3);

    let err = fixture.runner().run(&params(&[], &[])).unwrap_err();
    assert_eq!(err, TaskError::BuildFailed { code: 3 });
    assert_eq!(fixture.result_entries(), 0);
}

#[test]
fn test_missing_digest_is_a_failure() {
    let fixture = Fixture::new();
    fixture.stub("exit 0");
    fs::write(&fixture.config.digest_file, "sha256:stale").unwrap();

    let err = fixture.runner().run(&params(&[], &[])).unwrap_err();
    assert!(matches!(err, TaskError::MissingDigest { .. }));
    assert_eq!(err.exit_code(), 1);
    assert_eq!(fixture.result_entries(), 0);
}

#[test]
fn test_minimal_publish_command() {
    let fixture = Fixture::new();
    fixture.recording_stub();

    fixture.runner().run(&params(&[], &[])).unwrap();

    let digest_arg = format!(
        "--getResultOutputFile:{}",
        fixture.config.digest_file.display()
    );
    assert_eq!(
        fixture.log_lines(),
        vec![
            "publish",
            "--getProperty:GeneratedContainerDigest",
            digest_arg.as_str(),
            "-v",
            "",
            "-p:ContainerRegistry=test-image-registry.svc:5000",
            "-p:ContainerRepository=",
            "-p:ContainerImageTag=",
            "-p:ContainerImageTags=latest",
            "/t:PublishContainer",
            "",
        ]
    );
}

#[test]
fn test_build_props_reach_the_tool() {
    let fixture = Fixture::new();
    fixture.recording_stub();

    fixture
        .runner()
        .run(&params(
            &[],
            &["--build-props", "Prop1=Value 1", "Prop2=\"Value 2;\""],
        ))
        .unwrap();

    assert_eq!(
        &fixture.log_lines()[..4],
        &[
            "publish",
            "-p:Prop1=Value 1",
            "-p:Prop2=\"Value 2;\"",
            "--getProperty:GeneratedContainerDigest"
        ]
    );
}

#[test]
fn test_base_image_is_expanded_and_targets_written() {
    let fixture = Fixture::new();
    fixture.recording_stub();

    fixture
        .runner()
        .run(&params(
            &[(names::BASE_IMAGE, "runtime-repo")],
            &["--build-props", "ContainerFamily=ubi8"],
        ))
        .unwrap();

    let lines = fixture.log_lines();
    let targets = format!(
        "-p:CustomBeforeDirectoryBuildProps={}",
        fixture.config.base_image_targets.display()
    );
    assert!(lines.contains(&targets));
    assert!(lines.contains(
        &"-p:BASE_IMAGE=test-image-registry.svc:5000/runtime-repo:9.0-ubi8".to_string()
    ));
    assert_eq!(
        lines
            .iter()
            .rev()
            .find(|l| l.starts_with("-p:ContainerFamily=")),
        Some(&"-p:ContainerFamily=ubi8".to_string())
    );
    assert!(fixture.config.base_image_targets.exists());
}

#[test]
fn test_no_base_image_means_no_override() {
    let fixture = Fixture::new();
    fixture.recording_stub();

    fixture.runner().run(&params(&[], &[])).unwrap();

    let lines = fixture.log_lines();
    assert!(!lines.iter().any(|l| l.starts_with("-p:CustomBeforeDirectoryBuildProps=")));
    assert!(!lines.iter().any(|l| l.starts_with("-p:ContainerFamily=")));
    assert!(!fixture.config.base_image_targets.exists());
}

#[test]
fn test_env_vars_reach_the_tool() {
    let fixture = Fixture::new();
    fixture.stub(&format!(
        "env >> '{}'\necho 'sha256:deadbeef' > '{}'",
        fixture.log().display(),
        fixture.config.digest_file.display()
    ));

    fixture
        .runner()
        .run(&params(&[], &["--env-vars", "ENV1=VAL 1", "ENV2=VAL 2"]))
        .unwrap();

    let lines = fixture.log_lines();
    assert!(lines.contains(&"ENV1=VAL 1".to_string()));
    assert!(lines.contains(&"ENV2=VAL 2".to_string()));
}

#[test]
fn test_source_workspace_is_working_directory() {
    let fixture = Fixture::new();
    let source = fixture.path("source");
    fs::create_dir(&source).unwrap();
    fixture.stub(&format!(
        "pwd >> '{}'\necho 'sha256:deadbeef' > '{}'",
        fixture.log().display(),
        fixture.config.digest_file.display()
    ));

    fixture
        .runner()
        .run(&params(
            &[
                ("WORKSPACE_SOURCE_BOUND", "true"),
                ("WORKSPACE_SOURCE_PATH", source.display().to_string().as_str()),
            ],
            &[],
        ))
        .unwrap();

    let lines = fixture.log_lines();
    assert_eq!(
        fs::canonicalize(&lines[0]).unwrap(),
        fs::canonicalize(&source).unwrap()
    );
}

#[test]
fn test_pre_script_directory_persists_into_failed_build() {
    let fixture = Fixture::new();
    let log = fixture.log().display().to_string();
    let script = format!(
        "set +e\ncd /\n\necho \"script\" >> '{log}'\npwd >> '{log}'\n[[ $- == *e* ]] && echo \"errexit enabled\" >> '{log}' || echo \"errexit disabled\" >> '{log}'"
    );
    fixture.stub(&format!(
        "echo \"dotnet\" >> '{log}'\npwd >> '{log}'\necho 'sha256:deadbeef' > '{}'\nexit 1",
        fixture.config.digest_file.display()
    ));

    let err = fixture
        .runner()
        .run(&params(&[(names::PRE_PUBLISH_SCRIPT, script.as_str())], &[]))
        .unwrap_err();

    assert_eq!(err, TaskError::BuildFailed { code: 1 });
    assert_eq!(err.exit_code(), 1);
    assert_eq!(
        fixture.log_lines(),
        vec!["script", "/", "errexit disabled", "dotnet", "/"]
    );
    assert_eq!(fixture.result_entries(), 0);
}

#[test]
fn test_pre_script_exit_skips_the_build() {
    let fixture = Fixture::new();
    let log = fixture.log().display().to_string();
    fixture.stub(&format!("echo \"dotnet\" >> '{log}'"));

    let err = fixture
        .runner()
        .run(&params(
            &[(
                names::PRE_PUBLISH_SCRIPT,
                format!("echo \"hello\" >> '{log}'\nexit 1").as_str(),
            )],
            &[],
        ))
        .unwrap_err();

    assert_eq!(err, TaskError::PreScriptExited { code: 1 });
    assert_eq!(fixture.log_lines(), vec!["hello"]);
    assert_eq!(fixture.result_entries(), 0);
}

#[test]
fn test_pre_script_output_precedes_build() {
    let fixture = Fixture::new();
    let log = fixture.log().display().to_string();
    fixture.stub(&format!(
        "echo 'dotnet' >> '{log}'\necho 'sha256:deadbeef' > '{}'",
        fixture.config.digest_file.display()
    ));

    fixture
        .runner()
        .run(&params(
            &[(
                names::PRE_PUBLISH_SCRIPT,
                format!("echo \"hello\" >> '{log}'\necho \"world\" >> '{log}'").as_str(),
            )],
            &[],
        ))
        .unwrap();

    assert_eq!(fixture.log_lines(), vec!["hello", "world", "dotnet"]);
}

#[test]
fn test_credential_conflict_stops_before_build() {
    let fixture = Fixture::new();
    let creds = fixture.path("creds");
    fs::create_dir(&creds).unwrap();
    fs::write(creds.join("config.json"), "").unwrap();
    fs::write(creds.join(".dockerconfigjson"), "").unwrap();
    fixture.stub(&format!("echo \"dotnet\" >> '{}'", fixture.log().display()));

    let err = fixture
        .runner()
        .run(&params(
            &[
                ("WORKSPACE_DOCKERCONFIG_BOUND", "true"),
                ("WORKSPACE_DOCKERCONFIG_PATH", creds.display().to_string().as_str()),
            ],
            &[],
        ))
        .unwrap_err();

    assert_eq!(err, TaskError::CredentialConflict);
    assert!(fixture.log_lines().is_empty());
    assert_eq!(fixture.result_entries(), 0);
}

#[test]
fn test_credentials_are_linked_before_build() {
    let fixture = Fixture::new();
    let creds = fixture.path("creds");
    fs::create_dir(&creds).unwrap();
    fs::write(creds.join(".dockerconfigjson"), "{}").unwrap();
    let link = fixture.config.home_dir.join(".config/containers/auth.json");
    fixture.stub(&format!(
        "test -L '{}' && echo linked >> '{}'\necho 'sha256:deadbeef' > '{}'",
        link.display(),
        fixture.log().display(),
        fixture.config.digest_file.display()
    ));

    fixture
        .runner()
        .run(&params(
            &[
                ("WORKSPACE_DOCKERCONFIG_BOUND", "true"),
                ("WORKSPACE_DOCKERCONFIG_PATH", creds.display().to_string().as_str()),
            ],
            &[],
        ))
        .unwrap();

    assert_eq!(fixture.log_lines(), vec!["linked"]);
    assert_eq!(fs::read_link(&link).unwrap(), creds.join(".dockerconfigjson"));
}

#[test]
fn test_missing_build_tool() {
    let fixture = Fixture::new();
    let err = fixture.runner().run(&params(&[], &[])).unwrap_err();
    assert!(matches!(err, TaskError::Spawn { .. }));
    assert_eq!(fixture.result_entries(), 0);
}

/// In-process build tool recording the commands it receives
struct FakeTool {
    digest_file: PathBuf,
    calls: RefCell<Vec<Vec<String>>>,
}

impl FakeTool {
    fn new(digest_file: &Path) -> Self {
        Self {
            digest_file: digest_file.to_path_buf(),
            calls: RefCell::new(Vec::new()),
        }
    }
}

impl BuildTool for FakeTool {
    fn program(&self) -> &str {
        "fake-dotnet"
    }

    fn version(&self, _context: &ExecutionContext) -> Result<String, TaskError> {
        Ok("8.0.404".to_string())
    }

    fn run(&self, command: &PublishCommand, _context: &ExecutionContext) -> Result<i32, TaskError> {
        self.calls.borrow_mut().push(command.args().to_vec());
        fs::write(&self.digest_file, "sha256:abc123\n")?;
        Ok(0)
    }
}

#[test]
fn test_runner_with_custom_tool() {
    let fixture = Fixture::new();
    let tool = FakeTool::new(&fixture.config.digest_file);
    let runner = TaskRunner::with_tool(fixture.config.clone(), tool);

    let result = runner
        .run(&params(
            &[
                (names::IMAGE_NAME, "app:v1"),
                (names::BASE_IMAGE, "server.io/ns/runtime-repo"),
            ],
            &[],
        ))
        .unwrap();

    assert_eq!(
        result.image_with_digest,
        "test-image-registry.svc:5000/app@sha256:abc123"
    );
    let calls = runner.tool.calls.borrow();
    assert_eq!(calls.len(), 1);
    assert!(calls[0].contains(&"-p:BASE_IMAGE=server.io/ns/runtime-repo:8.0".to_string()));
    assert!(calls[0].contains(&"-p:ContainerImageTags=v1".to_string()));
    assert!(calls[0].contains(&"-p:ContainerFamily=".to_string()));
}

#[test]
fn test_dry_run_has_no_side_effects() {
    let fixture = Fixture::new();
    let tool = FakeTool::new(&fixture.config.digest_file);
    let runner = TaskRunner::with_tool(fixture.config.clone(), tool);

    let plan = runner
        .dry_run(&params(
            &[
                (names::IMAGE_NAME, "quay.io/u/app"),
                (names::BASE_IMAGE, "runtime-repo:tag1"),
                (names::PRE_PUBLISH_SCRIPT, "exit 1"),
            ],
            &["--env-vars", "A=1"],
        ))
        .unwrap();

    assert_eq!(plan.program, "fake-dotnet");
    assert_eq!(plan.args.args()[0], "publish");
    assert!(plan.args.args().contains(
        &"-p:BASE_IMAGE=test-image-registry.svc:5000/runtime-repo:tag1".to_string()
    ));
    assert_eq!(plan.env_vars.len(), 1);
    assert!(runner.tool.calls.borrow().is_empty());
    assert!(!fixture.config.base_image_targets.exists());
    assert_eq!(fixture.result_entries(), 0);
}
