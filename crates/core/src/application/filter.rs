// External process filter (single-file build execution contract)
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::application::artifact::TemporaryArtifact;
use crate::application::tool::ExternalTool;
use crate::domain::{
    FilterError, FilterInvocation, FilterOptions, FilterOutcome, InvocationPhase, PhaseTrail,
    ProcessRequest, ProcessResult, Settings, UnsupportedMode,
};
use crate::port::{ArtifactFactory, ProcessError, ProcessRunner, TimeProvider};

/// Placeholder shown for the output path when previewing a command
pub const OUTPUT_PLACEHOLDER: &str = "<output>";

/// Pipeline stage contract: content and source path in, tagged outcome out
#[async_trait]
pub trait Filter: Send + Sync {
    fn name(&self) -> &str;

    async fn input(&self, input: &[u8], source_path: &Path) -> FilterOutcome;
}

/// Everything observed during one invocation
#[derive(Debug)]
pub struct FilterReport {
    pub outcome: FilterOutcome,
    pub phases: PhaseTrail,

    /// Executed command line; `None` when nothing was launched
    pub command: Option<Vec<String>>,

    pub artifact_path: Option<PathBuf>,

    /// False only when releasing the artifact itself failed
    pub cleaned_up: bool,

    pub duration_ms: i64,
}

/// Runs one external build tool per invocation and relays its output artifact
pub struct ExternalProcessFilter {
    tool: Arc<dyn ExternalTool>,
    options: FilterOptions,
    runner: Arc<dyn ProcessRunner>,
    artifacts: Arc<dyn ArtifactFactory>,
    time_provider: Arc<dyn TimeProvider>,
}

impl ExternalProcessFilter {
    /// Create a new external process filter
    ///
    /// # Arguments
    /// * `tool` - Profile of the wrapped tool (e.g. `RequireJs`)
    /// * `options` - Options used when invoked through [`Filter::input`]
    /// * `runner` - Launches the child process
    /// * `artifacts` - Allocates the per-invocation output artifact
    /// * `time_provider` - Time provider for duration tracking
    pub fn new(
        tool: Arc<dyn ExternalTool>,
        options: FilterOptions,
        runner: Arc<dyn ProcessRunner>,
        artifacts: Arc<dyn ArtifactFactory>,
        time_provider: Arc<dyn TimeProvider>,
    ) -> Self {
        Self {
            tool,
            options,
            runner,
            artifacts,
            time_provider,
        }
    }

    /// Create a filter whose options are resolved from pipeline settings
    pub fn from_settings(
        tool: Arc<dyn ExternalTool>,
        settings: &Settings,
        runner: Arc<dyn ProcessRunner>,
        artifacts: Arc<dyn ArtifactFactory>,
        time_provider: Arc<dyn TimeProvider>,
    ) -> crate::domain::error::Result<Self> {
        let options = tool.resolve_options(settings)?;
        Ok(Self::new(tool, options, runner, artifacts, time_provider))
    }

    pub fn options(&self) -> &FilterOptions {
        &self.options
    }

    /// Snapshot of the configured options for one unit of work
    fn invocation(&self, input: &[u8], source_path: &Path) -> FilterInvocation {
        FilterInvocation::new(source_path, self.options.clone()).with_input(input.to_vec())
    }

    /// Assemble the child process request for a single-file build
    fn build_request(&self, invocation: &FilterInvocation, output_path: &Path) -> ProcessRequest {
        let options = &invocation.options;
        let args = self
            .tool
            .build_args(invocation.source_path(), output_path, &options.extra_args);

        ProcessRequest::new(options.binary_or(self.tool.default_binary()), args)
            .with_stdin(invocation.input.clone())
            .with_timeout(options.timeout_ms)
    }

    /// Command line that would run, with the output path left as a placeholder
    pub fn preview_command(&self, source_path: &Path) -> Vec<String> {
        self.build_request(&self.invocation(&[], source_path), Path::new(OUTPUT_PLACEHOLDER))
            .command_line()
    }

    pub async fn apply(&self, input: &[u8], source_path: &Path) -> FilterOutcome {
        self.apply_with_report(input, source_path).await.outcome
    }

    /// Run one build and return the outcome with its lifecycle details
    pub async fn apply_with_report(&self, input: &[u8], source_path: &Path) -> FilterReport {
        let invocation = self.invocation(input, source_path);
        self.execute(&invocation).await
    }

    async fn execute(&self, invocation: &FilterInvocation) -> FilterReport {
        let tool = self.tool.name().to_string();
        let started_at = self.time_provider.now_millis();
        let mut phases = PhaseTrail::new();

        if let Some(built_main) = &invocation.options.built_main {
            warn!(
                tool = %tool,
                built_main = %built_main.display(),
                "Whole-project build requested; declining"
            );
            return FilterReport {
                outcome: FilterOutcome::Unsupported(UnsupportedMode {
                    tool,
                    built_main: built_main.clone(),
                }),
                phases,
                command: None,
                artifact_path: None,
                cleaned_up: true,
                duration_ms: self.elapsed_since(started_at),
            };
        }

        let artifact = match TemporaryArtifact::allocate(self.artifacts.as_ref()) {
            Ok(artifact) => artifact,
            Err(e) => {
                error!(tool = %tool, error = %e, "Cannot allocate temporary output");
                enter(&mut phases, InvocationPhase::Failed);
                return FilterReport {
                    outcome: FilterError::ArtifactAllocation {
                        tool,
                        reason: e.to_string(),
                    }
                    .into(),
                    phases,
                    command: None,
                    artifact_path: None,
                    cleaned_up: true,
                    duration_ms: self.elapsed_since(started_at),
                };
            }
        };

        let request = self.build_request(invocation, artifact.path());
        let command = request.command_line();

        enter(&mut phases, InvocationPhase::Launching);
        info!(
            tool = %tool,
            command = ?command,
            timeout_ms = ?request.timeout_ms,
            "Launching external tool"
        );

        let outcome = match self.runner.run(&request).await {
            Ok(result) => {
                enter(&mut phases, InvocationPhase::Running);
                self.classify(result, &artifact)
            }
            Err(ProcessError::SpawnFailed(reason)) => FilterError::ToolLaunch {
                tool: tool.clone(),
                binary: request.program.to_string_lossy().into_owned(),
                reason,
            }
            .into(),
            Err(ProcessError::Timeout(timeout_ms)) => {
                enter(&mut phases, InvocationPhase::Running);
                FilterError::Timeout {
                    tool: tool.clone(),
                    timeout_ms,
                }
                .into()
            }
            Err(ProcessError::IoError(reason)) => {
                enter(&mut phases, InvocationPhase::Running);
                FilterError::Io {
                    tool: tool.clone(),
                    reason,
                }
                .into()
            }
        };

        match &outcome {
            FilterOutcome::Success(bytes) => {
                enter(&mut phases, InvocationPhase::Succeeded);
                info!(tool = %tool, output_bytes = bytes.len(), "External tool succeeded");
            }
            FilterOutcome::Failure(e) => {
                enter(&mut phases, InvocationPhase::Failed);
                error!(tool = %tool, error = %e, "External tool failed");
            }
            FilterOutcome::Unsupported(_) => enter(&mut phases, InvocationPhase::Failed),
        }

        let artifact_path = artifact.path().to_path_buf();
        let cleaned_up = match artifact.release() {
            Ok(()) => true,
            Err(e) => {
                warn!(
                    tool = %tool,
                    path = %artifact_path.display(),
                    error = %e,
                    "Temporary artifact cleanup failed"
                );
                false
            }
        };

        FilterReport {
            outcome,
            phases,
            command: Some(command),
            artifact_path: Some(artifact_path),
            cleaned_up,
            duration_ms: self.elapsed_since(started_at),
        }
    }

    /// Non-zero exit is a tool error; otherwise the artifact is the output
    fn classify(&self, result: ProcessResult, artifact: &TemporaryArtifact<'_>) -> FilterOutcome {
        let tool = self.tool.name().to_string();

        if !result.success() {
            return FilterError::ToolExecution {
                tool,
                exit_code: result.exit_code,
                stderr: result.stderr,
                stdout: result.stdout,
            }
            .into();
        }

        match artifact.read() {
            Ok(bytes) => FilterOutcome::Success(bytes),
            Err(e) => FilterError::ArtifactRead {
                tool,
                path: artifact.path().to_path_buf(),
                reason: e.to_string(),
            }
            .into(),
        }
    }

    fn elapsed_since(&self, started_at: i64) -> i64 {
        self.time_provider.now_millis() - started_at
    }
}

#[async_trait]
impl Filter for ExternalProcessFilter {
    fn name(&self) -> &str {
        self.tool.name()
    }

    async fn input(&self, input: &[u8], source_path: &Path) -> FilterOutcome {
        self.apply(input, source_path).await
    }
}

fn enter(phases: &mut PhaseTrail, next: InvocationPhase) {
    if let Err(e) = phases.advance(next) {
        warn!(error = %e, "Unexpected invocation phase transition");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::tool::RequireJs;
    use crate::port::artifact_factory::mocks::InMemoryArtifacts;
    use crate::port::process_runner::mocks::{MockBehavior, ScriptedProcessRunner};
    use crate::port::time_provider::mocks::SteppingClock;
    use InvocationPhase::*;

    fn filter_with(
        runner: Arc<ScriptedProcessRunner>,
        artifacts: Arc<InMemoryArtifacts>,
        options: FilterOptions,
    ) -> ExternalProcessFilter {
        ExternalProcessFilter::new(
            Arc::new(RequireJs),
            options,
            runner,
            artifacts,
            Arc::new(SteppingClock::new(1000, 5)),
        )
    }

    fn source() -> &'static Path {
        Path::new("static/app.build.js")
    }

    #[tokio::test]
    async fn test_success_returns_artifact_bytes_and_cleans_up() {
        let artifacts = Arc::new(InMemoryArtifacts::new());
        let runner = Arc::new(ScriptedProcessRunner::new_writing(
            "bundled-output",
            artifacts.clone(),
        ));
        let filter = filter_with(runner.clone(), artifacts.clone(), FilterOptions::default());

        let report = filter.apply_with_report(b"", source()).await;

        assert_eq!(report.outcome.into_result().unwrap(), b"bundled-output".to_vec());
        assert_eq!(report.phases.phases(), &[Idle, Launching, Running, Succeeded]);
        assert!(report.cleaned_up);
        assert_eq!(report.duration_ms, 5);
        assert_eq!(artifacts.live_count(), 0);
        assert!(!artifacts.exists(&report.artifact_path.unwrap()));
        assert_eq!(runner.call_count(), 1);
    }

    #[tokio::test]
    async fn test_command_line_shape() {
        let artifacts = Arc::new(InMemoryArtifacts::new());
        let runner = Arc::new(ScriptedProcessRunner::new_writing("x", artifacts.clone()));
        let options = FilterOptions {
            extra_args: vec![
                "optimize=none".to_string(),
                "OUT=elsewhere.js".to_string(),
                "wrap=true".to_string(),
            ],
            ..Default::default()
        };
        let filter = filter_with(runner.clone(), artifacts.clone(), options);

        let report = filter.apply_with_report(b"", source()).await;
        assert!(report.outcome.is_success());

        let requests = runner.requests();
        let request = &requests[0];
        assert_eq!(request.program, PathBuf::from("r.js"));
        assert_eq!(
            request.args,
            vec![
                "-o".to_string(),
                "static/app.build.js".to_string(),
                "out=/virtual/artifact-1.out".to_string(),
                "optimize=none".to_string(),
                "wrap=true".to_string(),
            ]
        );
        let out_args = request
            .args
            .iter()
            .filter(|a| a.to_ascii_lowercase().starts_with("out="))
            .count();
        assert_eq!(out_args, 1);
        assert_eq!(report.command.unwrap()[0], "r.js");
    }

    #[tokio::test]
    async fn test_whole_project_build_never_launches() {
        let artifacts = Arc::new(InMemoryArtifacts::new());
        let runner = Arc::new(ScriptedProcessRunner::new_writing("x", artifacts.clone()));
        let options = FilterOptions {
            built_main: Some(PathBuf::from("js/main.js")),
            ..Default::default()
        };
        let filter = filter_with(runner.clone(), artifacts.clone(), options);

        let report = filter.apply_with_report(b"", source()).await;

        match report.outcome {
            FilterOutcome::Unsupported(mode) => {
                assert_eq!(mode.tool, "requirejs");
                assert_eq!(mode.built_main, PathBuf::from("js/main.js"));
            }
            other => panic!("expected Unsupported, got {:?}", other),
        }
        assert_eq!(runner.call_count(), 0);
        assert!(artifacts.allocated_paths().is_empty());
        assert_eq!(report.phases.phases(), &[Idle]);
        assert!(report.command.is_none());
    }

    #[tokio::test]
    async fn test_nonzero_exit_carries_diagnostics() {
        let artifacts = Arc::new(InMemoryArtifacts::new());
        let runner = Arc::new(ScriptedProcessRunner::new_exit(
            2,
            "Tracing dependencies for: main",
            "Error: Cannot find module 'jquery'",
        ));
        let filter = filter_with(runner, artifacts.clone(), FilterOptions::default());

        let report = filter.apply_with_report(b"", source()).await;

        let err = report.outcome.into_result().unwrap_err();
        let message = err.to_string();
        assert!(message.contains("stderr=Error: Cannot find module 'jquery'"));
        assert!(message.contains("stdout=Tracing dependencies for: main"));
        assert!(message.contains("returncode=2"));
        match err {
            FilterError::ToolExecution { exit_code, .. } => assert_eq!(exit_code, 2),
            other => panic!("expected ToolExecution, got {:?}", other),
        }
        assert_eq!(report.phases.current(), Failed);
        assert_eq!(artifacts.live_count(), 0);
    }

    #[tokio::test]
    async fn test_launch_failure_cleans_up() {
        let artifacts = Arc::new(InMemoryArtifacts::new());
        let runner = Arc::new(ScriptedProcessRunner::new_spawn_fail(
            "No such file or directory (os error 2)",
        ));
        let options = FilterOptions {
            binary: Some(PathBuf::from("/missing/r.js")),
            ..Default::default()
        };
        let filter = filter_with(runner, artifacts.clone(), options);

        let report = filter.apply_with_report(b"", source()).await;

        match report.outcome.into_result() {
            Err(FilterError::ToolLaunch { binary, reason, .. }) => {
                assert_eq!(binary, "/missing/r.js");
                assert!(reason.contains("os error 2"));
            }
            other => panic!("expected ToolLaunch, got {:?}", other),
        }
        assert_eq!(report.phases.phases(), &[Idle, Launching, Failed]);
        assert_eq!(artifacts.allocated_paths().len(), 1);
        assert_eq!(artifacts.live_count(), 0);
    }

    #[tokio::test]
    async fn test_missing_artifact_after_success_exit() {
        let artifacts = Arc::new(InMemoryArtifacts::new());
        let runner = Arc::new(ScriptedProcessRunner::new_exit(0, "", ""));
        let filter = filter_with(runner, artifacts.clone(), FilterOptions::default());

        let outcome = filter.apply(b"", source()).await;

        assert!(matches!(
            outcome.into_result(),
            Err(FilterError::ArtifactRead { .. })
        ));
        assert_eq!(artifacts.live_count(), 0);
    }

    #[tokio::test]
    async fn test_timeout_is_reported() {
        let artifacts = Arc::new(InMemoryArtifacts::new());
        let runner = Arc::new(ScriptedProcessRunner::new(MockBehavior::Timeout(250)));
        let options = FilterOptions {
            timeout_ms: Some(250),
            ..Default::default()
        };
        let filter = filter_with(runner.clone(), artifacts.clone(), options);

        let report = filter.apply_with_report(b"", source()).await;

        assert!(matches!(
            report.outcome.into_result(),
            Err(FilterError::Timeout { timeout_ms: 250, .. })
        ));
        assert_eq!(runner.requests()[0].timeout_ms, Some(250));
        assert_eq!(artifacts.live_count(), 0);
    }

    #[tokio::test]
    async fn test_wait_io_error_is_reported_and_cleans_up() {
        let artifacts = Arc::new(InMemoryArtifacts::new());
        let runner = Arc::new(ScriptedProcessRunner::new(MockBehavior::IoError(
            "stdout pipe closed unexpectedly".to_string(),
        )));
        let filter = filter_with(runner, artifacts.clone(), FilterOptions::default());

        let report = filter.apply_with_report(b"", source()).await;

        match report.outcome.into_result() {
            Err(FilterError::Io { tool, reason }) => {
                assert_eq!(tool, "requirejs");
                assert!(reason.contains("pipe closed"));
            }
            other => panic!("expected Io, got {:?}", other),
        }
        assert_eq!(report.phases.phases(), &[Idle, Launching, Running, Failed]);
        assert_eq!(artifacts.allocated_paths().len(), 1);
        assert_eq!(artifacts.live_count(), 0);
    }

    #[tokio::test]
    async fn test_allocation_failure_is_fatal_before_launch() {
        let artifacts = Arc::new(InMemoryArtifacts::new_failing_allocation());
        let runner = Arc::new(ScriptedProcessRunner::new_exit(0, "", ""));
        let filter = filter_with(runner.clone(), artifacts, FilterOptions::default());

        let report = filter.apply_with_report(b"", source()).await;

        assert!(matches!(
            report.outcome.into_result(),
            Err(FilterError::ArtifactAllocation { .. })
        ));
        assert_eq!(runner.call_count(), 0);
        assert_eq!(report.phases.phases(), &[Idle, Failed]);
    }

    #[tokio::test]
    async fn test_release_failure_keeps_outcome() {
        let artifacts = Arc::new(InMemoryArtifacts::new_failing_release());
        let runner = Arc::new(ScriptedProcessRunner::new_writing("ok", artifacts.clone()));
        let filter = filter_with(runner, artifacts, FilterOptions::default());

        let report = filter.apply_with_report(b"", source()).await;

        assert!(!report.cleaned_up);
        assert_eq!(report.outcome.into_result().unwrap(), b"ok".to_vec());
    }

    #[tokio::test]
    async fn test_concurrent_invocations_use_distinct_artifacts() {
        let artifacts = Arc::new(InMemoryArtifacts::new());
        let runner = Arc::new(ScriptedProcessRunner::new_writing("x", artifacts.clone()));
        let filter = filter_with(runner.clone(), artifacts.clone(), FilterOptions::default());

        let (a, b) = tokio::join!(
            filter.apply_with_report(b"first", source()),
            filter.apply_with_report(b"second", source())
        );

        assert_ne!(a.artifact_path, b.artifact_path);
        assert_eq!(artifacts.allocated_paths().len(), 2);
        assert_eq!(artifacts.live_count(), 0);
    }

    #[test]
    fn test_filter_trait_uses_configured_options() {
        let artifacts = Arc::new(InMemoryArtifacts::new());
        let runner = Arc::new(ScriptedProcessRunner::new_writing("piped", artifacts.clone()));
        let options = FilterOptions {
            binary: Some(PathBuf::from("node_modules/.bin/r.js")),
            ..Default::default()
        };
        let filter = filter_with(runner.clone(), artifacts, options);

        let outcome = tokio_test::block_on(filter.input(b"console.log(1)", Path::new("b.js")));

        assert_eq!(filter.name(), "requirejs");
        assert_eq!(outcome.into_result().unwrap(), b"piped".to_vec());
        let request = &runner.requests()[0];
        assert_eq!(request.program, PathBuf::from("node_modules/.bin/r.js"));
        assert_eq!(request.stdin, b"console.log(1)".to_vec());
    }

    #[test]
    fn test_preview_command_uses_placeholder() {
        let artifacts = Arc::new(InMemoryArtifacts::new());
        let runner = Arc::new(ScriptedProcessRunner::new_exit(0, "", ""));
        let filter = filter_with(runner.clone(), artifacts.clone(), FilterOptions::default());

        let command = filter.preview_command(source());

        assert_eq!(command, vec!["r.js", "-o", "static/app.build.js", "out=<output>"]);
        assert_eq!(runner.call_count(), 0);
        assert!(artifacts.allocated_paths().is_empty());
    }

    #[tokio::test]
    async fn test_preview_matches_launched_command() {
        let artifacts = Arc::new(InMemoryArtifacts::new());
        let runner = Arc::new(ScriptedProcessRunner::new_writing("x", artifacts.clone()));
        let options = FilterOptions {
            binary: Some(PathBuf::from("/opt/r.js")),
            extra_args: vec!["optimize=none".to_string()],
            ..Default::default()
        };
        let filter = filter_with(runner, artifacts, options);

        let preview = filter.preview_command(source());
        let report = filter.apply_with_report(b"", source()).await;

        let launched = report.command.unwrap();
        let own_out = format!("out={}", report.artifact_path.unwrap().display());
        let expected: Vec<String> = preview
            .into_iter()
            .map(|arg| if arg == "out=<output>" { own_out.clone() } else { arg })
            .collect();
        assert_eq!(launched, expected);
    }

    #[test]
    fn test_from_settings_resolves_requirejs_keys() {
        let mut settings = Settings::new();
        settings.set("REQUIREJS_EXTRA_ARGS", "optimize=none");
        settings.set("REQUIREJS_TIMEOUT_MS", 3000);

        let filter = ExternalProcessFilter::from_settings(
            Arc::new(RequireJs),
            &settings,
            Arc::new(ScriptedProcessRunner::new_exit(0, "", "")),
            Arc::new(InMemoryArtifacts::new()),
            Arc::new(SteppingClock::new(0, 1)),
        )
        .unwrap();

        assert_eq!(filter.options().extra_args, vec!["optimize=none".to_string()]);
        assert_eq!(filter.options().timeout_ms, Some(3000));
    }
}
