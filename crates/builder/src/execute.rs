//! Sequential execution of the invocation plan

use std::time::{Duration, Instant};

use kiln_errors::{BuildError, Error};
use kiln_events::{AppEvent, BuildEvent, EventEmitter};
use kiln_platform::{CommandOutput, Platform, PlatformContext};
use kiln_types::{Invocation, InvocationPlan, PlanPhase, TestFailurePolicy, TestOutcome};

/// Output lines kept in a `CommandFailed` error
const OUTPUT_TAIL_LINES: usize = 40;

/// Knobs that apply to every command of a run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecutionSettings {
    /// Per-command limit; `None` waits indefinitely
    pub timeout: Option<Duration>,
    pub test_policy: TestFailurePolicy,
}

/// Totals of a whole-plan execution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionSummary {
    pub commands_run: usize,
    pub tests: TestOutcome,
}

/// Run every non-test command of `phase` in order, stopping at the first failure
///
/// The build directory is created before the configure phase.
///
/// # Errors
///
/// Returns `BuildError::CommandFailed` with the command line, exit code and
/// output tail of the first failing command, or a spawn/timeout error.
pub async fn execute_phase<E: EventEmitter>(
    plan: &InvocationPlan,
    phase: PlanPhase,
    platform: &Platform,
    pctx: &PlatformContext,
    settings: &ExecutionSettings,
    emitter: &E,
) -> Result<usize, Error> {
    if phase == PlanPhase::Configure {
        tokio::fs::create_dir_all(&plan.build_dir)
            .await
            .map_err(|e| Error::io_with_path(&e, &plan.build_dir))?;
    }

    let mut count = 0;
    for invocation in plan.phase(phase) {
        let output = run(plan, invocation, platform, pctx, settings, emitter).await?;
        if !output.success() {
            return Err(command_failed(invocation, &output).into());
        }
        count += 1;
    }
    Ok(count)
}

/// Run the test phase under `settings.test_policy`
///
/// With [`TestFailurePolicy::Warn`] a failing test command ends the phase
/// with [`TestOutcome::Failed`] and a warning instead of an error.
///
/// # Errors
///
/// Returns the failing command's error under the fatal policy, and spawn or
/// timeout errors under either policy.
pub async fn run_tests<E: EventEmitter>(
    plan: &InvocationPlan,
    platform: &Platform,
    pctx: &PlatformContext,
    settings: &ExecutionSettings,
    emitter: &E,
) -> Result<TestOutcome, Error> {
    let mut passed = 0;
    for invocation in plan.phase(PlanPhase::Test) {
        let output = run(plan, invocation, platform, pctx, settings, emitter).await?;
        if output.success() {
            passed += 1;
            continue;
        }
        if settings.test_policy == TestFailurePolicy::Fatal {
            return Err(command_failed(invocation, &output).into());
        }

        let command = invocation.command_line();
        emitter.emit(AppEvent::Build(BuildEvent::TestsFailed {
            formula: plan.formula.clone(),
            command: command.clone(),
            exit_code: output.exit_code,
        }));
        emitter.emit_warning_with_context(
            format!("tests failed for {}; keeping the install", plan.formula),
            output.tail(OUTPUT_TAIL_LINES),
        );
        return Ok(TestOutcome::Failed {
            command,
            exit_code: output.exit_code,
        });
    }

    Ok(if passed == 0 {
        TestOutcome::NotRun
    } else {
        TestOutcome::Passed { commands: passed }
    })
}

/// Run the whole plan: configure, build, install, then tests
///
/// # Errors
///
/// See [`execute_phase`] and [`run_tests`].
pub async fn execute<E: EventEmitter>(
    plan: &InvocationPlan,
    platform: &Platform,
    pctx: &PlatformContext,
    settings: &ExecutionSettings,
    emitter: &E,
) -> Result<ExecutionSummary, Error> {
    let mut commands_run = 0;
    for phase in [PlanPhase::Configure, PlanPhase::Build, PlanPhase::Install] {
        commands_run += execute_phase(plan, phase, platform, pctx, settings, emitter).await?;
    }
    let tests = run_tests(plan, platform, pctx, settings, emitter).await?;
    if let TestOutcome::Passed { commands } = tests {
        commands_run += commands;
    }
    Ok(ExecutionSummary {
        commands_run,
        tests,
    })
}

async fn run<E: EventEmitter>(
    plan: &InvocationPlan,
    invocation: &Invocation,
    platform: &Platform,
    pctx: &PlatformContext,
    settings: &ExecutionSettings,
    emitter: &E,
) -> Result<CommandOutput, Error> {
    let command = invocation.command_line();
    emitter.emit(AppEvent::Build(BuildEvent::CommandStarted {
        phase: invocation.phase,
        command: command.clone(),
        working_dir: invocation.working_dir.clone(),
    }));

    let mut cmd = platform.command(&invocation.program);
    cmd.args(&invocation.args)
        .current_dir(invocation.working_dir.clone())
        .envs(&plan.env)
        .timeout(settings.timeout);

    let start = Instant::now();
    let output = platform
        .execute_command(pctx, cmd)
        .await
        .map_err(|e| match e {
            Error::Platform(p) => Error::Build(BuildError::from(p)),
            other => other,
        })?;

    if output.success() {
        emitter.emit(AppEvent::Build(BuildEvent::CommandCompleted {
            phase: invocation.phase,
            command,
            duration_ms: u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
        }));
    }
    Ok(output)
}

fn command_failed(invocation: &Invocation, output: &CommandOutput) -> BuildError {
    BuildError::CommandFailed {
        phase: invocation.phase.to_string(),
        command: invocation.command_line(),
        exit_code: output.exit_code,
        output: output.tail(OUTPUT_TAIL_LINES),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use kiln_events::EventSender;
    use kiln_platform::{PlatformCommand, ProcessOperations};
    use kiln_types::{BuildMode, ResolvedOptions};
    use std::collections::BTreeMap;
    use std::path::PathBuf;
    use std::sync::{Arc, Mutex};

    /// Records commands; exits with the configured code for matching lines
    #[derive(Default)]
    struct Scripted {
        seen: Mutex<Vec<String>>,
        fail: Vec<(&'static str, i32)>,
    }

    #[async_trait]
    impl ProcessOperations for Scripted {
        async fn execute_command(
            &self,
            _ctx: &PlatformContext,
            cmd: PlatformCommand,
        ) -> Result<CommandOutput, Error> {
            let line = cmd.display();
            self.seen.lock().unwrap().push(line.clone());
            let code = self
                .fail
                .iter()
                .find(|(l, _)| *l == line)
                .map_or(0, |(_, c)| *c);
            Ok(CommandOutput {
                exit_code: Some(code),
                stdout: b"building\n".to_vec(),
                stderr: if code == 0 { Vec::new() } else { b"boom\n".to_vec() },
            })
        }

        async fn which(&self, program: &str) -> Result<PathBuf, Error> {
            Ok(PathBuf::from("/usr/bin").join(program))
        }
    }

    struct Collect(EventSender);

    impl EventEmitter for Collect {
        fn event_sender(&self) -> Option<&EventSender> {
            Some(&self.0)
        }
    }

    fn inv(phase: PlanPhase, program: &str, args: &[&str], dir: &std::path::Path) -> Invocation {
        Invocation {
            phase,
            program: program.to_string(),
            args: args.iter().map(ToString::to_string).collect(),
            working_dir: dir.to_path_buf(),
        }
    }

    fn plan(build_dir: &std::path::Path) -> InvocationPlan {
        InvocationPlan {
            formula: "pcl".to_string(),
            version: "1.7.1".to_string(),
            mode: BuildMode::Release,
            options: ResolvedOptions::default(),
            prefix: PathBuf::from("/opt/kiln/Cellar/pcl/1.7.1"),
            source_dir: build_dir.parent().unwrap().to_path_buf(),
            build_dir: build_dir.to_path_buf(),
            env: BTreeMap::from([("PATH".to_string(), "/usr/bin".to_string())]),
            invocations: vec![
                inv(PlanPhase::Configure, "cmake", &[".."], build_dir),
                inv(PlanPhase::Build, "make", &["-j2"], build_dir),
                inv(PlanPhase::Install, "make", &["install"], build_dir),
                inv(PlanPhase::Test, "make", &["test"], build_dir),
            ],
        }
    }

    fn platform(fail: Vec<(&'static str, i32)>) -> (Arc<Scripted>, Platform) {
        let ops = Arc::new(Scripted {
            seen: Mutex::new(Vec::new()),
            fail,
        });
        (ops.clone(), Platform::new(ops))
    }

    #[tokio::test]
    async fn test_runs_in_order_and_creates_build_dir() {
        let work = tempfile::tempdir().unwrap();
        let build_dir = work.path().join("macbuild");
        let (ops, platform) = platform(vec![]);
        let (tx, _rx) = kiln_events::channel();

        let summary = execute(
            &plan(&build_dir),
            &platform,
            &PlatformContext::default(),
            &ExecutionSettings::default(),
            &Collect(tx),
        )
        .await
        .unwrap();

        assert!(build_dir.is_dir());
        assert_eq!(summary.commands_run, 4);
        assert_eq!(summary.tests, TestOutcome::Passed { commands: 1 });
        assert_eq!(
            *ops.seen.lock().unwrap(),
            vec!["cmake ..", "make -j2", "make install", "make test"]
        );
    }

    #[tokio::test]
    async fn test_stops_at_first_failure() {
        let work = tempfile::tempdir().unwrap();
        let (ops, platform) = platform(vec![("make -j2", 2)]);
        let (tx, _rx) = kiln_events::channel();

        let err = execute(
            &plan(&work.path().join("build")),
            &platform,
            &PlatformContext::default(),
            &ExecutionSettings::default(),
            &Collect(tx),
        )
        .await
        .unwrap_err();

        match err {
            Error::Build(BuildError::CommandFailed {
                phase,
                command,
                exit_code,
                output,
            }) => {
                assert_eq!(phase, "build");
                assert_eq!(command, "make -j2");
                assert_eq!(exit_code, Some(2));
                assert!(output.ends_with("boom"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(ops.seen.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_failure_policy() {
        let work = tempfile::tempdir().unwrap();
        let build_dir = work.path().join("build");
        let (_ops, platform) = platform(vec![("make test", 1)]);

        let (tx, _rx) = kiln_events::channel();
        let fatal = execute(
            &plan(&build_dir),
            &platform,
            &PlatformContext::default(),
            &ExecutionSettings::default(),
            &Collect(tx),
        )
        .await;
        assert!(fatal.is_err());

        let (tx, mut rx) = kiln_events::channel();
        let settings = ExecutionSettings {
            timeout: None,
            test_policy: TestFailurePolicy::Warn,
        };
        let summary = execute(
            &plan(&build_dir),
            &platform,
            &PlatformContext::default(),
            &settings,
            &Collect(tx),
        )
        .await
        .unwrap();
        assert!(summary.tests.is_failure());
        assert_eq!(summary.commands_run, 3);

        let mut saw_failure = false;
        while let Ok(event) = rx.try_recv() {
            if matches!(event, AppEvent::Build(BuildEvent::TestsFailed { .. })) {
                saw_failure = true;
            }
        }
        assert!(saw_failure);
    }
}
