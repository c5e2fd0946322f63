//! The formula evaluator state machine
//!
//! `Init -> OptionsResolved -> DependenciesSelected -> RequirementsChecked ->
//! SourceAcquired -> PatchesApplied -> Configured -> Built -> Installed ->
//! TestsRun -> Done`. `TestsRun` is skipped when no test step was selected. A
//! failure is attributed to the stage being entered.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use kiln_errors::Error;
use kiln_events::{AppEvent, BuildEvent, EventEmitter};
use kiln_platform::{Platform, PlatformContext};
use kiln_types::{
    BuildMode, BuildRequest, ConditionContext, Formula, InstallReport, InvocationPlan,
    LocatedDependency, PlanPhase, ResolvedOptions, Stage, TestOutcome,
};
use thiserror::Error;

use super::context::EvaluationContext;
use crate::dependencies::{
    locate_dependencies, select_dependencies, CellarRegistry, InstalledRegistry,
};
use crate::execute::{execute_phase, run_tests};
use crate::options::resolve_request;
use crate::patches::apply_patches;
use crate::plan::{build_invocation_plan, PlanLayout};
use crate::requirements::check_requirements;
use crate::source::{acquire_source, Fetcher, SourceOrigin};
use crate::workdir::WorkDir;

/// A full install request
#[derive(Debug, Clone, Default)]
pub struct InstallRequest {
    pub build: BuildRequest,
    /// Use this staged tree instead of downloading or cloning
    pub source_dir: Option<PathBuf>,
}

/// Terminal failure of a run, naming the stage that failed
#[derive(Debug, Clone, Error)]
#[error("{stage} stage failed: {error}")]
pub struct StageFailure {
    pub stage: Stage,
    #[source]
    pub error: Error,
}

impl StageFailure {
    /// Process exit code for this failure
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        self.stage.exit_code()
    }
}

/// Emits the stage events around one stage
struct StageTimer<'a> {
    ctx: &'a EvaluationContext,
    formula: &'a str,
    stage: Stage,
    start: Instant,
}

impl<'a> StageTimer<'a> {
    fn start(ctx: &'a EvaluationContext, formula: &'a str, stage: Stage) -> Self {
        ctx.emit_stage_started(formula, stage);
        Self {
            ctx,
            formula,
            stage,
            start: Instant::now(),
        }
    }

    fn finish<T, E: Into<Error>>(self, result: Result<T, E>) -> Result<T, StageFailure> {
        match result {
            Ok(value) => {
                self.ctx
                    .emit_stage_completed(self.formula, self.stage, elapsed_ms(self.start));
                Ok(value)
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    fn fail<E: Into<Error>>(self, error: E) -> StageFailure {
        let error = error.into();
        self.ctx.emit_stage_failed(self.formula, self.stage, &error);
        tracing::debug!(formula = self.formula, stage = %self.stage, error = %error, "stage failed");
        StageFailure {
            stage: self.stage,
            error,
        }
    }
}

fn elapsed_ms(start: Instant) -> u64 {
    u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX)
}

/// Resolved choices shared by `plan` and `install`
struct Selection {
    options: ResolvedOptions,
    mode: BuildMode,
    dependencies: Vec<LocatedDependency>,
}

/// What the work-directory stages produced
struct BuildOutcome {
    plan: InvocationPlan,
    patches_applied: Vec<String>,
    commands_run: usize,
    tests: TestOutcome,
}

/// Evaluates one formula against an explicit context
pub struct Evaluator {
    formula: Arc<Formula>,
    ctx: EvaluationContext,
    platform: Platform,
    registry: Arc<dyn InstalledRegistry>,
}

impl std::fmt::Debug for Evaluator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Evaluator")
            .field("formula", &self.formula.name)
            .field("ctx", &self.ctx)
            .finish_non_exhaustive()
    }
}

impl Evaluator {
    /// Evaluator using the host platform and the context's cellar
    #[must_use]
    pub fn new(formula: Formula, ctx: EvaluationContext) -> Self {
        let registry = Arc::new(CellarRegistry::new(ctx.cellar.clone()));
        Self {
            formula: Arc::new(formula),
            ctx,
            platform: Platform::current(),
            registry,
        }
    }

    #[must_use]
    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }

    #[must_use]
    pub fn with_registry(mut self, registry: Arc<dyn InstalledRegistry>) -> Self {
        self.registry = registry;
        self
    }

    #[must_use]
    pub fn formula(&self) -> &Formula {
        &self.formula
    }

    #[must_use]
    pub fn context(&self) -> &EvaluationContext {
        &self.ctx
    }

    fn platform_context(&self) -> PlatformContext {
        PlatformContext::new(self.ctx.event_sender.clone())
    }

    fn layout(&self, source_dir: PathBuf) -> PlanLayout {
        PlanLayout {
            source_dir,
            cellar: self.ctx.cellar.clone(),
            global_prefix: self.ctx.prefix.clone(),
            jobs: self.ctx.jobs,
            base_path: self.ctx.base_path.clone(),
        }
    }

    fn condition_context<'a>(&'a self, selection: &'a Selection) -> ConditionContext<'a> {
        ConditionContext {
            options: &selection.options,
            mode: selection.mode,
            platform: &self.ctx.platform,
        }
    }

    /// Options, dependencies and host checks; nothing is spawned
    async fn select(&self, request: &BuildRequest) -> Result<Selection, StageFailure> {
        let name = self.formula.name.as_str();

        let timer = StageTimer::start(&self.ctx, name, Stage::OptionsResolved);
        let options = timer.finish(resolve_request(&self.formula, request))?;
        let (enabled, disabled): (Vec<_>, Vec<_>) = options.iter().partition(|(_, on)| *on);
        self.ctx.emit(AppEvent::Build(BuildEvent::OptionsResolved {
            formula: name.to_string(),
            enabled: enabled.into_iter().map(|(n, _)| n.to_string()).collect(),
            disabled: disabled.into_iter().map(|(n, _)| n.to_string()).collect(),
        }));
        let mode = request.mode;

        let timer = StageTimer::start(&self.ctx, name, Stage::DependenciesSelected);
        let located = async {
            let selected = select_dependencies(&self.formula, &options, mode, &self.ctx.platform)?;
            let located =
                locate_dependencies(&selected, &*self.registry, self.platform.process()).await?;
            // a provisional render surfaces placeholder errors before any work starts
            build_invocation_plan(
                &self.formula,
                &options,
                mode,
                &self.ctx.platform,
                &located,
                &self.layout(self.ctx.work_root.clone()),
            )?;
            Ok::<_, Error>(located)
        }
        .await;
        let dependencies = timer.finish(located)?;
        for dep in &dependencies {
            self.ctx.emit(AppEvent::Build(BuildEvent::DependencyLocated {
                name: dep.name.clone(),
                phase: dep.phase,
                prefix: dep.prefix.clone(),
            }));
        }

        let selection = Selection {
            options,
            mode,
            dependencies,
        };
        let timer = StageTimer::start(&self.ctx, name, Stage::RequirementsChecked);
        timer.finish(check_requirements(
            &self.formula,
            &self.condition_context(&selection),
        ))?;

        Ok(selection)
    }

    /// Render the invocation plan without fetching or spawning anything
    ///
    /// The source directory in the plan is where an install would unpack
    /// the source; the real path carries a per-run suffix.
    ///
    /// # Errors
    ///
    /// Returns the failing stage for bad options, conflicting or missing
    /// dependencies, unmet preconditions and unknown placeholders.
    pub async fn plan(&self, request: &BuildRequest) -> Result<InvocationPlan, StageFailure> {
        let selection = self.select(request).await?;
        let source_dir = self
            .ctx
            .work_root
            .join(format!(
                "{}-{}",
                self.formula.name,
                self.formula.version_for(selection.mode)
            ))
            .join("src")
            .join(&self.formula.name);

        build_invocation_plan(
            &self.formula,
            &selection.options,
            selection.mode,
            &self.ctx.platform,
            &selection.dependencies,
            &self.layout(source_dir),
        )
        .map_err(|error| StageFailure {
            stage: Stage::Configured,
            error,
        })
    }

    /// Run the whole state machine
    ///
    /// The work directory is removed afterwards, on success and on failure,
    /// unless the context asks to keep it.
    ///
    /// # Errors
    ///
    /// Returns the first failing stage together with its error.
    pub async fn install(&self, request: &InstallRequest) -> Result<InstallReport, StageFailure> {
        let start = Instant::now();
        let name = self.formula.name.clone();
        self.ctx.emit(AppEvent::Build(BuildEvent::SessionStarted {
            formula: name.clone(),
            version: self.formula.version_for(request.build.mode).to_string(),
            mode: request.build.mode,
        }));

        let selection = self.select(&request.build).await?;

        let timer = StageTimer::start(&self.ctx, &name, Stage::SourceAcquired);
        let created = WorkDir::create(
            &self.ctx.work_root,
            &self.formula.name,
            self.formula.version_for(selection.mode),
        )
        .await;
        let work_dir = match created {
            Ok(dir) => dir,
            Err(e) => return Err(timer.fail(e)),
        };

        let result = self.build_in(&work_dir, timer, &selection, request).await;
        let kept = work_dir.finish(self.ctx.keep_work_dir).await;

        let BuildOutcome {
            plan,
            patches_applied,
            commands_run,
            tests,
        } = result?;
        let duration_ms = elapsed_ms(start);
        self.ctx.emit(AppEvent::Build(BuildEvent::SessionCompleted {
            formula: name.clone(),
            version: plan.version.clone(),
            prefix: plan.prefix.clone(),
            duration_ms,
        }));

        Ok(InstallReport {
            formula: name,
            version: plan.version,
            mode: selection.mode,
            prefix: plan.prefix,
            options: selection.options,
            dependencies: selection.dependencies,
            patches_applied,
            commands_run,
            tests,
            duration_ms,
            work_dir: kept,
        })
    }

    /// Stages that need the work directory, starting inside source acquisition
    async fn build_in(
        &self,
        work_dir: &WorkDir,
        timer: StageTimer<'_>,
        selection: &Selection,
        request: &InstallRequest,
    ) -> Result<BuildOutcome, StageFailure> {
        let name = self.formula.name.as_str();
        let cond = self.condition_context(selection);
        let pctx = self.platform_context();
        let settings = self.ctx.execution_settings();

        let origin = request
            .source_dir
            .as_deref()
            .map_or(SourceOrigin::Upstream, SourceOrigin::Local);
        let source = async {
            let fetcher = Fetcher::new(self.ctx.timeout)?;
            acquire_source(
                &self.formula,
                &cond,
                origin,
                &work_dir.src(),
                &fetcher,
                &self.platform,
                &pctx,
            )
            .await
        }
        .await;
        let source = timer.finish(source)?;

        let timer = StageTimer::start(&self.ctx, name, Stage::PatchesApplied);
        let patches_applied = timer.finish(
            apply_patches(
                &source.root,
                name,
                &self.formula.patches,
                &cond,
                &source.fetched,
                &self.ctx,
            )
            .await,
        )?;

        let plan = build_invocation_plan(
            &self.formula,
            &selection.options,
            selection.mode,
            &self.ctx.platform,
            &selection.dependencies,
            &self.layout(source.root.clone()),
        )
        .map_err(|error| StageFailure {
            stage: Stage::Configured,
            error,
        })?;

        let mut commands_run = 0;
        for (stage, phase) in [
            (Stage::Configured, PlanPhase::Configure),
            (Stage::Built, PlanPhase::Build),
            (Stage::Installed, PlanPhase::Install),
        ] {
            let timer = StageTimer::start(&self.ctx, name, stage);
            commands_run += timer.finish(
                execute_phase(&plan, phase, &self.platform, &pctx, &settings, &self.ctx).await,
            )?;
        }

        let tests = if plan.phase(PlanPhase::Test).next().is_none() {
            TestOutcome::NotRun
        } else {
            let timer = StageTimer::start(&self.ctx, name, Stage::TestsRun);
            timer.finish(run_tests(&plan, &self.platform, &pctx, &settings, &self.ctx).await)?
        };
        if let TestOutcome::Passed { commands } = tests {
            commands_run += commands;
        }

        Ok(BuildOutcome {
            plan,
            patches_applied,
            commands_run,
            tests,
        })
    }
}
