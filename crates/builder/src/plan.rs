//! Rendering the invocation plan
//!
//! The plan is a pure function of the formula, resolved options, build
//! mode, host, located dependencies and layout. Nothing here touches the
//! filesystem or spawns processes.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use kiln_errors::{ConfigError, Error};
use kiln_types::{
    holds, BuildMode, CommandStep, ConditionContext, Formula, Invocation, InvocationPlan,
    LocatedDependency, PlanPhase, PlatformInfo, ResolvedOptions,
};

use crate::build_systems::{BuildSystemRegistry, PARALLEL_TOOLS};
use crate::placeholders::{Placeholders, DEPS_PREFIX};

/// Paths and limits the plan is rendered against
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanLayout {
    /// Root of the (patched) source tree
    pub source_dir: PathBuf,
    /// Kegs live at `<cellar>/<name>/<version>`
    pub cellar: PathBuf,
    pub global_prefix: PathBuf,
    pub jobs: usize,
    /// `PATH` inherited from the caller, appended after dependency bins
    pub base_path: Option<String>,
}

/// Build the ordered configure → build → install → test plan
///
/// # Errors
///
/// Returns an error for unknown placeholders or a `std_args` request on a
/// configure program without standard arguments.
pub fn build_invocation_plan(
    formula: &Formula,
    options: &ResolvedOptions,
    mode: BuildMode,
    platform: &PlatformInfo,
    deps: &[LocatedDependency],
    layout: &PlanLayout,
) -> Result<InvocationPlan, Error> {
    let ctx = ConditionContext {
        options,
        mode,
        platform,
    };
    let version = formula.version_for(mode).to_string();
    let prefix = layout.cellar.join(formula.keg_name(mode));
    let build_dir = layout.source_dir.join(&formula.install.build_dir);

    let mut vars = Placeholders::new();
    vars.insert("PREFIX", path_str(&prefix));
    vars.insert("GLOBAL_PREFIX", path_str(&layout.global_prefix));
    vars.insert("NAME", formula.name.as_str());
    vars.insert("VERSION", version.as_str());
    vars.insert("JOBS", layout.jobs.to_string());
    vars.insert("SOURCE_DIR", path_str(&layout.source_dir));
    vars.insert("BUILD_DIR", path_str(&build_dir));
    for dep in deps {
        vars.insert(format!("{DEPS_PREFIX}{}", dep.short_name()), path_str(&dep.prefix));
    }

    let mut invocations = Vec::new();

    let configure = &formula.install.configure;
    let mut args = Vec::new();
    if configure.std_args {
        let system = BuildSystemRegistry::new()
            .for_program(&configure.program)
            .map(|s| s.std_args())
            .ok_or_else(|| ConfigError::Invalid {
                message: format!("no standard arguments for `{}`", configure.program),
            })?;
        args.extend(system);
    }
    args.extend(configure.args.iter().cloned());
    for entry in &configure.options {
        if entry.when.evaluate(&ctx) {
            args.extend(entry.args.iter().cloned());
        } else {
            args.extend(entry.otherwise.iter().cloned());
        }
    }
    args.extend(configure.trailing.iter().cloned());
    invocations.push(Invocation {
        phase: PlanPhase::Configure,
        program: vars.expand(&configure.program)?,
        args: vars.expand_all(&args)?,
        working_dir: build_dir.clone(),
    });

    let phases = [
        (PlanPhase::Build, &formula.install.build),
        (PlanPhase::Install, &formula.install.install),
        (PlanPhase::Test, &formula.install.test),
    ];
    for (phase, steps) in phases {
        for step in steps.iter().filter(|s| holds(s.when.as_ref(), &ctx)) {
            invocations.push(render_step(phase, step, layout.jobs, &vars, &build_dir)?);
        }
    }

    Ok(InvocationPlan {
        formula: formula.name.clone(),
        version,
        mode,
        options: options.clone(),
        prefix,
        source_dir: layout.source_dir.clone(),
        build_dir,
        env: build_env(deps, layout),
        invocations,
    })
}

fn render_step(
    phase: PlanPhase,
    step: &CommandStep,
    jobs: usize,
    vars: &Placeholders,
    build_dir: &Path,
) -> Result<Invocation, Error> {
    let program = vars.expand(&step.program)?;
    let mut args = Vec::with_capacity(step.args.len() + 1);
    if phase == PlanPhase::Build && step.parallel && is_parallel_tool(&program) {
        args.push(format!("-j{jobs}"));
    }
    args.extend(vars.expand_all(&step.args)?);
    Ok(Invocation {
        phase,
        program,
        args,
        working_dir: build_dir.to_path_buf(),
    })
}

fn is_parallel_tool(program: &str) -> bool {
    let base = Path::new(program)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(program);
    PARALLEL_TOOLS.contains(&base)
}

/// `PATH`, `PKG_CONFIG_PATH` and `CMAKE_PREFIX_PATH` for the build
fn build_env(deps: &[LocatedDependency], layout: &PlanLayout) -> BTreeMap<String, String> {
    let mut path = Vec::new();
    let mut pkg_config = Vec::new();
    let mut cmake = Vec::new();

    for prefix in deps
        .iter()
        .map(|d| d.prefix.as_path())
        .chain(std::iter::once(layout.global_prefix.as_path()))
    {
        push_unique(&mut path, path_str(&prefix.join("bin")));
        push_unique(&mut pkg_config, path_str(&prefix.join("lib").join("pkgconfig")));
        push_unique(&mut cmake, path_str(prefix));
    }
    if let Some(base) = &layout.base_path {
        for entry in base.split(':').filter(|e| !e.is_empty()) {
            push_unique(&mut path, entry.to_string());
        }
    }

    BTreeMap::from([
        ("PATH".to_string(), path.join(":")),
        ("PKG_CONFIG_PATH".to_string(), pkg_config.join(":")),
        ("CMAKE_PREFIX_PATH".to_string(), cmake.join(":")),
    ])
}

fn push_unique(list: &mut Vec<String>, entry: String) {
    if !list.contains(&entry) {
        list.push(entry);
    }
}

fn path_str(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}
