//! Dependency selection and lookup

mod registry;

pub use registry::{CellarRegistry, InstalledKeg, InstalledRegistry, StaticRegistry};

use std::collections::HashMap;

use kiln_errors::{ConfigError, DependencyError, Error};
use kiln_platform::ProcessOperations;
use kiln_types::{
    holds, BuildMode, ConditionContext, Dependency, DependencyKind, DependencyPhase, Formula,
    LocatedDependency, PlatformInfo, ResolvedOptions,
};

/// Select the dependencies that apply to this build
///
/// Declared order is kept. A dependency listed more than once with the same
/// sub-options is kept once; two different selections in one variant group
/// are rejected.
pub fn select_dependencies(
    formula: &Formula,
    options: &ResolvedOptions,
    mode: BuildMode,
    platform: &PlatformInfo,
) -> Result<Vec<Dependency>, ConfigError> {
    let ctx = ConditionContext {
        options,
        mode,
        platform,
    };

    let mut selected: Vec<Dependency> = Vec::new();
    let mut groups: HashMap<String, usize> = HashMap::new();

    for dep in &formula.dependencies {
        let wanted = match dep.kind {
            DependencyKind::Required => true,
            DependencyKind::Recommended | DependencyKind::Optional => dep
                .implicit_option()
                .is_some_and(|name| options.is_enabled(name)),
        };
        if !wanted || !holds(dep.when.as_ref(), &ctx) {
            continue;
        }

        let group = dep.variant_group().to_string();
        if let Some(&index) = groups.get(&group) {
            let existing = &selected[index];
            if existing.name == dep.name && existing.sub_options == dep.sub_options {
                continue;
            }
            return Err(ConfigError::ConflictingDependencies {
                group,
                first: describe(existing),
                second: describe(dep),
            });
        }

        groups.insert(group, selected.len());
        selected.push(dep.clone());
    }

    tracing::debug!(
        formula = %formula.name,
        count = selected.len(),
        "selected dependencies"
    );
    Ok(selected)
}

fn describe(dep: &Dependency) -> String {
    if dep.sub_options.is_empty() {
        dep.name.clone()
    } else {
        format!("{} [{}]", dep.name, dep.sub_options.join(", "))
    }
}

/// Resolve selected dependencies to installed prefixes
///
/// Build-time tools that are not installed as formulae may be satisfied by an
/// executable of the same name on `PATH`.
pub async fn locate_dependencies(
    selected: &[Dependency],
    registry: &dyn InstalledRegistry,
    process: &dyn ProcessOperations,
) -> Result<Vec<LocatedDependency>, Error> {
    let mut located = Vec::with_capacity(selected.len());

    for dep in selected {
        if let Some(keg) = registry.lookup(&dep.name).await? {
            located.push(LocatedDependency {
                name: dep.name.clone(),
                phase: dep.phase,
                prefix: keg.prefix,
                version: keg.version,
            });
            continue;
        }

        if dep.phase == DependencyPhase::Build {
            if let Ok(path) = process.which(dep.short_name()).await {
                // <prefix>/bin/<tool>
                let prefix = path
                    .parent()
                    .and_then(|bin| bin.parent())
                    .map(std::path::Path::to_path_buf)
                    .unwrap_or_default();
                tracing::debug!(name = %dep.name, path = %path.display(), "build tool found on PATH");
                located.push(LocatedDependency {
                    name: dep.name.clone(),
                    phase: dep.phase,
                    prefix,
                    version: None,
                });
                continue;
            }
        }

        return Err(DependencyError::NotInstalled {
            name: dep.name.clone(),
            phase: dep.phase.to_string(),
        }
        .into());
    }

    Ok(located)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use kiln_platform::{CommandOutput, PlatformCommand, PlatformContext};
    use kiln_types::{Condition, OsFamily};
    use std::collections::BTreeMap;
    use std::path::PathBuf;

    fn formula(deps: Vec<Dependency>) -> Formula {
        let mut formula = crate::formula::parse_formula(
            "name: demo\nurl: https://example.org/demo-1.0.tar.gz\nchecksum: { sha256: \
             0000000000000000000000000000000000000000000000000000000000000000 }\n\
             version: '1.0'\ninstall:\n  configure: { program: cmake }\n",
        )
        .unwrap();
        formula.dependencies = deps;
        formula
    }

    fn opts(pairs: &[(&str, bool)]) -> ResolvedOptions {
        ResolvedOptions::from_map(
            pairs
                .iter()
                .map(|(k, v)| ((*k).to_string(), *v))
                .collect::<BTreeMap<_, _>>(),
        )
    }

    fn linux() -> PlatformInfo {
        PlatformInfo::new(OsFamily::Linux, "6.1", "x86_64")
    }

    #[test]
    fn test_kinds_follow_implicit_options() {
        let f = formula(vec![
            Dependency::new("boost"),
            Dependency::new("qt").kind(DependencyKind::Recommended),
            Dependency::new("homebrew/science/openni").kind(DependencyKind::Optional),
        ]);

        let names = |o: &ResolvedOptions| -> Vec<String> {
            select_dependencies(&f, o, BuildMode::Release, &linux())
                .unwrap()
                .into_iter()
                .map(|d| d.name)
                .collect()
        };

        assert_eq!(
            names(&opts(&[("qt", true), ("openni", false)])),
            vec!["boost", "qt"]
        );
        assert_eq!(
            names(&opts(&[("qt", false), ("openni", true)])),
            vec!["boost", "homebrew/science/openni"]
        );
    }

    #[test]
    fn test_conditional_variants() {
        let mut with_qt = Dependency::new("vtk5")
            .kind(DependencyKind::Recommended)
            .when(Condition::with("qvtk"));
        with_qt.sub_options = vec!["with-qt".to_string()];
        let plain = Dependency::new("vtk5")
            .kind(DependencyKind::Recommended)
            .when(Condition::without("qvtk"));
        let f = formula(vec![with_qt, plain]);

        let on = select_dependencies(
            &f,
            &opts(&[("vtk5", true), ("qvtk", true)]),
            BuildMode::Release,
            &linux(),
        )
        .unwrap();
        assert_eq!(on.len(), 1);
        assert_eq!(on[0].sub_options, vec!["with-qt"]);

        let off = select_dependencies(
            &f,
            &opts(&[("vtk5", true), ("qvtk", false)]),
            BuildMode::Release,
            &linux(),
        )
        .unwrap();
        assert_eq!(off.len(), 1);
        assert!(off[0].sub_options.is_empty());
    }

    #[test]
    fn test_group_conflict() {
        let mut a = Dependency::new("qhull");
        a.group = Some("qhull".to_string());
        let mut b = Dependency::new("qhull2011").kind(DependencyKind::Optional);
        b.group = Some("qhull".to_string());
        let f = formula(vec![a, b]);

        let ok = select_dependencies(&f, &opts(&[("qhull2011", false)]), BuildMode::Release, &linux());
        assert_eq!(ok.unwrap().len(), 1);

        let err = select_dependencies(&f, &opts(&[("qhull2011", true)]), BuildMode::Release, &linux())
            .unwrap_err();
        assert!(matches!(err, ConfigError::ConflictingDependencies { ref group, .. } if group == "qhull"));
    }

    #[test]
    fn test_duplicate_declaration_kept_once() {
        let f = formula(vec![Dependency::new("eigen"), Dependency::new("eigen")]);
        let selected = select_dependencies(&f, &opts(&[]), BuildMode::Head, &linux()).unwrap();
        assert_eq!(selected.len(), 1);
    }

    struct PathTools(Vec<&'static str>);

    #[async_trait]
    impl ProcessOperations for PathTools {
        async fn execute_command(
            &self,
            _ctx: &PlatformContext,
            _cmd: PlatformCommand,
        ) -> Result<CommandOutput, Error> {
            unreachable!("lookup never spawns")
        }

        async fn which(&self, program: &str) -> Result<PathBuf, Error> {
            if self.0.contains(&program) {
                Ok(PathBuf::from("/usr/bin").join(program))
            } else {
                Err(kiln_errors::PlatformError::CommandNotFound {
                    command: program.to_string(),
                }
                .into())
            }
        }
    }

    #[tokio::test]
    async fn test_locate_uses_registry_then_path() {
        let registry = StaticRegistry::new().with("boost", "/opt/kiln/Cellar/boost/1.55.0");
        let selected = vec![Dependency::new("cmake").build(), Dependency::new("boost")];

        let located = locate_dependencies(&selected, &registry, &PathTools(vec!["cmake"]))
            .await
            .unwrap();
        assert_eq!(located[0].prefix, PathBuf::from("/usr"));
        assert_eq!(located[1].prefix, PathBuf::from("/opt/kiln/Cellar/boost/1.55.0"));
    }

    #[tokio::test]
    async fn test_runtime_dependency_not_on_path() {
        let selected = vec![Dependency::new("flann")];
        let err = locate_dependencies(&selected, &StaticRegistry::new(), &PathTools(vec!["flann"]))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Dependency(DependencyError::NotInstalled { ref phase, .. }) if phase == "runtime"
        ));
    }
}
