//! End-to-end runs of the bundled pcl formula against a scripted host

use async_trait::async_trait;
use kiln_builder::{
    build_invocation_plan, load_formula, parse_formula, resolve_options, select_dependencies,
    EvaluationContext, Evaluator, InstallRequest, PlanLayout, StaticRegistry,
};
use kiln_errors::Error;
use kiln_events::{AppEvent, BuildEvent, EventReceiver};
use kiln_platform::{CommandOutput, Platform, PlatformCommand, PlatformContext, ProcessOperations};
use kiln_types::{
    BuildMode, BuildRequest, Formula, LocatedDependency, OptionOverrides, OsFamily, PlatformInfo,
    Stage, TestFailurePolicy, TestOutcome,
};
use proptest::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

const INSTALLED: &[&str] = &[
    "boost",
    "eigen",
    "flann",
    "cminpack",
    "qhull2011",
    "libusb",
    "glew",
    "qt",
    "vtk5",
    "openni",
];

/// Records every spawned command line; lines starting with a listed prefix
/// exit with status 2
#[derive(Default)]
struct Recorder {
    seen: Mutex<Vec<String>>,
    fail: Vec<String>,
    clone_from: Option<PathBuf>,
}

impl Recorder {
    fn failing(lines: &[&str]) -> Self {
        Self {
            fail: lines.iter().map(ToString::to_string).collect(),
            ..Self::default()
        }
    }

    /// `git clone` fills its target with a copy of `tree`
    fn cloning(mut self, tree: PathBuf) -> Self {
        self.clone_from = Some(tree);
        self
    }

    fn seen(&self) -> Vec<String> {
        self.seen.lock().unwrap().clone()
    }
}

fn copy_dir(from: &Path, to: &Path) {
    std::fs::create_dir_all(to).unwrap();
    for entry in std::fs::read_dir(from).unwrap() {
        let entry = entry.unwrap();
        let target = to.join(entry.file_name());
        if entry.file_type().unwrap().is_dir() {
            copy_dir(&entry.path(), &target);
        } else {
            std::fs::copy(entry.path(), &target).unwrap();
        }
    }
}

#[async_trait]
impl ProcessOperations for Recorder {
    async fn execute_command(
        &self,
        _ctx: &PlatformContext,
        cmd: PlatformCommand,
    ) -> Result<CommandOutput, Error> {
        let line = cmd.display();
        self.seen.lock().unwrap().push(line.clone());
        let failed = self.fail.iter().any(|prefix| line.starts_with(prefix.as_str()));
        if !failed && line.starts_with("git clone") {
            if let (Some(tree), Some(target)) = (&self.clone_from, cmd.get_args().last()) {
                copy_dir(tree, Path::new(target));
            }
        }
        Ok(CommandOutput {
            exit_code: Some(if failed { 2 } else { 0 }),
            stdout: Vec::new(),
            stderr: if failed { b"error 2\n".to_vec() } else { Vec::new() },
        })
    }

    async fn which(&self, program: &str) -> Result<PathBuf, Error> {
        Ok(PathBuf::from("/usr/local/bin").join(program))
    }
}

fn formula_path() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("../../formulae/pcl.yml")
}

fn fixture_source() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/pcl-src")
}

fn registry(cellar: &Path, skip: &[&str]) -> StaticRegistry {
    INSTALLED
        .iter()
        .filter(|name| !skip.contains(name))
        .fold(StaticRegistry::new(), |reg, name| {
            reg.with(name, cellar.join(name).join("1.0"))
        })
}

struct Harness {
    _temp: TempDir,
    evaluator: Evaluator,
    ops: Arc<Recorder>,
    events: EventReceiver,
    prefix: PathBuf,
}

impl Harness {
    async fn new(platform: PlatformInfo, ops: Recorder, skip: &[&str]) -> Self {
        Self::with_policy(platform, ops, skip, TestFailurePolicy::Fatal).await
    }

    async fn with_policy(
        platform: PlatformInfo,
        ops: Recorder,
        skip: &[&str],
        policy: TestFailurePolicy,
    ) -> Self {
        let formula = load_formula(&formula_path()).await.unwrap();
        Self::with_formula(formula, platform, ops, skip, policy)
    }

    fn with_formula(
        formula: Formula,
        platform: PlatformInfo,
        ops: Recorder,
        skip: &[&str],
        policy: TestFailurePolicy,
    ) -> Self {
        let temp = TempDir::new().unwrap();
        let prefix = temp.path().join("prefix");
        let (tx, events) = kiln_events::channel();
        let ctx = EvaluationContext::new(prefix.clone(), platform)
            .with_work_root(temp.path().join("work"))
            .with_jobs(4)
            .with_test_policy(policy)
            .with_keep_work_dir(true)
            .with_base_path(Some("/usr/bin:/bin".to_string()))
            .with_event_sender(tx);
        let ops = Arc::new(ops);
        let evaluator = Evaluator::new(formula, ctx)
            .with_platform(Platform::new(ops.clone()))
            .with_registry(Arc::new(registry(&prefix.join("Cellar"), skip)));
        Self {
            _temp: temp,
            evaluator,
            ops,
            events,
            prefix,
        }
    }

    fn drain(&mut self) -> Vec<AppEvent> {
        let mut out = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            out.push(event);
        }
        out
    }
}

fn yosemite() -> PlatformInfo {
    PlatformInfo::new(OsFamily::Macos, "10.10.5", "x86_64")
}

fn mavericks() -> PlatformInfo {
    PlatformInfo::new(OsFamily::Macos, "10.9.5", "x86_64")
}

fn request(switches: &[&str]) -> BuildRequest {
    BuildRequest::from_switches(switches).unwrap()
}

fn install_request(switches: &[&str]) -> InstallRequest {
    InstallRequest {
        build: request(switches),
        source_dir: Some(fixture_source()),
    }
}

#[tokio::test]
async fn plan_without_apps_and_qvtk() {
    let h = Harness::new(yosemite(), Recorder::default(), &[]).await;
    let plan = h
        .evaluator
        .plan(&request(&["--without-apps", "--without-qvtk"]))
        .await
        .unwrap();

    let args = plan.configure_args();
    assert!(args.contains(&"-DBUILD_apps:BOOL=OFF".to_string()));
    assert!(args.contains(&"-DVTK_USE_QVTK:BOOL=OFF".to_string()));
    assert!(!args.contains(&"-DBUILD_tools:BOOL=OFF".to_string()));
    assert!(!args.iter().any(|a| a == "-DBUILD_apps=AUTO_OFF"));
    assert_eq!(args.last().map(String::as_str), Some(".."));
    assert!(args.contains(&format!(
        "-DQHULL_ROOT={}",
        h.prefix.join("Cellar/qhull2011/1.0").display()
    )));
    assert!(args.contains(&format!(
        "-DGLEW_INCLUDE_DIR={}/include/GL",
        h.prefix.display()
    )));
    assert!(plan.is_well_ordered());
    assert!(h.ops.seen().is_empty());
}

#[tokio::test]
async fn plan_defaults_include_apps() {
    let h = Harness::new(yosemite(), Recorder::default(), &[]).await;
    let plan = h.evaluator.plan(&BuildRequest::default()).await.unwrap();

    let args = plan.configure_args();
    assert!(args.contains(&"-DBUILD_apps=AUTO_OFF".to_string()));
    assert!(args.contains(&"-DBUILD_examples:BOOL=OFF".to_string()));
    assert!(args.contains(&"-DCMAKE_DISABLE_FIND_PACKAGE_OpenNI:BOOL=TRUE".to_string()));
    assert!(!args.contains(&"-DVTK_USE_QVTK:BOOL=OFF".to_string()));
    // no test step unless tests were requested
    assert_eq!(plan.phase(kiln_types::PlanPhase::Test).count(), 0);
}

#[tokio::test]
async fn mavericks_release_stops_before_any_command() {
    let mut h = Harness::new(mavericks(), Recorder::default(), &[]).await;
    let failure = h
        .evaluator
        .install(&install_request(&[]))
        .await
        .unwrap_err();

    assert_eq!(failure.stage, Stage::RequirementsChecked);
    assert_eq!(failure.exit_code(), 5);
    assert!(matches!(failure.error, Error::Environment(_)));
    assert!(failure.to_string().contains("--HEAD on Mavericks"));
    assert!(h.ops.seen().is_empty());

    let events = h.drain();
    assert!(events.iter().any(|e| matches!(
        e,
        AppEvent::Build(BuildEvent::StageFailed { stage: Stage::RequirementsChecked, .. })
    )));
    assert!(!events.iter().any(|e| matches!(
        e,
        AppEvent::Build(BuildEvent::StageStarted { stage: Stage::SourceAcquired, .. })
    )));
}

#[tokio::test]
async fn mavericks_head_plan_is_allowed() {
    let h = Harness::new(mavericks(), Recorder::default(), &[]).await;
    let plan = h.evaluator.plan(&request(&["--HEAD"])).await.unwrap();
    assert_eq!(plan.mode, BuildMode::Head);
    assert!(plan.prefix.ends_with("pcl/HEAD"));
}

#[tokio::test]
async fn full_install_patches_and_runs_in_order() {
    let mut h = Harness::new(yosemite(), Recorder::default(), &[]).await;
    let report = h.evaluator.install(&install_request(&[])).await.unwrap();

    assert_eq!(
        report.patches_applied,
        vec!["glu-headers", "gl-headers", "glew-qhull"]
    );
    assert_eq!(report.commands_run, 3);
    assert_eq!(report.tests, TestOutcome::NotRun);
    assert_eq!(report.prefix, h.prefix.join("Cellar/pcl/1.7.1"));

    let seen = h.ops.seen();
    assert_eq!(seen.len(), 3);
    assert!(seen[0].starts_with("cmake -DCMAKE_INSTALL_PREFIX="));
    assert!(seen[0].ends_with(" .."));
    assert_eq!(seen[1], "make -j4");
    assert_eq!(seen[2], "make install");

    let root = report.work_dir.clone().unwrap().join("src/pcl");
    let viewer =
        std::fs::read_to_string(root.join("apps/in_hand_scanner/src/opengl_viewer.cpp")).unwrap();
    assert!(viewer.contains("<OpenGL/gl.h>"));
    assert!(viewer.contains("<OpenGL/glu.h>"));
    let editor =
        std::fs::read_to_string(root.join("apps/point_cloud_editor/src/cloudEditorWidget.cpp"))
            .unwrap();
    assert!(editor.contains("<OpenGL/glu.h>"));
    let glew = std::fs::read_to_string(root.join("cmake/Modules/FindGLEW.cmake")).unwrap();
    assert!(glew.contains("FIND_LIBRARY( GLEW_GLEW_LIBRARY GLEW)"));
    assert!(!glew.contains("\"-framework GLEW\""));
    let qhull = std::fs::read_to_string(root.join("cmake/Modules/FindQhull.cmake")).unwrap();
    assert_eq!(qhull.matches("NO_DEFAULT_PATH").count(), 2);
    assert!(root.join("macbuild").is_dir());
    assert!(root.join(kiln_builder::STAMP_FILE).is_file());

    let events = h.drain();
    let patched: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            AppEvent::Build(BuildEvent::PatchApplied { patch, .. }) => Some(patch.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(patched, ["glu-headers", "gl-headers", "glew-qhull"]);
    assert!(!events.iter().any(|e| matches!(
        e,
        AppEvent::Build(BuildEvent::StageStarted { stage: Stage::TestsRun, .. })
    )));
    assert!(events
        .iter()
        .any(|e| matches!(e, AppEvent::Build(BuildEvent::SessionCompleted { .. }))));

    // the staged tree itself is never patched
    let staged = std::fs::read_to_string(
        fixture_source().join("apps/in_hand_scanner/src/opengl_viewer.cpp"),
    )
    .unwrap();
    assert!(staged.contains("<GL/gl.h>"));
}

#[tokio::test]
async fn failing_build_stops_before_install() {
    let h = Harness::new(yosemite(), Recorder::failing(&["make -j4"]), &[]).await;
    let failure = h
        .evaluator
        .install(&install_request(&[]))
        .await
        .unwrap_err();

    assert_eq!(failure.stage, Stage::Built);
    assert_eq!(failure.exit_code(), 9);
    assert!(failure.to_string().contains("make -j4"));
    let seen = h.ops.seen();
    assert_eq!(seen.len(), 2);
    assert!(!seen.iter().any(|l| l == "make install"));
}

#[tokio::test]
async fn failing_tests_warn_and_keep_the_install() {
    let mut h = Harness::with_policy(
        yosemite(),
        Recorder::failing(&["make test"]),
        &[],
        TestFailurePolicy::Warn,
    )
    .await;
    let report = h
        .evaluator
        .install(&install_request(&["--with-tests"]))
        .await
        .unwrap();

    assert!(report.tests.is_failure());
    assert_eq!(h.ops.seen().last().map(String::as_str), Some("make test"));
    assert!(h.drain().iter().any(|e| matches!(
        e,
        AppEvent::Build(BuildEvent::StageCompleted { stage: Stage::TestsRun, .. })
    )));
}

#[tokio::test]
async fn failing_tests_are_fatal_by_default() {
    let h = Harness::new(yosemite(), Recorder::failing(&["make test"]), &[]).await;
    let failure = h
        .evaluator
        .install(&install_request(&["--with-tests"]))
        .await
        .unwrap_err();

    assert_eq!(failure.stage, Stage::TestsRun);
    assert_eq!(failure.exit_code(), 11);
}

#[tokio::test]
async fn unknown_option_fails_option_resolution() {
    let h = Harness::new(yosemite(), Recorder::default(), &[]).await;
    let failure = h
        .evaluator
        .plan(&request(&["--with-foo"]))
        .await
        .unwrap_err();

    assert_eq!(failure.stage, Stage::OptionsResolved);
    assert_eq!(failure.exit_code(), 3);
    assert!(matches!(failure.error, Error::Config(_)));
}

#[tokio::test]
async fn missing_dependency_fails_selection() {
    let h = Harness::new(yosemite(), Recorder::default(), &["glew"]).await;
    let failure = h
        .evaluator
        .install(&install_request(&[]))
        .await
        .unwrap_err();

    assert_eq!(failure.stage, Stage::DependenciesSelected);
    assert_eq!(failure.exit_code(), 4);
    assert!(matches!(failure.error, Error::Dependency(_)));
    assert!(h.ops.seen().is_empty());
}

#[tokio::test]
async fn optional_dependency_not_required_unless_enabled() {
    let h = Harness::new(yosemite(), Recorder::default(), &["openni"]).await;
    assert!(h.evaluator.plan(&BuildRequest::default()).await.is_ok());

    let failure = h
        .evaluator
        .plan(&request(&["--with-openni"]))
        .await
        .unwrap_err();
    assert_eq!(failure.stage, Stage::DependenciesSelected);
}

const HEAD_PATCH: &str = "\
diff --git a/CMakeLists.txt b/CMakeLists.txt
--- a/CMakeLists.txt
+++ b/CMakeLists.txt
@@ -1,2 +1,3 @@
 cmake_minimum_required(VERSION 2.8)
 project(PCL)
+set(PCL_SHARED_LIBS ON)
";

/// The pcl formula with its head-only remote patch served from `dir`
fn pcl_with_local_head_patch(dir: &Path) -> Formula {
    let patch = dir.join("486.patch");
    std::fs::write(&patch, HEAD_PATCH).unwrap();
    let yaml = std::fs::read_to_string(formula_path()).unwrap().replace(
        "https://github.com/PointCloudLibrary/pcl/pull/486.patch",
        &format!("file://{}", patch.display()),
    );
    parse_formula(&yaml).unwrap()
}

fn position(events: &[AppEvent], wanted: impl Fn(&BuildEvent) -> bool) -> usize {
    events
        .iter()
        .position(|e| matches!(e, AppEvent::Build(b) if wanted(b)))
        .unwrap()
}

fn head_request() -> InstallRequest {
    InstallRequest {
        build: request(&["--HEAD"]),
        source_dir: None,
    }
}

#[tokio::test]
async fn head_install_clones_then_applies_remote_patch() {
    let patches = TempDir::new().unwrap();
    let mut h = Harness::with_formula(
        pcl_with_local_head_patch(patches.path()),
        yosemite(),
        Recorder::default().cloning(fixture_source()),
        &[],
        TestFailurePolicy::Fatal,
    );
    let report = h.evaluator.install(&head_request()).await.unwrap();

    let root = report.work_dir.clone().unwrap().join("src/pcl");
    let seen = h.ops.seen();
    assert_eq!(
        seen[0],
        format!(
            "git clone --depth 1 https://github.com/PointCloudLibrary/pcl.git {}",
            root.display()
        )
    );
    assert!(seen[1].starts_with("cmake "));
    assert_eq!(report.prefix, h.prefix.join("Cellar/pcl/HEAD"));

    // release-only header fixes are skipped on head
    assert_eq!(report.patches_applied, vec!["glew-qhull", "pull-486"]);
    let cmake = std::fs::read_to_string(root.join("CMakeLists.txt")).unwrap();
    assert!(cmake.ends_with("set(PCL_SHARED_LIBS ON)\n"));
    let viewer =
        std::fs::read_to_string(root.join("apps/in_hand_scanner/src/opengl_viewer.cpp")).unwrap();
    assert!(viewer.contains("<GL/gl.h>"));

    let events = h.drain();
    let downloaded = position(&events, |b| {
        matches!(b, BuildEvent::DownloadCompleted { url, .. } if url.ends_with("486.patch"))
    });
    let patched = position(&events, |b| {
        matches!(b, BuildEvent::PatchApplied { patch, .. } if patch == "pull-486")
    });
    assert!(downloaded < patched);
}

#[tokio::test]
async fn failing_clone_is_a_source_failure() {
    let patches = TempDir::new().unwrap();
    let h = Harness::with_formula(
        pcl_with_local_head_patch(patches.path()),
        yosemite(),
        Recorder::failing(&["git clone"]),
        &[],
        TestFailurePolicy::Fatal,
    );
    let failure = h.evaluator.install(&head_request()).await.unwrap_err();

    assert_eq!(failure.stage, Stage::SourceAcquired);
    assert_eq!(failure.exit_code(), 6);
    assert!(matches!(failure.error, Error::Build(_)));
    assert_eq!(h.ops.seen().len(), 1);
}

fn pcl() -> Formula {
    parse_formula(&std::fs::read_to_string(formula_path()).unwrap()).unwrap()
}

fn render(formula: &Formula, overrides: &OptionOverrides, mode: BuildMode) -> kiln_types::InvocationPlan {
    let platform = yosemite();
    let options = resolve_options(formula, overrides).unwrap();
    let located: Vec<LocatedDependency> = select_dependencies(formula, &options, mode, &platform)
        .unwrap()
        .into_iter()
        .map(|dep| LocatedDependency {
            prefix: PathBuf::from("/opt/kiln/Cellar").join(dep.short_name()).join("1.0"),
            name: dep.name,
            phase: dep.phase,
            version: Some("1.0".to_string()),
        })
        .collect();
    let layout = PlanLayout {
        source_dir: PathBuf::from("/tmp/kiln/pcl/src/pcl"),
        cellar: PathBuf::from("/opt/kiln/Cellar"),
        global_prefix: PathBuf::from("/opt/kiln"),
        jobs: 2,
        base_path: Some("/usr/bin".to_string()),
    };
    build_invocation_plan(formula, &options, mode, &platform, &located, &layout).unwrap()
}

const PCL_OPTIONS: [&str; 8] = [
    "examples", "tests", "tools", "apps", "qvtk", "qt", "vtk5", "openni",
];

proptest! {
    #[test]
    fn plans_are_deterministic_and_ordered(
        picks in proptest::collection::vec(proptest::option::of(any::<bool>()), 8),
        head in any::<bool>(),
    ) {
        let formula = pcl();
        let mut overrides = OptionOverrides::new();
        for (name, pick) in PCL_OPTIONS.iter().zip(&picks) {
            if let Some(on) = pick {
                overrides.set(name, *on).unwrap();
            }
        }
        let mode = if head { BuildMode::Head } else { BuildMode::Release };

        let first = render(&formula, &overrides, mode);
        let second = render(&formula, &overrides, mode);
        prop_assert_eq!(&first, &second);
        prop_assert!(first.is_well_ordered());
        prop_assert_eq!(first.configure_args().last().map(String::as_str), Some(".."));

        let apps_off = first.configure_args().iter().any(|a| a == "-DBUILD_apps:BOOL=OFF");
        prop_assert_eq!(apps_off, picks[3] == Some(false));
    }
}
