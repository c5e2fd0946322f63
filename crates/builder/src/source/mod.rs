//! Source acquisition: release archive, head checkout or a local tree

mod archive;
mod checksum;
mod fetch;

pub use fetch::Fetcher;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use kiln_errors::{BuildError, ConfigError, Error};
use kiln_events::{AppEvent, BuildEvent, EventEmitter};
use kiln_platform::{Platform, PlatformContext};
use kiln_types::{holds, BuildMode, Checksum, ConditionContext, DiffSource, Formula, PatchAction};

/// Remote patch contents keyed by URL
pub type FetchedPatches = BTreeMap<String, String>;

/// A source tree ready for patching
#[derive(Debug, Clone)]
pub struct AcquiredSource {
    pub root: PathBuf,
    pub fetched: FetchedPatches,
}

/// Where the source tree comes from
#[derive(Debug, Clone, Copy)]
pub enum SourceOrigin<'a> {
    /// Download `url` or clone `head` depending on the build mode
    Upstream,
    /// Copy an already staged tree
    Local(&'a Path),
}

/// Put the formula's source into `dest` and download applicable remote patches
///
/// # Errors
///
/// Returns a `BuildError` if a download, checksum, extraction or clone fails.
pub async fn acquire_source(
    formula: &Formula,
    cond: &ConditionContext<'_>,
    origin: SourceOrigin<'_>,
    dest: &Path,
    fetcher: &Fetcher,
    platform: &Platform,
    pctx: &PlatformContext,
) -> Result<AcquiredSource, Error> {
    let downloads = dest.with_file_name("downloads");
    tokio::fs::create_dir_all(&downloads)
        .await
        .map_err(|e| Error::io_with_path(&e, &downloads))?;

    let root = match (origin, cond.mode) {
        (SourceOrigin::Local(dir), _) => copy_tree(dir, &dest.join(&formula.name)).await?,
        (SourceOrigin::Upstream, BuildMode::Release) => {
            let archive = downloads.join(fetch::display_name(&formula.url));
            let bytes = fetcher
                .download(&formula.url, &archive, Some(&formula.checksum))
                .await?;
            pctx.emit(AppEvent::Build(BuildEvent::DownloadCompleted {
                url: formula.url.clone(),
                bytes,
            }));
            archive::extract(&archive, dest).await?
        }
        (SourceOrigin::Upstream, BuildMode::Head) => {
            clone_head(formula, &dest.join(&formula.name), platform, pctx).await?
        }
    };

    let fetched = fetch_patches(formula, cond, &downloads, fetcher, pctx).await?;

    pctx.emit(AppEvent::Build(BuildEvent::SourceReady {
        formula: formula.name.clone(),
        source_dir: root.clone(),
    }));
    Ok(AcquiredSource { root, fetched })
}

async fn clone_head(
    formula: &Formula,
    target: &Path,
    platform: &Platform,
    pctx: &PlatformContext,
) -> Result<PathBuf, Error> {
    let head = formula.head.as_ref().ok_or_else(|| ConfigError::HeadUnavailable {
        formula: formula.name.clone(),
    })?;

    let mut cmd = platform.command("git");
    cmd.args(["clone", "--depth", "1"]);
    if let Some(branch) = &head.branch {
        cmd.arg("--branch").arg(branch);
    }
    cmd.arg(&head.git).arg(target.to_string_lossy());
    let command = cmd.display();

    let output = platform.execute_command(pctx, cmd).await?;
    if !output.success() {
        return Err(BuildError::CommandFailed {
            phase: "source".to_string(),
            command,
            exit_code: output.exit_code,
            output: output.tail(20),
        }
        .into());
    }
    Ok(target.to_path_buf())
}

async fn fetch_patches(
    formula: &Formula,
    cond: &ConditionContext<'_>,
    downloads: &Path,
    fetcher: &Fetcher,
    pctx: &PlatformContext,
) -> Result<FetchedPatches, Error> {
    let mut fetched = FetchedPatches::new();
    for (index, patch) in formula.patches.iter().enumerate() {
        if !holds(patch.when.as_ref(), cond) {
            continue;
        }
        let PatchAction::Diff { diff } = &patch.action else {
            continue;
        };
        let DiffSource::Url { url, sha256 } = &diff.source else {
            continue;
        };
        if fetched.contains_key(url) {
            continue;
        }

        let dest = downloads.join(format!("{index}-{}", fetch::display_name(url)));
        let expected = sha256.clone().map(|sha256| Checksum::Sha256 { sha256 });
        let bytes = fetcher.download(url, &dest, expected.as_ref()).await?;
        let text = tokio::fs::read_to_string(&dest)
            .await
            .map_err(|e| Error::io_with_path(&e, &dest))?;
        pctx.emit(AppEvent::Build(BuildEvent::DownloadCompleted {
            url: url.clone(),
            bytes,
        }));
        fetched.insert(url.clone(), text);
    }
    Ok(fetched)
}

/// Copy a staged source tree, keeping symlinks as symlinks
async fn copy_tree(from: &Path, to: &Path) -> Result<PathBuf, Error> {
    let from = from.to_path_buf();
    let to = to.to_path_buf();
    tokio::task::spawn_blocking(move || {
        for entry in walkdir::WalkDir::new(&from).follow_links(false) {
            let entry = entry.map_err(|e| Error::internal(format!("walking {}: {e}", from.display())))?;
            let relative = entry
                .path()
                .strip_prefix(&from)
                .map_err(|e| Error::internal(e.to_string()))?;
            let target = to.join(relative);
            let file_type = entry.file_type();

            if file_type.is_dir() {
                std::fs::create_dir_all(&target).map_err(|e| Error::io_with_path(&e, &target))?;
            } else if file_type.is_symlink() {
                #[cfg(unix)]
                {
                    let link = std::fs::read_link(entry.path())
                        .map_err(|e| Error::io_with_path(&e, entry.path()))?;
                    std::os::unix::fs::symlink(&link, &target)
                        .map_err(|e| Error::io_with_path(&e, &target))?;
                }
            } else {
                std::fs::copy(entry.path(), &target).map_err(|e| Error::io_with_path(&e, &target))?;
            }
        }
        Ok::<PathBuf, Error>(to)
    })
    .await
    .map_err(|e| Error::internal(format!("copy task failed: {e}")))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiln_types::{OsFamily, PlatformInfo, ResolvedOptions};

    #[tokio::test]
    async fn test_local_tree_is_copied() {
        let staged = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(staged.path().join("io/src")).unwrap();
        std::fs::write(staged.path().join("CMakeLists.txt"), "project(PCL)\n").unwrap();
        std::fs::write(staged.path().join("io/src/ply.cpp"), "int x;\n").unwrap();

        let work = tempfile::tempdir().unwrap();
        let dest = work.path().join("src");
        std::fs::create_dir(&dest).unwrap();

        let formula = crate::formula::parse_formula(
            "name: pcl\nurl: https://example.org/pcl.zip\nchecksum: { md5: \
             900150983cd24fb0d6963f7d28e17f72 }\nversion: 1.7.1\n\
             install:\n  configure: { program: cmake }\n",
        )
        .unwrap();
        let options = ResolvedOptions::default();
        let platform_info = PlatformInfo::new(OsFamily::Linux, "6.1", "x86_64");
        let cond = ConditionContext {
            options: &options,
            mode: BuildMode::Release,
            platform: &platform_info,
        };

        let source = acquire_source(
            &formula,
            &cond,
            SourceOrigin::Local(staged.path()),
            &dest,
            &Fetcher::new(None).unwrap(),
            &Platform::current(),
            &PlatformContext::default(),
        )
        .await
        .unwrap();

        assert_eq!(source.root, dest.join("pcl"));
        assert_eq!(
            std::fs::read_to_string(source.root.join("io/src/ply.cpp")).unwrap(),
            "int x;\n"
        );
        assert!(source.fetched.is_empty());
        // the staged tree is untouched
        assert!(staged.path().join("CMakeLists.txt").is_file());
    }
}
