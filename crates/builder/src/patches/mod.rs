//! Transactional source patching
//!
//! Every applicable patch is applied to an in-memory copy of the files it
//! touches, in declared order. Nothing reaches the disk until all of them
//! have succeeded, so a failing patch leaves the tree exactly as it was.

mod diff;

use std::collections::BTreeMap;
use std::path::{Component, Path};

use kiln_errors::{Error, PatchError};
use kiln_events::{AppEvent, BuildEvent, EventEmitter};
use kiln_types::{holds, ConditionContext, DiffSource, Inreplace, Patch, PatchAction};

use crate::source::FetchedPatches;
use diff::{FileChange, FileDiff};

/// Records which patches were applied to a tree
pub const STAMP_FILE: &str = ".kiln-patches";

/// Files touched by the patches, staged in memory
struct StagedTree<'a> {
    root: &'a Path,
    original: BTreeMap<String, Option<String>>,
    current: BTreeMap<String, Option<String>>,
}

impl<'a> StagedTree<'a> {
    fn new(root: &'a Path) -> Self {
        Self {
            root,
            original: BTreeMap::new(),
            current: BTreeMap::new(),
        }
    }

    /// Current contents of `relative`; `None` if it does not exist
    async fn get(&mut self, relative: &str) -> Result<Option<&String>, Error> {
        contained(relative)?;
        if !self.current.contains_key(relative) {
            let path = self.root.join(relative);
            let contents = match tokio::fs::read(&path).await {
                Ok(bytes) => Some(String::from_utf8(bytes).map_err(|_| {
                    PatchError::HunkRejected {
                        file: relative.to_string(),
                        patch: String::new(),
                        message: "file is not UTF-8 text".to_string(),
                    }
                })?),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
                Err(e) => return Err(Error::io_with_path(&e, &path)),
            };
            self.original.insert(relative.to_string(), contents.clone());
            self.current.insert(relative.to_string(), contents);
        }
        Ok(self.current.get(relative).and_then(Option::as_ref))
    }

    fn set(&mut self, relative: &str, contents: Option<String>) {
        self.current.insert(relative.to_string(), contents);
    }

    /// Write every changed file and remove deleted ones
    async fn commit(self) -> Result<usize, Error> {
        let mut written = 0;
        for (relative, contents) in &self.current {
            if self.original.get(relative) == Some(contents) {
                continue;
            }
            let path = self.root.join(relative);
            match contents {
                Some(text) => {
                    if let Some(parent) = path.parent() {
                        tokio::fs::create_dir_all(parent)
                            .await
                            .map_err(|e| Error::io_with_path(&e, parent))?;
                    }
                    kiln_platform::fs::write_atomic(&path, text.as_bytes()).await?;
                }
                None => tokio::fs::remove_file(&path)
                    .await
                    .map_err(|e| Error::io_with_path(&e, &path))?,
            }
            written += 1;
        }
        Ok(written)
    }
}

/// Reject absolute paths and `..` components
fn contained(relative: &str) -> Result<(), PatchError> {
    let path = Path::new(relative);
    let escapes = path
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
    if escapes || relative.is_empty() {
        return Err(PatchError::PathEscape {
            path: relative.to_string(),
        });
    }
    Ok(())
}

/// Apply the patches whose condition holds, in declared order
///
/// Returns the labels of the applied patches. A tree carrying the stamp
/// file is rejected with `PatchError::AlreadyApplied`.
///
/// # Errors
///
/// Returns a `PatchError` naming the first patch that does not apply; the
/// tree is left untouched in that case.
pub async fn apply_patches<E: EventEmitter>(
    root: &Path,
    formula: &str,
    patches: &[Patch],
    cond: &ConditionContext<'_>,
    fetched: &FetchedPatches,
    emitter: &E,
) -> Result<Vec<String>, Error> {
    let stamp = root.join(STAMP_FILE);
    if tokio::fs::try_exists(&stamp).await.unwrap_or(false) {
        return Err(PatchError::AlreadyApplied {
            path: root.display().to_string(),
        }
        .into());
    }

    let mut tree = StagedTree::new(root);
    let mut applied = Vec::new();

    for (index, patch) in patches.iter().enumerate() {
        if !holds(patch.when.as_ref(), cond) {
            continue;
        }
        let label = patch.label(index);
        match &patch.action {
            PatchAction::Inreplace { inreplace } => apply_inreplace(&mut tree, inreplace).await?,
            PatchAction::Diff { diff } => {
                let text = match &diff.source {
                    DiffSource::Inline { inline } => inline.as_str(),
                    DiffSource::Url { url, .. } => fetched
                        .get(url)
                        .map(String::as_str)
                        .ok_or_else(|| PatchError::NotFetched { url: url.clone() })?,
                };
                for file in diff::split(text, diff.strip, &label)? {
                    apply_file_diff(&mut tree, &file, &label).await?;
                }
            }
        }
        tracing::debug!(formula, patch = %label, "patch staged");
        applied.push(label);
    }

    let written = tree.commit().await?;
    let mut stamp_contents = applied.join("\n");
    stamp_contents.push('\n');
    kiln_platform::fs::write_atomic(&stamp, stamp_contents.as_bytes()).await?;

    for label in &applied {
        emitter.emit(AppEvent::Build(BuildEvent::PatchApplied {
            formula: formula.to_string(),
            patch: label.clone(),
        }));
    }
    tracing::debug!(formula, patches = applied.len(), files = written, "patches committed");
    Ok(applied)
}

async fn apply_inreplace(tree: &mut StagedTree<'_>, inreplace: &Inreplace) -> Result<(), Error> {
    for file in &inreplace.files {
        let Some(contents) = tree.get(file).await? else {
            return Err(PatchError::TargetMissing { file: file.clone() }.into());
        };
        if !contents.contains(&inreplace.search) {
            return Err(PatchError::NoMatch {
                file: file.clone(),
                search: inreplace.search.clone(),
            }
            .into());
        }
        let replaced = contents.replace(&inreplace.search, &inreplace.replace);
        tree.set(file, Some(replaced));
    }
    Ok(())
}

async fn apply_file_diff(
    tree: &mut StagedTree<'_>,
    file: &FileDiff,
    label: &str,
) -> Result<(), Error> {
    let rejected = |message: String| PatchError::HunkRejected {
        file: file.path.clone(),
        patch: label.to_string(),
        message,
    };

    let base = match (tree.get(&file.path).await?, file.change) {
        (Some(_), FileChange::Create) => {
            return Err(rejected("file already exists".to_string()).into());
        }
        (None, FileChange::Create) => String::new(),
        (Some(text), _) => text.clone(),
        (None, _) => {
            return Err(PatchError::TargetMissing {
                file: file.path.clone(),
            }
            .into());
        }
    };

    let parsed = diffy::Patch::from_str(&file.text).map_err(|e| PatchError::InvalidDiff {
        patch: label.to_string(),
        message: format!("{}: {e}", file.path),
    })?;
    let patched = diffy::apply(&base, &parsed).map_err(|e| rejected(e.to_string()))?;

    let result = match file.change {
        FileChange::Delete => None,
        FileChange::Create | FileChange::Modify => Some(patched),
    };
    tree.set(&file.path, result);
    Ok(())
}
