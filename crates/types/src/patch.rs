//! Source patches

use serde::{Deserialize, Serialize};

use crate::condition::Condition;

/// Literal search-and-replace over named files in the source tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Inreplace {
    /// Paths relative to the source root
    pub files: Vec<String>,
    pub search: String,
    pub replace: String,
}

/// Where a unified diff comes from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DiffSource {
    Inline {
        inline: String,
    },
    Url {
        url: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        sha256: Option<String>,
    },
}

/// A unified diff applied against the source root
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffPatch {
    #[serde(flatten)]
    pub source: DiffSource,
    /// Leading path components to strip from diff headers (`-p`)
    #[serde(default = "default_strip")]
    pub strip: usize,
}

fn default_strip() -> usize {
    1
}

/// The two patch shapes a formula may carry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PatchAction {
    Inreplace { inreplace: Inreplace },
    Diff { diff: DiffPatch },
}

/// One predicate-tagged patch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Patch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(flatten)]
    pub action: PatchAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub when: Option<Condition>,
}

impl Patch {
    #[must_use]
    pub fn inreplace(files: &[&str], search: &str, replace: &str) -> Self {
        Self {
            id: None,
            action: PatchAction::Inreplace {
                inreplace: Inreplace {
                    files: files.iter().map(ToString::to_string).collect(),
                    search: search.to_string(),
                    replace: replace.to_string(),
                },
            },
            when: None,
        }
    }

    #[must_use]
    pub fn when(mut self, condition: Condition) -> Self {
        self.when = Some(condition);
        self
    }

    /// Stable label used in logs and the applied-patches stamp
    #[must_use]
    pub fn label(&self, index: usize) -> String {
        if let Some(id) = &self.id {
            return id.clone();
        }
        match &self.action {
            PatchAction::Inreplace { inreplace } => {
                format!("inreplace#{index}:{}", inreplace.files.join(","))
            }
            PatchAction::Diff { diff } => match &diff.source {
                DiffSource::Inline { .. } => format!("diff#{index}:inline"),
                DiffSource::Url { url, .. } => format!("diff#{index}:{url}"),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_inreplace() {
        let yaml = r##"
inreplace:
  files: [CMakeLists.txt]
  search: "SET(CMAKE_OSX_ARCHITECTURES"
  replace: "#SET(CMAKE_OSX_ARCHITECTURES"
when: { os: macos }
"##;
        let patch: Patch = serde_yml::from_str(yaml).unwrap();
        assert!(matches!(patch.action, PatchAction::Inreplace { .. }));
        assert!(patch.when.is_some());
        assert_eq!(patch.label(0), "inreplace#0:CMakeLists.txt");
    }

    #[test]
    fn test_parse_diff_url_default_strip() {
        let yaml = "id: fix-lz\ndiff:\n  url: https://example.org/fix.patch\n  sha256: abc\n";
        let patch: Patch = serde_yml::from_str(yaml).unwrap();
        assert_eq!(patch.label(3), "fix-lz");
        match patch.action {
            PatchAction::Diff { diff } => {
                assert_eq!(diff.strip, 1);
                assert!(matches!(
                    diff.source,
                    DiffSource::Url { ref url, .. } if url == "https://example.org/fix.patch"
                ));
            }
            PatchAction::Inreplace { .. } => panic!("expected diff"),
        }
    }
}
