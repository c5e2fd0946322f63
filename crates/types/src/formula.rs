//! The formula descriptor

use serde::{Deserialize, Serialize};

use crate::condition::Condition;
use crate::dependency::{Dependency, DependencyKind};
use crate::install::InstallProcedure;
use crate::options::{BuildMode, OptionDecl};
use crate::patch::Patch;

/// Supported archive digests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChecksumAlgorithm {
    Sha1,
    Sha256,
    Md5,
}

impl std::fmt::Display for ChecksumAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sha1 => write!(f, "sha1"),
            Self::Sha256 => write!(f, "sha256"),
            Self::Md5 => write!(f, "md5"),
        }
    }
}

/// Expected digest of the release archive
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Checksum {
    Sha1 { sha1: String },
    Sha256 { sha256: String },
    Md5 { md5: String },
}

impl Checksum {
    #[must_use]
    pub fn algorithm(&self) -> ChecksumAlgorithm {
        match self {
            Self::Sha1 { .. } => ChecksumAlgorithm::Sha1,
            Self::Sha256 { .. } => ChecksumAlgorithm::Sha256,
            Self::Md5 { .. } => ChecksumAlgorithm::Md5,
        }
    }

    /// Lowercase hex digest
    #[must_use]
    pub fn expected(&self) -> &str {
        match self {
            Self::Sha1 { sha1: hex } | Self::Sha256 { sha256: hex } | Self::Md5 { md5: hex } => {
                hex
            }
        }
    }

    /// Digest length in hex characters
    #[must_use]
    pub fn expected_len(&self) -> usize {
        match self.algorithm() {
            ChecksumAlgorithm::Sha1 => 40,
            ChecksumAlgorithm::Sha256 => 64,
            ChecksumAlgorithm::Md5 => 32,
        }
    }
}

/// Development head source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HeadSource {
    pub git: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
}

/// A host precondition checked before any work starts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Precondition {
    /// Condition under which the build is refused
    pub when: Condition,
    pub message: String,
}

/// A complete, load-time validated formula
///
/// Instances are never mutated once loaded; per-run choices live in
/// [`crate::ResolvedOptions`] and [`BuildMode`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Formula {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub homepage: Option<String>,
    pub url: String,
    pub checksum: Checksum,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub head: Option<HeadSource>,
    #[serde(default)]
    pub options: Vec<OptionDecl>,
    #[serde(default)]
    pub dependencies: Vec<Dependency>,
    #[serde(default)]
    pub requirements: Vec<Precondition>,
    #[serde(default)]
    pub patches: Vec<Patch>,
    pub install: InstallProcedure,
}

impl Formula {
    /// Declared options followed by those implied by recommended and
    /// optional dependencies, each name once, in declaration order
    #[must_use]
    pub fn option_declarations(&self) -> Vec<OptionDecl> {
        let mut decls = self.options.clone();
        for dep in &self.dependencies {
            let Some(name) = dep.implicit_option() else {
                continue;
            };
            if decls.iter().any(|d| d.name == name) {
                continue;
            }
            decls.push(match dep.kind {
                DependencyKind::Recommended => OptionDecl::recommended(name, &dep.name),
                DependencyKind::Optional | DependencyKind::Required => {
                    OptionDecl::optional(name, &dep.name)
                }
            });
        }
        decls
    }

    /// Version string for the chosen mode
    #[must_use]
    pub fn version_for(&self, mode: BuildMode) -> &str {
        match mode {
            BuildMode::Release => &self.version,
            BuildMode::Head => "HEAD",
        }
    }

    /// Keg directory name, `<name>/<version>`
    #[must_use]
    pub fn keg_name(&self, mode: BuildMode) -> String {
        format!("{}/{}", self.name, self.version_for(mode))
    }
}
