//! Dependency declarations

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::condition::Condition;

/// When a dependency is needed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DependencyPhase {
    /// Only while building
    Build,
    /// Linked against or loaded by the installed package
    #[default]
    Runtime,
}

impl std::fmt::Display for DependencyPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Build => write!(f, "build"),
            Self::Runtime => write!(f, "runtime"),
        }
    }
}

/// How strongly a dependency is wanted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DependencyKind {
    #[default]
    Required,
    /// Selected unless `--without-<short name>`
    Recommended,
    /// Selected only with `--with-<short name>`
    Optional,
}

/// A dependency as written in the formula
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Dependency {
    /// Formula name, possibly tap-qualified (`homebrew/science/openni`)
    pub name: String,
    #[serde(default)]
    pub phase: DependencyPhase,
    #[serde(default)]
    pub kind: DependencyKind,
    /// Options requested of the dependency itself, e.g. `with-qt`
    #[serde(default, rename = "with", skip_serializing_if = "Vec::is_empty")]
    pub sub_options: Vec<String>,
    /// Mutually exclusive variant group; defaults to the short name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub when: Option<Condition>,
}

impl Dependency {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            phase: DependencyPhase::default(),
            kind: DependencyKind::default(),
            sub_options: Vec::new(),
            group: None,
            when: None,
        }
    }

    #[must_use]
    pub fn build(mut self) -> Self {
        self.phase = DependencyPhase::Build;
        self
    }

    #[must_use]
    pub fn kind(mut self, kind: DependencyKind) -> Self {
        self.kind = kind;
        self
    }

    #[must_use]
    pub fn when(mut self, condition: Condition) -> Self {
        self.when = Some(condition);
        self
    }

    /// Last path segment of the name; used for implicit options and `${deps.*}`
    #[must_use]
    pub fn short_name(&self) -> &str {
        self.name.rsplit('/').next().unwrap_or(&self.name)
    }

    /// Group within which at most one variant may be selected
    #[must_use]
    pub fn variant_group(&self) -> &str {
        self.group.as_deref().unwrap_or_else(|| self.short_name())
    }

    /// Implicit option name, if the dependency kind creates one
    #[must_use]
    pub fn implicit_option(&self) -> Option<&str> {
        match self.kind {
            DependencyKind::Required => None,
            DependencyKind::Recommended | DependencyKind::Optional => Some(self.short_name()),
        }
    }
}

/// A selected dependency resolved to an installation on this machine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocatedDependency {
    pub name: String,
    pub phase: DependencyPhase,
    /// Keg prefix, or the directory holding the tool when found on `PATH`
    pub prefix: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

impl LocatedDependency {
    #[must_use]
    pub fn short_name(&self) -> &str {
        self.name.rsplit('/').next().unwrap_or(&self.name)
    }
}
