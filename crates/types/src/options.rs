//! Build options: declarations, user overrides and the resolved map

use std::collections::BTreeMap;

use kiln_errors::ConfigError;
use serde::{Deserialize, Serialize};

/// Whether the stable release or the development head is built
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildMode {
    #[default]
    Release,
    Head,
}

impl std::fmt::Display for BuildMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Release => write!(f, "release"),
            Self::Head => write!(f, "head"),
        }
    }
}

/// Where an option declaration came from
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "dependency")]
pub enum OptionOrigin {
    /// Listed under `options:` in the formula
    #[default]
    Declared,
    /// Implied by a recommended dependency; on unless disabled
    Recommended(String),
    /// Implied by an optional dependency; off unless enabled
    Optional(String),
}

/// A named boolean switch exposed by a formula
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OptionDecl {
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub default: bool,
    #[serde(skip_deserializing, default)]
    pub origin: OptionOrigin,
}

impl OptionDecl {
    /// Implicit option for a recommended dependency
    #[must_use]
    pub fn recommended(name: &str, dependency: &str) -> Self {
        Self {
            name: name.to_string(),
            description: format!("Build without {name} support."),
            default: true,
            origin: OptionOrigin::Recommended(dependency.to_string()),
        }
    }

    /// Implicit option for an optional dependency
    #[must_use]
    pub fn optional(name: &str, dependency: &str) -> Self {
        Self {
            name: name.to_string(),
            description: format!("Build with {name} support."),
            default: false,
            origin: OptionOrigin::Optional(dependency.to_string()),
        }
    }

    /// The switch that flips this option away from its default
    #[must_use]
    pub fn switch(&self) -> String {
        if self.default {
            format!("--without-{}", self.name)
        } else {
            format!("--with-{}", self.name)
        }
    }
}

/// Explicit user choices, keyed by option name
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionOverrides {
    values: BTreeMap<String, bool>,
}

impl OptionOverrides {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a choice
    ///
    /// # Errors
    ///
    /// Returns an error if the same option was already set the other way.
    pub fn set(&mut self, name: &str, enabled: bool) -> Result<(), ConfigError> {
        match self.values.get(name) {
            Some(existing) if *existing != enabled => Err(ConfigError::ConflictingOverride {
                name: name.to_string(),
            }),
            _ => {
                self.values.insert(name.to_string(), enabled);
                Ok(())
            }
        }
    }

    /// Builder-style [`set`](Self::set)
    ///
    /// # Errors
    ///
    /// Returns an error if the same option was already set the other way.
    pub fn with(mut self, name: &str, enabled: bool) -> Result<Self, ConfigError> {
        self.set(name, enabled)?;
        Ok(self)
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<bool> {
        self.values.get(name).copied()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// A parsed command-line build request
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildRequest {
    pub overrides: OptionOverrides,
    pub mode: BuildMode,
}

impl BuildRequest {
    /// Parse `--with-X`, `--without-X` and `--HEAD` switches
    ///
    /// # Errors
    ///
    /// Returns an error for an unrecognised switch or when one option is both
    /// enabled and disabled.
    pub fn from_switches<S: AsRef<str>>(switches: &[S]) -> Result<Self, ConfigError> {
        let mut request = Self::default();
        for raw in switches {
            let switch = raw.as_ref();
            if switch == "--HEAD" {
                request.mode = BuildMode::Head;
            } else if let Some(name) = switch.strip_prefix("--without-") {
                request.overrides.set(valid_name(name, switch)?, false)?;
            } else if let Some(name) = switch.strip_prefix("--with-") {
                request.overrides.set(valid_name(name, switch)?, true)?;
            } else {
                return Err(ConfigError::InvalidSwitch {
                    switch: switch.to_string(),
                });
            }
        }
        Ok(request)
    }
}

fn valid_name<'a>(name: &'a str, switch: &str) -> Result<&'a str, ConfigError> {
    let ok = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '+');
    if ok {
        Ok(name)
    } else {
        Err(ConfigError::InvalidSwitch {
            switch: switch.to_string(),
        })
    }
}

/// The complete option map for one run: every declared option mapped to on/off
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResolvedOptions {
    values: BTreeMap<String, bool>,
}

impl ResolvedOptions {
    #[must_use]
    pub fn from_map(values: BTreeMap<String, bool>) -> Self {
        Self { values }
    }

    /// Whether `name` is on; undeclared names are off
    #[must_use]
    pub fn is_enabled(&self, name: &str) -> bool {
        self.values.get(name).copied().unwrap_or(false)
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, bool)> {
        self.values.iter().map(|(k, v)| (k.as_str(), *v))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
