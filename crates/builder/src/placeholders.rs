//! `${VAR}` placeholder expansion for formula arguments

use kiln_errors::{ConfigError, DependencyError, Error};
use std::collections::BTreeMap;

/// Names every formula may use
pub const BUILTIN: &[&str] = &[
    "PREFIX",
    "GLOBAL_PREFIX",
    "NAME",
    "VERSION",
    "JOBS",
    "SOURCE_DIR",
    "BUILD_DIR",
];

/// Prefix of dependency placeholders, `${deps.<short name>}`
pub const DEPS_PREFIX: &str = "deps.";

/// Placeholder names referenced by `input`, in order
///
/// # Errors
///
/// Returns the offending text if a `${` is never closed.
pub fn references(input: &str) -> Result<Vec<&str>, String> {
    let mut names = Vec::new();
    let mut rest = input;
    while let Some(start) = rest.find("${") {
        let after = &rest[start + 2..];
        let end = after.find('}').ok_or_else(|| rest[start..].to_string())?;
        names.push(&after[..end]);
        rest = &after[end + 1..];
    }
    Ok(names)
}

/// Values available for expansion in one run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Placeholders {
    values: BTreeMap<String, String>,
}

impl Placeholders {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    /// Replace every `${KEY}` in `input`
    ///
    /// # Errors
    ///
    /// Returns `DependencyError::NotSelected` for a `${deps.X}` whose
    /// dependency is not part of this run, and a configuration error for any
    /// other unknown or unterminated placeholder.
    pub fn expand(&self, input: &str) -> Result<String, Error> {
        let mut out = String::with_capacity(input.len());
        let mut rest = input;
        while let Some(start) = rest.find("${") {
            out.push_str(&rest[..start]);
            let after = &rest[start + 2..];
            let end = after.find('}').ok_or_else(|| ConfigError::Invalid {
                message: format!("unterminated placeholder in `{input}`"),
            })?;
            let key = &after[..end];
            match self.values.get(key) {
                Some(value) => out.push_str(value),
                None => {
                    if let Some(dep) = key.strip_prefix(DEPS_PREFIX) {
                        return Err(DependencyError::NotSelected {
                            name: dep.to_string(),
                        }
                        .into());
                    }
                    return Err(ConfigError::Invalid {
                        message: format!("unknown placeholder ${{{key}}}"),
                    }
                    .into());
                }
            }
            rest = &after[end + 1..];
        }
        out.push_str(rest);
        Ok(out)
    }

    /// Expand every element of `args`
    ///
    /// # Errors
    ///
    /// See [`Placeholders::expand`].
    pub fn expand_all(&self, args: &[String]) -> Result<Vec<String>, Error> {
        args.iter().map(|a| self.expand(a)).collect()
    }
}
