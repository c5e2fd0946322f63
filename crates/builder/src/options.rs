//! Option resolution

use kiln_errors::ConfigError;
use kiln_types::{BuildMode, BuildRequest, Formula, OptionOverrides, ResolvedOptions};
use std::collections::BTreeMap;

/// Resolve every declared option against the user's overrides
///
/// Each option takes the override when one is given, otherwise its
/// declared default. Implicit options of recommended dependencies default
/// to on and those of optional dependencies to off.
///
/// # Errors
///
/// Returns `ConfigError::UnknownOption` if an override names an option the
/// formula does not declare.
pub fn resolve_options(
    formula: &Formula,
    overrides: &OptionOverrides,
) -> Result<ResolvedOptions, ConfigError> {
    let decls = formula.option_declarations();

    if let Some(unknown) = overrides
        .names()
        .find(|name| !decls.iter().any(|d| d.name == *name))
    {
        return Err(ConfigError::UnknownOption {
            formula: formula.name.clone(),
            name: unknown.to_string(),
        });
    }

    let values: BTreeMap<String, bool> = decls
        .into_iter()
        .map(|decl| {
            let value = overrides.get(&decl.name).unwrap_or(decl.default);
            (decl.name, value)
        })
        .collect();
    Ok(ResolvedOptions::from_map(values))
}

/// Resolve options and check the requested build mode is available
///
/// # Errors
///
/// Returns an error for unknown overrides, or for `--HEAD` on a formula
/// without a head source.
pub fn resolve_request(
    formula: &Formula,
    request: &BuildRequest,
) -> Result<ResolvedOptions, ConfigError> {
    if request.mode == BuildMode::Head && formula.head.is_none() {
        return Err(ConfigError::HeadUnavailable {
            formula: formula.name.clone(),
        });
    }
    resolve_options(formula, &request.overrides)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formula::parse_formula;
    use proptest::prelude::*;

    const FORMULA: &str = r#"
name: demo
url: https://example.org/demo-1.0.tar.gz
checksum: { sha256: "0000000000000000000000000000000000000000000000000000000000000000" }
version: "1.0"
options:
  - { name: examples, description: Build examples. }
  - { name: tools, description: Build without tools., default: true }
dependencies:
  - { name: qt, kind: recommended }
  - { name: homebrew/science/openni, kind: optional }
install:
  configure: { program: cmake, trailing: [".."] }
"#;

    #[test]
    fn test_defaults() {
        let formula = parse_formula(FORMULA).unwrap();
        let resolved = resolve_options(&formula, &OptionOverrides::new()).unwrap();
        assert!(!resolved.is_enabled("examples"));
        assert!(resolved.is_enabled("tools"));
        assert!(resolved.is_enabled("qt"));
        assert!(!resolved.is_enabled("openni"));
        assert_eq!(resolved.len(), 4);
    }

    #[test]
    fn test_unknown_override() {
        let formula = parse_formula(FORMULA).unwrap();
        let overrides = OptionOverrides::new().with("gpu", true).unwrap();
        let err = resolve_options(&formula, &overrides).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownOption { name, .. } if name == "gpu"));
    }

    #[test]
    fn test_head_requires_head_source() {
        let formula = parse_formula(FORMULA).unwrap();
        let request = BuildRequest::from_switches(&["--HEAD"]).unwrap();
        assert!(matches!(
            resolve_request(&formula, &request),
            Err(ConfigError::HeadUnavailable { .. })
        ));
    }

    proptest! {
        #[test]
        fn resolution_is_deterministic_and_independent(
            choices in proptest::collection::vec(proptest::option::of(any::<bool>()), 4)
        ) {
            let formula = parse_formula(FORMULA).unwrap();
            let names = ["examples", "tools", "qt", "openni"];
            let mut overrides = OptionOverrides::new();
            for (name, choice) in names.iter().zip(&choices) {
                if let Some(value) = choice {
                    overrides.set(name, *value).unwrap();
                }
            }

            let first = resolve_options(&formula, &overrides).unwrap();
            let second = resolve_options(&formula, &overrides).unwrap();
            prop_assert_eq!(&first, &second);

            let defaults = resolve_options(&formula, &OptionOverrides::new()).unwrap();
            for (name, choice) in names.iter().zip(&choices) {
                // Each option depends only on its own override
                let expected = choice.unwrap_or_else(|| defaults.is_enabled(name));
                prop_assert_eq!(first.is_enabled(name), expected);
            }
        }
    }
}
