//! Load-time formula validation
//!
//! Everything that can be checked without a host, options or dependencies
//! is checked here, so a formula that loads can only fail later because of
//! the environment it runs in.

use std::collections::HashSet;
use std::path::{Component, Path};

use kiln_errors::ConfigError;
use kiln_types::{Condition, DependencyKind, DiffSource, Formula, OptionOrigin, PatchAction};

use crate::build_systems::BuildSystemRegistry;
use crate::placeholders::{self, DEPS_PREFIX};

fn invalid(formula: &Formula, message: impl Into<String>) -> ConfigError {
    ConfigError::InvalidFormula {
        formula: formula.name.clone(),
        message: message.into(),
    }
}

/// Validate a parsed formula
///
/// # Errors
///
/// Returns `ConfigError::InvalidFormula` describing the first problem found.
pub fn validate_formula(formula: &Formula) -> Result<(), ConfigError> {
    validate_metadata(formula)?;
    validate_options(formula)?;
    validate_conditions(formula)?;
    validate_patches(formula)?;
    validate_install(formula)?;
    Ok(())
}

fn validate_metadata(formula: &Formula) -> Result<(), ConfigError> {
    if formula.name.trim().is_empty() {
        return Err(invalid(formula, "name cannot be empty"));
    }
    if formula.version.trim().is_empty() {
        return Err(invalid(formula, "version cannot be empty"));
    }
    if formula.url.trim().is_empty() {
        return Err(invalid(formula, "url cannot be empty"));
    }

    let digest = formula.checksum.expected();
    if digest.len() != formula.checksum.expected_len()
        || !digest.chars().all(|c| c.is_ascii_hexdigit())
    {
        return Err(invalid(
            formula,
            format!(
                "{} checksum must be {} hex characters",
                formula.checksum.algorithm(),
                formula.checksum.expected_len()
            ),
        ));
    }

    if let Some(head) = &formula.head {
        if head.git.trim().is_empty() {
            return Err(invalid(formula, "head.git cannot be empty"));
        }
    }
    Ok(())
}

fn is_valid_option_name(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
        && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-')
}

fn validate_options(formula: &Formula) -> Result<(), ConfigError> {
    let mut seen = HashSet::new();
    for option in &formula.options {
        if !is_valid_option_name(&option.name) {
            return Err(invalid(
                formula,
                format!("invalid option name `{}`", option.name),
            ));
        }
        if option.name.starts_with("with-") || option.name.starts_with("without-") {
            return Err(invalid(
                formula,
                format!(
                    "option `{}` must be declared without its with-/without- prefix",
                    option.name
                ),
            ));
        }
        if !seen.insert(option.name.as_str()) {
            return Err(invalid(
                formula,
                format!("option `{}` declared twice", option.name),
            ));
        }
    }

    for dep in &formula.dependencies {
        if dep.name.trim().is_empty() {
            return Err(invalid(formula, "dependency name cannot be empty"));
        }
        if let Some(implicit) = dep.implicit_option() {
            if seen.contains(implicit) {
                return Err(invalid(
                    formula,
                    format!(
                        "option `{implicit}` clashes with the option implied by dependency {}",
                        dep.name
                    ),
                ));
            }
            if !is_valid_option_name(implicit) {
                return Err(invalid(
                    formula,
                    format!("dependency {} cannot imply an option", dep.name),
                ));
            }
        }
    }

    // Implicit options of one dependency name must agree on their default
    let decls = formula.option_declarations();
    for dep in &formula.dependencies {
        let Some(implicit) = dep.implicit_option() else {
            continue;
        };
        let clash = decls.iter().find(|d| d.name == implicit).is_some_and(|d| {
            !matches!(
                (&d.origin, dep.kind),
                (OptionOrigin::Recommended(_), DependencyKind::Recommended)
                    | (OptionOrigin::Optional(_), DependencyKind::Optional)
            )
        });
        if clash {
            return Err(invalid(
                formula,
                format!("dependency {} is both recommended and optional", dep.name),
            ));
        }
    }
    Ok(())
}

fn check_condition(
    formula: &Formula,
    known: &HashSet<String>,
    when: &Condition,
) -> Result<(), ConfigError> {
    for name in when.referenced_options() {
        if !known.contains(name) {
            return Err(invalid(
                formula,
                format!("condition references undeclared option `{name}`"),
            ));
        }
    }
    Ok(())
}

fn validate_conditions(formula: &Formula) -> Result<(), ConfigError> {
    let known: HashSet<String> = formula
        .option_declarations()
        .into_iter()
        .map(|d| d.name)
        .collect();

    let install = &formula.install;
    let conditions = formula
        .dependencies
        .iter()
        .filter_map(|d| d.when.as_ref())
        .chain(formula.requirements.iter().map(|r| &r.when))
        .chain(formula.patches.iter().filter_map(|p| p.when.as_ref()))
        .chain(install.configure.options.iter().map(|o| &o.when))
        .chain(
            install
                .build
                .iter()
                .chain(&install.install)
                .chain(&install.test)
                .filter_map(|s| s.when.as_ref()),
        );

    for when in conditions {
        check_condition(formula, &known, when)?;
    }
    Ok(())
}

fn is_contained(path: &str) -> bool {
    let path = Path::new(path);
    !path.as_os_str().is_empty()
        && path
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}

fn validate_patches(formula: &Formula) -> Result<(), ConfigError> {
    let mut ids = HashSet::new();
    for (index, patch) in formula.patches.iter().enumerate() {
        if !ids.insert(patch.label(index)) {
            return Err(invalid(
                formula,
                format!("patch id `{}` used twice", patch.label(index)),
            ));
        }
        match &patch.action {
            PatchAction::Inreplace { inreplace } => {
                if inreplace.files.is_empty() {
                    return Err(invalid(formula, format!("patch {index} lists no files")));
                }
                if inreplace.search.is_empty() {
                    return Err(invalid(
                        formula,
                        format!("patch {index} has an empty search string"),
                    ));
                }
                if let Some(bad) = inreplace.files.iter().find(|f| !is_contained(f)) {
                    return Err(invalid(
                        formula,
                        format!("patch {index} targets `{bad}` outside the source tree"),
                    ));
                }
            }
            PatchAction::Diff { diff } => match &diff.source {
                DiffSource::Inline { inline } if inline.trim().is_empty() => {
                    return Err(invalid(formula, format!("patch {index} has an empty diff")));
                }
                DiffSource::Url { url, sha256 } => {
                    if url.trim().is_empty() {
                        return Err(invalid(formula, format!("patch {index} has an empty url")));
                    }
                    if sha256
                        .as_ref()
                        .is_some_and(|h| h.len() != 64 || !h.chars().all(|c| c.is_ascii_hexdigit()))
                    {
                        return Err(invalid(
                            formula,
                            format!("patch {index} sha256 must be 64 hex characters"),
                        ));
                    }
                }
                DiffSource::Inline { .. } => {}
            },
        }
    }
    Ok(())
}

fn check_placeholders<'a>(
    formula: &Formula,
    deps: &HashSet<&str>,
    args: impl IntoIterator<Item = &'a String>,
) -> Result<(), ConfigError> {
    for arg in args {
        let names = placeholders::references(arg).map_err(|text| {
            invalid(formula, format!("unterminated placeholder in `{text}`"))
        })?;
        for name in names {
            let ok = match name.strip_prefix(DEPS_PREFIX) {
                Some(dep) => deps.contains(dep),
                None => placeholders::BUILTIN.contains(&name),
            };
            if !ok {
                return Err(invalid(
                    formula,
                    format!("unknown placeholder ${{{name}}} in `{arg}`"),
                ));
            }
        }
    }
    Ok(())
}

fn validate_install(formula: &Formula) -> Result<(), ConfigError> {
    let install = &formula.install;
    if install.configure.program.trim().is_empty() {
        return Err(invalid(formula, "configure.program cannot be empty"));
    }
    if !is_contained(&install.build_dir) {
        return Err(invalid(
            formula,
            format!("build_dir `{}` must be a relative path", install.build_dir),
        ));
    }
    if install.configure.std_args
        && BuildSystemRegistry::new()
            .for_program(&install.configure.program)
            .is_none()
    {
        return Err(invalid(
            formula,
            format!(
                "no standard arguments are known for `{}`",
                install.configure.program
            ),
        ));
    }

    let deps: HashSet<&str> = formula.dependencies.iter().map(|d| d.short_name()).collect();
    let configure = &install.configure;
    check_placeholders(formula, &deps, &configure.args)?;
    check_placeholders(formula, &deps, &configure.trailing)?;
    for entry in &configure.options {
        check_placeholders(formula, &deps, entry.args.iter().chain(&entry.otherwise))?;
    }
    for step in install.build.iter().chain(&install.install).chain(&install.test) {
        if step.program.trim().is_empty() {
            return Err(invalid(formula, "step program cannot be empty"));
        }
        check_placeholders(formula, &deps, std::iter::once(&step.program).chain(&step.args))?;
    }
    Ok(())
}
