//! YAML formula parser

use super::validate::validate_formula;
use kiln_errors::{ConfigError, Error};
use kiln_types::Formula;
use std::path::{Path, PathBuf};

/// Parse and validate a formula file
///
/// # Errors
///
/// Returns an error if:
/// - The file cannot be read
/// - The YAML is invalid or has unknown fields
/// - Validation fails
pub async fn load_formula(path: &Path) -> Result<Formula, Error> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| Error::io_with_path(&e, path))?;

    let formula = parse_formula(&content).map_err(|e| match e {
        ConfigError::InvalidFormula { message, .. } => ConfigError::InvalidFormula {
            formula: path.display().to_string(),
            message,
        },
        other => other,
    })?;
    tracing::debug!(formula = %formula.name, path = %path.display(), "loaded formula");
    Ok(formula)
}

/// Parse and validate a formula from a string
///
/// # Errors
///
/// Returns an error if the YAML is invalid, has unknown fields, or fails
/// validation.
pub fn parse_formula(content: &str) -> Result<Formula, ConfigError> {
    let formula: Formula =
        serde_yml::from_str(content).map_err(|e| ConfigError::InvalidFormula {
            formula: "<input>".to_string(),
            message: format!("failed to parse YAML: {e}"),
        })?;

    validate_formula(&formula)?;
    Ok(formula)
}

/// Resolve a formula argument to a file
///
/// An argument that names an existing file is used as is. Otherwise
/// `<dir>/<name>.yml` and `<dir>/<name>.yaml` are tried in each directory.
///
/// # Errors
///
/// Returns an error if nothing matches.
pub fn find_formula(name: &str, dirs: &[PathBuf]) -> Result<PathBuf, ConfigError> {
    let direct = Path::new(name);
    if direct.is_file() {
        return Ok(direct.to_path_buf());
    }

    dirs.iter()
        .flat_map(|dir| ["yml", "yaml"].map(|ext| dir.join(format!("{name}.{ext}"))))
        .find(|candidate| candidate.is_file())
        .ok_or_else(|| ConfigError::FormulaNotFound {
            name: name.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEMO: &str = r#"
name: demo
url: https://example.org/demo-1.0.tar.gz
checksum: { md5: "0123456789abcdef0123456789abcdef" }
version: "1.0"
install:
  configure: { program: cmake, std_args: true, trailing: [".."] }
  build: [ { program: make } ]
  install: [ { program: make, args: [install] } ]
"#;

    #[tokio::test]
    async fn test_load_formula_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.yml");
        std::fs::write(&path, "name: [").unwrap();

        let err = load_formula(&path).await.unwrap_err();
        match err {
            Error::Config(ConfigError::InvalidFormula { formula, .. }) => {
                assert!(formula.ends_with("broken.yml"));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_find_formula_by_name() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("demo.yaml"), DEMO).unwrap();

        let found = find_formula("demo", &[PathBuf::from("/nonexistent"), dir.path().to_path_buf()])
            .unwrap();
        assert_eq!(found, dir.path().join("demo.yaml"));
        assert!(matches!(
            find_formula("missing", &[dir.path().to_path_buf()]),
            Err(ConfigError::FormulaNotFound { .. })
        ));
    }

    #[test]
    fn test_bundled_pcl_formula_parses() {
        let formula = parse_formula(include_str!("../../../../formulae/pcl.yml")).unwrap();
        assert_eq!(formula.name, "pcl");
        assert_eq!(formula.version, "1.7.1");
        assert!(formula.head.is_some());
        assert_eq!(formula.option_declarations().len(), 8);
        assert_eq!(formula.requirements.len(), 1);
        assert!(formula
            .dependencies
            .iter()
            .any(|dep| dep.name == "homebrew/science/openni"));
    }

    #[test]
    fn test_parse_formula_ok() {
        let formula = parse_formula(DEMO).unwrap();
        assert_eq!(formula.name, "demo");
        assert_eq!(formula.install.build_dir, "build");
    }
}
