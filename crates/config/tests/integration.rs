//! Integration tests for config

#[cfg(test)]
mod tests {
    use kiln_config::*;
    use kiln_types::{ColorChoice, OutputFormat, TestFailurePolicy};
    use std::io::Write;
    use std::path::PathBuf;
    use tempfile::NamedTempFile;

    #[tokio::test]
    async fn test_load_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(
            temp_file,
            r#"
[general]
default_output = "plain"
color = "never"

[paths]
prefix = "/usr/local"
formula_dirs = ["/srv/formulae"]

[build]
jobs = 4
timeout_seconds = 0

[tests]
failure_policy = "warn"
        "#
        )
        .unwrap();

        let config = Config::load_from_file(temp_file.path()).await.unwrap();
        assert_eq!(config.general.default_output, OutputFormat::Plain);
        assert_eq!(config.general.color, ColorChoice::Never);
        assert_eq!(config.prefix(), PathBuf::from("/usr/local"));
        assert_eq!(config.cellar(), PathBuf::from("/usr/local/Cellar"));
        assert_eq!(config.build_jobs(), 4);
        assert_eq!(config.command_timeout(), None);
        assert_eq!(config.tests.failure_policy, TestFailurePolicy::Warn);
        assert_eq!(
            config.formula_dirs(),
            [
                PathBuf::from("/srv/formulae"),
                PathBuf::from(constants::FORMULA_DIR)
            ]
        );
    }

    #[tokio::test]
    async fn test_empty_file_gives_defaults() {
        let temp_file = NamedTempFile::new().unwrap();
        let config = Config::load_or_default(Some(temp_file.path()))
            .await
            .unwrap();
        assert_eq!(config.prefix(), PathBuf::from(constants::PREFIX));
        assert_eq!(config.tests.failure_policy, TestFailurePolicy::Fatal);
        assert!(!config.build.keep_work_dir);
    }

    #[test]
    fn test_env_takes_precedence_over_file() {
        let mut config: Config = toml::from_str("[build]\njobs = 2\n").unwrap();
        config
            .merge_env_from(|key| match key {
                "KILN_BUILD_JOBS" => Some("6".to_string()),
                "KILN_TEST_POLICY" => Some("warn".to_string()),
                _ => None,
            })
            .unwrap();
        assert_eq!(config.build_jobs(), 6);
        assert_eq!(config.tests.failure_policy, TestFailurePolicy::Warn);
    }
}
