#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Configuration management for kiln
//!
//! This crate handles loading and merging configuration from:
//! - Default values (hard-coded)
//! - Configuration file (~/.config/kiln/config.toml)
//! - Environment variables
//! - CLI flags

pub mod constants;

use kiln_errors::{ConfigError, Error};
use kiln_types::{ColorChoice, OutputFormat, TestFailurePolicy};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,

    #[serde(default)]
    pub paths: PathConfig,

    #[serde(default)]
    pub build: BuildConfig,

    #[serde(default)]
    pub tests: TestConfig,
}

/// General configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    #[serde(default = "default_output_format")]
    pub default_output: OutputFormat,
    #[serde(default = "default_color_choice")]
    pub color: ColorChoice,
}

/// Path configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PathConfig {
    /// Global install prefix; exposed to formulae as `${GLOBAL_PREFIX}`
    pub prefix: Option<PathBuf>,
    /// Where kegs are installed, `<cellar>/<name>/<version>`
    pub cellar: Option<PathBuf>,
    /// Parent of per-run work directories
    pub work_root: Option<PathBuf>,
    pub logs_dir: Option<PathBuf>,
    /// Directories searched when a formula is given by name
    #[serde(default)]
    pub formula_dirs: Vec<PathBuf>,
}

/// Build configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildConfig {
    #[serde(default = "default_build_jobs")]
    pub jobs: usize, // 0 = auto-detect
    /// Per-command timeout; 0 disables it
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
    #[serde(default)]
    pub keep_work_dir: bool,
}

/// Test phase configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TestConfig {
    #[serde(default)]
    pub failure_policy: TestFailurePolicy,
}

// Default implementations

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            default_output: OutputFormat::Tty,
            color: ColorChoice::Auto,
        }
    }
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            jobs: 0, // 0 = auto-detect
            timeout_seconds: default_timeout_seconds(),
            keep_work_dir: false,
        }
    }
}

// Default value functions for serde
fn default_output_format() -> OutputFormat {
    OutputFormat::Tty
}

fn default_color_choice() -> ColorChoice {
    ColorChoice::Auto
}

fn default_build_jobs() -> usize {
    0 // 0 = auto-detect
}

fn default_timeout_seconds() -> u64 {
    3600 // 1 hour
}

impl Config {
    /// Get the default config file path
    ///
    /// # Errors
    ///
    /// Returns an error if the system config directory cannot be determined.
    pub fn default_path() -> Result<PathBuf, Error> {
        let config_dir = dirs::config_dir().ok_or_else(|| ConfigError::NotFound {
            path: "config directory".to_string(),
        })?;
        Ok(config_dir.join("kiln").join("config.toml"))
    }

    /// Load configuration from file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or if the file contents
    /// contain invalid TOML syntax that cannot be parsed.
    pub async fn load_from_file(path: &Path) -> Result<Self, Error> {
        let contents = fs::read_to_string(path)
            .await
            .map_err(|_| ConfigError::NotFound {
                path: path.display().to_string(),
            })?;

        toml::from_str(&contents)
            .map_err(|e| ConfigError::ParseError {
                message: e.to_string(),
            })
            .map_err(Into::into)
    }

    /// Load configuration with fallback to defaults
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration file exists but cannot be read
    /// or contains invalid TOML syntax.
    pub async fn load() -> Result<Self, Error> {
        let config_path = Self::default_path()?;

        if config_path.exists() {
            tracing::debug!(path = %config_path.display(), "loading configuration");
            Self::load_from_file(&config_path).await
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from an optional path or use default
    ///
    /// # Errors
    ///
    /// Returns an error if the config file cannot be read or parsed
    pub async fn load_or_default(path: Option<&Path>) -> Result<Self, Error> {
        match path {
            Some(config_path) => Self::load_from_file(config_path).await,
            None => Self::load().await,
        }
    }

    /// Merge with environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if environment variables contain invalid values
    /// that cannot be parsed into the expected types.
    pub fn merge_env(&mut self) -> Result<(), Error> {
        self.merge_env_from(|key| std::env::var(key).ok())
    }

    /// Merge overrides from an arbitrary variable source
    ///
    /// # Errors
    ///
    /// Returns an error if a variable holds a value of the wrong shape.
    pub fn merge_env_from<F>(&mut self, lookup: F) -> Result<(), Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        // KILN_PREFIX
        if let Some(prefix) = lookup("KILN_PREFIX") {
            self.paths.prefix = Some(PathBuf::from(prefix));
        }

        // KILN_CELLAR
        if let Some(cellar) = lookup("KILN_CELLAR") {
            self.paths.cellar = Some(PathBuf::from(cellar));
        }

        // KILN_WORK_ROOT
        if let Some(root) = lookup("KILN_WORK_ROOT") {
            self.paths.work_root = Some(PathBuf::from(root));
        }

        // KILN_BUILD_JOBS
        if let Some(jobs) = lookup("KILN_BUILD_JOBS") {
            self.build.jobs = jobs.parse().map_err(|_| ConfigError::InvalidValue {
                field: "KILN_BUILD_JOBS".to_string(),
                value: jobs,
            })?;
        }

        // KILN_TIMEOUT
        if let Some(timeout) = lookup("KILN_TIMEOUT") {
            self.build.timeout_seconds =
                timeout.parse().map_err(|_| ConfigError::InvalidValue {
                    field: "KILN_TIMEOUT".to_string(),
                    value: timeout,
                })?;
        }

        // KILN_TEST_POLICY
        if let Some(policy) = lookup("KILN_TEST_POLICY") {
            self.tests.failure_policy = match policy.as_str() {
                "fatal" => TestFailurePolicy::Fatal,
                "warn" => TestFailurePolicy::Warn,
                _ => {
                    return Err(ConfigError::InvalidValue {
                        field: "KILN_TEST_POLICY".to_string(),
                        value: policy,
                    }
                    .into())
                }
            };
        }

        // KILN_COLOR
        if let Some(color) = lookup("KILN_COLOR") {
            self.general.color = match color.as_str() {
                "always" => ColorChoice::Always,
                "auto" => ColorChoice::Auto,
                "never" => ColorChoice::Never,
                _ => {
                    return Err(ConfigError::InvalidValue {
                        field: "KILN_COLOR".to_string(),
                        value: color,
                    }
                    .into())
                }
            };
        }

        Ok(())
    }

    /// Get the global prefix (with default)
    #[must_use]
    pub fn prefix(&self) -> PathBuf {
        self.paths
            .prefix
            .clone()
            .unwrap_or_else(|| PathBuf::from(constants::PREFIX))
    }

    /// Get the cellar path (with default)
    ///
    /// An explicit `prefix` without an explicit `cellar` puts the cellar
    /// under that prefix.
    #[must_use]
    pub fn cellar(&self) -> PathBuf {
        match (&self.paths.cellar, &self.paths.prefix) {
            (Some(cellar), _) => cellar.clone(),
            (None, Some(prefix)) => prefix.join("Cellar"),
            (None, None) => PathBuf::from(constants::CELLAR_DIR),
        }
    }

    /// Get the work root (with default)
    #[must_use]
    pub fn work_root(&self) -> PathBuf {
        self.paths
            .work_root
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join(constants::WORK_DIR_NAME))
    }

    /// Get the logs directory (with default)
    #[must_use]
    pub fn logs_dir(&self) -> PathBuf {
        self.paths
            .logs_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from(constants::LOGS_DIR))
    }

    /// Formula search path: configured directories, then the fixed default
    #[must_use]
    pub fn formula_dirs(&self) -> Vec<PathBuf> {
        let mut dirs = self.paths.formula_dirs.clone();
        let fixed = PathBuf::from(constants::FORMULA_DIR);
        if !dirs.contains(&fixed) {
            dirs.push(fixed);
        }
        dirs
    }

    /// Effective parallel job count
    #[must_use]
    pub fn build_jobs(&self) -> usize {
        calculate_build_jobs(self.build.jobs)
    }

    /// Effective command timeout, if any
    #[must_use]
    pub fn command_timeout(&self) -> Option<std::time::Duration> {
        (self.build.timeout_seconds > 0)
            .then(|| std::time::Duration::from_secs(self.build.timeout_seconds))
    }
}

/// Calculate build jobs based on CPU count
#[must_use]
pub fn calculate_build_jobs(config_value: usize) -> usize {
    if config_value > 0 {
        config_value // User override
    } else {
        // Use 75% of CPUs for builds, minimum 1
        let cpus = num_cpus::get();
        (cpus * 3 / 4).max(1)
    }
}
