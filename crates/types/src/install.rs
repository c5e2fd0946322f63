//! Install procedure: configure, build, install and test steps

use serde::{Deserialize, Serialize};

use crate::condition::Condition;

/// Configure arguments contributed by a condition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OptionArgs {
    pub when: Condition,
    /// Appended when the condition holds
    #[serde(default)]
    pub args: Vec<String>,
    /// Appended when it does not
    #[serde(default)]
    pub otherwise: Vec<String>,
}

/// The configure invocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigureStep {
    pub program: String,
    /// Prepend the standard arguments of the configure system
    #[serde(default)]
    pub std_args: bool,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub options: Vec<OptionArgs>,
    /// Appended after every other argument, typically the source path
    #[serde(default)]
    pub trailing: Vec<String>,
}

/// A build, install or test command
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CommandStep {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
    /// `make` steps get `-j${JOBS}` unless this is false
    #[serde(default = "default_parallel")]
    pub parallel: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub when: Option<Condition>,
}

fn default_parallel() -> bool {
    true
}

impl CommandStep {
    #[must_use]
    pub fn new(program: &str, args: &[&str]) -> Self {
        Self {
            program: program.to_string(),
            args: args.iter().map(ToString::to_string).collect(),
            parallel: true,
            when: None,
        }
    }
}

/// How a formula is built and installed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InstallProcedure {
    /// Out-of-tree build directory, relative to the source root
    #[serde(default = "default_build_dir")]
    pub build_dir: String,
    pub configure: ConfigureStep,
    #[serde(default)]
    pub build: Vec<CommandStep>,
    #[serde(default)]
    pub install: Vec<CommandStep>,
    #[serde(default)]
    pub test: Vec<CommandStep>,
}

fn default_build_dir() -> String {
    "build".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_procedure_defaults() {
        let yaml = "configure:\n  program: cmake\n  std_args: true\n  trailing: [\"..\"]\ninstall:\n  - program: make\n    args: [install]\n";
        let proc: InstallProcedure = serde_yml::from_str(yaml).unwrap();
        assert_eq!(proc.build_dir, "build");
        assert!(proc.configure.std_args);
        assert!(proc.build.is_empty());
        assert_eq!(proc.install[0].args, vec!["install"]);
    }
}
