//! Explicit environment of one formula evaluation

use kiln_config::Config;
use kiln_events::{EventEmitter, EventSender};
use kiln_types::{PlatformInfo, TestFailurePolicy};
use std::path::PathBuf;
use std::time::Duration;

use crate::execute::ExecutionSettings;

/// Everything the evaluator reads from the outside world
///
/// The install prefix, cellar and host description are passed in here
/// rather than looked up from process-wide state.
#[derive(Clone, Debug)]
pub struct EvaluationContext {
    /// Global prefix, `${GLOBAL_PREFIX}`
    pub prefix: PathBuf,
    /// Kegs are installed at `<cellar>/<name>/<version>`
    pub cellar: PathBuf,
    /// Parent of the per-run work directories
    pub work_root: PathBuf,
    pub jobs: usize,
    pub timeout: Option<Duration>,
    pub test_policy: TestFailurePolicy,
    pub keep_work_dir: bool,
    pub platform: PlatformInfo,
    /// `PATH` appended after dependency bin directories
    pub base_path: Option<String>,
    /// Event sender for progress reporting
    pub event_sender: Option<EventSender>,
}

impl EventEmitter for EvaluationContext {
    fn event_sender(&self) -> Option<&EventSender> {
        self.event_sender.as_ref()
    }
}

impl EvaluationContext {
    #[must_use]
    pub fn new(prefix: PathBuf, platform: PlatformInfo) -> Self {
        Self {
            cellar: prefix.join("Cellar"),
            work_root: std::env::temp_dir().join("kiln"),
            prefix,
            jobs: 1,
            timeout: None,
            test_policy: TestFailurePolicy::default(),
            keep_work_dir: false,
            platform,
            base_path: None,
            event_sender: None,
        }
    }

    /// Context from the loaded configuration and the caller's `PATH`
    #[must_use]
    pub fn from_config(config: &Config, platform: PlatformInfo) -> Self {
        Self {
            prefix: config.prefix(),
            cellar: config.cellar(),
            work_root: config.work_root(),
            jobs: config.build_jobs(),
            timeout: config.command_timeout(),
            test_policy: config.tests.failure_policy,
            keep_work_dir: config.build.keep_work_dir,
            platform,
            base_path: std::env::var("PATH").ok(),
            event_sender: None,
        }
    }

    #[must_use]
    pub fn with_work_root(mut self, work_root: PathBuf) -> Self {
        self.work_root = work_root;
        self
    }

    #[must_use]
    pub fn with_jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs.max(1);
        self
    }

    #[must_use]
    pub fn with_test_policy(mut self, policy: TestFailurePolicy) -> Self {
        self.test_policy = policy;
        self
    }

    #[must_use]
    pub fn with_keep_work_dir(mut self, keep: bool) -> Self {
        self.keep_work_dir = keep;
        self
    }

    #[must_use]
    pub fn with_base_path(mut self, path: Option<String>) -> Self {
        self.base_path = path;
        self
    }

    /// Set event sender
    #[must_use]
    pub fn with_event_sender(mut self, event_sender: EventSender) -> Self {
        self.event_sender = Some(event_sender);
        self
    }

    pub(crate) fn execution_settings(&self) -> ExecutionSettings {
        ExecutionSettings {
            timeout: self.timeout,
            test_policy: self.test_policy,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiln_types::OsFamily;

    #[test]
    fn test_from_config() {
        let mut config = Config::default();
        config.paths.prefix = Some(PathBuf::from("/usr/local"));
        config.build.jobs = 3;
        config.build.timeout_seconds = 0;
        config.tests.failure_policy = TestFailurePolicy::Warn;

        let ctx = EvaluationContext::from_config(
            &config,
            PlatformInfo::new(OsFamily::Macos, "10.10", "x86_64"),
        );
        assert_eq!(ctx.prefix, PathBuf::from("/usr/local"));
        assert_eq!(ctx.cellar, PathBuf::from("/usr/local/Cellar"));
        assert_eq!(ctx.jobs, 3);
        assert!(ctx.timeout.is_none());
        assert_eq!(ctx.execution_settings().test_policy, TestFailurePolicy::Warn);
    }
}
