//! Predicates attached to dependencies, patches, preconditions and
//! configure arguments
//!
//! A condition is data, not code: the formula states *when* something
//! applies and [`Condition::evaluate`] is the single routine that decides it.

use serde::{Deserialize, Serialize};

use crate::options::{BuildMode, ResolvedOptions};

/// Operating system family of the build host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OsFamily {
    Macos,
    Linux,
    Other,
}

impl std::fmt::Display for OsFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Macos => write!(f, "macos"),
            Self::Linux => write!(f, "linux"),
            Self::Other => write!(f, "other"),
        }
    }
}

/// Description of the build host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformInfo {
    pub family: OsFamily,
    /// Dotted release version, e.g. `10.9.5` on macOS or the kernel release elsewhere
    pub version: String,
    pub arch: String,
}

impl PlatformInfo {
    #[must_use]
    pub fn new(family: OsFamily, version: impl Into<String>, arch: impl Into<String>) -> Self {
        Self {
            family,
            version: version.into(),
            arch: arch.into(),
        }
    }
}

impl std::fmt::Display for PlatformInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} ({})", self.family, self.version, self.arch)
    }
}

/// Match against a specific OS release
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OsVersionMatch {
    pub family: OsFamily,
    /// Version prefix; `10.9` matches `10.9` and `10.9.5` but not `10.10`
    pub version: String,
}

impl OsVersionMatch {
    #[must_use]
    pub fn matches(&self, platform: &PlatformInfo) -> bool {
        if self.family != platform.family {
            return false;
        }
        let mut host = platform.version.split('.');
        self.version
            .split('.')
            .all(|wanted| host.next().is_some_and(|have| have == wanted))
    }
}

/// Everything a condition may look at
#[derive(Debug, Clone, Copy)]
pub struct ConditionContext<'a> {
    pub options: &'a ResolvedOptions,
    pub mode: BuildMode,
    pub platform: &'a PlatformInfo,
}

/// Applicability predicate
///
/// In formula files a condition is either the bare word `head` / `release`
/// or a single-key map such as `{ with: qvtk }` or `{ all: [...] }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Condition {
    Mode(BuildMode),
    With { with: String },
    Without { without: String },
    Os { os: OsFamily },
    OsVersion { os_version: OsVersionMatch },
    All { all: Vec<Condition> },
    Any { any: Vec<Condition> },
    Not { not: Box<Condition> },
}

impl Condition {
    #[must_use]
    pub fn head() -> Self {
        Self::Mode(BuildMode::Head)
    }

    #[must_use]
    pub fn release() -> Self {
        Self::Mode(BuildMode::Release)
    }

    #[must_use]
    pub fn with(option: impl Into<String>) -> Self {
        Self::With {
            with: option.into(),
        }
    }

    #[must_use]
    pub fn without(option: impl Into<String>) -> Self {
        Self::Without {
            without: option.into(),
        }
    }

    #[must_use]
    pub fn all(conditions: Vec<Condition>) -> Self {
        Self::All { all: conditions }
    }

    /// Evaluate the predicate
    #[must_use]
    pub fn evaluate(&self, ctx: &ConditionContext<'_>) -> bool {
        match self {
            Self::Mode(mode) => *mode == ctx.mode,
            Self::With { with } => ctx.options.is_enabled(with),
            Self::Without { without } => !ctx.options.is_enabled(without),
            Self::Os { os } => *os == ctx.platform.family,
            Self::OsVersion { os_version } => os_version.matches(ctx.platform),
            Self::All { all } => all.iter().all(|c| c.evaluate(ctx)),
            Self::Any { any } => any.iter().any(|c| c.evaluate(ctx)),
            Self::Not { not } => !not.evaluate(ctx),
        }
    }

    /// Option names referenced anywhere in this condition
    #[must_use]
    pub fn referenced_options(&self) -> Vec<&str> {
        let mut names = Vec::new();
        self.collect_options(&mut names);
        names
    }

    fn collect_options<'a>(&'a self, names: &mut Vec<&'a str>) {
        match self {
            Self::With { with: name } | Self::Without { without: name } => names.push(name),
            Self::All { all: list } | Self::Any { any: list } => {
                for c in list {
                    c.collect_options(names);
                }
            }
            Self::Not { not } => not.collect_options(names),
            Self::Mode(_) | Self::Os { .. } | Self::OsVersion { .. } => {}
        }
    }
}

/// Evaluate an optional `when`; absence means the item always applies
#[must_use]
pub fn holds(when: Option<&Condition>, ctx: &ConditionContext<'_>) -> bool {
    when.is_none_or(|c| c.evaluate(ctx))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn mavericks() -> PlatformInfo {
        PlatformInfo::new(OsFamily::Macos, "10.9.5", "x86_64")
    }

    #[test]
    fn test_os_version_prefix_match() {
        let m = OsVersionMatch {
            family: OsFamily::Macos,
            version: "10.9".to_string(),
        };
        assert!(m.matches(&mavericks()));
        assert!(m.matches(&PlatformInfo::new(OsFamily::Macos, "10.9", "x86_64")));
        assert!(!m.matches(&PlatformInfo::new(OsFamily::Macos, "10.10", "x86_64")));
        assert!(!m.matches(&PlatformInfo::new(OsFamily::Macos, "10", "x86_64")));
        assert!(!m.matches(&PlatformInfo::new(OsFamily::Linux, "10.9", "x86_64")));
    }

    #[test]
    fn test_evaluate_composite() {
        let options = ResolvedOptions::from_map(BTreeMap::from([
            ("qvtk".to_string(), false),
            ("apps".to_string(), true),
        ]));
        let platform = mavericks();
        let ctx = ConditionContext {
            options: &options,
            mode: BuildMode::Release,
            platform: &platform,
        };

        assert!(Condition::without("qvtk").evaluate(&ctx));
        assert!(Condition::with("apps").evaluate(&ctx));
        assert!(Condition::release().evaluate(&ctx));
        assert!(!Condition::head().evaluate(&ctx));
        assert!(Condition::all(vec![Condition::release(), Condition::with("apps")]).evaluate(&ctx));
        assert!(!Condition::Not {
            not: Box::new(Condition::with("apps"))
        }
        .evaluate(&ctx));
        assert!(holds(None, &ctx));
    }

    #[test]
    fn test_parse_yaml_forms() {
        let c: Condition = serde_yml::from_str("head").unwrap();
        assert_eq!(c, Condition::head());

        let c: Condition = serde_yml::from_str("{ with: qvtk }").unwrap();
        assert_eq!(c, Condition::with("qvtk"));

        let c: Condition = serde_yml::from_str(
            "all:\n  - os_version: { family: macos, version: \"10.9\" }\n  - release\n",
        )
        .unwrap();
        assert_eq!(c.referenced_options().len(), 0);
        match c {
            Condition::All { all } => assert_eq!(all.len(), 2),
            other => panic!("unexpected condition: {other:?}"),
        }
    }

    #[test]
    fn test_referenced_options_walks_tree() {
        let c = Condition::Any {
            any: vec![
                Condition::with("a"),
                Condition::Not {
                    not: Box::new(Condition::without("b")),
                },
            ],
        };
        assert_eq!(c.referenced_options(), vec!["a", "b"]);
    }
}
