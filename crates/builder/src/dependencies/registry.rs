//! Registries of already-installed formulae

use async_trait::async_trait;
use kiln_errors::Error;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::path::PathBuf;

/// An installed formula
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstalledKeg {
    pub prefix: PathBuf,
    pub version: Option<String>,
}

/// Lookup of installed formulae by name
///
/// The evaluator only ever asks this trait; it never consults global state.
#[async_trait]
pub trait InstalledRegistry: Send + Sync {
    /// Installed keg for `name`, if any
    async fn lookup(&self, name: &str) -> Result<Option<InstalledKeg>, Error>;
}

/// Registry backed by a cellar directory laid out as `<cellar>/<name>/<version>`
#[derive(Debug, Clone)]
pub struct CellarRegistry {
    cellar: PathBuf,
}

impl CellarRegistry {
    #[must_use]
    pub fn new(cellar: impl Into<PathBuf>) -> Self {
        Self {
            cellar: cellar.into(),
        }
    }
}

#[async_trait]
impl InstalledRegistry for CellarRegistry {
    async fn lookup(&self, name: &str) -> Result<Option<InstalledKeg>, Error> {
        let short = name.rsplit('/').next().unwrap_or(name);
        let rack = self.cellar.join(short);
        let mut entries = match tokio::fs::read_dir(&rack).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(Error::io_with_path(&e, &rack)),
        };

        let mut newest: Option<String> = None;
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| Error::io_with_path(&e, &rack))?
        {
            if !entry.file_type().await.is_ok_and(|t| t.is_dir()) {
                continue;
            }
            let version = entry.file_name().to_string_lossy().into_owned();
            if version.starts_with('.') {
                continue;
            }
            if newest
                .as_deref()
                .is_none_or(|current| compare_versions(&version, current) == Ordering::Greater)
            {
                newest = Some(version);
            }
        }

        Ok(newest.map(|version| InstalledKeg {
            prefix: rack.join(&version),
            version: Some(version),
        }))
    }
}

/// Fixed in-memory registry
#[derive(Debug, Clone, Default)]
pub struct StaticRegistry {
    kegs: HashMap<String, InstalledKeg>,
}

impl StaticRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `name` as installed at `prefix`
    #[must_use]
    pub fn with(mut self, name: &str, prefix: impl Into<PathBuf>) -> Self {
        self.kegs.insert(
            name.to_string(),
            InstalledKeg {
                prefix: prefix.into(),
                version: None,
            },
        );
        self
    }
}

#[async_trait]
impl InstalledRegistry for StaticRegistry {
    async fn lookup(&self, name: &str) -> Result<Option<InstalledKeg>, Error> {
        let short = name.rsplit('/').next().unwrap_or(name);
        Ok(self
            .kegs
            .get(name)
            .or_else(|| self.kegs.get(short))
            .cloned())
    }
}

/// Dotted version comparison, numeric where both components are numbers
fn compare_versions(a: &str, b: &str) -> Ordering {
    let mut left = a.split(['.', '_', '-']);
    let mut right = b.split(['.', '_', '-']);
    loop {
        match (left.next(), right.next()) {
            (None, None) => return Ordering::Equal,
            (Some(_), None) => return Ordering::Greater,
            (None, Some(_)) => return Ordering::Less,
            (Some(x), Some(y)) => {
                let ord = match (x.parse::<u64>(), y.parse::<u64>()) {
                    (Ok(x), Ok(y)) => x.cmp(&y),
                    _ => x.cmp(y),
                };
                if ord != Ordering::Equal {
                    return ord;
                }
            }
        }
    }
}
