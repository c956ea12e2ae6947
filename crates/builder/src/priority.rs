//! Optional module priority list read from `.pbuild/simple-parallel.json`.
//!
//! ```json
//! { "prioritizedModules": ["com.acme:slow-integration-tests", "com.acme:core"] }
//! ```
//!
//! Earlier entries are submitted first within every segment. A missing file
//! means "no preference"; a malformed one fails the run.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use pbuild_core::{BuilderConfig, ConfigError, Module, ModuleId};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Location of the priority file relative to the execution root.
pub const PRIORITY_CONFIG_PATH: &str = ".pbuild/simple-parallel.json";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct PriorityFile {
    #[serde(default)]
    prioritized_modules: Vec<String>,
}

/// Ordered `groupId:artifactId` keys, highest priority first.
#[derive(Debug, Clone, Default)]
pub struct PriorityConfig {
    prioritized_modules: Vec<String>,
    /// key -> index of its first occurrence
    ranks: HashMap<String, usize>,
}

impl PriorityConfig {
    pub fn new<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let prioritized_modules: Vec<String> = keys.into_iter().map(Into::into).collect();
        let mut ranks = HashMap::with_capacity(prioritized_modules.len());
        for (idx, key) in prioritized_modules.iter().enumerate() {
            ranks.entry(key.clone()).or_insert(idx);
        }
        Self {
            prioritized_modules,
            ranks,
        }
    }

    /// Load the priority list for a run.
    ///
    /// `config.priority_file` wins over the well-known location under
    /// `config.root_dir`. An explicitly configured file that does not exist is
    /// treated the same as an absent default file.
    pub fn load(config: &BuilderConfig) -> Result<Self, ConfigError> {
        let path = config
            .priority_file
            .clone()
            .unwrap_or_else(|| config.root_dir.join(PRIORITY_CONFIG_PATH));
        Self::load_optional(Some(&path))
    }

    /// Load from `path` if given and present, else return an empty list.
    pub fn load_optional(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) if path.exists() => Self::from_file(path),
            Some(path) => {
                debug!("No priority config at {}", path.display());
                Ok(Self::default())
            }
            None => Ok(Self::default()),
        }
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        info!("Loading config from {}", path.display());
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&raw, path)
    }

    fn parse(raw: &str, path: &Path) -> Result<Self, ConfigError> {
        let file: PriorityFile = serde_json::from_str(raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        if let Some(bad) = file
            .prioritized_modules
            .iter()
            .find(|key| ModuleId::parse(key).is_none())
        {
            return Err(ConfigError::Validation {
                path: PathBuf::from(path),
                message: format!("'{}' is not a groupId:artifactId key", bad),
            });
        }

        let config = Self::new(file.prioritized_modules);
        info!("Loaded {} prioritized modules", config.len());
        Ok(config)
    }

    pub fn prioritized_modules(&self) -> &[String] {
        &self.prioritized_modules
    }

    pub fn len(&self) -> usize {
        self.prioritized_modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prioritized_modules.is_empty()
    }

    /// Sort key: position in the list, or `len()` for unlisted keys.
    pub fn rank(&self, key: &str) -> usize {
        self.ranks.get(key).copied().unwrap_or(self.prioritized_modules.len())
    }

    pub fn rank_of(&self, module: &Module) -> usize {
        self.rank(&module.key())
    }

    /// Stable sort by rank; unlisted modules keep their relative order.
    pub fn sort<T, F>(&self, items: &mut [T], module_of: F)
    where
        F: Fn(&T) -> &Module,
    {
        items.sort_by_cached_key(|item| self.rank_of(module_of(item)));
    }
}
