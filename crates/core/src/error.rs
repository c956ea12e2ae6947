use std::path::PathBuf;

use thiserror::Error;

use crate::module::ModuleId;

/// Malformed or unreadable configuration. Always fatal.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Error while reading {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Error while parsing {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid config {}: {message}", path.display())]
    Validation { path: PathBuf, message: String },
}

#[derive(Error, Debug)]
pub enum BuildError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),

    /// The module executor returned an error.
    #[error("Failed to build {module}: {source:#}")]
    ModuleBuild {
        module: ModuleId,
        #[source]
        source: anyhow::Error,
    },

    #[error("Build of {module} panicked: {message}")]
    ModulePanicked { module: ModuleId, message: String },

    /// The planner handed in the same module twice for one segment.
    #[error("{module} is planned more than once in segment [{segment}]")]
    DuplicateProjectBuild { module: ModuleId, segment: String },

    #[error("Failed to start worker pool: {0}")]
    WorkerPool(String),

    /// The orchestrating thread was interrupted while waiting on results.
    #[error("Build interrupted")]
    Interrupted,
}

impl BuildError {
    /// Module the error is attributed to, if any.
    pub fn module(&self) -> Option<&ModuleId> {
        match self {
            BuildError::ModuleBuild { module, .. }
            | BuildError::ModulePanicked { module, .. }
            | BuildError::DuplicateProjectBuild { module, .. } => Some(module),
            BuildError::Configuration(_) | BuildError::WorkerPool(_) | BuildError::Interrupted => {
                None
            }
        }
    }
}
