pub mod build_list;
pub mod config;
pub mod error;
pub mod module;
pub mod session;

pub use build_list::{ProjectBuild, ProjectBuildList};
pub use config::BuilderConfig;
pub use error::{BuildError, ConfigError};
pub use module::{Module, ModuleId, TaskSegment};
pub use session::{
    BuildResult, HaltSignal, InterruptSignal, ReactorBuildStatus, ReactorContext, Session,
};
