pub mod executor;
pub mod names;
pub mod pool;
pub mod priority;
pub mod scheduler;

pub use executor::ModuleExecutor;
pub use names::{current_thread_label, duplicate_short_names, thread_label, LabelGuard};
pub use pool::{degree_of_concurrency, CompletionService, WorkerPool};
pub use priority::{PriorityConfig, PRIORITY_CONFIG_PATH};
pub use scheduler::{
    BuildOrchestrator, BuildStatus, BuildSummary, ModuleReport, ModuleStatus, SegmentOutcome,
    SegmentReport, SegmentScheduler,
};
