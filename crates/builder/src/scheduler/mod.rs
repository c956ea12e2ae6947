//! Segment-by-segment parallel build scheduling.
//!
//! Split into focused submodules:
//! - `orchestrator`: run-level driver owning the worker pool
//! - `segment`: priority-ordered submission and completion harvesting for one segment
//! - `report`: per-module and per-segment outcomes

mod orchestrator;
mod report;
mod segment;

pub use orchestrator::BuildOrchestrator;
pub use report::{
    BuildStatus, BuildSummary, ModuleReport, ModuleStatus, SegmentOutcome, SegmentReport,
};
pub use segment::{segment_labels, submission_order, SegmentScheduler};
