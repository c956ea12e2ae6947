use std::time::Duration;

use chrono::{DateTime, Utc};
use pbuild_core::{ModuleId, TaskSegment};
use serde::Serialize;
use uuid::Uuid;

/// Per-module result within one segment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ModuleStatus {
    Succeeded,
    Failed { error: String },
    /// Submitted, but the segment stopped harvesting before it finished.
    /// The build itself still ran to completion.
    Unharvested,
    /// The segment was abandoned before this module was submitted.
    NotAttempted,
}

/// How a segment ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SegmentOutcome {
    Success,
    /// The halt signal was observed; not an error.
    Halted,
    /// A module failed; the error is on the root session's result.
    Failed,
    /// Never started because an earlier segment stopped the build.
    Skipped,
}

impl SegmentOutcome {
    /// Whether the build may continue with the next segment.
    pub fn proceeds(&self) -> bool {
        matches!(self, SegmentOutcome::Success)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ModuleReport {
    pub module: ModuleId,
    /// Diagnostic label the worker carried while building it.
    pub label: String,
    pub status: ModuleStatus,
    /// Time from submission to harvest, for harvested modules.
    pub elapsed: Option<Duration>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SegmentReport {
    pub segment: TaskSegment,
    pub outcome: SegmentOutcome,
    /// In submission order.
    pub modules: Vec<ModuleReport>,
}

impl SegmentReport {
    /// A segment none of whose modules were submitted; `modules` pairs each
    /// module with its label, in submission order.
    pub fn not_attempted(
        segment: TaskSegment,
        outcome: SegmentOutcome,
        modules: Vec<(ModuleId, String)>,
    ) -> Self {
        Self {
            segment,
            outcome,
            modules: modules
                .into_iter()
                .map(|(module, label)| ModuleReport {
                    module,
                    label,
                    status: ModuleStatus::NotAttempted,
                    elapsed: None,
                })
                .collect(),
        }
    }

    pub fn submission_order(&self) -> Vec<&ModuleId> {
        self.modules.iter().map(|m| &m.module).collect()
    }

    pub fn status_of(&self, module: &ModuleId) -> Option<&ModuleStatus> {
        self.modules
            .iter()
            .find(|m| &m.module == module)
            .map(|m| &m.status)
    }

    pub fn count(&self, status: fn(&ModuleStatus) -> bool) -> usize {
        self.modules.iter().filter(|m| status(&m.status)).count()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildStatus {
    Success,
    Halted,
    Failed,
}

/// Result of one orchestrated run.
#[derive(Debug, Clone, Serialize)]
pub struct BuildSummary {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub degree_of_concurrency: usize,
    pub parallel: bool,
    pub status: BuildStatus,
    /// One entry per input segment, in input order.
    pub segments: Vec<SegmentReport>,
    pub elapsed: Duration,
    /// First failure recorded on the root result, if any.
    pub failure: Option<String>,
}

impl BuildSummary {
    pub fn is_success(&self) -> bool {
        self.status == BuildStatus::Success
    }

    /// Segments that were actually started.
    pub fn started_segments(&self) -> usize {
        self.segments
            .iter()
            .filter(|s| s.outcome != SegmentOutcome::Skipped)
            .count()
    }

    pub fn succeeded_modules(&self) -> usize {
        self.segments
            .iter()
            .map(|s| s.count(|st| matches!(st, ModuleStatus::Succeeded)))
            .sum()
    }

    pub fn failed_modules(&self) -> usize {
        self.segments
            .iter()
            .map(|s| s.count(|st| matches!(st, ModuleStatus::Failed { .. })))
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skipped_segment_marks_every_module_not_attempted() {
        let report = SegmentReport::not_attempted(
            TaskSegment::new(["test"]),
            SegmentOutcome::Skipped,
            vec![
                (ModuleId::new("g", "a"), "a".to_string()),
                (ModuleId::new("g", "b"), "b".to_string()),
            ],
        );
        assert_eq!(report.outcome, SegmentOutcome::Skipped);
        assert!(!report.outcome.proceeds());
        assert_eq!(report.count(|s| *s == ModuleStatus::NotAttempted), 2);
        assert_eq!(
            report.status_of(&ModuleId::new("g", "b")),
            Some(&ModuleStatus::NotAttempted)
        );
    }

    #[test]
    fn module_status_serializes_tagged() {
        let json = serde_json::to_value(ModuleStatus::Failed {
            error: "boom".to_string(),
        })
        .unwrap();
        assert_eq!(json, serde_json::json!({"status": "failed", "error": "boom"}));
    }
}
