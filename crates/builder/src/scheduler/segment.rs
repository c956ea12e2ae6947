use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use pbuild_core::{BuildError, ProjectBuild, ProjectBuildList, ReactorContext, Session, TaskSegment};
use tracing::{debug, info, info_span, warn};

use crate::executor::ModuleExecutor;
use crate::names::{duplicate_short_names, thread_label, LabelGuard};
use crate::pool::{TaskOutcome, WorkerPool};
use crate::priority::PriorityConfig;

use super::report::{ModuleReport, ModuleStatus, SegmentOutcome, SegmentReport};

/// Runs every module of one task segment on the shared pool.
pub struct SegmentScheduler<'a> {
    executor: &'a Arc<dyn ModuleExecutor>,
    pool: &'a WorkerPool,
}

impl<'a> SegmentScheduler<'a> {
    pub fn new(executor: &'a Arc<dyn ModuleExecutor>, pool: &'a WorkerPool) -> Self {
        Self { executor, pool }
    }

    /// Submit the segment's modules in priority order and harvest them in
    /// completion order.
    ///
    /// Stops harvesting at the first failure (recorded on the root session's
    /// result) or as soon as the halt signal is seen after a harvest. Units
    /// still running at that point are left to finish on the pool.
    ///
    /// `segment_index` is the segment's position in the run; `segment` is
    /// only used for reporting.
    ///
    /// Returns `Err` only for problems of the scheduler itself: a module
    /// planned twice for this segment, or an interrupted wait.
    pub fn run(
        &self,
        segment_index: usize,
        segment: &TaskSegment,
        builds: &ProjectBuildList,
        priority: &PriorityConfig,
        root_session: &Arc<Session>,
        reactor: &Arc<ReactorContext>,
    ) -> Result<SegmentReport, BuildError> {
        let mut projects = builds.by_task_segment(segment_index);
        ensure_unique(&projects, builds, segment_index, segment)?;

        let duplicates = duplicate_short_names(projects.iter().map(|b| &b.module));
        priority.sort(&mut projects, |b| &b.module);

        let mut service = self.pool.completion_service::<anyhow::Result<()>>();
        let mut modules = Vec::with_capacity(projects.len());
        let mut submitted_at = Vec::with_capacity(projects.len());

        for build in projects {
            debug!("Scheduling: {}", build.module);
            let label = thread_label(&build.module, &duplicates);
            modules.push(ModuleReport {
                module: build.module.id().clone(),
                label: label.clone(),
                status: ModuleStatus::Unharvested,
                elapsed: None,
            });
            submitted_at.push(Instant::now());
            service.submit(self.unit_of_work(build, label, root_session, reactor));
        }

        let mut outcome = SegmentOutcome::Success;
        while let Some(done) = service.take()? {
            let idx = done.handle.index();
            let report = &mut modules[idx];
            report.elapsed = Some(submitted_at[idx].elapsed());

            let failure = match done.outcome {
                TaskOutcome::Finished(Ok(())) => {
                    report.status = ModuleStatus::Succeeded;
                    None
                }
                TaskOutcome::Finished(Err(source)) => Some(BuildError::ModuleBuild {
                    module: report.module.clone(),
                    source,
                }),
                TaskOutcome::Panicked(message) => Some(BuildError::ModulePanicked {
                    module: report.module.clone(),
                    message,
                }),
            };

            if let Some(error) = failure {
                report.status = ModuleStatus::Failed {
                    error: error.to_string(),
                };
                root_session.result().add_exception(error);
                outcome = SegmentOutcome::Failed;
                break;
            }

            if reactor.build_status().is_halted() {
                outcome = SegmentOutcome::Halted;
                break;
            }
        }

        let unharvested = service.pending();
        if unharvested > 0 {
            warn!(
                "Segment [{}] stopped with {} module builds still running",
                segment, unharvested
            );
        }
        info!(segment = %segment, outcome = ?outcome, modules = modules.len(), "segment finished");

        Ok(SegmentReport {
            segment: segment.clone(),
            outcome,
            modules,
        })
    }

    /// The closure a worker runs for one module: label the thread, enter a
    /// span, call the executor.
    fn unit_of_work(
        &self,
        build: &ProjectBuild,
        label: String,
        root_session: &Arc<Session>,
        reactor: &Arc<ReactorContext>,
    ) -> impl FnOnce() -> anyhow::Result<()> + Send + 'static {
        let executor = Arc::clone(self.executor);
        let module_session = Arc::clone(&build.session);
        let root_session = Arc::clone(root_session);
        let reactor = Arc::clone(reactor);
        let module = build.module.clone();
        let segment = build.segment.clone();

        move || {
            let span = info_span!("module", label = %label);
            let _span = span.enter();
            let _label = LabelGuard::set(label);
            executor.build_module(&module_session, &root_session, &reactor, &module, &segment)
        }
    }
}

fn ensure_unique(
    projects: &[&ProjectBuild],
    builds: &ProjectBuildList,
    segment_index: usize,
    segment: &TaskSegment,
) -> Result<(), BuildError> {
    let by_module = builds.select_segment(segment_index);
    if by_module.len() == projects.len() {
        return Ok(());
    }
    // A module planned twice maps to its last build; its first one differs.
    match projects
        .iter()
        .find(|b| !std::ptr::eq(by_module[&b.module], **b))
    {
        Some(build) => Err(BuildError::DuplicateProjectBuild {
            module: build.module.id().clone(),
            segment: segment.to_string(),
        }),
        None => Ok(()),
    }
}

/// Submission order the scheduler would use for the segment at
/// `segment_index`, without running.
pub fn submission_order<'b>(
    segment_index: usize,
    builds: &'b ProjectBuildList,
    priority: &PriorityConfig,
) -> Vec<&'b ProjectBuild> {
    let mut projects = builds.by_task_segment(segment_index);
    priority.sort(&mut projects, |b| &b.module);
    projects
}

/// Labels the scheduler would assign to the segment's modules.
pub fn segment_labels(segment_index: usize, builds: &ProjectBuildList) -> HashMap<String, String> {
    let projects = builds.by_task_segment(segment_index);
    let duplicates = duplicate_short_names(projects.iter().map(|b| &b.module));
    projects
        .iter()
        .map(|b| (b.module.key(), thread_label(&b.module, &duplicates)))
        .collect()
}
