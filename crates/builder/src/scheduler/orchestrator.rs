use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use pbuild_core::{
    BuildError, BuilderConfig, ProjectBuildList, ReactorContext, Session, TaskSegment,
};
use tracing::{error, info};
use uuid::Uuid;

use crate::executor::ModuleExecutor;
use crate::pool::{degree_of_concurrency, WorkerPool};
use crate::priority::PriorityConfig;

use super::report::{BuildStatus, BuildSummary, SegmentOutcome, SegmentReport};
use super::segment::{segment_labels, submission_order, SegmentScheduler};

/// Drives a whole run: one pool, every segment in order, stop on the first
/// failure or halt.
pub struct BuildOrchestrator {
    executor: Arc<dyn ModuleExecutor>,
    config: BuilderConfig,
}

impl BuildOrchestrator {
    pub fn new(executor: Arc<dyn ModuleExecutor>, config: BuilderConfig) -> Self {
        Self { executor, config }
    }

    pub fn config(&self) -> &BuilderConfig {
        &self.config
    }

    /// Build `segments` in order.
    ///
    /// Module failures, and a pool that cannot start, are recorded on
    /// `root_session.result()` and reflected in the summary; they do not make
    /// this return `Err`. Only an interrupted wait does. In every case the
    /// pool is shut down and all in-flight module builds have finished before
    /// returning.
    pub fn build(
        &self,
        root_session: &Arc<Session>,
        reactor: &Arc<ReactorContext>,
        builds: &ProjectBuildList,
        segments: &[TaskSegment],
        priority: &PriorityConfig,
    ) -> Result<BuildSummary, BuildError> {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let start = Instant::now();

        let total_modules = builds.modules().len();
        let threads = degree_of_concurrency(self.config.threads, total_modules);
        info!(
            "Parallel builder will use {} threads to build {} modules",
            threads, total_modules
        );

        // Informational for executors; the scheduler does not read it.
        let parallel = threads > 1;
        root_session.set_parallel(parallel);
        for build in builds {
            build.session.set_parallel(parallel);
        }

        let (status, reports) = match WorkerPool::new(threads) {
            Ok(pool) => {
                let pool = pool
                    .with_harvest_poll(self.config.harvest_poll())
                    .with_interrupt(reactor.interrupt_signal().clone());
                let result =
                    self.run_segments(&pool, root_session, reactor, builds, segments, priority);
                pool.shutdown();
                result?
            }
            Err(error) => pool_failed(error, root_session, builds, segments, priority),
        };

        let summary = BuildSummary {
            run_id,
            started_at,
            degree_of_concurrency: threads,
            parallel,
            status,
            segments: reports,
            elapsed: start.elapsed(),
            failure: root_session.result().first_failure(),
        };
        info!(
            run_id = %run_id,
            status = ?summary.status,
            segments = summary.started_segments(),
            elapsed_ms = summary.elapsed.as_millis() as u64,
            "build finished"
        );
        Ok(summary)
    }

    fn run_segments(
        &self,
        pool: &WorkerPool,
        root_session: &Arc<Session>,
        reactor: &Arc<ReactorContext>,
        builds: &ProjectBuildList,
        segments: &[TaskSegment],
        priority: &PriorityConfig,
    ) -> Result<(BuildStatus, Vec<SegmentReport>), BuildError> {
        let scheduler = SegmentScheduler::new(&self.executor, pool);
        let mut status = BuildStatus::Success;
        let mut reports = Vec::with_capacity(segments.len());

        for (index, segment) in segments.iter().enumerate() {
            if status == BuildStatus::Success && reactor.build_status().is_halted() {
                info!("Halt requested before segment [{}], stopping", segment);
                status = BuildStatus::Halted;
            }
            if status != BuildStatus::Success {
                reports.push(not_attempted(
                    index,
                    segment,
                    builds,
                    priority,
                    SegmentOutcome::Skipped,
                ));
                continue;
            }

            match scheduler.run(index, segment, builds, priority, root_session, reactor) {
                Ok(report) => {
                    if !report.outcome.proceeds() {
                        status = if report.outcome == SegmentOutcome::Halted {
                            BuildStatus::Halted
                        } else {
                            BuildStatus::Failed
                        };
                    }
                    reports.push(report);
                }
                Err(BuildError::Interrupted) => return Err(BuildError::Interrupted),
                Err(error) => {
                    root_session.result().add_exception(error);
                    status = BuildStatus::Failed;
                    reports.push(not_attempted(
                        index,
                        segment,
                        builds,
                        priority,
                        SegmentOutcome::Failed,
                    ));
                }
            }
        }

        Ok((status, reports))
    }
}

/// Status and reports for a run whose pool never started: the error is
/// recorded and every segment is skipped.
pub(super) fn pool_failed(
    error: BuildError,
    root_session: &Session,
    builds: &ProjectBuildList,
    segments: &[TaskSegment],
    priority: &PriorityConfig,
) -> (BuildStatus, Vec<SegmentReport>) {
    error!("{}", error);
    root_session.result().add_exception(error);
    let reports = segments
        .iter()
        .enumerate()
        .map(|(index, segment)| {
            not_attempted(index, segment, builds, priority, SegmentOutcome::Skipped)
        })
        .collect();
    (BuildStatus::Failed, reports)
}

fn not_attempted(
    segment_index: usize,
    segment: &TaskSegment,
    builds: &ProjectBuildList,
    priority: &PriorityConfig,
    outcome: SegmentOutcome,
) -> SegmentReport {
    let mut labels = segment_labels(segment_index, builds);
    let modules = submission_order(segment_index, builds, priority)
        .into_iter()
        .map(|b| {
            let label = labels
                .remove(&b.module.key())
                .unwrap_or_else(|| b.module.short_name().to_string());
            (b.module.id().clone(), label)
        })
        .collect();
    SegmentReport::not_attempted(segment.clone(), outcome, modules)
}
