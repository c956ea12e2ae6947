use std::collections::HashMap;
use std::sync::Arc;

use crate::module::{Module, TaskSegment};
use crate::session::Session;

/// A module paired with its segment-scoped session.
///
/// Created by the upstream planner; exactly one per (module, segment).
/// Segments are identified by their position in the run, so two segments
/// with the same tasks stay distinct.
#[derive(Debug, Clone)]
pub struct ProjectBuild {
    pub module: Module,
    /// Position of `segment` in the run's segment list.
    pub segment_index: usize,
    pub segment: TaskSegment,
    pub session: Arc<Session>,
}

impl ProjectBuild {
    pub fn new(
        module: Module,
        segment_index: usize,
        segment: TaskSegment,
        session: Arc<Session>,
    ) -> Self {
        Self {
            module,
            segment_index,
            segment,
            session,
        }
    }
}

/// Every [`ProjectBuild`] of a run, in planner order.
#[derive(Debug, Clone, Default)]
pub struct ProjectBuildList {
    builds: Vec<ProjectBuild>,
}

impl ProjectBuildList {
    pub fn new(builds: Vec<ProjectBuild>) -> Self {
        Self { builds }
    }

    /// One build per module per segment, each with a session forked from
    /// `root`.
    pub fn plan(root: &Session, modules: &[Module], segments: &[TaskSegment]) -> Self {
        let builds = segments
            .iter()
            .enumerate()
            .flat_map(|(index, segment)| {
                modules.iter().map(move |module| {
                    ProjectBuild::new(
                        module.clone(),
                        index,
                        segment.clone(),
                        root.fork(module.key()),
                    )
                })
            })
            .collect();
        Self { builds }
    }

    pub fn push(&mut self, build: ProjectBuild) {
        self.builds.push(build);
    }

    pub fn iter(&self) -> impl Iterator<Item = &ProjectBuild> {
        self.builds.iter()
    }

    pub fn len(&self) -> usize {
        self.builds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.builds.is_empty()
    }

    /// Builds of the segment at `segment_index`, in planner order.
    pub fn by_task_segment(&self, segment_index: usize) -> Vec<&ProjectBuild> {
        self.builds
            .iter()
            .filter(|b| b.segment_index == segment_index)
            .collect()
    }

    /// Module → build map for the segment at `segment_index`. A module planned
    /// twice maps to its last build.
    pub fn select_segment(&self, segment_index: usize) -> HashMap<&Module, &ProjectBuild> {
        self.by_task_segment(segment_index)
            .into_iter()
            .map(|b| (&b.module, b))
            .collect()
    }

    /// Distinct modules across all segments, first occurrence order.
    pub fn modules(&self) -> Vec<&Module> {
        let mut seen = std::collections::HashSet::new();
        self.builds
            .iter()
            .map(|b| &b.module)
            .filter(|m| seen.insert(*m))
            .collect()
    }
}

impl<'a> IntoIterator for &'a ProjectBuildList {
    type Item = &'a ProjectBuild;
    type IntoIter = std::slice::Iter<'a, ProjectBuild>;

    fn into_iter(self) -> Self::IntoIter {
        self.builds.iter()
    }
}
