//! JSON build plan: the reactor's modules, its task segments and the command
//! run for each (module, segment).

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use pbuild_core::{Module, ModuleId, ProjectBuild, ProjectBuildList, Session, TaskSegment};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanModule {
    #[serde(flatten)]
    pub module: Module,
    /// Working directory for the module's command, relative to the root.
    #[serde(default)]
    pub dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlanSegment {
    #[serde(flatten)]
    pub segment: TaskSegment,
    /// Restrict the segment to these `groupId:artifactId` keys.
    #[serde(default)]
    pub modules: Option<Vec<String>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BuildPlan {
    pub modules: Vec<PlanModule>,
    pub segments: Vec<PlanSegment>,
    /// Program and arguments run once per (module, segment).
    #[serde(default)]
    pub command: Vec<String>,
}

impl BuildPlan {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read plan {}", path.display()))?;
        let plan: BuildPlan = serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse plan {}", path.display()))?;
        plan.validate()?;
        Ok(plan)
    }

    fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for m in &self.modules {
            if !seen.insert(m.module.key()) {
                bail!("module {} is listed twice", m.module.key());
            }
        }
        for seg in &self.segments {
            for key in seg.modules.iter().flatten() {
                let id = ModuleId::parse(key)
                    .with_context(|| format!("'{}' is not a groupId:artifactId key", key))?;
                if !seen.contains(&id.key()) {
                    bail!("segment [{}] names unknown module {}", seg.segment, key);
                }
            }
        }
        Ok(())
    }

    pub fn task_segments(&self) -> Vec<TaskSegment> {
        self.segments.iter().map(|s| s.segment.clone()).collect()
    }

    /// Working directory per module key, resolved against `root`.
    pub fn module_dirs(&self, root: &Path) -> HashMap<String, PathBuf> {
        self.modules
            .iter()
            .map(|m| {
                let dir = m
                    .dir
                    .as_ref()
                    .map(|d| root.join(d))
                    .unwrap_or_else(|| root.to_path_buf());
                (m.module.key(), dir)
            })
            .collect()
    }

    /// One project build per (module, segment), honouring segment
    /// restrictions. Every module's session is forked from `root` once and
    /// reused across segments.
    pub fn project_builds(&self, root: &Arc<Session>) -> ProjectBuildList {
        let sessions: HashMap<String, Arc<Session>> = self
            .modules
            .iter()
            .map(|m| (m.module.key(), root.fork(m.module.key())))
            .collect();

        let mut builds = ProjectBuildList::default();
        for (index, seg) in self.segments.iter().enumerate() {
            let allowed: Option<HashSet<&str>> = seg
                .modules
                .as_ref()
                .map(|keys| keys.iter().map(String::as_str).collect());
            for m in &self.modules {
                let key = m.module.key();
                if allowed.as_ref().is_some_and(|a| !a.contains(key.as_str())) {
                    continue;
                }
                let session = Arc::clone(&sessions[&key]);
                builds.push(ProjectBuild::new(
                    m.module.clone(),
                    index,
                    seg.segment.clone(),
                    session,
                ));
            }
        }
        builds
    }
}
