use std::collections::HashMap;
use std::path::PathBuf;
use std::process::{Command, Stdio};

use anyhow::{bail, Context, Result};
use pbuild_builder::ModuleExecutor;
use pbuild_core::{Module, ReactorContext, Session, TaskSegment};
use tracing::{debug, warn};

/// Runs an external command once per (module, segment).
///
/// The module and tasks are passed through the environment:
/// `PBUILD_MODULE`, `PBUILD_GROUP_ID`, `PBUILD_ARTIFACT_ID`, `PBUILD_TASKS`
/// (space separated) and `PBUILD_AGGREGATING`.
pub struct CommandExecutor {
    program: String,
    args: Vec<String>,
    dirs: HashMap<String, PathBuf>,
    default_dir: PathBuf,
    fail_fast_halt: bool,
}

impl CommandExecutor {
    pub fn new(
        command: &[String],
        dirs: HashMap<String, PathBuf>,
        default_dir: PathBuf,
    ) -> Result<Self> {
        let Some((program, args)) = command.split_first() else {
            bail!("build plan has an empty command");
        };
        Ok(Self {
            program: program.clone(),
            args: args.to_vec(),
            dirs,
            default_dir,
            fail_fast_halt: false,
        })
    }

    pub fn with_fail_fast_halt(mut self, enabled: bool) -> Self {
        self.fail_fast_halt = enabled;
        self
    }

    fn run(&self, module: &Module, segment: &TaskSegment) -> Result<()> {
        let dir = self.dirs.get(&module.key()).unwrap_or(&self.default_dir);
        debug!(dir = %dir.display(), "running {} for [{}]", self.program, segment);

        let output = Command::new(&self.program)
            .args(&self.args)
            .current_dir(dir)
            .env("PBUILD_MODULE", module.key())
            .env("PBUILD_GROUP_ID", &module.id().group_id)
            .env("PBUILD_ARTIFACT_ID", &module.id().artifact_id)
            .env("PBUILD_TASKS", segment.tasks.join(" "))
            .env("PBUILD_AGGREGATING", segment.aggregating.to_string())
            .stdin(Stdio::null())
            .output()
            .with_context(|| format!("failed to spawn {}", self.program))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let tail = stderr.lines().last().unwrap_or("").trim();
            match output.status.code() {
                Some(code) if tail.is_empty() => {
                    bail!("{} exited with status {}", self.program, code)
                }
                Some(code) => {
                    bail!("{} exited with status {}: {}", self.program, code, tail)
                }
                None => bail!("{} was terminated by a signal", self.program),
            }
        }
        Ok(())
    }
}

impl ModuleExecutor for CommandExecutor {
    fn build_module(
        &self,
        _module_session: &Session,
        _root_session: &Session,
        reactor: &ReactorContext,
        module: &Module,
        segment: &TaskSegment,
    ) -> anyhow::Result<()> {
        let result = self.run(module, segment);
        if result.is_err() && self.fail_fast_halt {
            warn!("Halting reactor after failure of {}", module);
            reactor.build_status().halt();
        }
        result
    }
}
