use pbuild_core::{Module, ReactorContext, Session, TaskSegment};

/// Builds a single module for one task segment.
///
/// Invoked exactly once per submitted (module, segment), on a worker thread.
/// Implementations must be callable concurrently for different modules.
pub trait ModuleExecutor: Send + Sync {
    fn build_module(
        &self,
        module_session: &Session,
        root_session: &Session,
        reactor: &ReactorContext,
        module: &Module,
        segment: &TaskSegment,
    ) -> anyhow::Result<()>;
}

impl<F> ModuleExecutor for F
where
    F: Fn(&Module, &TaskSegment) -> anyhow::Result<()> + Send + Sync,
{
    fn build_module(
        &self,
        _module_session: &Session,
        _root_session: &Session,
        _reactor: &ReactorContext,
        module: &Module,
        segment: &TaskSegment,
    ) -> anyhow::Result<()> {
        self(module, segment)
    }
}
