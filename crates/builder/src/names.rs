//! Per-worker diagnostic labels.
//!
//! A worker thread carries the label of the module it is currently building.
//! Short names are used unless two modules of the segment share one, in which
//! case both fall back to the fully-qualified `group:artifact` key.

use std::cell::RefCell;
use std::collections::HashSet;

use pbuild_core::Module;

thread_local! {
    static THREAD_LABEL: RefCell<Option<String>> = const { RefCell::new(None) };
}

/// Short names carried by two or more of `modules`.
pub fn duplicate_short_names<'a, I>(modules: I) -> HashSet<String>
where
    I: IntoIterator<Item = &'a Module>,
{
    let mut seen = HashSet::new();
    let mut duplicates = HashSet::new();
    for module in modules {
        if !seen.insert(module.short_name()) {
            duplicates.insert(module.short_name().to_string());
        }
    }
    duplicates
}

/// Label a worker uses while building `module`.
pub fn thread_label(module: &Module, duplicates: &HashSet<String>) -> String {
    if duplicates.contains(module.short_name()) {
        module.key()
    } else {
        module.short_name().to_string()
    }
}

/// Label of the calling thread: the active module label if one is set,
/// otherwise the OS thread name.
pub fn current_thread_label() -> Option<String> {
    THREAD_LABEL
        .with(|cell| cell.borrow().clone())
        .or_else(|| std::thread::current().name().map(str::to_string))
}

/// Sets the thread label for its lifetime and restores the previous one on
/// drop, unwinding included.
#[must_use = "the label is restored as soon as the guard is dropped"]
pub struct LabelGuard {
    previous: Option<String>,
}

impl LabelGuard {
    pub fn set(label: impl Into<String>) -> Self {
        let label = label.into();
        let previous = THREAD_LABEL.with(|cell| cell.replace(Some(label)));
        Self { previous }
    }
}

impl Drop for LabelGuard {
    fn drop(&mut self) {
        let previous = self.previous.take();
        THREAD_LABEL.with(|cell| {
            *cell.borrow_mut() = previous;
        });
    }
}
