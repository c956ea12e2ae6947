use std::fmt;

use serde::{Deserialize, Serialize};

/// Stable identity of a buildable module: `groupId:artifactId`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleId {
    pub group_id: String,
    pub artifact_id: String,
}

impl ModuleId {
    pub fn new(group_id: impl Into<String>, artifact_id: impl Into<String>) -> Self {
        Self {
            group_id: group_id.into(),
            artifact_id: artifact_id.into(),
        }
    }

    /// Parse a `group:artifact` key. Both halves must be non-empty.
    pub fn parse(key: &str) -> Option<Self> {
        let (group, artifact) = key.split_once(':')?;
        if group.is_empty() || artifact.is_empty() || artifact.contains(':') {
            return None;
        }
        Some(Self::new(group, artifact))
    }

    /// Fully-qualified key, unique within a reactor.
    pub fn key(&self) -> String {
        format!("{}:{}", self.group_id, self.artifact_id)
    }
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.group_id, self.artifact_id)
    }
}

/// One buildable unit of the reactor.
///
/// Immutable for the duration of a build run. Equality and hashing only look
/// at the [`ModuleId`], so two handles to the same coordinates are the same
/// module regardless of version.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Module {
    #[serde(flatten)]
    pub id: ModuleId,
    /// Informational only; not part of the identity.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

impl Module {
    pub fn new(group_id: impl Into<String>, artifact_id: impl Into<String>) -> Self {
        Self {
            id: ModuleId::new(group_id, artifact_id),
            version: None,
        }
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn id(&self) -> &ModuleId {
        &self.id
    }

    /// `groupId:artifactId`.
    pub fn key(&self) -> String {
        self.id.key()
    }

    /// Display name; not guaranteed unique within a segment.
    pub fn short_name(&self) -> &str {
        &self.id.artifact_id
    }
}

impl PartialEq for Module {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Module {}

impl std::hash::Hash for Module {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.version {
            Some(v) => write!(f, "{}:{}", self.id, v),
            None => write!(f, "{}", self.id),
        }
    }
}

/// Ordered task descriptors run per module, e.g. `["compile", "test"]`.
///
/// Opaque to the scheduler beyond being handed to the module executor.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskSegment {
    pub tasks: Vec<String>,
    /// Aggregating segments run goals that span the whole reactor.
    #[serde(default)]
    pub aggregating: bool,
}

impl TaskSegment {
    pub fn new<I, S>(tasks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            tasks: tasks.into_iter().map(Into::into).collect(),
            aggregating: false,
        }
    }

    pub fn aggregating(mut self) -> Self {
        self.aggregating = true;
        self
    }
}

impl fmt::Display for TaskSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.tasks.join(" "))?;
        if self.aggregating {
            write!(f, " (aggregating)")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn module_key_and_short_name() {
        let m = Module::new("com.acme", "core").with_version("1.0");
        assert_eq!(m.key(), "com.acme:core");
        assert_eq!(m.short_name(), "core");
        assert_eq!(m.to_string(), "com.acme:core:1.0");
    }

    #[test]
    fn module_identity_ignores_version() {
        let a = Module::new("g", "a").with_version("1");
        let b = Module::new("g", "a").with_version("2");
        assert_eq!(a, b);
    }

    #[test]
    fn parse_module_id() {
        assert_eq!(ModuleId::parse("g:a"), Some(ModuleId::new("g", "a")));
        assert_eq!(ModuleId::parse("g"), None);
        assert_eq!(ModuleId::parse(":a"), None);
        assert_eq!(ModuleId::parse("g:"), None);
        assert_eq!(ModuleId::parse("g:a:1"), None);
    }

    #[test]
    fn module_deserializes_flattened_coordinates() {
        let m: Module =
            serde_json::from_str(r#"{"groupId":"x","artifactId":"foo","version":"2"}"#).unwrap();
        assert_eq!(m.key(), "x:foo");
        assert_eq!(m.version.as_deref(), Some("2"));
    }

    #[test]
    fn segment_display() {
        let s = TaskSegment::new(["clean", "install"]);
        assert_eq!(s.to_string(), "clean install");
        assert_eq!(TaskSegment::new(["site"]).aggregating().to_string(), "site (aggregating)");
    }
}
