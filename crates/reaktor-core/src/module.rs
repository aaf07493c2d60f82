use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Identity of one buildable module in the reactor: `group:artifact:version`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ModuleId {
    pub group: String,
    pub artifact: String,
    pub version: String,
}

impl ModuleId {
    pub fn new(group: &str, artifact: &str, version: &str) -> Self {
        Self {
            group: group.to_string(),
            artifact: artifact.to_string(),
            version: version.to_string(),
        }
    }

    /// Parse `"group:artifact:version"` into a module identity.
    pub fn parse(s: &str) -> Option<Self> {
        let parts: Vec<&str> = s.split(':').collect();
        if parts.len() == 3 && parts.iter().all(|p| !p.is_empty()) {
            Some(Self::new(parts[0], parts[1], parts[2]))
        } else {
            None
        }
    }

    /// `group:artifact` identifier (without version).
    pub fn key(&self) -> String {
        format!("{}:{}", self.group, self.artifact)
    }
}

impl std::fmt::Display for ModuleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}:{}", self.group, self.artifact, self.version)
    }
}

/// One buildable unit in a multi-module build.
///
/// Built once per invocation and read-only afterwards. `dependencies` holds
/// the declared inter-module dependencies in declaration order; references
/// to modules outside the reactor are ignored during graph construction.
#[derive(Debug, Clone)]
pub struct Module {
    pub id: ModuleId,
    pub dependencies: Vec<ModuleId>,
    pub base_dir: PathBuf,
}

impl Module {
    pub fn new(id: ModuleId, base_dir: impl Into<PathBuf>) -> Self {
        Self {
            id,
            dependencies: Vec::new(),
            base_dir: base_dir.into(),
        }
    }

    /// Add a declared dependency on another module, preserving declaration order.
    pub fn with_dependency(mut self, dep: ModuleId) -> Self {
        self.dependencies.push(dep);
        self
    }

    /// Returns `true` if this module directly depends on `other`.
    pub fn depends_on(&self, other: &ModuleId) -> bool {
        self.dependencies.contains(other)
    }
}
