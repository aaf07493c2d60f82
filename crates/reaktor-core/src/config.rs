use serde::{Deserialize, Serialize};

use reaktor_util::errors::ReaktorError;

/// Conflict-resolution rule applied when two versions of one artifact meet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConflictMode {
    Nearest,
    Newest,
}

impl Default for ConflictMode {
    fn default() -> Self {
        Self::Nearest
    }
}

/// What to do with the rest of the reactor when one module fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailureMode {
    /// Stop dispatching new modules as soon as one fails.
    FailFast,
    /// Skip the failed module's dependents, build everything else, report at the end.
    FailAtEnd,
    /// Treat the failed module as finished so its dependents still build.
    FailNever,
}

impl Default for FailureMode {
    fn default() -> Self {
        Self::FailFast
    }
}

/// Orchestration settings from `[orchestration]` in the config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestrationConfig {
    /// Number of concurrent build workers.
    #[serde(default = "default_jobs")]
    pub jobs: usize,

    #[serde(default, rename = "conflict-policy")]
    pub conflict_policy: ConflictMode,

    #[serde(default, rename = "failure-policy")]
    pub failure_policy: FailureMode,

    /// Hard cap on resolution-tree depth.
    #[serde(default = "default_max_depth", rename = "max-resolution-depth")]
    pub max_resolution_depth: usize,
}

impl Default for OrchestrationConfig {
    fn default() -> Self {
        Self {
            jobs: default_jobs(),
            conflict_policy: ConflictMode::default(),
            failure_policy: FailureMode::default(),
            max_resolution_depth: default_max_depth(),
        }
    }
}

fn default_jobs() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

fn default_max_depth() -> usize {
    64
}

/// Top-level configuration document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub orchestration: OrchestrationConfig,
}

impl Config {
    /// Parse a configuration document from TOML text.
    pub fn parse_toml(content: &str) -> miette::Result<Self> {
        toml::from_str(content).map_err(|e| {
            ReaktorError::Config {
                message: format!("Failed to parse config: {e}"),
            }
            .into()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = Config::default();
        assert!(config.orchestration.jobs >= 1);
        assert_eq!(config.orchestration.conflict_policy, ConflictMode::Nearest);
        assert_eq!(config.orchestration.failure_policy, FailureMode::FailFast);
        assert_eq!(config.orchestration.max_resolution_depth, 64);
    }

    #[test]
    fn parse_full() {
        let config = Config::parse_toml(
            r#"
[orchestration]
jobs = 6
conflict-policy = "newest"
failure-policy = "fail-at-end"
max-resolution-depth = 32
"#,
        )
        .unwrap();
        assert_eq!(config.orchestration.jobs, 6);
        assert_eq!(config.orchestration.conflict_policy, ConflictMode::Newest);
        assert_eq!(config.orchestration.failure_policy, FailureMode::FailAtEnd);
        assert_eq!(config.orchestration.max_resolution_depth, 32);
    }

    #[test]
    fn parse_empty_uses_defaults() {
        let config = Config::parse_toml("").unwrap();
        assert_eq!(config.orchestration.conflict_policy, ConflictMode::Nearest);
    }

    #[test]
    fn parse_rejects_unknown_policy() {
        assert!(Config::parse_toml(
            r#"
[orchestration]
conflict-policy = "closest"
"#,
        )
        .is_err());
    }
}
