//! The per-artifact metadata record and its merge rules.

use serde::{Deserialize, Serialize};
use tracing::trace;

/// Meta-version markers that must never be persisted as concrete versions.
pub const LATEST_VERSION: &str = "LATEST";
pub const RELEASE_VERSION: &str = "RELEASE";

/// Timestamped snapshot state for one artifact version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotInfo {
    /// `yyyyMMdd.HHmmss` UTC timestamp; the format sorts lexicographically.
    pub timestamp: String,
    #[serde(rename = "build-number")]
    pub build_number: u32,
}

impl SnapshotInfo {
    pub fn new(timestamp: &str, build_number: u32) -> Self {
        Self {
            timestamp: timestamp.to_string(),
            build_number,
        }
    }

    /// `true` if `self` supersedes `other`: strictly newer timestamp, or
    /// the same timestamp with a higher build number.
    pub fn supersedes(&self, other: &SnapshotInfo) -> bool {
        match self.timestamp.cmp(&other.timestamp) {
            std::cmp::Ordering::Greater => true,
            std::cmp::Ordering::Equal => self.build_number > other.build_number,
            std::cmp::Ordering::Less => false,
        }
    }
}

/// Everything the repository layer knows about one artifact, keyed by
/// (group, artifact) or (group, artifact, version) for snapshot records.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactMetadata {
    pub group: String,
    pub artifact: String,
    #[serde(default)]
    pub version: Option<String>,
    /// Known versions in discovery order.
    #[serde(default)]
    pub versions: Vec<String>,
    #[serde(default)]
    pub latest: Option<String>,
    #[serde(default)]
    pub release: Option<String>,
    #[serde(default)]
    pub snapshot: Option<SnapshotInfo>,
    #[serde(default, rename = "last-updated")]
    pub last_updated: Option<String>,
}

impl ArtifactMetadata {
    pub fn new(group: &str, artifact: &str) -> Self {
        Self {
            group: group.to_string(),
            artifact: artifact.to_string(),
            ..Self::default()
        }
    }

    pub fn with_versions(mut self, versions: &[&str]) -> Self {
        self.versions = versions.iter().map(|v| v.to_string()).collect();
        self
    }

    pub fn with_release(mut self, release: &str) -> Self {
        self.release = Some(release.to_string());
        self
    }

    pub fn with_latest(mut self, latest: &str) -> Self {
        self.latest = Some(latest.to_string());
        self
    }

    pub fn with_snapshot(mut self, timestamp: &str, build_number: u32) -> Self {
        self.snapshot = Some(SnapshotInfo::new(timestamp, build_number));
        self
    }

    /// Field-level reconciliation with `incoming`. Returns `true` if
    /// anything changed.
    ///
    /// Known versions are unioned with existing order preserved and new
    /// entries appended; the release/latest pointers take the incoming
    /// value when present; the snapshot sub-record is replaced wholesale
    /// only when the incoming one supersedes it. Merging a record with
    /// itself is a no-op, and `merge(merge(a, b), b)` equals `merge(a, b)`.
    pub fn merge(&mut self, incoming: &ArtifactMetadata) -> bool {
        let mut changed = false;

        for version in &incoming.versions {
            if !self.versions.contains(version) {
                self.versions.push(version.clone());
                changed = true;
            }
        }

        if incoming.release.is_some() && incoming.release != self.release {
            self.release = incoming.release.clone();
            changed = true;
        }
        if incoming.latest.is_some() && incoming.latest != self.latest {
            self.latest = incoming.latest.clone();
            changed = true;
        }

        match (&self.snapshot, &incoming.snapshot) {
            (Some(existing), Some(candidate)) => {
                if candidate.supersedes(existing) {
                    self.snapshot = incoming.snapshot.clone();
                    changed = true;
                }
            }
            (None, Some(_)) => {
                self.snapshot = incoming.snapshot.clone();
                changed = true;
            }
            _ => {}
        }

        if incoming.last_updated.is_some() && incoming.last_updated > self.last_updated {
            self.last_updated = incoming.last_updated.clone();
            changed = true;
        }

        if changed {
            trace!(
                artifact = %format!("{}:{}", self.group, self.artifact),
                versions = self.versions.len(),
                "metadata merged"
            );
        }
        changed
    }

    /// Strip meta-version markers so they are never persisted as concrete
    /// versions.
    pub fn normalize(&mut self) {
        if matches!(self.version.as_deref(), Some(LATEST_VERSION) | Some(RELEASE_VERSION)) {
            self.version = None;
        }
        self.versions
            .retain(|v| v != LATEST_VERSION && v != RELEASE_VERSION);
    }

    /// `true` if `version` is one of the meta-version markers.
    pub fn is_meta_version(version: &str) -> bool {
        version == LATEST_VERSION || version == RELEASE_VERSION
    }
}
