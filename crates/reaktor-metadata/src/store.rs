//! In-memory store of merged metadata records with per-key locking.
//!
//! One registry mutex hands out the per-key entry; every read-modify-write
//! of a record then runs under that entry's own lock, so concurrent
//! resolutions of the same key cannot race while distinct keys never
//! contend. Fetching is never done under either lock; callers fetch first
//! and merge after, which the idempotent merge makes safe.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tracing::debug;

use crate::record::ArtifactMetadata;
use crate::source::MetadataError;

/// Identity of one metadata record: group, artifact, and optionally a
/// version for snapshot-level records.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MetadataKey {
    pub group: String,
    pub artifact: String,
    pub version: Option<String>,
}

impl MetadataKey {
    pub fn artifact_level(group: &str, artifact: &str) -> Self {
        Self {
            group: group.to_string(),
            artifact: artifact.to_string(),
            version: None,
        }
    }

    pub fn version_level(group: &str, artifact: &str, version: &str) -> Self {
        Self {
            group: group.to_string(),
            artifact: artifact.to_string(),
            version: Some(version.to_string()),
        }
    }
}

impl std::fmt::Display for MetadataKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.version {
            Some(v) => write!(f, "{}:{}:{}", self.group, self.artifact, v),
            None => write!(f, "{}:{}", self.group, self.artifact),
        }
    }
}

/// Merged metadata records for all artifacts seen this run.
#[derive(Default)]
pub struct MetadataStore {
    entries: Mutex<HashMap<MetadataKey, Arc<Mutex<ArtifactMetadata>>>>,
}

impl MetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn entry(&self, key: &MetadataKey) -> Arc<Mutex<ArtifactMetadata>> {
        let mut entries = self.entries.lock().expect("metadata registry poisoned");
        entries
            .entry(key.clone())
            .or_insert_with(|| {
                Arc::new(Mutex::new(ArtifactMetadata::new(&key.group, &key.artifact)))
            })
            .clone()
    }

    /// Merge `incoming` into the record for `key` inside that key's
    /// critical section. Returns the merged record and whether it changed.
    ///
    /// The incoming record is normalized first: meta-version markers are
    /// never persisted as concrete versions.
    pub fn merge_with(
        &self,
        key: &MetadataKey,
        incoming: &ArtifactMetadata,
    ) -> (ArtifactMetadata, bool) {
        let mut normalized = incoming.clone();
        normalized.normalize();

        let entry = self.entry(key);
        let mut record = entry.lock().expect("metadata entry poisoned");
        let changed = record.merge(&normalized);
        if changed {
            debug!(key = %key, "metadata record updated");
        }
        (record.clone(), changed)
    }

    /// Snapshot of the record for `key`, if any.
    pub fn get(&self, key: &MetadataKey) -> Option<ArtifactMetadata> {
        let entries = self.entries.lock().expect("metadata registry poisoned");
        let entry = entries.get(key)?.clone();
        drop(entries);
        let snapshot = entry.lock().expect("metadata entry poisoned").clone();
        Some(snapshot)
    }

    /// Return the merged record for `key`, fetching it through `fetch` on
    /// first use. The fetch runs outside every lock; concurrent callers
    /// may both fetch, but the idempotent merge keeps the outcome single.
    pub fn get_or_fetch<F>(
        &self,
        key: &MetadataKey,
        fetch: F,
    ) -> Result<ArtifactMetadata, MetadataError>
    where
        F: FnOnce() -> Result<ArtifactMetadata, MetadataError>,
    {
        if let Some(existing) = self.get(key) {
            if !existing.versions.is_empty()
                || existing.release.is_some()
                || existing.latest.is_some()
                || existing.snapshot.is_some()
            {
                return Ok(existing);
            }
        }
        let fetched = fetch()?;
        let (merged, _) = self.merge_with(key, &fetched);
        Ok(merged)
    }

    /// Number of distinct keys tracked.
    pub fn len(&self) -> usize {
        self.entries.lock().expect("metadata registry poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
