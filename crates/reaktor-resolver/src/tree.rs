//! Resolution-tree expansion and flattening.
//!
//! Dependencies expand into an arena of nodes: children are owned by index
//! and the parent link is a plain back-reference, so no node ever shares
//! mutable state with another. Conflict mediation fires the moment a new
//! node's artifact identity collides with one already in the tree; the
//! loser's subtree is deactivated and never expanded further.

use std::collections::{HashMap, HashSet};

use tracing::{debug, trace, warn};

use reaktor_core::artifact::{ArtifactCoordinate, DeclaredDependency, Scope};
use reaktor_metadata::record::{ArtifactMetadata, LATEST_VERSION, RELEASE_VERSION};
use reaktor_metadata::source::MetadataSource;
use reaktor_metadata::store::{MetadataKey, MetadataStore};
use reaktor_util::errors::{ReaktorError, ReaktorResult};

use crate::conflict::{ConflictPolicy, ConflictReport, Contender, VersionConflict, Winner};
use crate::version::{ArtifactVersion, VersionRange};

/// One node of the pre-conflict expansion tree.
#[derive(Debug)]
pub struct ResolutionNode {
    pub artifact: ArtifactCoordinate,
    pub scope: Scope,
    /// Distance from the root artifact; direct dependencies sit at 1.
    pub depth: usize,
    /// Declaration-order index among the node's siblings.
    pub pom_order: usize,
    pub parent: Option<usize>,
    children: Vec<usize>,
    active: bool,
}

/// One artifact of the flattened, post-conflict result.
#[derive(Debug, Clone)]
pub struct ResolvedArtifact {
    pub coordinate: ArtifactCoordinate,
    pub scope: Scope,
    pub depth: usize,
}

/// The outcome of one resolution request.
#[derive(Debug)]
pub struct Resolution {
    /// Artifacts in the reproducible flattening order, root excluded.
    pub artifacts: Vec<ResolvedArtifact>,
    pub conflicts: ConflictReport,
}

impl Resolution {
    /// The artifacts visible on the classpath for `scope`.
    pub fn classpath(&self, scope: Scope) -> Vec<&ResolvedArtifact> {
        self.artifacts
            .iter()
            .filter(|a| scope_included(scope, a.scope))
            .collect()
    }
}

fn scope_included(classpath: Scope, dependency: Scope) -> bool {
    match classpath {
        Scope::Compile | Scope::Provided | Scope::System => {
            matches!(dependency, Scope::Compile | Scope::Provided | Scope::System)
        }
        Scope::Runtime => matches!(dependency, Scope::Compile | Scope::Runtime),
        Scope::Test => true,
    }
}

/// Expands dependency trees and mediates version conflicts.
pub struct ArtifactResolver<'a> {
    source: &'a dyn MetadataSource,
    store: &'a MetadataStore,
    policy: ConflictPolicy,
    max_depth: usize,
}

impl<'a> ArtifactResolver<'a> {
    pub fn new(
        source: &'a dyn MetadataSource,
        store: &'a MetadataStore,
        policy: ConflictPolicy,
    ) -> Self {
        Self {
            source,
            store,
            policy,
            max_depth: 64,
        }
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth.max(1);
        self
    }

    /// Resolve the transitive closure of `direct` for `root`.
    ///
    /// Returns the surviving artifacts in the reproducible flattening
    /// order: a depth-first walk visiting children by (depth descending,
    /// pom order descending, artifact identity).
    pub fn resolve(
        &self,
        root: &ArtifactCoordinate,
        direct: &[DeclaredDependency],
    ) -> ReaktorResult<Resolution> {
        let mut expansion = Expansion {
            resolver: self,
            nodes: vec![ResolutionNode {
                artifact: root.clone(),
                scope: Scope::Compile,
                depth: 0,
                pom_order: 0,
                parent: None,
                children: Vec::new(),
                active: true,
            }],
            by_key: HashMap::new(),
            report: ConflictReport::new(),
        };
        expansion
            .by_key
            .insert(root.conflict_key(), vec![0]);

        let mut path = vec![root.conflict_key()];
        expansion.expand(0, direct, &HashSet::new(), &mut path)?;

        let artifacts = expansion.flatten();
        debug!(
            root = %root,
            resolved = artifacts.len(),
            conflicts = expansion.report.len(),
            "resolution complete"
        );
        Ok(Resolution {
            artifacts,
            conflicts: expansion.report,
        })
    }
}

struct Expansion<'r, 'a> {
    resolver: &'r ArtifactResolver<'a>,
    nodes: Vec<ResolutionNode>,
    /// Conflict key to every node ever created under it.
    by_key: HashMap<String, Vec<usize>>,
    report: ConflictReport,
}

impl Expansion<'_, '_> {
    fn expand(
        &mut self,
        parent: usize,
        declared: &[DeclaredDependency],
        exclusions: &HashSet<String>,
        path: &mut Vec<String>,
    ) -> ReaktorResult<()> {
        let parent_depth = self.nodes[parent].depth;
        let parent_scope = self.nodes[parent].scope;
        let is_root = parent == 0;

        let mut pom_order = 0;
        for dep in declared {
            // Optional dependencies only count where they were declared.
            if dep.optional && !is_root {
                continue;
            }
            // Test, provided and system dependencies are not transitive.
            if !is_root
                && matches!(dep.scope, Scope::Test | Scope::Provided | Scope::System)
            {
                continue;
            }
            if exclusions.contains(&dep.group)
                || exclusions.contains(&format!("{}:{}", dep.group, dep.artifact))
            {
                trace!(dependency = %format!("{}:{}", dep.group, dep.artifact), "excluded");
                continue;
            }

            let version = self.concrete_version(dep)?;
            let coordinate = ArtifactCoordinate {
                group: dep.group.clone(),
                artifact: dep.artifact.clone(),
                version,
                kind: dep.kind.clone(),
                classifier: dep.classifier.clone(),
            };
            let key = coordinate.conflict_key();

            // The same identity already on the current path is a cycle.
            if path.contains(&key) {
                trace!(artifact = %coordinate, "cycle in dependency chain, skipping");
                continue;
            }

            let scope = if is_root {
                dep.scope
            } else {
                Scope::propagate(parent_scope, dep.scope)
            };

            let idx = self.nodes.len();
            self.nodes.push(ResolutionNode {
                artifact: coordinate.clone(),
                scope,
                depth: parent_depth + 1,
                pom_order,
                parent: Some(parent),
                children: Vec::new(),
                active: true,
            });
            self.nodes[parent].children.push(idx);
            pom_order += 1;

            let mut lost = false;
            let prior = self.by_key.get(&key).cloned().unwrap_or_default();
            for previous in prior {
                if !self.nodes[previous].active {
                    continue;
                }
                // The project's own artifact always keeps its place.
                let winner = if previous == 0 {
                    Winner::First
                } else {
                    self.resolver
                        .policy
                        .pick(self.contender(previous), self.contender(idx))
                };
                let (kept, omitted) = match winner {
                    Winner::First => (previous, idx),
                    Winner::Second => (idx, previous),
                };
                let kept_version = self.nodes[kept].artifact.version.clone();
                let omitted_version = self.nodes[omitted].artifact.version.clone();
                if kept_version != omitted_version {
                    self.report.add(VersionConflict {
                        group: coordinate.group.clone(),
                        artifact: coordinate.artifact.clone(),
                        omitted: omitted_version,
                        kept: kept_version,
                        reason: format!(
                            "{} (depth {} vs {})",
                            self.resolver.policy.label(),
                            self.nodes[kept].depth,
                            self.nodes[omitted].depth,
                        ),
                    });
                }
                self.deactivate(omitted);
                if omitted == idx {
                    lost = true;
                    break;
                }
            }
            self.by_key.entry(key.clone()).or_default().push(idx);
            if lost {
                continue;
            }

            if parent_depth + 1 >= self.resolver.max_depth {
                warn!(artifact = %coordinate, depth = parent_depth + 1, "max resolution depth reached");
                continue;
            }

            let transitive = self
                .resolver
                .source
                .direct_dependencies(&coordinate)
                .map_err(|e| ReaktorError::Resolution {
                    coordinate: coordinate.to_string(),
                    message: e.to_string(),
                })?;
            if transitive.is_empty() {
                continue;
            }

            let mut child_exclusions = exclusions.clone();
            for exclusion in &dep.exclusions {
                match &exclusion.artifact {
                    Some(artifact) => {
                        child_exclusions.insert(format!("{}:{}", exclusion.group, artifact))
                    }
                    None => child_exclusions.insert(exclusion.group.clone()),
                };
            }

            path.push(key);
            self.expand(idx, &transitive, &child_exclusions, path)?;
            path.pop();
        }
        Ok(())
    }

    fn contender(&self, idx: usize) -> Contender<'_> {
        let node = &self.nodes[idx];
        Contender {
            version: &node.artifact.version,
            depth: node.depth,
            encounter: idx,
        }
    }

    fn deactivate(&mut self, root: usize) {
        let mut stack = vec![root];
        while let Some(idx) = stack.pop() {
            if self.nodes[idx].active {
                self.nodes[idx].active = false;
                stack.extend(self.nodes[idx].children.iter().copied());
            }
        }
    }

    /// Turn a declared version specification into a concrete version,
    /// consulting known-versions metadata for ranges and meta-versions.
    fn concrete_version(&self, dep: &DeclaredDependency) -> ReaktorResult<String> {
        let spec = dep.version.as_str();

        if let Some(range) = VersionRange::parse(spec) {
            let metadata = self.versions_metadata(dep)?;
            return range
                .best_match(metadata.versions.iter().map(String::as_str))
                .ok_or_else(|| {
                    ReaktorError::UnresolvableRange {
                        coordinate: format!("{}:{}", dep.group, dep.artifact),
                        range: spec.to_string(),
                    }
                    .into()
                });
        }

        match spec {
            LATEST_VERSION => {
                let metadata = self.versions_metadata(dep)?;
                metadata
                    .latest
                    .clone()
                    .or_else(|| highest_version(&metadata.versions, false))
                    .ok_or_else(|| no_known_versions(dep))
            }
            RELEASE_VERSION => {
                let metadata = self.versions_metadata(dep)?;
                metadata
                    .release
                    .clone()
                    .or_else(|| highest_version(&metadata.versions, true))
                    .ok_or_else(|| no_known_versions(dep))
            }
            _ => Ok(spec.to_string()),
        }
    }

    fn versions_metadata(&self, dep: &DeclaredDependency) -> ReaktorResult<ArtifactMetadata> {
        let key = MetadataKey::artifact_level(&dep.group, &dep.artifact);
        self.resolver
            .store
            .get_or_fetch(&key, || {
                self.resolver
                    .source
                    .versions_metadata(&dep.group, &dep.artifact)
            })
            .map_err(|e| {
                ReaktorError::Resolution {
                    coordinate: format!("{}:{}", dep.group, dep.artifact),
                    message: e.to_string(),
                }
                .into()
            })
    }

    /// Flatten the post-conflict tree: depth-first, children visited by
    /// (depth descending, pom order descending, artifact identity).
    fn flatten(&self) -> Vec<ResolvedArtifact> {
        let mut out = Vec::new();
        self.walk(0, &mut out);
        out
    }

    fn walk(&self, idx: usize, out: &mut Vec<ResolvedArtifact>) {
        let mut children: Vec<usize> = self.nodes[idx]
            .children
            .iter()
            .copied()
            .filter(|&c| self.nodes[c].active)
            .collect();
        children.sort_by(|&x, &y| {
            let a = &self.nodes[x];
            let b = &self.nodes[y];
            b.depth
                .cmp(&a.depth)
                .then(b.pom_order.cmp(&a.pom_order))
                .then_with(|| a.artifact.conflict_key().cmp(&b.artifact.conflict_key()))
        });
        for child in children {
            let node = &self.nodes[child];
            out.push(ResolvedArtifact {
                coordinate: node.artifact.clone(),
                scope: node.scope,
                depth: node.depth,
            });
            self.walk(child, out);
        }
    }
}

fn highest_version(versions: &[String], releases_only: bool) -> Option<String> {
    versions
        .iter()
        .map(|v| ArtifactVersion::parse(v))
        .filter(|v| !releases_only || !v.is_snapshot())
        .max()
        .map(|v| v.as_str().to_string())
}

fn no_known_versions(dep: &DeclaredDependency) -> miette::Report {
    ReaktorError::Resolution {
        coordinate: format!("{}:{}", dep.group, dep.artifact),
        message: format!("no versions known for {} marker", dep.version),
    }
    .into()
}
