//! The metadata-fetch seam.
//!
//! Resolution needs two things from the repository side: the direct
//! dependencies an artifact declares, and the known-versions record for a
//! coordinate. Both come through [`MetadataSource`], an injected capability
//! that may block on I/O; the core never calls it while holding a
//! scheduler or store lock.

use std::collections::HashMap;

use miette::Diagnostic;
use thiserror::Error;

use reaktor_core::artifact::{ArtifactCoordinate, DeclaredDependency};

use crate::record::ArtifactMetadata;

/// Failure modes of a metadata fetch, always naming the coordinate.
#[derive(Debug, Error, Diagnostic)]
pub enum MetadataError {
    #[error("Artifact not found: {coordinate}")]
    NotFound { coordinate: String },

    #[error("Transfer failed for {coordinate}: {message}")]
    Transfer { coordinate: String, message: String },

    #[error("Unauthorized to access {coordinate}")]
    #[diagnostic(help("Check the repository credentials"))]
    Unauthorized { coordinate: String },
}

impl MetadataError {
    /// The coordinate this failure is about.
    pub fn coordinate(&self) -> &str {
        match self {
            MetadataError::NotFound { coordinate }
            | MetadataError::Transfer { coordinate, .. }
            | MetadataError::Unauthorized { coordinate } => coordinate,
        }
    }
}

/// Injected capability answering repository questions for the resolver.
pub trait MetadataSource: Send + Sync {
    /// Direct dependencies declared by `artifact`, in declaration order.
    fn direct_dependencies(
        &self,
        artifact: &ArtifactCoordinate,
    ) -> Result<Vec<DeclaredDependency>, MetadataError>;

    /// Known-versions record for `group:artifact`.
    fn versions_metadata(
        &self,
        group: &str,
        artifact: &str,
    ) -> Result<ArtifactMetadata, MetadataError>;
}

/// In-memory [`MetadataSource`] backed by plain tables.
///
/// The seam implementation used throughout the test suites; a real
/// repository client implements the same trait.
#[derive(Debug, Default)]
pub struct TableSource {
    dependencies: HashMap<String, Vec<DeclaredDependency>>,
    metadata: HashMap<String, ArtifactMetadata>,
}

impl TableSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the direct dependencies of `group:artifact:version`.
    pub fn with_dependencies(
        mut self,
        coordinate: &str,
        dependencies: Vec<DeclaredDependency>,
    ) -> Self {
        self.dependencies.insert(coordinate.to_string(), dependencies);
        self
    }

    /// Register the known-versions record for `group:artifact`.
    pub fn with_metadata(mut self, metadata: ArtifactMetadata) -> Self {
        let key = format!("{}:{}", metadata.group, metadata.artifact);
        self.metadata.insert(key, metadata);
        self
    }
}

impl MetadataSource for TableSource {
    fn direct_dependencies(
        &self,
        artifact: &ArtifactCoordinate,
    ) -> Result<Vec<DeclaredDependency>, MetadataError> {
        // Unregistered artifacts are treated as leaves: plenty of real
        // artifacts simply have no dependencies.
        Ok(self
            .dependencies
            .get(&artifact.to_string())
            .cloned()
            .unwrap_or_default())
    }

    fn versions_metadata(
        &self,
        group: &str,
        artifact: &str,
    ) -> Result<ArtifactMetadata, MetadataError> {
        self.metadata
            .get(&format!("{group}:{artifact}"))
            .cloned()
            .ok_or_else(|| MetadataError::NotFound {
                coordinate: format!("{group}:{artifact}"),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_source_serves_registered_dependencies() {
        let source = TableSource::new().with_dependencies(
            "g:a:1.0",
            vec![DeclaredDependency::new("g", "b", "2.0")],
        );
        let deps = source
            .direct_dependencies(&ArtifactCoordinate::new("g", "a", "1.0"))
            .unwrap();
        assert_eq!(deps.len(), 1);
        assert_eq!(deps[0].artifact, "b");
    }

    #[test]
    fn unregistered_artifact_is_a_leaf() {
        let source = TableSource::new();
        let deps = source
            .direct_dependencies(&ArtifactCoordinate::new("g", "nothing", "1.0"))
            .unwrap();
        assert!(deps.is_empty());
    }

    #[test]
    fn missing_metadata_is_not_found() {
        let source = TableSource::new();
        let err = source.versions_metadata("g", "a").unwrap_err();
        assert!(matches!(err, MetadataError::NotFound { .. }));
        assert_eq!(err.coordinate(), "g:a");
    }
}
