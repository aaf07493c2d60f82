use serde::{Deserialize, Serialize};

/// Dependency scope of an external artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    Compile,
    Runtime,
    Provided,
    Test,
    System,
}

impl Default for Scope {
    fn default() -> Self {
        Self::Compile
    }
}

impl Scope {
    /// Scope of a transitive dependency reached through a parent scope.
    ///
    /// `test` and `provided` parents dominate; a `runtime` edge anywhere in
    /// the chain demotes `compile` to `runtime`.
    pub fn propagate(parent: Scope, child: Scope) -> Scope {
        match (parent, child) {
            (Scope::Compile, Scope::Compile) => Scope::Compile,
            (Scope::Compile, Scope::Runtime) => Scope::Runtime,
            (Scope::Runtime, Scope::Compile) => Scope::Runtime,
            (Scope::Runtime, Scope::Runtime) => Scope::Runtime,
            (Scope::Test, _) | (_, Scope::Test) => Scope::Test,
            (Scope::Provided, _) | (_, Scope::Provided) => Scope::Provided,
            (Scope::System, _) | (_, Scope::System) => Scope::System,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Scope::Compile => "compile",
            Scope::Runtime => "runtime",
            Scope::Provided => "provided",
            Scope::Test => "test",
            Scope::System => "system",
        }
    }
}

impl std::fmt::Display for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Full coordinate of one external artifact:
/// group, artifact, version, packaging kind, optional classifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArtifactCoordinate {
    pub group: String,
    pub artifact: String,
    pub version: String,
    #[serde(default = "default_kind")]
    pub kind: String,
    #[serde(default)]
    pub classifier: Option<String>,
}

fn default_kind() -> String {
    "jar".to_string()
}

impl ArtifactCoordinate {
    pub fn new(group: &str, artifact: &str, version: &str) -> Self {
        Self {
            group: group.to_string(),
            artifact: artifact.to_string(),
            version: version.to_string(),
            kind: default_kind(),
            classifier: None,
        }
    }

    /// Parse `"group:artifact:version"` shorthand.
    pub fn parse(s: &str) -> Option<Self> {
        let parts: Vec<&str> = s.split(':').collect();
        if parts.len() == 3 && parts.iter().all(|p| !p.is_empty()) {
            Some(Self::new(parts[0], parts[1], parts[2]))
        } else {
            None
        }
    }

    pub fn with_classifier(mut self, classifier: &str) -> Self {
        self.classifier = Some(classifier.to_string());
        self
    }

    pub fn with_kind(mut self, kind: &str) -> Self {
        self.kind = kind.to_string();
        self
    }

    /// Version-independent identity used for conflict detection:
    /// `group:artifact[:classifier]:kind`.
    ///
    /// Two coordinates with the same conflict key but different versions
    /// compete for a single slot in the resolved set.
    pub fn conflict_key(&self) -> String {
        match &self.classifier {
            Some(c) => format!("{}:{}:{}:{}", self.group, self.artifact, c, self.kind),
            None => format!("{}:{}:{}", self.group, self.artifact, self.kind),
        }
    }

    /// `group:artifact` pair, the key used for repository metadata.
    pub fn unversioned(&self) -> String {
        format!("{}:{}", self.group, self.artifact)
    }
}

impl std::fmt::Display for ArtifactCoordinate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}:{}", self.group, self.artifact, self.version)
    }
}

/// A transitive dependency to exclude, by group or group:artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Exclusion {
    pub group: String,
    #[serde(default)]
    pub artifact: Option<String>,
}

impl Exclusion {
    /// Returns `true` if `coordinate` falls under this exclusion.
    pub fn matches(&self, coordinate: &ArtifactCoordinate) -> bool {
        if self.group != coordinate.group {
            return false;
        }
        match &self.artifact {
            Some(a) => *a == coordinate.artifact,
            None => true,
        }
    }
}

/// One dependency as declared by an artifact or module, before resolution.
///
/// The version field is a *specification*: a concrete version, a range such
/// as `[1.0,2.0)`, or one of the meta-version markers `LATEST` / `RELEASE`.
/// The resolver makes it concrete against known-versions metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeclaredDependency {
    pub group: String,
    pub artifact: String,
    pub version: String,
    #[serde(default = "default_kind")]
    pub kind: String,
    #[serde(default)]
    pub classifier: Option<String>,
    #[serde(default)]
    pub scope: Scope,
    #[serde(default)]
    pub optional: bool,
    #[serde(default)]
    pub exclusions: Vec<Exclusion>,
}

impl DeclaredDependency {
    pub fn new(group: &str, artifact: &str, version: &str) -> Self {
        Self {
            group: group.to_string(),
            artifact: artifact.to_string(),
            version: version.to_string(),
            kind: default_kind(),
            classifier: None,
            scope: Scope::default(),
            optional: false,
            exclusions: Vec::new(),
        }
    }

    pub fn with_scope(mut self, scope: Scope) -> Self {
        self.scope = scope;
        self
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    pub fn with_exclusion(mut self, group: &str, artifact: Option<&str>) -> Self {
        self.exclusions.push(Exclusion {
            group: group.to_string(),
            artifact: artifact.map(str::to_string),
        });
        self
    }

    /// Coordinate with the declared (possibly not yet concrete) version.
    pub fn coordinate(&self) -> ArtifactCoordinate {
        ArtifactCoordinate {
            group: self.group.clone(),
            artifact: self.artifact.clone(),
            version: self.version.clone(),
            kind: self.kind.clone(),
            classifier: self.classifier.clone(),
        }
    }
}
