use reaktor_core::artifact::{ArtifactCoordinate, DeclaredDependency, Scope};

#[test]
fn coordinate_parse_valid() {
    let coord = ArtifactCoordinate::parse("com.example:my-lib:1.0.0").unwrap();
    assert_eq!(coord.group, "com.example");
    assert_eq!(coord.artifact, "my-lib");
    assert_eq!(coord.version, "1.0.0");
    assert_eq!(coord.kind, "jar");
    assert!(coord.classifier.is_none());
}

#[test]
fn coordinate_parse_two_parts_returns_none() {
    assert!(ArtifactCoordinate::parse("group:artifact").is_none());
}

#[test]
fn coordinate_parse_empty_string() {
    assert!(ArtifactCoordinate::parse("").is_none());
}

#[test]
fn coordinate_display_roundtrip() {
    let s = "com.example:my-lib:1.0.0";
    assert_eq!(ArtifactCoordinate::parse(s).unwrap().to_string(), s);
}

#[test]
fn declared_dependency_builder() {
    let dep = DeclaredDependency::new("org.example", "lib", "[1.0,2.0)")
        .with_scope(Scope::Test)
        .with_exclusion("org.legacy", None);
    assert_eq!(dep.scope, Scope::Test);
    assert_eq!(dep.exclusions.len(), 1);
    assert_eq!(dep.coordinate().version, "[1.0,2.0)");
}
