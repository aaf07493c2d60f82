//! Pairwise version-conflict mediation and reporting.
//!
//! When two nodes in the resolution tree share an artifact identity, one
//! of them must win. The policy is fixed at resolver construction; both
//! rules are symmetric and deterministic for a given pair. Consistency
//! across *multiple* pairwise decisions is the classic diamond-dependency
//! limitation and intentionally out of scope.

use std::cmp::Ordering;
use std::fmt;

use reaktor_core::config::ConflictMode;

use crate::version::ArtifactVersion;

/// Which of the two contenders keeps its place in the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Winner {
    First,
    Second,
}

/// One side of a pairwise conflict: the resolved version plus the node's
/// position in the tree. `encounter` is the global creation index, which
/// makes every pair strictly ordered.
#[derive(Debug, Clone, Copy)]
pub struct Contender<'a> {
    pub version: &'a str,
    pub depth: usize,
    pub encounter: usize,
}

/// Conflict-resolution rule, chosen once at resolver construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictPolicy {
    /// Shallower node wins; equal depth falls back to encounter order.
    /// Not a version comparison.
    NearestWins,
    /// Higher version wins regardless of depth; equal versions fall back
    /// to `NearestWins`.
    NewestWins,
}

impl From<ConflictMode> for ConflictPolicy {
    fn from(mode: ConflictMode) -> Self {
        match mode {
            ConflictMode::Nearest => Self::NearestWins,
            ConflictMode::Newest => Self::NewestWins,
        }
    }
}

impl ConflictPolicy {
    /// Decide the winner of one pairwise conflict.
    ///
    /// Symmetric: swapping the arguments flips the answer.
    pub fn pick(&self, a: Contender<'_>, b: Contender<'_>) -> Winner {
        match self {
            ConflictPolicy::NearestWins => nearest(a, b),
            ConflictPolicy::NewestWins => {
                let va = ArtifactVersion::parse(a.version);
                let vb = ArtifactVersion::parse(b.version);
                match va.cmp(&vb) {
                    Ordering::Greater => Winner::First,
                    Ordering::Less => Winner::Second,
                    Ordering::Equal => nearest(a, b),
                }
            }
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ConflictPolicy::NearestWins => "nearest wins",
            ConflictPolicy::NewestWins => "newest wins",
        }
    }
}

fn nearest(a: Contender<'_>, b: Contender<'_>) -> Winner {
    if (a.depth, a.encounter) <= (b.depth, b.encounter) {
        Winner::First
    } else {
        Winner::Second
    }
}

/// A single omission: one version of an artifact lost to another.
#[derive(Debug, Clone)]
pub struct VersionConflict {
    pub group: String,
    pub artifact: String,
    pub omitted: String,
    pub kept: String,
    pub reason: String,
}

impl fmt::Display for VersionConflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}: {} -> {} ({})",
            self.group, self.artifact, self.omitted, self.kept, self.reason
        )
    }
}

/// All version conflicts encountered during one resolution.
#[derive(Debug, Default)]
pub struct ConflictReport {
    pub conflicts: Vec<VersionConflict>,
}

impl ConflictReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, conflict: VersionConflict) {
        self.conflicts.push(conflict);
    }

    pub fn is_empty(&self) -> bool {
        self.conflicts.is_empty()
    }

    pub fn len(&self) -> usize {
        self.conflicts.len()
    }
}

impl fmt::Display for ConflictReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.conflicts.is_empty() {
            return write!(f, "No version conflicts.");
        }
        writeln!(f, "Version conflicts ({}):", self.conflicts.len())?;
        for c in &self.conflicts {
            writeln!(
                f,
                "  {}:{} omitted {} for {} ({})",
                c.group, c.artifact, c.omitted, c.kept, c.reason
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contender(version: &str, depth: usize, encounter: usize) -> Contender<'_> {
        Contender {
            version,
            depth,
            encounter,
        }
    }

    #[test]
    fn nearest_prefers_shallower_depth() {
        let policy = ConflictPolicy::NearestWins;
        // The deeper node loses even when its version is higher.
        assert_eq!(
            policy.pick(contender("1.0", 1, 5), contender("9.0", 2, 3)),
            Winner::First
        );
        assert_eq!(
            policy.pick(contender("9.0", 2, 3), contender("1.0", 1, 5)),
            Winner::Second
        );
    }

    #[test]
    fn nearest_equal_depth_prefers_first_declared() {
        let policy = ConflictPolicy::NearestWins;
        assert_eq!(
            policy.pick(contender("1.0", 2, 3), contender("2.0", 2, 7)),
            Winner::First
        );
        assert_eq!(
            policy.pick(contender("2.0", 2, 7), contender("1.0", 2, 3)),
            Winner::Second
        );
    }

    #[test]
    fn newest_prefers_higher_version_regardless_of_depth() {
        let policy = ConflictPolicy::NewestWins;
        assert_eq!(
            policy.pick(contender("1.0", 1, 1), contender("2.0", 4, 9)),
            Winner::Second
        );
        assert_eq!(
            policy.pick(contender("2.0", 4, 9), contender("1.0", 1, 1)),
            Winner::First
        );
    }

    #[test]
    fn newest_tie_falls_back_to_nearest() {
        let policy = ConflictPolicy::NewestWins;
        assert_eq!(
            policy.pick(contender("1.0", 3, 8), contender("1.0", 1, 2)),
            Winner::Second
        );
    }

    #[test]
    fn newest_understands_version_ordering() {
        let policy = ConflictPolicy::NewestWins;
        // 1.0-SNAPSHOT < 1.0, so the release wins.
        assert_eq!(
            policy.pick(contender("1.0-SNAPSHOT", 1, 1), contender("1.0", 2, 2)),
            Winner::Second
        );
        // 10.0 > 9.0 numerically, not lexically.
        assert_eq!(
            policy.pick(contender("10.0", 2, 2), contender("9.0", 1, 1)),
            Winner::First
        );
    }

    #[test]
    fn report_formatting() {
        let mut report = ConflictReport::new();
        assert_eq!(report.to_string(), "No version conflicts.");
        report.add(VersionConflict {
            group: "org.example".to_string(),
            artifact: "lib".to_string(),
            omitted: "2.0".to_string(),
            kept: "1.0".to_string(),
            reason: "nearest wins (depth 1 vs 2)".to_string(),
        });
        assert_eq!(report.len(), 1);
        let s = report.to_string();
        assert!(s.contains("org.example:lib"));
        assert!(s.contains("omitted 2.0 for 1.0"));
    }
}
