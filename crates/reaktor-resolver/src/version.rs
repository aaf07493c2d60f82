//! Artifact version parsing, total ordering, and range matching.
//!
//! Versions use the repository ecosystem's ordering rather than semver:
//! tokens split on `.` and `-`, numeric tokens compare numerically, and
//! string qualifiers follow a fixed precedence table:
//! `alpha < beta < milestone < rc < snapshot < "" (release) < sp`.
//! A snapshot therefore sorts before its release, and trailing zero
//! tokens are insignificant (`1.0 == 1.0.0`).

use std::cmp::Ordering;
use std::fmt;

/// Well-known qualifiers with a defined precedence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Qualifier {
    Alpha,
    Beta,
    Milestone,
    Rc,
    Snapshot,
    Release,
    Sp,
}

impl Qualifier {
    /// Recognize a token as a qualifier, including the short aliases the
    /// ecosystem accepts.
    fn recognize(token: &str) -> Option<Self> {
        match token.to_lowercase().as_str() {
            "alpha" | "a" => Some(Self::Alpha),
            "beta" | "b" => Some(Self::Beta),
            "milestone" | "m" => Some(Self::Milestone),
            "rc" | "cr" => Some(Self::Rc),
            "snapshot" => Some(Self::Snapshot),
            "" | "ga" | "final" | "release" => Some(Self::Release),
            "sp" => Some(Self::Sp),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Number(u64),
    Qualifier(Qualifier),
    Text(String),
}

impl Token {
    fn classify(raw: &str) -> Self {
        if let Ok(n) = raw.parse::<u64>() {
            return Self::Number(n);
        }
        match Qualifier::recognize(raw) {
            Some(q) => Self::Qualifier(q),
            None => Self::Text(raw.to_string()),
        }
    }

    /// Ordering of this token against a missing token in the other
    /// version (`1.0` vs `1.0.<here>`).
    fn cmp_padding(&self) -> Ordering {
        match self {
            Token::Number(0) => Ordering::Equal,
            Token::Number(_) => Ordering::Greater,
            Token::Qualifier(q) => q.cmp(&Qualifier::Release),
            Token::Text(_) => Ordering::Less,
        }
    }
}

fn cmp_tokens(a: &Token, b: &Token) -> Ordering {
    match (a, b) {
        (Token::Number(a), Token::Number(b)) => a.cmp(b),
        (Token::Qualifier(a), Token::Qualifier(b)) => a.cmp(b),
        (Token::Text(a), Token::Text(b)) => a.to_lowercase().cmp(&b.to_lowercase()),
        (Token::Number(_), _) => Ordering::Greater,
        (_, Token::Number(_)) => Ordering::Less,
        // Unknown text sorts between snapshot and release.
        (Token::Qualifier(q), Token::Text(_)) => {
            if *q >= Qualifier::Release {
                Ordering::Greater
            } else {
                Ordering::Less
            }
        }
        (Token::Text(_), Token::Qualifier(q)) => {
            if *q >= Qualifier::Release {
                Ordering::Less
            } else {
                Ordering::Greater
            }
        }
    }
}

/// A parsed artifact version with the ecosystem's total order.
#[derive(Debug, Clone)]
pub struct ArtifactVersion {
    raw: String,
    tokens: Vec<Token>,
}

impl ArtifactVersion {
    pub fn parse(version: &str) -> Self {
        let tokens = version
            .split(['.', '-'])
            .filter(|t| !t.is_empty())
            .map(Token::classify)
            .collect();
        Self {
            raw: version.to_string(),
            tokens,
        }
    }

    /// The version string as written.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn is_snapshot(&self) -> bool {
        self.raw.to_uppercase().ends_with("-SNAPSHOT")
    }

    /// The version without its `-SNAPSHOT` suffix.
    pub fn base_version(&self) -> &str {
        if let Some(pos) = self.raw.to_uppercase().rfind("-SNAPSHOT") {
            &self.raw[..pos]
        } else {
            &self.raw
        }
    }
}

impl fmt::Display for ArtifactVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl PartialEq for ArtifactVersion {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for ArtifactVersion {}

impl Ord for ArtifactVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        let len = self.tokens.len().max(other.tokens.len());
        for i in 0..len {
            let ord = match (self.tokens.get(i), other.tokens.get(i)) {
                (Some(a), Some(b)) => cmp_tokens(a, b),
                (Some(a), None) => a.cmp_padding(),
                (None, Some(b)) => b.cmp_padding().reverse(),
                (None, None) => Ordering::Equal,
            };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    }
}

impl PartialOrd for ArtifactVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// One end of a version range.
#[derive(Debug, Clone)]
struct Bound {
    version: ArtifactVersion,
    inclusive: bool,
}

/// A version range such as `[1.0,2.0)`, `(,2.0]`, or the exact `[1.0]`.
#[derive(Debug, Clone)]
pub struct VersionRange {
    raw: String,
    lower: Option<Bound>,
    upper: Option<Bound>,
}

impl VersionRange {
    /// Parse a range expression. Bare versions are not ranges and yield
    /// `None`.
    pub fn parse(spec: &str) -> Option<Self> {
        let s = spec.trim();
        let open = s.chars().next()?;
        let close = s.chars().last()?;
        if (open != '[' && open != '(') || (close != ']' && close != ')') {
            return None;
        }
        let inner = &s[1..s.len() - 1];
        let (lower, upper) = match inner.split_once(',') {
            Some((lo, hi)) => {
                let lo = lo.trim();
                let hi = hi.trim();
                (
                    (!lo.is_empty()).then(|| Bound {
                        version: ArtifactVersion::parse(lo),
                        inclusive: open == '[',
                    }),
                    (!hi.is_empty()).then(|| Bound {
                        version: ArtifactVersion::parse(hi),
                        inclusive: close == ']',
                    }),
                )
            }
            None => {
                // [1.0] pins exactly that version.
                let exact = ArtifactVersion::parse(inner.trim());
                (
                    Some(Bound {
                        version: exact.clone(),
                        inclusive: true,
                    }),
                    Some(Bound {
                        version: exact,
                        inclusive: true,
                    }),
                )
            }
        };
        Some(Self {
            raw: s.to_string(),
            lower,
            upper,
        })
    }

    pub fn contains(&self, version: &ArtifactVersion) -> bool {
        if let Some(lower) = &self.lower {
            let ord = version.cmp(&lower.version);
            if ord == Ordering::Less || (!lower.inclusive && ord == Ordering::Equal) {
                return false;
            }
        }
        if let Some(upper) = &self.upper {
            let ord = version.cmp(&upper.version);
            if ord == Ordering::Greater || (!upper.inclusive && ord == Ordering::Equal) {
                return false;
            }
        }
        true
    }

    /// The highest of `candidates` inside the range.
    pub fn best_match<'a, I>(&self, candidates: I) -> Option<String>
    where
        I: IntoIterator<Item = &'a str>,
    {
        candidates
            .into_iter()
            .map(ArtifactVersion::parse)
            .filter(|v| self.contains(v))
            .max()
            .map(|v| v.raw)
    }
}

impl fmt::Display for VersionRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}
