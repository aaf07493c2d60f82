use miette::Diagnostic;
use thiserror::Error;

/// Unified error type for all Reaktor operations.
#[derive(Debug, Error, Diagnostic)]
pub enum ReaktorError {
    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The same module was declared more than once in the reactor.
    #[error("Duplicate module in reactor: {id}")]
    #[diagnostic(help("Each module may appear only once in the build"))]
    DuplicateModule { id: String },

    /// The module graph contains a dependency cycle.
    ///
    /// `members` lists the modules on the cycle in encounter order.
    #[error("Module dependency cycle: {}", members.join(" -> "))]
    #[diagnostic(help("Break the cycle by removing one of the listed inter-module dependencies"))]
    Cycle { members: Vec<String> },

    /// A module was referenced that is not part of the reactor.
    #[error("Unknown module: {id}")]
    UnknownModule { id: String },

    /// A scheduling invariant was violated. Indicates a bug in the caller
    /// or the scheduler itself, never ordinary build failure.
    #[error("Scheduler invariant violated: {message}")]
    Scheduling { message: String },

    /// Dependency resolution failed for a specific artifact coordinate.
    #[error("Failed to resolve {coordinate}: {message}")]
    Resolution { coordinate: String, message: String },

    /// A version range matched none of the known versions.
    #[error("No version of {coordinate} satisfies the range {range}")]
    #[diagnostic(help("Widen the range or check the repository's available versions"))]
    UnresolvableRange { coordinate: String, range: String },

    /// Invalid or malformed orchestration configuration.
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Catch-all for miscellaneous errors.
    #[error("{message}")]
    Generic { message: String },
}

/// Convenience alias for `miette::Result<T>`.
pub type ReaktorResult<T> = miette::Result<T>;
