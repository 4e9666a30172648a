use thiserror::Error;

#[derive(Debug, Error)]
pub enum GuardError {
    #[error("not initialized: run 'guard init' (missing {0})")]
    NotInitialized(String),

    #[error("invalid id '{0}': must start with an alphanumeric and contain only [A-Za-z0-9._-]")]
    InvalidId(String),

    #[error("duplicate {kind} id: {id}")]
    DuplicateId { kind: &'static str, id: String },

    #[error("invalid pattern for '{id}': {source}")]
    InvalidPattern {
        id: String,
        #[source]
        source: regex::Error,
    },

    #[error("invalid glob '{glob}' for '{id}': {message}")]
    InvalidGlob {
        id: String,
        glob: String,
        message: String,
    },

    #[error("slice '{slice}' depends on unknown slice '{dependency}'")]
    UnknownDependency { slice: String, dependency: String },

    #[error("cyclic slice dependencies: {0}")]
    CyclicDependencies(String),

    #[error("invalid record: {0}")]
    InvalidRecord(String),

    #[error("invalid slice status: {0}")]
    InvalidStatus(String),

    #[error("ratchet not found: {0}")]
    RatchetNotFound(String),

    #[error("denylist rule not found: {0}")]
    DenylistRuleNotFound(String),

    #[error("slice not found: {0}")]
    SliceNotFound(String),

    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    #[error("invalid transition for slice '{slice}' from {from} to {to}: {reason}")]
    InvalidTransition {
        slice: String,
        from: String,
        to: String,
        reason: String,
    },

    #[error("slice '{slice}' is blocked by unfinished dependencies: {}", .pending.join(", "))]
    BlockedByDependency { slice: String, pending: Vec<String> },

    #[error("slice '{slice}' has unresolved guards: {}", .problems.join("; "))]
    UnresolvedGuards { slice: String, problems: Vec<String> },

    #[error("{0} guard violation(s)")]
    Violations(usize),

    #[error("guard run exceeded its {seconds}s timeout; results discarded")]
    Timeout { seconds: f64 },

    #[error("worker failed: {0}")]
    Worker(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Error taxonomy. Drives the process exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Bad records: abort before any check runs.
    Configuration,
    /// A mutation was refused by a guard.
    Invariant,
    /// A completed run found ratchet, denylist, deletion or map failures.
    Violation,
    /// Filesystem trouble or a timeout.
    Environment,
}

impl ErrorClass {
    pub fn exit_code(self) -> i32 {
        match self {
            ErrorClass::Invariant | ErrorClass::Violation => 1,
            ErrorClass::Configuration => 2,
            ErrorClass::Environment => 3,
        }
    }
}

impl GuardError {
    pub fn class(&self) -> ErrorClass {
        match self {
            GuardError::NotInitialized(_)
            | GuardError::InvalidId(_)
            | GuardError::DuplicateId { .. }
            | GuardError::InvalidPattern { .. }
            | GuardError::InvalidGlob { .. }
            | GuardError::UnknownDependency { .. }
            | GuardError::CyclicDependencies(_)
            | GuardError::InvalidRecord(_)
            | GuardError::InvalidStatus(_)
            | GuardError::RatchetNotFound(_)
            | GuardError::DenylistRuleNotFound(_)
            | GuardError::SliceNotFound(_)
            | GuardError::Yaml(_)
            | GuardError::Json(_) => ErrorClass::Configuration,
            GuardError::InvariantViolation(_)
            | GuardError::InvalidTransition { .. }
            | GuardError::BlockedByDependency { .. }
            | GuardError::UnresolvedGuards { .. } => ErrorClass::Invariant,
            GuardError::Violations(_) => ErrorClass::Violation,
            GuardError::Timeout { .. } | GuardError::Worker(_) | GuardError::Io(_) => {
                ErrorClass::Environment
            }
        }
    }

    pub fn exit_code(&self) -> i32 {
        self.class().exit_code()
    }
}

pub type Result<T> = std::result::Result<T, GuardError>;
