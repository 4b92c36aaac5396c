use thiserror::Error;

use crate::effect::Path;

/// Errors raised while parsing descriptors, resolving them against a
/// context, driving a computation, or matching harness expectations.
#[derive(Error, Debug)]
pub enum Error {
    /// The descriptor does not follow the `[mode?, path, ...args]` shape.
    #[error("Malformed descriptor: {reason}")]
    MalformedDescriptor { reason: String },

    /// A path segment is missing from the context or lands on a value that
    /// cannot be traversed further.
    #[error("Path '{path}' not found: no entry for segment '{segment}'")]
    PathNotFound { path: Path, segment: String },

    /// A resolved callable failed, or the callable's convention does not
    /// match the descriptor's mode.
    #[error("Effect '{path}' failed: {source}")]
    Execution {
        path: Path,
        #[source]
        source: anyhow::Error,
    },

    /// The computation itself failed with a domain error.
    #[error("Computation error: {0}")]
    Computation(#[from] anyhow::Error),

    /// The suspend/resume protocol was violated: resumed after completion,
    /// suspended on a foreign future, or performed two effects at once.
    #[error("Invalid resume: {reason}")]
    InvalidResume { reason: String },

    /// Harness: the next yielded effect did not match the expectation queue.
    #[error("Unexpected effect: {reason}")]
    UnexpectedEffect { reason: String },

    /// Harness: the computation completed while expectations remained queued.
    #[error("Unused expectations: {remaining} expectation(s) never consumed")]
    UnusedExpectations { remaining: usize },
}

impl Error {
    pub(crate) fn malformed(reason: impl Into<String>) -> Self {
        Error::MalformedDescriptor {
            reason: reason.into(),
        }
    }

    pub(crate) fn path_not_found(path: &Path, segment: &str) -> Self {
        Error::PathNotFound {
            path: path.clone(),
            segment: segment.to_string(),
        }
    }

    pub(crate) fn execution(path: &Path, source: anyhow::Error) -> Self {
        Error::Execution {
            path: path.clone(),
            source,
        }
    }

    pub(crate) fn invalid_resume(reason: impl Into<String>) -> Self {
        Error::InvalidResume {
            reason: reason.into(),
        }
    }

    /// True for harness protocol violations, which abort a test run outright
    /// instead of being thrown into the computation.
    pub fn is_protocol_violation(&self) -> bool {
        matches!(
            self,
            Error::UnexpectedEffect { .. } | Error::UnusedExpectations { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
