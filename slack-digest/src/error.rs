use std::path::PathBuf;

use thiserror::Error;

/// Failures that stop a digest run (or, for thread integrity, a channel).
#[derive(Debug, Error)]
pub enum DigestError {
    /// The remote call failed for a reason other than rate limiting.
    #[error("{method} failed: {diagnostic}")]
    Api { method: String, diagnostic: String },

    #[error("{method} still rate limited after {attempts} attempts")]
    RateLimitExceeded { method: String, attempts: usize },

    /// Rejected before any network activity.
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// A reply references a thread root that could not be fetched.
    #[error("thread root {root} in #{channel} could not be resolved")]
    ThreadIntegrity { channel: String, root: String },

    #[error("run cancelled")]
    Cancelled,

    #[error("cannot write report {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl DigestError {
    pub fn configuration(message: impl Into<String>) -> Self {
        DigestError::Configuration(message.into())
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        DigestError::Io {
            path: path.into(),
            source,
        }
    }
}
