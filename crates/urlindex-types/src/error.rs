//! Error taxonomy (§7). Each variant maps onto one of the dispositions
//! described there; the server uses [`Error::is_retriable`] and
//! [`Error::http_status_hint`] to decide status codes.

/// Failure building or querying the index.
#[derive(Debug, Clone)]
pub enum Error {
    /// Bad URL, bad query argument. Rejected locally; not fatal to a
    /// batch during ingestion.
    InputMalformed(String),

    /// The manifest's `current_version` pointer does not resolve to a
    /// published version. The operator must rebuild.
    VersionMissing,

    /// Magic mismatch, size mismatch, or decompression failure reading
    /// a binary artifact.
    ArtifactCorrupt { path: String, reason: String },

    /// A ranged read (e.g. against remote object storage) failed.
    /// Retriable with bounded exponential backoff.
    TransientIo { path: String, reason: String },

    /// A capacity limit was hit. Not fatal: either a buffer is flushed
    /// transparently, or a `limit` is clamped and surfaced as a warning.
    OverCapacity(String),

    /// Any other I/O failure not covered above.
    Io(String),
}

impl Error {
    /// Whether retrying the same request is likely to succeed.
    pub fn is_retriable(&self) -> bool {
        matches!(self, Error::TransientIo { .. })
    }

    /// Whether this failure means the service cannot serve any request
    /// until an operator rebuilds the index.
    pub fn is_fatal_to_service(&self) -> bool {
        matches!(self, Error::VersionMissing | Error::ArtifactCorrupt { .. })
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::InputMalformed(msg) => write!(f, "malformed input: {msg}"),
            Error::VersionMissing => write!(f, "manifest does not name a published version"),
            Error::ArtifactCorrupt { path, reason } => {
                write!(f, "artifact corrupt at '{path}': {reason}")
            }
            Error::TransientIo { path, reason } => {
                write!(f, "transient I/O error reading '{path}': {reason}")
            }
            Error::OverCapacity(msg) => write!(f, "over capacity: {msg}"),
            Error::Io(msg) => write!(f, "I/O error: {msg}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        None
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Io(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_transient_io_is_retriable() {
        assert!(Error::TransientIo {
            path: "x".to_string(),
            reason: "timeout".to_string()
        }
        .is_retriable());
        assert!(!Error::InputMalformed("x".to_string()).is_retriable());
        assert!(!Error::VersionMissing.is_retriable());
    }

    #[test]
    fn version_missing_and_artifact_corrupt_are_fatal() {
        assert!(Error::VersionMissing.is_fatal_to_service());
        assert!(Error::ArtifactCorrupt {
            path: "x".to_string(),
            reason: "bad magic".to_string()
        }
        .is_fatal_to_service());
        assert!(!Error::OverCapacity("x".to_string()).is_fatal_to_service());
    }
}
