//! Error types for svcfwd-core.

use thiserror::Error;

/// Main error type for svcfwd operations.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error from underlying system calls.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed address range specification.
    #[error("invalid address range: {message}")]
    InvalidRange { message: String },

    /// Every candidate in the range was claimed or answered liveness probes.
    #[error("address range exhausted: {range}")]
    RangeExhausted { range: String },

    /// Service or workload resolution failure.
    #[error("resolution error: {message}")]
    Resolution { message: String },

    /// Interface alias add/remove failure.
    #[error("binding error: {message}")]
    Binding { message: String },

    /// Tunnel transport failure.
    #[error("tunnel error: {message}")]
    Tunnel { message: String },

    /// Hosts registry failure.
    #[error("hosts error: {message}")]
    Hosts { message: String },

    /// Invalid configuration (kubeconfig, flags, collaborator construction).
    #[error("configuration error: {message}")]
    Config { message: String },
}

impl Error {
    /// Returns true if this error must abort the run before any session starts.
    ///
    /// Configuration errors mean the environment is unusable; nothing that
    /// happens later can recover from them.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::Config { .. } | Error::InvalidRange { .. })
    }

    /// Returns true if this error is scoped to a single session or service.
    ///
    /// Session-scoped errors are logged and the run continues with reduced
    /// coverage (fewer active forwards than requested).
    pub fn is_session_scoped(&self) -> bool {
        matches!(
            self,
            Error::RangeExhausted { .. }
                | Error::Resolution { .. }
                | Error::Binding { .. }
                | Error::Tunnel { .. }
        )
    }
}

/// Convenience result type for svcfwd operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_invalid_range() {
        let err = Error::InvalidRange {
            message: "bad span".into(),
        };
        assert_eq!(err.to_string(), "invalid address range: bad span");
    }

    #[test]
    fn error_display_exhausted() {
        let err = Error::RangeExhausted {
            range: "10.0.0.1-3".into(),
        };
        assert_eq!(err.to_string(), "address range exhausted: 10.0.0.1-3");
    }

    #[test]
    fn io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn fatal_errors() {
        assert!(Error::Config {
            message: "no kubeconfig".into()
        }
        .is_fatal());
        assert!(Error::InvalidRange {
            message: "bad".into()
        }
        .is_fatal());

        assert!(!Error::Tunnel {
            message: "closed".into()
        }
        .is_fatal());
    }

    #[test]
    fn session_scoped_errors() {
        assert!(Error::RangeExhausted {
            range: "r".into()
        }
        .is_session_scoped());
        assert!(Error::Binding {
            message: "add failed".into()
        }
        .is_session_scoped());
        assert!(Error::Tunnel {
            message: "reset".into()
        }
        .is_session_scoped());

        assert!(!Error::Config {
            message: "bad".into()
        }
        .is_session_scoped());
    }
}
