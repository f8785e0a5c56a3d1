use crate::host::HandleId;
use thiserror::Error;

/// Failure reported by a call into the host application.
///
/// Host adapters translate whatever the native API reports into one of these
/// two shapes. `InvalidHandle` is expected while the host tears documents down
/// and is absorbed by every caller in this workspace.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HostError {
    #[error("native handle is no longer valid")]
    InvalidHandle,

    #[error("{0}")]
    Failed(String),
}

impl HostError {
    /// Returns true if the failure only means the native object is gone.
    pub fn is_invalid_handle(&self) -> bool {
        matches!(self, Self::InvalidHandle)
    }
}

/// Result of a single call into the host.
pub type HostResult<T> = std::result::Result<T, HostError>;

/// Error types for the document session layer.
///
/// Operations invoked by client code (open, create, save, reload) return these
/// directly. Host callbacks never do: they classify the error with
/// [`SessionError::class`] and hand it to the error sink instead.
///
/// # Examples
///
/// ```
/// use docsession_core::error::{ErrorClass, HostError, SessionError};
///
/// let err = SessionError::host("active_document", HostError::Failed("busy".into()));
/// assert_eq!(err.class(), ErrorClass::HostCallFailure);
/// assert_eq!(err.to_string(), "host call active_document failed: busy");
///
/// let gone = SessionError::host("hook", HostError::InvalidHandle);
/// assert_eq!(gone.class(), ErrorClass::InvalidHandleFailure);
/// ```
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("host call {operation} failed: {source}")]
    HostCall {
        operation: &'static str,
        #[source]
        source: HostError,
    },

    #[error("native handle {handle} is no longer valid")]
    InvalidHandle { handle: HandleId },

    #[error("failed to produce document: {0}")]
    Creation(String),

    #[error("save failed (errors: {errors:#x}, warnings: {warnings:#x})")]
    Save { errors: i32, warnings: i32 },

    #[error("document {handle} has been disposed")]
    Disposed { handle: HandleId },

    #[error("listener for {event} panicked: {message}")]
    Listener { event: String, message: String },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SessionError {
    /// Wraps a host failure, keeping `InvalidHandle` recognisable.
    pub fn host(operation: &'static str, source: HostError) -> Self {
        Self::HostCall { operation, source }
    }

    /// Classifies the error for the error sink.
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::HostCall {
                source: HostError::InvalidHandle,
                ..
            }
            | Self::InvalidHandle { .. }
            | Self::Disposed { .. } => ErrorClass::InvalidHandleFailure,
            Self::HostCall { .. } => ErrorClass::HostCallFailure,
            Self::Creation(_) => ErrorClass::CreationFailure,
            Self::Save { .. } => ErrorClass::SaveFailure,
            Self::Listener { .. } => ErrorClass::ListenerFailure,
            Self::Config(_) | Self::Io(_) | Self::Json(_) => ErrorClass::ConfigurationFailure,
        }
    }

    /// Returns true for teardown races that callers absorb silently.
    pub fn is_invalid_handle(&self) -> bool {
        self.class() == ErrorClass::InvalidHandleFailure
    }
}

/// Coarse classification used when reporting errors out of host callbacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorClass {
    HostCallFailure,
    /// Expected during teardown; downgraded to a no-op.
    InvalidHandleFailure,
    CreationFailure,
    SaveFailure,
    ListenerFailure,
    ConfigurationFailure,
}

impl ErrorClass {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::HostCallFailure => "host-call",
            Self::InvalidHandleFailure => "invalid-handle",
            Self::CreationFailure => "creation",
            Self::SaveFailure => "save",
            Self::ListenerFailure => "listener",
            Self::ConfigurationFailure => "configuration",
        }
    }
}

/// Convenience type alias for `Result<T, SessionError>`.
///
/// # Examples
///
/// ```
/// use docsession_core::error::{Result, SessionError};
///
/// fn require_path(path: Option<&str>) -> Result<&str> {
///     path.ok_or_else(|| SessionError::Creation("document has no path".into()))
/// }
///
/// assert!(require_path(None).is_err());
/// ```
pub type Result<T> = std::result::Result<T, SessionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_error_display() {
        assert_eq!(
            HostError::InvalidHandle.to_string(),
            "native handle is no longer valid"
        );
        assert_eq!(HostError::Failed("rpc busy".into()).to_string(), "rpc busy");
    }

    #[test]
    fn test_host_call_classification() {
        let err = SessionError::host("save", HostError::Failed("denied".into()));
        assert_eq!(err.class(), ErrorClass::HostCallFailure);
        assert!(!err.is_invalid_handle());

        let err = SessionError::host("unhook", HostError::InvalidHandle);
        assert_eq!(err.class(), ErrorClass::InvalidHandleFailure);
        assert!(err.is_invalid_handle());
    }

    #[test]
    fn test_save_error_display() {
        let err = SessionError::Save {
            errors: 0x2,
            warnings: 0x0,
        };
        assert_eq!(err.to_string(), "save failed (errors: 0x2, warnings: 0x0)");
        assert_eq!(err.class(), ErrorClass::SaveFailure);
    }

    #[test]
    fn test_disposed_is_absorbed() {
        let err = SessionError::Disposed { handle: 7 };
        assert_eq!(err.to_string(), "document 7 has been disposed");
        assert!(err.is_invalid_handle());
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let error: SessionError = io_err.into();
        assert!(error.to_string().contains("I/O error"));
        assert_eq!(error.class(), ErrorClass::ConfigurationFailure);
    }

    #[test]
    fn test_json_error_conversion() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let error: SessionError = json_err.into();
        assert!(error.to_string().starts_with("JSON error"));
    }

    #[test]
    fn test_error_class_labels() {
        assert_eq!(ErrorClass::CreationFailure.as_str(), "creation");
        assert_eq!(ErrorClass::InvalidHandleFailure.as_str(), "invalid-handle");
    }
}
