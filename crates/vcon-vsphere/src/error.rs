//! Error types for the vSphere orchestration crate.

use std::fmt;
use std::time::Duration;

/// Categorised error kinds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VsphereErrorKind {
    /// Connecting, logging in, or resolving the datacenter / datastore failed
    ConnectionError,
    /// A VM path or named sub-resource (network, snapshot, folder) did not resolve
    NotFound,
    /// The shared deadline of an operation elapsed
    DeadlineExceeded,
    /// The VM is not in the state the verb requires
    PreconditionFailed,
    /// The host-side task finished in the error state
    TaskError,
    /// JSON parse / deserialization error
    ParseError,
    /// HTTP / API error with status code
    ApiError(u16),
    /// Generic
    Other,
}

/// Crate error type carrying a kind + human-readable message.
#[derive(Debug, Clone)]
pub struct VsphereError {
    pub kind: VsphereErrorKind,
    pub message: String,
}

impl VsphereError {
    pub fn new(kind: VsphereErrorKind, msg: impl Into<String>) -> Self {
        Self { kind, message: msg.into() }
    }

    pub fn connection(msg: impl Into<String>) -> Self {
        Self::new(VsphereErrorKind::ConnectionError, msg)
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::new(VsphereErrorKind::NotFound, msg)
    }

    /// The deadline of `timeout` elapsed before the operation finished.
    pub fn deadline(timeout: Duration) -> Self {
        Self::new(
            VsphereErrorKind::DeadlineExceeded,
            format!("Timed out after {} seconds", timeout.as_secs()),
        )
    }

    pub fn precondition(msg: impl Into<String>) -> Self {
        Self::new(VsphereErrorKind::PreconditionFailed, msg)
    }

    /// A task failure; the host's localized message is kept verbatim.
    pub fn task(msg: impl Into<String>) -> Self {
        Self::new(VsphereErrorKind::TaskError, msg)
    }

    pub fn api(status: u16, msg: impl Into<String>) -> Self {
        Self::new(VsphereErrorKind::ApiError(status), msg)
    }

    pub fn parse(msg: impl Into<String>) -> Self {
        Self::new(VsphereErrorKind::ParseError, msg)
    }

    pub fn other(msg: impl Into<String>) -> Self {
        Self::new(VsphereErrorKind::Other, msg)
    }

    pub fn is_deadline(&self) -> bool {
        self.kind == VsphereErrorKind::DeadlineExceeded
    }

    /// Prefix the message with one layer of call-site context.
    pub fn context(mut self, ctx: impl fmt::Display) -> Self {
        self.message = format!("{ctx}: {}", self.message);
        self
    }

    /// Final classification at the edge of a verb.
    ///
    /// A deadline failure is reported as `Timeout while attempting to <action>`;
    /// everything else as `Got error while attempting to <action>: <cause>`.
    /// The kind is preserved either way so the exit code stays correct.
    pub fn during(self, action: &str) -> Self {
        if self.is_deadline() {
            Self::new(self.kind, format!("Timeout while attempting to {action}"))
        } else {
            let message = format!("Got error while attempting to {action}: {}", self.message);
            Self::new(self.kind, message)
        }
    }

    /// Process exit code for this failure.
    pub fn exit_code(&self) -> i32 {
        match self.kind {
            VsphereErrorKind::ConnectionError => 1,
            VsphereErrorKind::NotFound => 2,
            VsphereErrorKind::DeadlineExceeded => 3,
            _ => -1,
        }
    }
}

impl fmt::Display for VsphereError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for VsphereError {}

impl From<reqwest::Error> for VsphereError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_connect() {
            Self::connection(format!("Connection failed: {e}"))
        } else {
            Self::other(format!("HTTP error: {e}"))
        }
    }
}

impl From<serde_json::Error> for VsphereError {
    fn from(e: serde_json::Error) -> Self {
        Self::parse(format!("JSON parse error: {e}"))
    }
}

/// Convenience alias.
pub type VsphereResult<T> = Result<T, VsphereError>;
