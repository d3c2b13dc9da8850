//! Application error type.

use thiserror::Error;
use vcon_vsphere::VsphereError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Vsphere(#[from] VsphereError),

    #[error("{0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Failed to prompt: {0}")]
    Prompt(String),
}

pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    /// 1 connection, 2 not found, 3 deadline, -1 anything else.
    pub fn exit_code(&self) -> i32 {
        match self {
            AppError::Vsphere(e) => e.exit_code(),
            _ => -1,
        }
    }
}

impl From<dialoguer::Error> for AppError {
    fn from(e: dialoguer::Error) -> Self {
        AppError::Prompt(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_follow_the_core_kind() {
        assert_eq!(AppError::from(VsphereError::connection("x")).exit_code(), 1);
        assert_eq!(AppError::from(VsphereError::not_found("x")).exit_code(), 2);
        assert_eq!(
            AppError::from(VsphereError::deadline(std::time::Duration::from_secs(30))).exit_code(),
            3
        );
        assert_eq!(AppError::from(VsphereError::precondition("x")).exit_code(), -1);
        assert_eq!(AppError::Config("bad".into()).exit_code(), -1);
    }

    #[test]
    fn core_messages_are_printed_verbatim() {
        let err = AppError::from(VsphereError::not_found("Failed to find VM with path 'a'"));
        assert_eq!(err.to_string(), "Failed to find VM with path 'a'");
    }
}
