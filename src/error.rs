//! Error handling for Relight
//!
//! Every error carries a stable code and recovery suggestions so the
//! CLI (or any embedding UI) can tell the user what to do next.

use thiserror::Error;

/// Result type alias for Relight operations
pub type Result<T> = std::result::Result<T, RelightError>;

/// Main error type for Relight operations
#[derive(Error, Debug)]
pub enum RelightError {
    // Batch Validation Errors
    #[error("Validation failed: {reason}")]
    Validation { reason: String },

    // Service Errors
    #[error("Authentication failed: {message}")]
    Auth { message: String },

    #[error("Service error: {message}")]
    Service {
        status_code: Option<u16>,
        message: String,
    },

    #[error("Could not load image '{reference}': {reason}")]
    Load { reference: String, reason: String },

    #[error("Backend unavailable: {reason}")]
    BackendUnavailable { reason: String },

    // File Errors
    #[error("File not found: {path}")]
    FileNotFound { path: String },

    #[error("Unsupported image format: {format}")]
    UnsupportedFormat { format: String },

    #[error("Invalid configuration: {reason}")]
    Config { reason: String },

    #[error("No async runtime available: {reason}")]
    Runtime { reason: String },

    // Codec Errors
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    // I/O Errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Serialization Errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl RelightError {
    pub fn validation(reason: impl Into<String>) -> Self {
        RelightError::Validation {
            reason: reason.into(),
        }
    }

    pub fn service(message: impl Into<String>) -> Self {
        RelightError::Service {
            status_code: None,
            message: message.into(),
        }
    }

    pub fn load(reference: impl Into<String>, reason: impl ToString) -> Self {
        RelightError::Load {
            reference: reference.into(),
            reason: reason.to_string(),
        }
    }

    /// Get the error code for this error type
    pub fn error_code(&self) -> &'static str {
        match self {
            RelightError::Validation { .. } => "VALIDATION_ERROR",
            RelightError::Auth { .. } => "AUTH_ERROR",
            RelightError::Service { .. } => "SERVICE_ERROR",
            RelightError::Load { .. } => "LOAD_ERROR",
            RelightError::BackendUnavailable { .. } => "BACKEND_UNAVAILABLE",
            RelightError::FileNotFound { .. } => "FILE_NOT_FOUND",
            RelightError::UnsupportedFormat { .. } => "UNSUPPORTED_FORMAT",
            RelightError::Config { .. } => "CONFIG_ERROR",
            RelightError::Runtime { .. } => "RUNTIME_ERROR",
            RelightError::Image(_) => "IMAGE_ERROR",
            RelightError::Io(_) => "IO_ERROR",
            RelightError::Serialization(_) => "SERIALIZATION_ERROR",
        }
    }

    /// True for authentication failures, which require new credentials
    pub fn is_auth(&self) -> bool {
        matches!(self, RelightError::Auth { .. })
    }

    /// Check if this error is recoverable
    ///
    /// Per-layer failures are recoverable by deleting the layer and
    /// resubmitting; validation errors by fixing the input.
    pub fn is_recoverable(&self) -> bool {
        match self {
            RelightError::Validation { .. } => true,
            RelightError::Auth { .. } => true,
            RelightError::Service { .. } => true,
            RelightError::Load { .. } => true,
            RelightError::FileNotFound { .. } => true,
            RelightError::UnsupportedFormat { .. } => true,
            _ => false,
        }
    }

    /// Get recovery suggestions for this error
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            RelightError::Validation { .. } => vec![
                "Enter at least one prompt (separate several with commas or new lines)",
                "Set an API key with --api-key or RELIGHT_API_KEY",
            ],
            RelightError::Auth { .. } => vec![
                "Check the API key in your settings",
                "Generate a new key and try again",
            ],
            RelightError::Service { .. } | RelightError::Load { .. } => vec![
                "Delete the failed layer and submit the prompt again",
                "Check that the backend is running and reachable",
            ],
            RelightError::BackendUnavailable { .. } => vec![
                "Rebuild with --features http-backend",
                "Check the backend URL (RELIGHT_BACKEND_URL)",
            ],
            RelightError::UnsupportedFormat { .. } => vec![
                "Convert the image to PNG or JPEG",
                "Supported formats: PNG, JPG, JPEG, GIF, WEBP",
            ],
            RelightError::Runtime { .. } => vec![
                "Submit jobs from inside a Tokio runtime (e.g. #[tokio::main])",
            ],
            RelightError::FileNotFound { .. } => vec![
                "Check the file path is correct",
                "Verify the file hasn't been moved or deleted",
            ],
            _ => vec![],
        }
    }

    /// Get a user-friendly message for this error
    pub fn friendly_message(&self) -> String {
        match self {
            RelightError::Auth { .. } => {
                "The backend rejected your API key. Please update it in your settings.".to_string()
            }
            RelightError::Load { reference, .. } => {
                format!("The image at '{}' could not be loaded.", reference)
            }
            RelightError::UnsupportedFormat { format } => {
                format!("'{}' files can't be used as a base image.", format)
            }
            _ => self.to_string(),
        }
    }
}
