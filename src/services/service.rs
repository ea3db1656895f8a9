//! Service contracts
//!
//! The generation and alignment backends are opaque request/response
//! services. Failures carry an optional status code so the orchestrator
//! can tell authentication failures apart from everything else.

use std::fmt;

use async_trait::async_trait;
use image::RgbaImage;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// HTTP-style status code for a rejected credential
pub const STATUS_UNAUTHORIZED: u16 = 401;

/// Request to generate one lighting layer
#[derive(Clone, Serialize)]
pub struct GenerationRequest {
    /// Identity of the base image on the backend
    pub base_ref: String,
    /// Single prompt from the batch
    pub prompt: String,
    /// Opaque API credential
    pub credential: String,
}

impl fmt::Debug for GenerationRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GenerationRequest")
            .field("base_ref", &self.base_ref)
            .field("prompt", &self.prompt)
            .field("credential", &"<redacted>")
            .finish()
    }
}

/// Request to align a layer image onto the base image
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AlignmentRequest {
    pub base_ref: String,
    pub layer_ref: String,
}

/// Successful service response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageResponse {
    /// Reference the produced image can be loaded from
    pub image_ref: String,
}

impl ImageResponse {
    pub fn new(image_ref: impl Into<String>) -> Self {
        Self {
            image_ref: image_ref.into(),
        }
    }
}

/// Failed service response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceFailure {
    /// Status code reported by the backend, if any
    pub status_code: Option<u16>,
    pub message: String,
}

impl ServiceFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            status_code: None,
            message: message.into(),
        }
    }

    pub fn with_status(status_code: u16, message: impl Into<String>) -> Self {
        Self {
            status_code: Some(status_code),
            message: message.into(),
        }
    }

    /// Whether the backend rejected the credential
    pub fn is_unauthorized(&self) -> bool {
        self.status_code == Some(STATUS_UNAUTHORIZED)
    }
}

pub type ServiceResult = std::result::Result<ImageResponse, ServiceFailure>;

/// External image generation service
#[async_trait]
pub trait GenerationService: Send + Sync {
    /// Generate an image for one prompt against the base image
    async fn generate(&self, request: &GenerationRequest) -> ServiceResult;
}

/// External alignment service
#[async_trait]
pub trait AlignmentService: Send + Sync {
    /// Register a layer image onto the base image
    async fn align(&self, request: &AlignmentRequest) -> ServiceResult;
}

/// Fetches and decodes the image behind a reference
#[async_trait]
pub trait ImageLoader: Send + Sync {
    /// Load an image, returning `RelightError::Load` on failure
    async fn load(&self, reference: &str) -> Result<RgbaImage>;
}
