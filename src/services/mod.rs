//! External service interfaces and implementations
//!
//! This module provides:
//! - `GenerationService`, `AlignmentService` and `ImageLoader` traits
//! - Filesystem and HTTP implementations
//! - Mock implementations for testing

mod http;
mod loader;
mod mock;
mod service;
#[cfg(all(test, feature = "http-backend"))]
pub(crate) mod test_server;

pub use http::{stored_upload_name, HttpBackend};
pub use loader::{cache_bust, decode_bytes, strip_query, FsImageLoader};
pub use mock::{MemoryImageLoader, MockAlignmentService, MockGenerationService, MockOutcome};
pub use service::{
    AlignmentRequest, AlignmentService, GenerationRequest, GenerationService, ImageLoader,
    ImageResponse, ServiceFailure, ServiceResult, STATUS_UNAUTHORIZED,
};
