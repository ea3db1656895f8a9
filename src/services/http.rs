//! HTTP backend
//!
//! Talks to the relight backend server, which wraps the image generation
//! model and the feature-based alignment step:
//! - `POST /upload` (multipart: file) -> redirect to `/workspace?filename=<stored>`
//! - `POST /generate` (form: filename, prompt, api_key) -> `{"url"}` | `{"error"}`
//! - `POST /align-layer` (form: base_filename, layer_url) -> `{"url", "status"}` | `{"error"}`
//! - `GET /system-prompt` -> `{"content"}`, `POST /system-prompt` (json: content)
//! - `GET <url>` -> encoded image bytes
//!
//! Requires the `http-backend` feature; without it every call fails with
//! a descriptive error.

use std::path::Path;

use async_trait::async_trait;
use image::RgbaImage;
use serde::{Deserialize, Serialize};

use super::service::{
    AlignmentRequest, AlignmentService, GenerationRequest, GenerationService, ImageLoader,
    ServiceResult,
};
#[cfg(feature = "http-backend")]
use super::service::{ImageResponse, ServiceFailure};
use crate::config::Config;
use crate::error::{RelightError, Result};
use crate::layers::is_allowed_file;

/// JSON body returned by the generation and alignment endpoints
#[derive(Debug, Default, Deserialize)]
#[cfg_attr(not(feature = "http-backend"), allow(dead_code))]
struct BackendResponse {
    url: Option<String>,
    error: Option<String>,
    #[allow(dead_code)]
    status: Option<String>,
}

/// Body of both system prompt endpoints
#[derive(Debug, Default, Serialize, Deserialize)]
#[cfg_attr(not(feature = "http-backend"), allow(dead_code))]
struct SystemPrompt {
    #[serde(default)]
    content: String,
}

/// File name the backend stores an upload under
///
/// Directories are dropped and spaces become underscores. Returns `None`
/// when the extension is not an accepted image type.
pub fn stored_upload_name(path: &Path) -> Option<String> {
    let name = path.file_name()?.to_str()?;
    if !is_allowed_file(name) {
        return None;
    }
    Some(name.replace(' ', "_"))
}

/// Client for the relight backend server
pub struct HttpBackend {
    base_url: String,
    #[cfg(feature = "http-backend")]
    timeout_ms: u64,
    #[cfg(feature = "http-backend")]
    client: reqwest::Client,
}

impl HttpBackend {
    /// Create a backend client from configuration
    #[cfg(feature = "http-backend")]
    pub fn new(config: &Config) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| RelightError::BackendUnavailable {
                reason: e.to_string(),
            })?;

        Ok(Self {
            base_url: config.backend_url.trim_end_matches('/').to_string(),
            timeout_ms: config.timeout_ms,
            client,
        })
    }

    #[cfg(not(feature = "http-backend"))]
    pub fn new(config: &Config) -> Result<Self> {
        Ok(Self {
            base_url: config.backend_url.trim_end_matches('/').to_string(),
        })
    }

    /// Whether this build can actually reach a backend
    pub fn is_available() -> bool {
        cfg!(feature = "http-backend")
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Absolute URL for a backend path or already-absolute reference
    pub fn url_for(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    // ========================================================================
    // Base upload and system prompt
    // ========================================================================

    /// Upload a base image and return the name the backend stored it under
    ///
    /// The returned name is the reference to use for generation and
    /// alignment requests.
    #[cfg(feature = "http-backend")]
    pub async fn upload_base(&self, path: &Path) -> Result<String> {
        let filename = stored_upload_name(path).ok_or_else(|| RelightError::UnsupportedFormat {
            format: path.display().to_string(),
        })?;
        let bytes = tokio::fs::read(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                RelightError::FileNotFound {
                    path: path.display().to_string(),
                }
            } else {
                RelightError::Io(e)
            }
        })?;

        let url = self.url_for("/upload");
        tracing::debug!("POST {} ({} bytes)", url, bytes.len());

        let part = reqwest::multipart::Part::bytes(bytes).file_name(filename.clone());
        let form = reqwest::multipart::Form::new().part("file", part);
        let response = self
            .client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| failure_to_error(self.transport_failure(e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(RelightError::Service {
                status_code: Some(status.as_u16()),
                message: format!("Upload failed with status {}", status),
            });
        }

        // Accepted uploads redirect to the workspace page for the stored file
        let stored = response
            .url()
            .query_pairs()
            .find(|(key, _)| key == "filename")
            .map(|(_, value)| value.into_owned());
        match stored {
            Some(name) if !name.is_empty() => {
                tracing::info!("Uploaded base image as {}", name);
                Ok(name)
            }
            _ => Err(RelightError::service(format!(
                "Backend rejected upload of {}",
                filename
            ))),
        }
    }

    #[cfg(not(feature = "http-backend"))]
    pub async fn upload_base(&self, _path: &Path) -> Result<String> {
        Err(unavailable_error())
    }

    /// Fetch the system prompt the backend prepends to every generation
    #[cfg(feature = "http-backend")]
    pub async fn system_prompt(&self) -> Result<String> {
        let url = self.url_for("/system-prompt");
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| failure_to_error(self.transport_failure(e)))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| failure_to_error(self.transport_failure(e)))?;
        if !status.is_success() {
            return Err(RelightError::Service {
                status_code: Some(status.as_u16()),
                message: "Could not read system prompt".to_string(),
            });
        }

        let prompt: SystemPrompt = serde_json::from_str(&text)?;
        Ok(prompt.content)
    }

    #[cfg(not(feature = "http-backend"))]
    pub async fn system_prompt(&self) -> Result<String> {
        Err(unavailable_error())
    }

    /// Replace the system prompt
    #[cfg(feature = "http-backend")]
    pub async fn set_system_prompt(&self, content: &str) -> Result<()> {
        let url = self.url_for("/system-prompt");
        let body = SystemPrompt {
            content: content.to_string(),
        };
        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| failure_to_error(self.transport_failure(e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(RelightError::Service {
                status_code: Some(status.as_u16()),
                message: "Could not save system prompt".to_string(),
            });
        }
        Ok(())
    }

    #[cfg(not(feature = "http-backend"))]
    pub async fn set_system_prompt(&self, _content: &str) -> Result<()> {
        Err(unavailable_error())
    }

    // ========================================================================
    // Transport
    // ========================================================================

    #[cfg(feature = "http-backend")]
    fn transport_failure(&self, e: reqwest::Error) -> ServiceFailure {
        if e.is_timeout() {
            ServiceFailure::new(format!("Backend timed out after {}ms", self.timeout_ms))
        } else if e.is_connect() {
            ServiceFailure::new(format!("Cannot connect to backend at {}: {}", self.base_url, e))
        } else {
            ServiceFailure::new(e.to_string())
        }
    }

    /// Post a form and translate the JSON reply
    #[cfg(feature = "http-backend")]
    async fn post_form(&self, path: &str, form: &[(&str, &str)], fallback: &str) -> ServiceResult {
        let url = self.url_for(path);
        tracing::debug!("POST {}", url);

        let response = self
            .client
            .post(&url)
            .form(form)
            .send()
            .await
            .map_err(|e| self.transport_failure(e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| self.transport_failure(e))?;
        interpret(status.as_u16(), status.is_success(), &body, fallback)
    }

    #[cfg(not(feature = "http-backend"))]
    async fn post_form(&self, _path: &str, _form: &[(&str, &str)], _fallback: &str) -> ServiceResult {
        Err(unavailable_failure())
    }
}

/// Translate a status and raw body into a service result
#[cfg(feature = "http-backend")]
fn interpret(status: u16, success: bool, body: &str, fallback: &str) -> ServiceResult {
    let body: BackendResponse = match serde_json::from_str(body) {
        Ok(body) => body,
        Err(e) if success => {
            return Err(ServiceFailure::with_status(
                status,
                format!("Invalid backend response: {}", e),
            ))
        }
        // Error pages are not always JSON; the status still tells the story
        Err(_) => return Err(ServiceFailure::with_status(status, fallback)),
    };

    if !success {
        let message = body.error.unwrap_or_else(|| fallback.to_string());
        return Err(ServiceFailure::with_status(status, message));
    }
    match body.url {
        Some(url) => Ok(ImageResponse::new(url)),
        None => Err(ServiceFailure::with_status(
            status,
            body.error
                .unwrap_or_else(|| "No image generated by model".to_string()),
        )),
    }
}

#[cfg(feature = "http-backend")]
fn failure_to_error(failure: ServiceFailure) -> RelightError {
    RelightError::Service {
        status_code: failure.status_code,
        message: failure.message,
    }
}

#[cfg(not(feature = "http-backend"))]
fn unavailable_failure() -> super::service::ServiceFailure {
    super::service::ServiceFailure::new(
        "HTTP backend support not compiled. Build with --features http-backend",
    )
}

#[cfg(not(feature = "http-backend"))]
fn unavailable_error() -> RelightError {
    RelightError::BackendUnavailable {
        reason: unavailable_failure().message,
    }
}

#[async_trait]
impl GenerationService for HttpBackend {
    async fn generate(&self, request: &GenerationRequest) -> ServiceResult {
        let form = [
            ("filename", request.base_ref.as_str()),
            ("prompt", request.prompt.as_str()),
            ("api_key", request.credential.as_str()),
        ];
        self.post_form("/generate", &form, "Generation failed").await
    }
}

#[async_trait]
impl AlignmentService for HttpBackend {
    async fn align(&self, request: &AlignmentRequest) -> ServiceResult {
        // The backend resolves the layer by file name; cache tokens would break that
        let layer_url = super::loader::strip_query(&request.layer_ref);
        let form = [
            ("base_filename", request.base_ref.as_str()),
            ("layer_url", layer_url),
        ];
        self.post_form("/align-layer", &form, "Alignment failed").await
    }
}

#[async_trait]
impl ImageLoader for HttpBackend {
    #[cfg(feature = "http-backend")]
    async fn load(&self, reference: &str) -> Result<RgbaImage> {
        let url = self.url_for(reference);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| RelightError::load(reference, e))?;

        if !response.status().is_success() {
            return Err(RelightError::load(
                reference,
                format!("backend returned {}", response.status()),
            ));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| RelightError::load(reference, e))?;
        super::loader::decode_bytes(reference, &bytes)
    }

    #[cfg(not(feature = "http-backend"))]
    async fn load(&self, _reference: &str) -> Result<RgbaImage> {
        Err(unavailable_error())
    }
}
