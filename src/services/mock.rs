//! Mock service implementations for testing
//!
//! These don't talk to a backend. Outcomes are scripted per prompt (or
//! per layer reference), jobs can be held in flight behind a gate, and
//! every call is logged so tests can assert what reached the "network".

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use image::RgbaImage;
use parking_lot::Mutex;
use tokio::sync::Notify;

use super::loader::strip_query;
use super::service::{
    AlignmentRequest, AlignmentService, GenerationRequest, GenerationService, ImageLoader,
    ImageResponse, ServiceFailure, ServiceResult,
};
use crate::error::{RelightError, Result};

/// Scripted response for a mock call
#[derive(Debug, Clone)]
pub enum MockOutcome {
    /// Succeed with this image reference
    Image(String),
    /// Fail with an optional status code
    Fail(ServiceFailure),
}

impl MockOutcome {
    fn into_result(self) -> ServiceResult {
        match self {
            MockOutcome::Image(image_ref) => Ok(ImageResponse::new(image_ref)),
            MockOutcome::Fail(failure) => Err(failure),
        }
    }
}

/// Scripted outcomes plus gates, keyed by request key
#[derive(Debug, Default)]
struct Script {
    outcomes: Mutex<HashMap<String, MockOutcome>>,
    gates: Mutex<HashMap<String, Arc<Notify>>>,
}

impl Script {
    fn set(&self, key: &str, outcome: MockOutcome) {
        self.outcomes.lock().insert(key.to_string(), outcome);
    }

    fn hold(&self, key: &str) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.gates.lock().insert(key.to_string(), gate.clone());
        gate
    }

    async fn wait_gate(&self, key: &str) {
        // Clone out of the lock before awaiting
        let gate = self.gates.lock().get(key).cloned();
        if let Some(gate) = gate {
            gate.notified().await;
        }
    }

    fn outcome(&self, key: &str) -> Option<MockOutcome> {
        self.outcomes.lock().get(key).cloned()
    }
}

/// Mock generation service
///
/// Unscripted prompts succeed with `mock://generated/<prompt>`.
#[derive(Debug, Default)]
pub struct MockGenerationService {
    script: Script,
    calls: Mutex<Vec<GenerationRequest>>,
}

impl MockGenerationService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Succeed for `prompt` with the given image reference
    pub fn respond(&self, prompt: &str, image_ref: &str) {
        self.script
            .set(prompt, MockOutcome::Image(image_ref.to_string()));
    }

    /// Fail for `prompt`
    pub fn fail(&self, prompt: &str, failure: ServiceFailure) {
        self.script.set(prompt, MockOutcome::Fail(failure));
    }

    /// Hold jobs for `prompt` until the returned gate is notified
    pub fn hold(&self, prompt: &str) -> Arc<Notify> {
        self.script.hold(prompt)
    }

    /// Requests received so far, in arrival order
    pub fn calls(&self) -> Vec<GenerationRequest> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    pub fn default_ref(prompt: &str) -> String {
        format!("mock://generated/{}", prompt.replace(' ', "_"))
    }
}

#[async_trait]
impl GenerationService for MockGenerationService {
    async fn generate(&self, request: &GenerationRequest) -> ServiceResult {
        self.calls.lock().push(request.clone());
        self.script.wait_gate(&request.prompt).await;

        self.script
            .outcome(&request.prompt)
            .unwrap_or_else(|| MockOutcome::Image(Self::default_ref(&request.prompt)))
            .into_result()
    }
}

/// Mock alignment service
///
/// Keyed by the layer reference without its cache token. Unscripted
/// references succeed and return the same reference, which is what the
/// real backend does after overwriting the layer file in place.
#[derive(Debug, Default)]
pub struct MockAlignmentService {
    script: Script,
    calls: Mutex<Vec<AlignmentRequest>>,
}

impl MockAlignmentService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(&self, layer_ref: &str, image_ref: &str) {
        self.script
            .set(strip_query(layer_ref), MockOutcome::Image(image_ref.to_string()));
    }

    pub fn fail(&self, layer_ref: &str, failure: ServiceFailure) {
        self.script
            .set(strip_query(layer_ref), MockOutcome::Fail(failure));
    }

    pub fn hold(&self, layer_ref: &str) -> Arc<Notify> {
        self.script.hold(strip_query(layer_ref))
    }

    pub fn calls(&self) -> Vec<AlignmentRequest> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }
}

#[async_trait]
impl AlignmentService for MockAlignmentService {
    async fn align(&self, request: &AlignmentRequest) -> ServiceResult {
        self.calls.lock().push(request.clone());
        let key = strip_query(&request.layer_ref);
        self.script.wait_gate(key).await;

        self.script
            .outcome(key)
            .unwrap_or_else(|| MockOutcome::Image(key.to_string()))
            .into_result()
    }
}

/// In-memory image loader
///
/// Images are registered per reference (cache tokens ignored); a
/// fallback image can serve every unregistered reference.
#[derive(Debug, Default)]
pub struct MemoryImageLoader {
    images: Mutex<HashMap<String, RgbaImage>>,
    broken: Mutex<HashSet<String>>,
    fallback: Option<RgbaImage>,
    loads: Mutex<Vec<String>>,
}

impl MemoryImageLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `image` for any reference without an explicit entry
    pub fn with_fallback(image: RgbaImage) -> Self {
        Self {
            fallback: Some(image),
            ..Self::default()
        }
    }

    pub fn insert(&self, reference: &str, image: RgbaImage) {
        self.images
            .lock()
            .insert(strip_query(reference).to_string(), image);
    }

    /// Make loads of `reference` fail as undecodable
    pub fn break_reference(&self, reference: &str) {
        self.broken.lock().insert(strip_query(reference).to_string());
    }

    /// References requested so far, exactly as passed in
    pub fn loads(&self) -> Vec<String> {
        self.loads.lock().clone()
    }
}

#[async_trait]
impl ImageLoader for MemoryImageLoader {
    async fn load(&self, reference: &str) -> Result<RgbaImage> {
        self.loads.lock().push(reference.to_string());
        let key = strip_query(reference);

        if self.broken.lock().contains(key) {
            return Err(RelightError::load(reference, "Image Load Error"));
        }

        let found = self.images.lock().get(key).cloned();
        found
            .or_else(|| self.fallback.clone())
            .ok_or_else(|| RelightError::load(reference, "no such image"))
    }
}
