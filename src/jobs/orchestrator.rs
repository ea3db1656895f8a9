//! Job Orchestrator
//!
//! Turns prompt batches into concurrent generation jobs and drives
//! alignment jobs. Jobs run as independent tokio tasks and only produce
//! a completion value; the orchestrator applies completions to the
//! registry one at a time, so the registry has a single writer and
//! needs no locking.
//!
//! Each job owns exactly one layer id. Before a completion is applied
//! the registry is consulted; if the layer was deleted in the meantime
//! the result is dropped and a `Discarded` event is reported, unless the
//! backend rejected the credential.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use image::RgbaImage;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use super::events::JobEvent;
use super::prompts::split_prompts;
use crate::error::{RelightError, Result};
use crate::layers::{LayerId, LayerRegistry, LayerStatus, ALIGNED_MARKER, ALIGNING_MARKER};
use crate::services::{
    cache_bust, AlignmentRequest, AlignmentService, GenerationRequest, GenerationService,
    ImageLoader, ServiceFailure,
};

/// Message used when the backend rejects the credential
pub const AUTH_FAILURE_MESSAGE: &str = "API key invalid or missing. Please check API settings.";

/// Image produced by a job, ready to attach to its layer
struct LoadedImage {
    image: RgbaImage,
    source_ref: String,
}

enum JobKind {
    Generation,
    Alignment { original_name: String },
}

/// Result of one job, applied by the orchestrator
struct JobCompletion {
    id: LayerId,
    kind: JobKind,
    outcome: Result<LoadedImage>,
}

/// Classify a generation failure into the error taxonomy
pub fn classify_generation_failure(failure: ServiceFailure) -> RelightError {
    if failure.is_unauthorized() {
        RelightError::Auth {
            message: AUTH_FAILURE_MESSAGE.to_string(),
        }
    } else {
        RelightError::Service {
            status_code: failure.status_code,
            message: failure.message,
        }
    }
}

/// Classify an alignment failure; alignment has no credential
pub fn classify_alignment_failure(failure: ServiceFailure) -> RelightError {
    RelightError::Service {
        status_code: failure.status_code,
        message: failure.message,
    }
}

/// Message stored on a failed layer
fn failure_message(error: &RelightError) -> String {
    match error {
        RelightError::Auth { message } | RelightError::Service { message, .. } => message.clone(),
        other => other.to_string(),
    }
}

/// Jobs are spawned onto the current Tokio runtime
fn ensure_runtime() -> Result<()> {
    tokio::runtime::Handle::try_current()
        .map(|_| ())
        .map_err(|e| RelightError::Runtime {
            reason: e.to_string(),
        })
}

/// Drives generation and alignment jobs against external services
pub struct JobOrchestrator {
    generator: Arc<dyn GenerationService>,
    aligner: Arc<dyn AlignmentService>,
    loader: Arc<dyn ImageLoader>,
    jobs: JoinSet<JobCompletion>,
    next_cache_token: u64,
}

impl JobOrchestrator {
    pub fn new(
        generator: Arc<dyn GenerationService>,
        aligner: Arc<dyn AlignmentService>,
        loader: Arc<dyn ImageLoader>,
    ) -> Self {
        Self {
            generator,
            aligner,
            loader,
            jobs: JoinSet::new(),
            next_cache_token: 1,
        }
    }

    /// Use one backend for generation, alignment and image loading
    pub fn with_backend<B>(backend: Arc<B>) -> Self
    where
        B: GenerationService + AlignmentService + ImageLoader + 'static,
    {
        Self::new(backend.clone(), backend.clone(), backend)
    }

    /// Number of jobs still outstanding
    pub fn in_flight(&self) -> usize {
        self.jobs.len()
    }

    // ========================================================================
    // Submission
    // ========================================================================

    /// Submit a batch of prompts, one generation job per prompt
    ///
    /// Validation happens before anything is created: an empty batch or a
    /// missing credential fails the whole batch with `Validation` and no
    /// layer is created and no service is called. Outside a Tokio runtime
    /// the batch fails with `Runtime`, also before any layer is created.
    ///
    /// # Returns
    /// Ids of the new pending layers, in prompt order
    pub fn submit_generation_batch(
        &mut self,
        registry: &mut LayerRegistry,
        raw_text: &str,
        credential: Option<&str>,
    ) -> Result<Vec<LayerId>> {
        let prompts = split_prompts(raw_text);
        if prompts.is_empty() {
            return Err(RelightError::validation("Please enter a prompt."));
        }

        let credential = match credential.map(str::trim) {
            Some(key) if !key.is_empty() => key.to_string(),
            _ => {
                return Err(RelightError::validation(
                    "Please set your API key before generating.",
                ))
            }
        };
        ensure_runtime()?;

        let base_ref = registry.base().reference().to_string();
        let mut ids = Vec::with_capacity(prompts.len());

        for prompt in prompts {
            let id = registry.create_pending(prompt.as_str());
            let request = GenerationRequest {
                base_ref: base_ref.clone(),
                prompt,
                credential: credential.clone(),
            };
            self.spawn_generation(id, request);
            ids.push(id);
        }

        info!("Submitted generation batch of {} prompts", ids.len());
        Ok(ids)
    }

    /// Submit an alignment job for a ready layer
    ///
    /// The layer name is tagged while the job runs. Layers that are absent
    /// or not `Ready` are ignored.
    ///
    /// # Returns
    /// `Ok(true)` if a job was started, `Err(Runtime)` outside a Tokio runtime
    pub fn submit_alignment(&mut self, registry: &mut LayerRegistry, id: LayerId) -> Result<bool> {
        let (original_name, layer_ref) = match registry.get(id) {
            Some(record) if record.status() == LayerStatus::Ready => match record.source_ref() {
                Some(source_ref) => (record.name().to_string(), source_ref.to_string()),
                None => return Ok(false),
            },
            _ => return Ok(false),
        };
        ensure_runtime()?;

        registry.rename(id, format!("{}{}", original_name, ALIGNING_MARKER));

        let request = AlignmentRequest {
            base_ref: registry.base().reference().to_string(),
            layer_ref,
        };
        let token = self.next_cache_token;
        self.next_cache_token += 1;

        self.spawn_alignment(id, original_name, request, token);
        Ok(true)
    }

    fn spawn_generation(&mut self, id: LayerId, request: GenerationRequest) {
        let generator = self.generator.clone();
        let loader = self.loader.clone();
        debug!("Spawning generation job for {} ({:?})", id, request.prompt);

        let job = async move {
            let response = generator
                .generate(&request)
                .await
                .map_err(classify_generation_failure)?;
            let image = loader.load(&response.image_ref).await?;
            Ok(LoadedImage {
                image,
                source_ref: response.image_ref,
            })
        };

        self.spawn(id, JobKind::Generation, job);
    }

    fn spawn_alignment(&mut self, id: LayerId, original_name: String, request: AlignmentRequest, token: u64) {
        let aligner = self.aligner.clone();
        let loader = self.loader.clone();
        debug!("Spawning alignment job for {}", id);

        let job = async move {
            let response = aligner
                .align(&request)
                .await
                .map_err(classify_alignment_failure)?;
            // Same reference may come back with new content
            let source_ref = cache_bust(&response.image_ref, token);
            let image = loader.load(&source_ref).await?;
            Ok(LoadedImage { image, source_ref })
        };

        self.spawn(id, JobKind::Alignment { original_name }, job);
    }

    fn spawn<F>(&mut self, id: LayerId, kind: JobKind, job: F)
    where
        F: std::future::Future<Output = Result<LoadedImage>> + Send + 'static,
    {
        self.jobs.spawn(async move {
            let outcome = match AssertUnwindSafe(job).catch_unwind().await {
                Ok(outcome) => outcome,
                Err(_) => Err(RelightError::service("Job panicked")),
            };
            JobCompletion { id, kind, outcome }
        });
    }

    // ========================================================================
    // Completion
    // ========================================================================

    /// Wait for the next job to finish and apply it to the registry
    ///
    /// Returns `None` once no jobs are outstanding.
    pub async fn next_event(&mut self, registry: &mut LayerRegistry) -> Option<JobEvent> {
        loop {
            match self.jobs.join_next().await? {
                Ok(completion) => return Some(Self::apply(registry, completion)),
                Err(e) => warn!("Job task ended abnormally: {}", e),
            }
        }
    }

    /// Wait for every outstanding job, applying each as it finishes
    pub async fn drain(&mut self, registry: &mut LayerRegistry) -> Vec<JobEvent> {
        let mut events = Vec::new();
        while let Some(event) = self.next_event(registry).await {
            events.push(event);
        }
        events
    }

    fn apply(registry: &mut LayerRegistry, completion: JobCompletion) -> JobEvent {
        let JobCompletion { id, kind, outcome } = completion;

        if !registry.contains(id) {
            // The registry stays untouched, but a rejected credential affects
            // every later submission, so it is still reported
            return match (kind, outcome) {
                (JobKind::Generation, Err(error)) if error.is_auth() => {
                    warn!("Credential rejected for deleted {}", id);
                    JobEvent::CredentialsRejected { id, error }
                }
                _ => {
                    debug!("Dropping result for deleted {}", id);
                    JobEvent::Discarded { id }
                }
            };
        }

        match (kind, outcome) {
            (JobKind::Generation, Ok(loaded)) => {
                if registry.attach_image(id, loaded.image, loaded.source_ref) {
                    registry.select_if_none(id);
                    info!("{} ready", id);
                    JobEvent::LayerReady { id }
                } else {
                    JobEvent::Discarded { id }
                }
            }
            (JobKind::Generation, Err(error)) => {
                warn!("Generation failed for {}: {}", id, error);
                let marked = registry.mark_failed(id, failure_message(&error));
                if error.is_auth() {
                    JobEvent::CredentialsRejected { id, error }
                } else if marked {
                    JobEvent::LayerFailed { id, error }
                } else {
                    JobEvent::Discarded { id }
                }
            }
            (JobKind::Alignment { original_name }, Ok(loaded)) => {
                if registry.replace_image(id, loaded.image, loaded.source_ref) {
                    registry.rename(id, format!("{}{}", original_name, ALIGNED_MARKER));
                    info!("{} aligned", id);
                    JobEvent::Aligned { id }
                } else {
                    JobEvent::Discarded { id }
                }
            }
            (JobKind::Alignment { original_name }, Err(error)) => {
                warn!("Alignment failed for {}: {}", id, error);
                registry.rename(id, original_name);
                JobEvent::AlignmentFailed { id, error }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layers::BaseImage;
    use crate::services::{MemoryImageLoader, MockAlignmentService, MockGenerationService};
    use image::Rgba;

    struct Fixture {
        generator: Arc<MockGenerationService>,
        aligner: Arc<MockAlignmentService>,
        loader: Arc<MemoryImageLoader>,
        orchestrator: JobOrchestrator,
        registry: LayerRegistry,
    }

    fn fixture() -> Fixture {
        let generator = Arc::new(MockGenerationService::new());
        let aligner = Arc::new(MockAlignmentService::new());
        let loader = Arc::new(MemoryImageLoader::with_fallback(RgbaImage::from_pixel(
            2,
            2,
            Rgba([50, 50, 50, 255]),
        )));
        let orchestrator = JobOrchestrator::new(generator.clone(), aligner.clone(), loader.clone());
        let registry = LayerRegistry::new(BaseImage::new("base.png", RgbaImage::new(2, 2)));
        Fixture {
            generator,
            aligner,
            loader,
            orchestrator,
            registry,
        }
    }

    #[test]
    fn test_classify_unauthorized() {
        let err = classify_generation_failure(ServiceFailure::with_status(401, "API Key is required"));
        assert!(err.is_auth());
        assert_eq!(failure_message(&err), AUTH_FAILURE_MESSAGE);

        let err = classify_generation_failure(ServiceFailure::with_status(500, "quota"));
        assert!(!err.is_auth());
        assert_eq!(failure_message(&err), "quota");
    }

    #[tokio::test]
    async fn test_generation_success_selects_first_ready() {
        let mut f = fixture();
        let ids = f
            .orchestrator
            .submit_generation_batch(&mut f.registry, "a, b", Some("key"))
            .unwrap();
        assert_eq!(f.orchestrator.in_flight(), 2);

        let events = f.orchestrator.drain(&mut f.registry).await;
        assert_eq!(events.len(), 2);
        assert!(events.iter().all(|e| matches!(e, JobEvent::LayerReady { .. })));
        assert!(f.registry.layers().all(|r| r.is_ready()));

        let active = f.registry.active().unwrap();
        assert!(ids.contains(&active));
        assert_eq!(f.orchestrator.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_load_failure_marks_layer_failed() {
        let mut f = fixture();
        f.loader
            .break_reference(&MockGenerationService::default_ref("broken"));

        let ids = f
            .orchestrator
            .submit_generation_batch(&mut f.registry, "broken", Some("key"))
            .unwrap();
        let events = f.orchestrator.drain(&mut f.registry).await;

        assert!(matches!(&events[0], JobEvent::LayerFailed { error, .. } if error.error_code() == "LOAD_ERROR"));
        assert_eq!(f.registry.get(ids[0]).unwrap().status(), LayerStatus::Failed);
        assert_eq!(f.registry.active(), None);
    }

    #[tokio::test]
    async fn test_alignment_rejected_unless_ready() {
        let mut f = fixture();
        let gate = f.generator.hold("slow");
        let ids = f
            .orchestrator
            .submit_generation_batch(&mut f.registry, "slow", Some("key"))
            .unwrap();

        assert!(!f.orchestrator.submit_alignment(&mut f.registry, ids[0]).unwrap());
        assert_eq!(f.registry.get(ids[0]).unwrap().name(), "slow");

        gate.notify_one();
        f.orchestrator.drain(&mut f.registry).await;
        assert!(f.orchestrator.submit_alignment(&mut f.registry, ids[0]).unwrap());
        assert_eq!(f.registry.get(ids[0]).unwrap().name(), "slow (Aligning...)");

        f.orchestrator.drain(&mut f.registry).await;
        assert_eq!(f.aligner.call_count(), 1);
        assert_eq!(f.registry.get(ids[0]).unwrap().name(), "slow (Aligned)");
    }

    #[tokio::test]
    async fn test_alignment_cache_busts_reload() {
        let mut f = fixture();
        let ids = f
            .orchestrator
            .submit_generation_batch(&mut f.registry, "glow", Some("key"))
            .unwrap();
        f.orchestrator.drain(&mut f.registry).await;

        f.orchestrator.submit_alignment(&mut f.registry, ids[0]).unwrap();
        f.orchestrator.drain(&mut f.registry).await;

        let loads = f.loader.loads();
        assert_eq!(loads.last().unwrap(), "mock://generated/glow?t=1");
        assert_eq!(
            f.registry.get(ids[0]).unwrap().source_ref(),
            Some("mock://generated/glow?t=1")
        );
    }

    #[test]
    fn test_batch_outside_runtime_is_an_error() {
        let mut f = fixture();
        let err = f
            .orchestrator
            .submit_generation_batch(&mut f.registry, "a, b", Some("key"))
            .unwrap_err();

        assert_eq!(err.error_code(), "RUNTIME_ERROR");
        assert!(f.registry.is_empty());
        assert_eq!(f.generator.call_count(), 0);
    }

    #[test]
    fn test_alignment_outside_runtime_is_an_error() {
        let mut f = fixture();
        let id = f.registry.create_pending("glow");
        f.registry.attach_image(id, RgbaImage::new(2, 2), "/g/glow.png");

        let err = f
            .orchestrator
            .submit_alignment(&mut f.registry, id)
            .unwrap_err();
        assert_eq!(err.error_code(), "RUNTIME_ERROR");
        assert_eq!(f.registry.get(id).unwrap().name(), "glow");
        assert_eq!(f.orchestrator.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_rejected_credential_reported_after_delete() {
        let mut f = fixture();
        f.generator
            .fail("only", ServiceFailure::with_status(401, "API Key is required"));
        let gate = f.generator.hold("only");
        let ids = f
            .orchestrator
            .submit_generation_batch(&mut f.registry, "only", Some("stale"))
            .unwrap();

        f.registry.delete(ids[0]);
        gate.notify_one();
        let events = f.orchestrator.drain(&mut f.registry).await;

        assert!(matches!(
            events.as_slice(),
            [JobEvent::CredentialsRejected { id, .. }] if *id == ids[0]
        ));
        assert!(f.registry.is_empty());
    }
}
