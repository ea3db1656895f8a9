//! Workspace
//!
//! Ties the registry, the job orchestrator and the compositor together.
//! The orchestrator writes layer state, the compositor reads it; they
//! only meet through the registry.

use crate::compositor::{self, Surface};
use crate::error::Result;
use crate::jobs::{JobEvent, JobOrchestrator};
use crate::layers::{BaseImage, LayerId, LayerRecord, LayerRegistry, LayerSummary};

pub struct Workspace {
    registry: LayerRegistry,
    jobs: JobOrchestrator,
}

impl Workspace {
    pub fn new(base: BaseImage, jobs: JobOrchestrator) -> Self {
        Self {
            registry: LayerRegistry::new(base),
            jobs,
        }
    }

    pub fn registry(&self) -> &LayerRegistry {
        &self.registry
    }

    /// Direct access for presentation edits (opacity, visibility, selection)
    pub fn registry_mut(&mut self) -> &mut LayerRegistry {
        &mut self.registry
    }

    pub fn layer(&self, id: LayerId) -> Option<&LayerRecord> {
        self.registry.get(id)
    }

    pub fn summaries(&self) -> Vec<LayerSummary> {
        self.registry.summaries()
    }

    pub fn in_flight(&self) -> usize {
        self.jobs.in_flight()
    }

    /// See [`JobOrchestrator::submit_generation_batch`]
    pub fn submit_generation_batch(&mut self, raw_text: &str, credential: Option<&str>) -> Result<Vec<LayerId>> {
        self.jobs
            .submit_generation_batch(&mut self.registry, raw_text, credential)
    }

    /// See [`JobOrchestrator::submit_alignment`]
    pub fn submit_alignment(&mut self, id: LayerId) -> Result<bool> {
        self.jobs.submit_alignment(&mut self.registry, id)
    }

    /// Delete a layer, even while its job is in flight
    pub fn delete_layer(&mut self, id: LayerId) -> Option<LayerRecord> {
        self.registry.delete(id)
    }

    pub async fn next_event(&mut self) -> Option<JobEvent> {
        self.jobs.next_event(&mut self.registry).await
    }

    pub async fn drain(&mut self) -> Vec<JobEvent> {
        self.jobs.drain(&mut self.registry).await
    }

    /// Render the current state onto an existing surface
    pub fn render_into(&self, surface: &mut Surface) {
        compositor::render(surface, self.registry.base(), self.registry.layers());
    }

    /// Render the current state at the base image's size
    pub fn render(&self) -> Surface {
        let mut surface = Surface::for_base(self.registry.base());
        self.render_into(&mut surface);
        surface
    }
}
