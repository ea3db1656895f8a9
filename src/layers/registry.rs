//! Layer Registry
//!
//! Owns the ordered layer collection, the base image and the active
//! selection. All mutation goes through `&mut self`, so there is exactly
//! one writer at a time.
//!
//! Every operation keyed by a [`LayerId`] treats a missing id as a no-op:
//! a layer may be deleted while the job that created it is still in
//! flight, and the late completion must leave the registry untouched.

use std::collections::BTreeMap;

use image::RgbaImage;
use serde::{Deserialize, Serialize};

use super::base::BaseImage;
use super::record::{LayerId, LayerRecord, LayerState, LayerStatus, FAILED_MARKER};

/// Listing row for a single layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerSummary {
    pub id: LayerId,
    pub name: String,
    pub status: LayerStatus,
    pub opacity: u8,
    pub visible: bool,
    pub active: bool,
    pub description: String,
}

/// Registry of layers stacked over a base image
///
/// Layers are keyed by a monotonic id, so iterating the map yields
/// creation order, which is also the z-order (bottom to top).
#[derive(Debug)]
pub struct LayerRegistry {
    base: BaseImage,
    layers: BTreeMap<LayerId, LayerRecord>,
    next_id: u64,
    active: Option<LayerId>,
}

impl LayerRegistry {
    /// Create an empty registry over a base image
    pub fn new(base: BaseImage) -> Self {
        Self {
            base,
            layers: BTreeMap::new(),
            next_id: 1,
            active: None,
        }
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Append a new pending layer at the top of the stack
    pub fn create_pending(&mut self, name: impl Into<String>) -> LayerId {
        let id = LayerId(self.next_id);
        self.next_id += 1;
        self.layers.insert(id, LayerRecord::pending(id, name));
        id
    }

    /// Resolve a pending layer with its generated image
    ///
    /// Returns `true` if the layer transitioned to `Ready`. Absent or
    /// already terminal layers are left unchanged.
    pub fn attach_image(&mut self, id: LayerId, image: RgbaImage, source_ref: impl Into<String>) -> bool {
        match self.layers.get_mut(&id) {
            Some(record) if record.status() == LayerStatus::Pending => {
                record.state = LayerState::Ready {
                    image,
                    source_ref: source_ref.into(),
                };
                true
            }
            _ => false,
        }
    }

    /// Resolve a pending layer as failed
    ///
    /// The message is appended to the layer name so listings show why the
    /// layer failed.
    pub fn mark_failed(&mut self, id: LayerId, message: impl Into<String>) -> bool {
        match self.layers.get_mut(&id) {
            Some(record) if record.status() == LayerStatus::Pending => {
                let message = message.into();
                record.name = format!("{} ({}: {})", record.name, FAILED_MARKER, message);
                record.state = LayerState::Failed { message };
                true
            }
            _ => false,
        }
    }

    /// Swap the image of a ready layer (used by alignment)
    pub fn replace_image(&mut self, id: LayerId, image: RgbaImage, source_ref: impl Into<String>) -> bool {
        match self.layers.get_mut(&id) {
            Some(record) if record.status() == LayerStatus::Ready => {
                record.state = LayerState::Ready {
                    image,
                    source_ref: source_ref.into(),
                };
                true
            }
            _ => false,
        }
    }

    /// Remove a layer regardless of status
    ///
    /// Idempotent: deleting an absent id returns `None`.
    pub fn delete(&mut self, id: LayerId) -> Option<LayerRecord> {
        if self.active == Some(id) {
            self.active = None;
        }
        self.layers.remove(&id)
    }

    // ========================================================================
    // Presentation state
    // ========================================================================

    /// Set layer opacity, clamped to [0, 100]
    pub fn set_opacity(&mut self, id: LayerId, value: i32) {
        if let Some(record) = self.layers.get_mut(&id) {
            record.set_opacity(value);
        }
    }

    pub fn set_visible(&mut self, id: LayerId, visible: bool) {
        if let Some(record) = self.layers.get_mut(&id) {
            record.visible = visible;
        }
    }

    pub fn set_base_visible(&mut self, visible: bool) {
        self.base.visible = visible;
    }

    pub fn rename(&mut self, id: LayerId, name: impl Into<String>) -> bool {
        match self.layers.get_mut(&id) {
            Some(record) => {
                record.name = name.into();
                true
            }
            None => false,
        }
    }

    /// Make a layer the active one; absent ids are ignored
    pub fn select(&mut self, id: LayerId) -> bool {
        if self.layers.contains_key(&id) {
            self.active = Some(id);
            true
        } else {
            false
        }
    }

    /// Select a layer only if nothing is selected yet
    pub fn select_if_none(&mut self, id: LayerId) -> bool {
        match self.active {
            Some(_) => false,
            None => self.select(id),
        }
    }

    // ========================================================================
    // Queries
    // ========================================================================

    pub fn base(&self) -> &BaseImage {
        &self.base
    }

    pub fn get(&self, id: LayerId) -> Option<&LayerRecord> {
        self.layers.get(&id)
    }

    pub fn contains(&self, id: LayerId) -> bool {
        self.layers.contains_key(&id)
    }

    pub fn active(&self) -> Option<LayerId> {
        self.active
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Layers bottom to top
    pub fn layers(&self) -> impl DoubleEndedIterator<Item = &LayerRecord> + '_ {
        self.layers.values()
    }

    /// Read-only view of the ordered layer sequence
    pub fn snapshot(&self) -> Vec<&LayerRecord> {
        self.layers.values().collect()
    }

    /// Listing rows, bottom to top
    pub fn summaries(&self) -> Vec<LayerSummary> {
        self.layers
            .values()
            .map(|record| LayerSummary {
                id: record.id(),
                name: record.name.clone(),
                status: record.status(),
                opacity: record.opacity(),
                visible: record.visible,
                active: self.active == Some(record.id()),
                description: record.description(),
            })
            .collect()
    }
}
