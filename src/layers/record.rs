//! Layer Records
//!
//! A layer is one independently generated image composited above the
//! base image. Its lifecycle is `Pending -> Ready | Failed`; the pixel
//! data only exists in the `Ready` state.

use std::fmt;

use image::RgbaImage;
use serde::{Deserialize, Serialize};

/// Marker appended to a layer name if generation fails
pub const FAILED_MARKER: &str = "Failed";

/// Marker appended to a layer name while an alignment job is in flight
pub const ALIGNING_MARKER: &str = " (Aligning...)";

/// Marker appended to a layer name after a successful alignment
pub const ALIGNED_MARKER: &str = " (Aligned)";

/// Default opacity of a freshly created layer
pub const DEFAULT_OPACITY: u8 = 100;

/// Maximum opacity (fully opaque)
pub const MAX_OPACITY: u8 = 100;

/// Unique layer identifier
///
/// Allocated from a monotonic counter owned by the registry, so ids are
/// never reused and their ordering equals creation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LayerId(pub(crate) u64);

impl fmt::Display for LayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "layer-{}", self.0)
    }
}

/// Lifecycle status of a layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayerStatus {
    /// Generation job still outstanding
    Pending,
    /// Image decoded and available for rendering
    Ready,
    /// Generation failed; never rendered
    Failed,
}

/// Status together with the data that only exists in that status
#[derive(Debug, Clone)]
pub(crate) enum LayerState {
    Pending,
    Ready { image: RgbaImage, source_ref: String },
    Failed { message: String },
}

/// A single layer in the registry
#[derive(Debug, Clone)]
pub struct LayerRecord {
    id: LayerId,
    /// Display name (starts as the prompt text)
    pub name: String,
    pub(crate) state: LayerState,
    opacity: u8,
    /// Whether the layer takes part in rendering
    pub visible: bool,
}

impl LayerRecord {
    pub(crate) fn pending(id: LayerId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            state: LayerState::Pending,
            opacity: DEFAULT_OPACITY,
            visible: true,
        }
    }

    pub fn id(&self) -> LayerId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn status(&self) -> LayerStatus {
        match self.state {
            LayerState::Pending => LayerStatus::Pending,
            LayerState::Ready { .. } => LayerStatus::Ready,
            LayerState::Failed { .. } => LayerStatus::Failed,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.status() == LayerStatus::Ready
    }

    /// Decoded pixels, present only when `Ready`
    pub fn image(&self) -> Option<&RgbaImage> {
        match &self.state {
            LayerState::Ready { image, .. } => Some(image),
            _ => None,
        }
    }

    /// Reference to the image backing this layer, present only when `Ready`
    pub fn source_ref(&self) -> Option<&str> {
        match &self.state {
            LayerState::Ready { source_ref, .. } => Some(source_ref),
            _ => None,
        }
    }

    /// Failure message, present only when `Failed`
    pub fn failure(&self) -> Option<&str> {
        match &self.state {
            LayerState::Failed { message } => Some(message),
            _ => None,
        }
    }

    pub fn opacity(&self) -> u8 {
        self.opacity
    }

    /// Store an opacity value, clamped to [0, 100]
    pub(crate) fn set_opacity(&mut self, value: i32) {
        self.opacity = value.clamp(0, MAX_OPACITY as i32) as u8;
    }

    /// Opacity as a blend factor in [0.0, 1.0]
    pub fn alpha(&self) -> f32 {
        self.opacity as f32 / MAX_OPACITY as f32
    }

    /// Whether the compositor draws this layer
    pub fn is_renderable(&self) -> bool {
        self.visible && self.is_ready()
    }

    /// Short status line used in layer listings
    pub fn description(&self) -> String {
        match self.status() {
            LayerStatus::Pending => "Generating...".to_string(),
            LayerStatus::Failed => "Generation Failed".to_string(),
            LayerStatus::Ready => format!("{}% Opacity", self.opacity),
        }
    }
}
