//! Layer Model Module
//!
//! Implements the layer stack:
//! - Base image: fixed original, always drawn first
//! - Layer records: generated images with a `Pending | Ready | Failed` lifecycle
//! - Registry: ordered, id-keyed collection with single-writer mutation

mod base;
mod record;
mod registry;

pub use base::{is_allowed_file, BaseImage, ALLOWED_EXTENSIONS};
pub use record::{
    LayerId, LayerRecord, LayerStatus, ALIGNED_MARKER, ALIGNING_MARKER, DEFAULT_OPACITY,
    FAILED_MARKER, MAX_OPACITY,
};
pub use registry::{LayerRegistry, LayerSummary};
