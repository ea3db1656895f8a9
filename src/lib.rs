//! Relight - Layered Relighting Compositor
//!
//! Relight stacks independently generated lighting passes ("layers") over
//! a fixed base image. Layers are produced asynchronously by an external
//! generation backend, can be re-aligned onto the base, and are toggled
//! and weighted before being composited with a screen blend.
//!
//! # Architecture
//!
//! - `layers`: registry of layer records over the base image (single writer)
//! - `jobs`: concurrent generation/alignment jobs that update the registry
//! - `compositor`: deterministic render of registry state into pixels
//! - `services`: contracts for the external backend, plus HTTP and mock
//!   implementations

pub mod cli;
pub mod compositor;
pub mod config;
pub mod error;
pub mod jobs;
pub mod layers;
pub mod services;
pub mod workspace;

pub use config::Config;
pub use error::{RelightError, Result};
pub use workspace::Workspace;
