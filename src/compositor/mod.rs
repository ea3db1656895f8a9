//! Compositor Module
//!
//! Turns layer state into pixels:
//! - Blend modes and per-pixel compositing math
//! - Surface with canvas-like draw state
//! - Render pass over base image + layer stack

mod blend;
mod render;
mod surface;

pub use blend::{composite_pixel, screen_channel, BlendMode};
pub use render::render;
pub use surface::{DrawState, Surface};
