//! Render Surface
//!
//! A pixel buffer plus the drawing state applied to the next draw call,
//! modelled on a 2D canvas context.

use std::borrow::Cow;
use std::path::Path;

use image::imageops::{self, FilterType};
use image::{Rgba, RgbaImage};

use super::blend::{composite_pixel, BlendMode};
use crate::error::Result;
use crate::layers::BaseImage;

/// Drawing state consulted by [`Surface::draw_image`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrawState {
    pub blend: BlendMode,
    /// Global alpha in [0.0, 1.0]
    pub alpha: f32,
}

impl Default for DrawState {
    fn default() -> Self {
        Self {
            blend: BlendMode::Normal,
            alpha: 1.0,
        }
    }
}

/// Target of a render pass
#[derive(Debug, Clone)]
pub struct Surface {
    pixels: RgbaImage,
    state: DrawState,
}

impl Surface {
    /// Create a transparent surface
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            pixels: RgbaImage::new(width, height),
            state: DrawState::default(),
        }
    }

    /// Create a surface at the base image's natural size
    pub fn for_base(base: &BaseImage) -> Self {
        let (width, height) = base.dimensions();
        Self::new(width, height)
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.pixels.dimensions()
    }

    pub fn state(&self) -> DrawState {
        self.state
    }

    pub fn pixels(&self) -> &RgbaImage {
        &self.pixels
    }

    /// Reset every pixel to transparent black
    pub fn clear(&mut self) {
        for pixel in self.pixels.pixels_mut() {
            *pixel = Rgba([0, 0, 0, 0]);
        }
    }

    pub fn set_blend_mode(&mut self, blend: BlendMode) {
        self.state.blend = blend;
    }

    pub fn set_global_alpha(&mut self, alpha: f32) {
        self.state.alpha = alpha.clamp(0.0, 1.0);
    }

    /// Restore the default blend mode and alpha
    pub fn reset_state(&mut self) {
        self.state = DrawState::default();
    }

    /// Draw an image stretched to fill the surface
    ///
    /// Images whose size differs from the surface are resampled with a
    /// bilinear filter first.
    pub fn draw_image(&mut self, image: &RgbaImage) {
        let (width, height) = self.dimensions();
        if width == 0 || height == 0 || image.width() == 0 || image.height() == 0 {
            return;
        }

        let source: Cow<'_, RgbaImage> = if image.dimensions() == (width, height) {
            Cow::Borrowed(image)
        } else {
            Cow::Owned(imageops::resize(image, width, height, FilterType::Triangle))
        };

        let DrawState { blend, alpha } = self.state;
        for (dst, src) in self.pixels.pixels_mut().zip(source.pixels()) {
            composite_pixel(dst, src, alpha, blend);
        }
    }

    /// Encode the surface to disk; the format follows the file extension
    pub fn save(&self, path: &Path) -> Result<()> {
        self.pixels.save(path)?;
        Ok(())
    }
}
