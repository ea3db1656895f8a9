//! Composite render pass
//!
//! The output depends only on the base image, its visibility and the
//! ordered layer list (visibility, opacity, status, image).

use super::blend::BlendMode;
use super::surface::Surface;
use crate::layers::{BaseImage, LayerRecord};

/// Render the base image and layers onto `surface`
///
/// 1. Clear the surface
/// 2. Draw the base (if visible) with a normal blend at full alpha
/// 3. Screen every visible, ready layer bottom to top at its opacity
/// 4. Reset the draw state
pub fn render<'a, I>(surface: &mut Surface, base: &BaseImage, layers: I)
where
    I: IntoIterator<Item = &'a LayerRecord>,
{
    surface.clear();

    if base.visible {
        surface.set_blend_mode(BlendMode::Normal);
        surface.set_global_alpha(1.0);
        surface.draw_image(base.image());
    }

    for layer in layers {
        if !layer.is_renderable() {
            continue;
        }
        if let Some(image) = layer.image() {
            surface.set_blend_mode(BlendMode::Screen);
            surface.set_global_alpha(layer.alpha());
            surface.draw_image(image);
        }
    }

    surface.reset_state();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compositor::DrawState;
    use crate::layers::LayerRegistry;
    use image::{Rgba, RgbaImage};

    fn base_image() -> BaseImage {
        let mut image = RgbaImage::new(2, 1);
        image.put_pixel(0, 0, Rgba([100, 0, 0, 255]));
        image.put_pixel(1, 0, Rgba([0, 200, 50, 255]));
        BaseImage::new("base.png", image)
    }

    #[test]
    fn test_base_only() {
        let registry = LayerRegistry::new(base_image());
        let mut surface = Surface::for_base(registry.base());
        render(&mut surface, registry.base(), registry.layers());

        assert_eq!(surface.pixels(), registry.base().image());
        assert_eq!(surface.state(), DrawState::default());
    }

    #[test]
    fn test_hidden_base_yields_empty_surface() {
        let mut registry = LayerRegistry::new(base_image());
        registry.set_base_visible(false);
        let mut surface = Surface::for_base(registry.base());
        render(&mut surface, registry.base(), registry.layers());

        assert!(surface.pixels().pixels().all(|p| *p == Rgba([0, 0, 0, 0])));
    }

    #[test]
    fn test_render_clears_previous_pass() {
        let mut registry = LayerRegistry::new(base_image());
        let mut surface = Surface::for_base(registry.base());
        render(&mut surface, registry.base(), registry.layers());

        registry.set_base_visible(false);
        render(&mut surface, registry.base(), registry.layers());
        assert!(surface.pixels().pixels().all(|p| p[3] == 0));
    }

    #[test]
    fn test_screen_layer_at_opacity() {
        let mut registry = LayerRegistry::new(base_image());
        let id = registry.create_pending("glow");
        registry.attach_image(id, RgbaImage::from_pixel(2, 1, Rgba([128, 128, 128, 255])), "/g/1.png");
        registry.set_opacity(id, 100);

        let mut surface = Surface::for_base(registry.base());
        render(&mut surface, registry.base(), registry.layers());

        // screen(100, 128) = 255 - (155 * 127) / 255 = 178
        assert_eq!(surface.pixels().get_pixel(0, 0), &Rgba([178, 128, 128, 255]));
        assert_eq!(surface.state(), DrawState::default());
    }
}
