//! Integration Tests
//!
//! Registry and compositor behaviour through the public API.

use image::{Rgba, RgbaImage};
use test_case::test_case;

use relight::compositor::{render, Surface};
use relight::layers::{BaseImage, LayerId, LayerRegistry, LayerStatus};

const BASE_PIXEL: Rgba<u8> = Rgba([100, 100, 100, 255]);
const LAYER_PIXEL: Rgba<u8> = Rgba([128, 128, 128, 255]);

fn registry() -> LayerRegistry {
    LayerRegistry::new(BaseImage::new(
        "base.png",
        RgbaImage::from_pixel(4, 4, BASE_PIXEL),
    ))
}

fn ready_layer(registry: &mut LayerRegistry, name: &str) -> LayerId {
    let id = registry.create_pending(name);
    assert!(registry.attach_image(
        id,
        RgbaImage::from_pixel(4, 4, LAYER_PIXEL),
        format!("/static/{}.png", name)
    ));
    id
}

fn render_pixel(registry: &LayerRegistry) -> Rgba<u8> {
    let mut surface = Surface::for_base(registry.base());
    render(&mut surface, registry.base(), registry.layers());
    *surface.pixels().get_pixel(1, 1)
}

// ============================================================================
// Registry
// ============================================================================

#[test_case(-50 => 0; "negative clamps to zero")]
#[test_case(0 => 0; "zero")]
#[test_case(37 => 37; "in range")]
#[test_case(100 => 100; "max")]
#[test_case(250 => 100; "above max clamps")]
fn test_opacity_clamped(value: i32) -> u8 {
    let mut registry = registry();
    let id = ready_layer(&mut registry, "glow");
    registry.set_opacity(id, value);
    registry.get(id).unwrap().opacity()
}

#[test]
fn test_last_value_wins() {
    let mut registry = registry();
    let id = ready_layer(&mut registry, "glow");

    registry.set_visible(id, false);
    registry.set_visible(id, true);
    registry.set_visible(id, false);
    registry.set_opacity(id, 10);
    registry.set_opacity(id, 70);

    let layer = registry.get(id).unwrap();
    assert!(!layer.visible);
    assert_eq!(layer.opacity(), 70);
}

#[test]
fn test_repeated_writes_render_like_final_values() {
    let mut written = registry();
    let glow = ready_layer(&mut written, "glow");
    let rim = ready_layer(&mut written, "rim");
    written.set_visible(glow, false);
    written.set_opacity(glow, 10);
    written.set_visible(glow, true);
    written.set_opacity(glow, 70);
    written.set_opacity(glow, 70);
    written.set_visible(rim, false);
    written.set_opacity(rim, 5);
    written.set_visible(rim, true);
    written.set_visible(rim, false);

    let mut fresh = registry();
    let glow = ready_layer(&mut fresh, "glow");
    let rim = ready_layer(&mut fresh, "rim");
    fresh.set_opacity(glow, 70);
    fresh.set_opacity(rim, 5);
    fresh.set_visible(rim, false);

    let mut expected = Surface::for_base(fresh.base());
    render(&mut expected, fresh.base(), fresh.layers());
    let mut actual = Surface::for_base(written.base());
    render(&mut actual, written.base(), written.layers());

    assert_eq!(actual.pixels(), expected.pixels());
    assert_ne!(actual.pixels().get_pixel(0, 0), &BASE_PIXEL);
}

#[test]
fn test_ids_unique_after_delete() {
    let mut registry = registry();
    let a = registry.create_pending("a");
    registry.delete(a);
    let b = registry.create_pending("b");

    assert_ne!(a, b);
    assert!(registry.get(a).is_none());
    assert_eq!(registry.len(), 1);
}

#[test]
fn test_failed_layer_is_terminal() {
    let mut registry = registry();
    let id = registry.create_pending("neon");
    assert!(registry.mark_failed(id, "quota exceeded"));

    assert!(!registry.attach_image(id, RgbaImage::new(4, 4), "/static/late.png"));
    assert!(!registry.mark_failed(id, "again"));

    let layer = registry.get(id).unwrap();
    assert_eq!(layer.status(), LayerStatus::Failed);
    assert_eq!(layer.failure(), Some("quota exceeded"));
    assert_eq!(layer.name(), "neon (Failed: quota exceeded)");
}

#[test]
fn test_summaries_follow_z_order() {
    let mut registry = registry();
    ready_layer(&mut registry, "bottom");
    registry.create_pending("middle");
    ready_layer(&mut registry, "top");

    let names: Vec<_> = registry.summaries().into_iter().map(|s| s.name).collect();
    assert_eq!(names, vec!["bottom", "middle", "top"]);
}

// ============================================================================
// Compositing
// ============================================================================

#[test]
fn test_render_base_only() {
    let registry = registry();
    assert_eq!(render_pixel(&registry), BASE_PIXEL);
}

#[test]
fn test_render_hidden_base_without_layers_is_blank() {
    let mut registry = registry();
    registry.set_base_visible(false);
    assert_eq!(render_pixel(&registry), Rgba([0, 0, 0, 0]));
}

#[test]
fn test_render_screens_ready_layer() {
    let mut registry = registry();
    ready_layer(&mut registry, "glow");

    // 255 - (155 * 127) / 255
    assert_eq!(render_pixel(&registry), Rgba([178, 178, 178, 255]));
}

#[test]
fn test_render_respects_opacity() {
    let mut registry = registry();
    let id = ready_layer(&mut registry, "glow");
    registry.set_opacity(id, 50);

    // 100 * 0.5 + 178 * 0.5
    assert_eq!(render_pixel(&registry), Rgba([139, 139, 139, 255]));
}

#[test]
fn test_render_skips_hidden_pending_and_failed() {
    let mut registry = registry();
    let hidden = ready_layer(&mut registry, "hidden");
    registry.set_visible(hidden, false);
    registry.create_pending("pending");
    let failed = registry.create_pending("failed");
    registry.mark_failed(failed, "boom");

    assert_eq!(render_pixel(&registry), BASE_PIXEL);
}

#[test]
fn test_render_is_deterministic() {
    let mut registry = registry();
    let a = ready_layer(&mut registry, "a");
    ready_layer(&mut registry, "b");
    registry.set_opacity(a, 30);

    let mut first = Surface::for_base(registry.base());
    render(&mut first, registry.base(), registry.layers());
    let mut second = Surface::for_base(registry.base());
    render(&mut second, registry.base(), registry.layers());
    // Rendering again onto a used surface gives the same result
    render(&mut second, registry.base(), registry.layers());

    assert_eq!(first.pixels(), second.pixels());
}

#[test]
fn test_render_resizes_mismatched_layer() {
    let mut registry = registry();
    let id = registry.create_pending("small");
    registry.attach_image(id, RgbaImage::from_pixel(2, 2, LAYER_PIXEL), "/static/small.png");

    let mut surface = Surface::for_base(registry.base());
    render(&mut surface, registry.base(), registry.layers());

    assert_eq!(surface.dimensions(), (4, 4));
    assert_eq!(surface.pixels().get_pixel(3, 3), &Rgba([178, 178, 178, 255]));
}
