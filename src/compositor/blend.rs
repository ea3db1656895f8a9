//! Blend modes and per-pixel compositing
//!
//! Channel math is integer for the blend function itself and f32 for
//! alpha mixing, rounded back to u8. The results are fully deterministic.

use image::Rgba;
use serde::{Deserialize, Serialize};

/// How source pixels combine with the surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BlendMode {
    /// Source-over: the source replaces the destination
    #[default]
    Normal,
    /// Lightening blend used for lighting passes
    Screen,
}

impl BlendMode {
    /// Blend a single colour channel
    #[inline]
    pub fn blend_channel(&self, dst: u8, src: u8) -> u8 {
        match self {
            Self::Normal => src,
            Self::Screen => screen_channel(dst, src),
        }
    }
}

/// Screen blend: `255 - ((255 - dst) * (255 - src)) / 255`
#[inline]
pub fn screen_channel(dst: u8, src: u8) -> u8 {
    let inv = (255 - dst as u16) * (255 - src as u16) / 255;
    (255 - inv) as u8
}

#[inline]
fn to_u8(value: f32) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}

/// Composite `src` onto `dst` with the given mode and global alpha
///
/// Over an opaque destination this is
/// `dst * (1 - a) + blend(dst, src) * a`, with `a = alpha * src_alpha`.
/// Over a (partially) transparent destination the blend result is
/// weighted by the destination alpha before the source-over step, so
/// drawing onto a cleared surface yields the source colour unchanged.
pub fn composite_pixel(dst: &mut Rgba<u8>, src: &Rgba<u8>, alpha: f32, mode: BlendMode) {
    let a_src = alpha.clamp(0.0, 1.0) * (src[3] as f32 / 255.0);
    if a_src <= 0.0 {
        return;
    }
    let a_dst = dst[3] as f32 / 255.0;
    let a_out = a_src + a_dst * (1.0 - a_src);

    for c in 0..3 {
        let d = dst[c] as f32;
        let s = src[c] as f32;
        let blended = mode.blend_channel(dst[c], src[c]) as f32;
        let mixed = (1.0 - a_dst) * s + a_dst * blended;
        let premul = mixed * a_src + d * a_dst * (1.0 - a_src);
        dst[c] = to_u8(premul / a_out);
    }
    dst[3] = to_u8(a_out * 255.0);
}
