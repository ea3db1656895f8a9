//! Image loading
//!
//! References are URL-like paths (`/static/generated/x.png?t=3`). The
//! query part only disambiguates caches and is ignored when resolving
//! the image itself.

use std::path::PathBuf;

use async_trait::async_trait;
use image::RgbaImage;

use super::service::ImageLoader;
use crate::error::{RelightError, Result};

/// Append a uniqueness token so caches treat the reference as new
pub fn cache_bust(reference: &str, token: u64) -> String {
    let separator = if reference.contains('?') { '&' } else { '?' };
    format!("{}{}t={}", reference, separator, token)
}

/// Drop the query part of a reference
pub fn strip_query(reference: &str) -> &str {
    match reference.split_once('?') {
        Some((path, _)) => path,
        None => reference,
    }
}

/// Decode an in-memory encoded image
pub fn decode_bytes(reference: &str, bytes: &[u8]) -> Result<RgbaImage> {
    image::load_from_memory(bytes)
        .map(|image| image.to_rgba8())
        .map_err(|e| RelightError::load(reference, e))
}

/// Loads references relative to a directory on disk
///
/// `/static/generated/a.png` resolves to `<root>/static/generated/a.png`.
#[derive(Debug, Clone)]
pub struct FsImageLoader {
    root: PathBuf,
}

impl FsImageLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Filesystem path a reference resolves to
    pub fn resolve(&self, reference: &str) -> PathBuf {
        let relative = strip_query(reference).trim_start_matches('/');
        self.root.join(relative)
    }
}

#[async_trait]
impl ImageLoader for FsImageLoader {
    async fn load(&self, reference: &str) -> Result<RgbaImage> {
        let path = self.resolve(reference);
        let bytes = tokio::fs::read(&path)
            .await
            .map_err(|e| RelightError::load(reference, e))?;

        let reference = reference.to_string();
        tokio::task::spawn_blocking(move || decode_bytes(&reference, &bytes))
            .await
            .map_err(|e| RelightError::service(format!("Decode task failed: {}", e)))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;
    use tempfile::tempdir;

    #[test]
    fn test_cache_bust() {
        assert_eq!(cache_bust("/g/a.png", 7), "/g/a.png?t=7");
        assert_eq!(cache_bust("/g/a.png?t=7", 8), "/g/a.png?t=7&t=8");
    }

    #[test]
    fn test_strip_query() {
        assert_eq!(strip_query("/g/a.png?t=7"), "/g/a.png");
        assert_eq!(strip_query("/g/a.png"), "/g/a.png");
    }

    #[test]
    fn test_decode_garbage_is_load_error() {
        let err = decode_bytes("/g/bad.png", b"definitely not a png").unwrap_err();
        assert_eq!(err.error_code(), "LOAD_ERROR");
    }

    #[tokio::test]
    async fn test_fs_loader_ignores_cache_token() {
        let dir = tempdir().unwrap();
        let generated = dir.path().join("static").join("generated");
        std::fs::create_dir_all(&generated).unwrap();
        RgbaImage::from_pixel(2, 2, Rgba([5, 6, 7, 255]))
            .save(generated.join("gen_1.png"))
            .unwrap();

        let loader = FsImageLoader::new(dir.path());
        let image = loader
            .load("/static/generated/gen_1.png?t=42")
            .await
            .unwrap();
        assert_eq!(image.get_pixel(1, 1), &Rgba([5, 6, 7, 255]));
    }

    #[tokio::test]
    async fn test_fs_loader_missing_file() {
        let dir = tempdir().unwrap();
        let loader = FsImageLoader::new(dir.path());
        let err = loader.load("/static/generated/nope.png").await.unwrap_err();
        assert_eq!(err.error_code(), "LOAD_ERROR");
    }
}
