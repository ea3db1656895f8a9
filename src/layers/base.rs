//! Base Image
//!
//! The fixed original image every layer overlays. It is always drawn
//! beneath all layers and never modified.

use std::path::Path;

use image::RgbaImage;

use crate::error::{RelightError, Result};

/// File extensions accepted for base images
pub const ALLOWED_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "webp"];

/// Check whether a file name carries an accepted image extension
pub fn is_allowed_file(filename: &str) -> bool {
    match filename.rsplit_once('.') {
        Some((_, ext)) => ALLOWED_EXTENSIONS.contains(&ext.to_lowercase().as_str()),
        None => false,
    }
}

/// The base image and its visibility flag
#[derive(Debug, Clone)]
pub struct BaseImage {
    /// Identity sent to the generation and alignment services
    reference: String,
    image: RgbaImage,
    /// Whether the base is drawn under the layers
    pub visible: bool,
}

impl BaseImage {
    /// Wrap already-decoded pixels
    pub fn new(reference: impl Into<String>, image: RgbaImage) -> Self {
        Self {
            reference: reference.into(),
            image,
            visible: true,
        }
    }

    /// Decode a base image from disk
    ///
    /// The file name (without directories) becomes the reference sent to
    /// the backend, matching how the backend stores uploads.
    ///
    /// # Errors
    /// Returns `UnsupportedFormat` for extensions outside
    /// [`ALLOWED_EXTENSIONS`], `FileNotFound` if the path does not exist.
    pub fn open(path: &Path) -> Result<Self> {
        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| RelightError::FileNotFound {
                path: path.display().to_string(),
            })?;

        if !is_allowed_file(filename) {
            let format = filename
                .rsplit_once('.')
                .map(|(_, ext)| ext.to_string())
                .unwrap_or_else(|| filename.to_string());
            return Err(RelightError::UnsupportedFormat { format });
        }

        if !path.exists() {
            return Err(RelightError::FileNotFound {
                path: path.display().to_string(),
            });
        }

        let image = image::open(path)?.to_rgba8();
        tracing::debug!(
            "Loaded base image {} ({}x{})",
            filename,
            image.width(),
            image.height()
        );

        Ok(Self::new(filename, image))
    }

    /// Replace the reference, e.g. with the name the backend stored an upload under
    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = reference.into();
        self
    }

    pub fn reference(&self) -> &str {
        &self.reference
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    /// Natural dimensions, used to size the render surface
    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;
    use tempfile::tempdir;

    #[test]
    fn test_allowed_extensions() {
        assert!(is_allowed_file("street.png"));
        assert!(is_allowed_file("street.JPG"));
        assert!(is_allowed_file("my.photo.webp"));
        assert!(!is_allowed_file("street.tiff"));
        assert!(!is_allowed_file("street"));
    }

    #[test]
    fn test_open_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("base.png");
        RgbaImage::from_pixel(4, 3, Rgba([10, 20, 30, 255]))
            .save(&path)
            .unwrap();

        let base = BaseImage::open(&path).unwrap();
        assert_eq!(base.reference(), "base.png");
        assert_eq!(base.dimensions(), (4, 3));
        assert!(base.visible);
        assert_eq!(base.image().get_pixel(0, 0), &Rgba([10, 20, 30, 255]));
    }

    #[test]
    fn test_with_reference_keeps_pixels() {
        let base = BaseImage::new("night street.png", RgbaImage::new(3, 1))
            .with_reference("night_street.png");
        assert_eq!(base.reference(), "night_street.png");
        assert_eq!(base.dimensions(), (3, 1));
    }

    #[test]
    fn test_open_rejects_unsupported_format() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("base.tiff");
        std::fs::write(&path, b"not an image").unwrap();

        let err = BaseImage::open(&path).unwrap_err();
        assert_eq!(err.error_code(), "UNSUPPORTED_FORMAT");
    }

    #[test]
    fn test_open_missing_file() {
        let dir = tempdir().unwrap();
        let err = BaseImage::open(&dir.path().join("missing.png")).unwrap_err();
        assert_eq!(err.error_code(), "FILE_NOT_FOUND");
    }
}
