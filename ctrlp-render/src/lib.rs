#[cfg(feature = "pdf")]
mod pdfium;

use std::path::{Path, PathBuf};

use ctrlp_core::{LoadError, RenderImage};
use image::{DynamicImage, RgbaImage};

#[cfg(feature = "pdf")]
pub use pdfium::{PdfiumRenderFactory, PDFIUM_LIBRARY_ENV};

#[cfg(feature = "pdf")]
pub type PdfRenderFactory = PdfiumRenderFactory;

/// Resolves `path` to an absolute file path, or explains why it cannot be opened.
pub fn ensure_pdf_path(path: &Path) -> Result<PathBuf, LoadError> {
    if !path.exists() {
        return Err(LoadError::Missing(path.to_path_buf()));
    }
    let absolute = path.canonicalize().map_err(|err| LoadError::Backend {
        path: path.to_path_buf(),
        message: err.to_string(),
    })?;
    if !absolute.is_file() {
        return Err(LoadError::Backend {
            path: absolute,
            message: "not a regular file".to_string(),
        });
    }
    Ok(absolute)
}

/// Converts RGBA pixels to their luma while keeping alpha. Images whose
/// buffer does not match their dimensions are returned untouched.
pub fn to_grayscale(image: RenderImage) -> RenderImage {
    let RenderImage {
        width,
        height,
        pixels,
    } = image;
    match RgbaImage::from_raw(width, height, pixels) {
        Some(buffer) => {
            let gray = DynamicImage::ImageRgba8(buffer).grayscale().to_rgba8();
            RenderImage {
                width,
                height,
                pixels: gray.into_raw(),
            }
        }
        None => {
            tracing::warn!(width, height, "pixel buffer size mismatch, skipping grayscale");
            RenderImage {
                width,
                height,
                pixels: Vec::new(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn missing_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.pdf");
        let err = ensure_pdf_path(&path).unwrap_err();
        assert!(matches!(err, LoadError::Missing(ref missing) if missing == &path));
        assert!(err.to_string().starts_with("File does not exist: "));
    }

    #[test]
    fn directory_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let err = ensure_pdf_path(dir.path()).unwrap_err();
        assert!(matches!(err, LoadError::Backend { .. }));
    }

    #[test]
    fn existing_file_resolves_to_absolute_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("paper.pdf");
        fs::write(&path, b"%PDF-1.4\n").unwrap();
        let resolved = ensure_pdf_path(&path).unwrap();
        assert!(resolved.is_absolute());
        assert!(resolved.ends_with("paper.pdf"));
    }

    #[test]
    fn grayscale_keeps_size_and_alpha() {
        let image = RenderImage {
            width: 2,
            height: 1,
            pixels: vec![255, 0, 0, 255, 0, 0, 255, 128],
        };
        let gray = to_grayscale(image);
        assert_eq!((gray.width, gray.height), (2, 1));
        assert_eq!(gray.pixels.len(), 8);
        for pixel in gray.pixels.chunks_exact(4) {
            assert_eq!(pixel[0], pixel[1]);
            assert_eq!(pixel[1], pixel[2]);
        }
        assert_eq!(gray.pixels[3], 255);
        assert_eq!(gray.pixels[7], 128);
        assert!(gray.pixels[0] > gray.pixels[4]);
    }

    #[test]
    fn mismatched_buffer_is_dropped() {
        let gray = to_grayscale(RenderImage {
            width: 4,
            height: 4,
            pixels: vec![0; 3],
        });
        assert!(gray.pixels.is_empty());
    }
}
