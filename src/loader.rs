//! Loading source photos from disk.

use crate::{MosaicError, Result};
use image::RgbImage;
use log::debug;
use std::path::Path;

/// Decodes the image at `path` and converts it to 8-bit RGB.
///
/// Grayscale images are expanded to three channels and any alpha channel is dropped,
/// so the result can be passed straight to [`recommend`](crate::recommend) or [`compose`](crate::compose).
///
/// # Errors
/// Returns [`MosaicError::UnsupportedImageFormat`] if the file cannot be read or decoded.
pub fn load_image(path: impl AsRef<Path>) -> Result<RgbImage> {
    let path = path.as_ref();
    let image = image::open(path).map_err(|source| MosaicError::UnsupportedImageFormat {
        path: path.to_owned(),
        source,
    })?;

    debug!(
        "loaded {} ({}x{}, {:?})",
        path.display(),
        image.width(),
        image.height(),
        image.color()
    );

    Ok(image.into_rgb8())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::ErrorKind;
    use image::{GrayImage, Luma, Rgba, RgbaImage};

    fn temp_path(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("chipwall-{}-{name}", std::process::id()))
    }

    #[test]
    fn missing_file() {
        let err = load_image(temp_path("does-not-exist.png")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedImageFormat);
    }

    #[test]
    fn not_an_image() {
        let path = temp_path("not-an-image.png");
        std::fs::write(&path, b"definitely not a png").unwrap();
        let err = load_image(&path).unwrap_err();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(err.kind(), ErrorKind::UnsupportedImageFormat);
    }

    #[test]
    fn grayscale_is_expanded() {
        let path = temp_path("gray.png");
        GrayImage::from_pixel(3, 2, Luma([77])).save(&path).unwrap();
        let image = load_image(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(image.dimensions(), (3, 2));
        assert!(image.pixels().all(|p| p.0 == [77, 77, 77]));
    }

    #[test]
    fn alpha_is_dropped() {
        let path = temp_path("alpha.png");
        RgbaImage::from_pixel(2, 2, Rgba([10, 20, 30, 40])).save(&path).unwrap();
        let image = load_image(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert!(image.pixels().all(|p| p.0 == [10, 20, 30]));
    }
}
