//! Poster cropping for landscape cover images.
//!
//! Covers are usually a landscape scan of a DVD sleeve with the front panel
//! on the right. A portrait poster is cut out of it at a 2:3 aspect ratio,
//! centered on a subject when one is known.

use std::io::Cursor;

use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageResult};
use tracing::debug;

pub const DEFAULT_JPEG_QUALITY: u8 = 90;

/// Horizontal crop window spanning the full image height.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropWindow {
    pub x: u32,
    pub width: u32,
}

/// Poster width for an image of the given height.
pub fn target_width(height: u32) -> u32 {
    ((u64::from(height) * 2 + 1) / 3) as u32
}

/// Whether an image of this size must be cropped to become a poster.
pub fn needs_crop(width: u32, height: u32) -> bool {
    target_width(height) < width
}

/// Crop window for an image, or `None` when it is already poster-shaped.
///
/// `poi` is the subject's x coordinate. Without one (or with a non-positive
/// one) the window is right-aligned.
pub fn crop_window(width: u32, height: u32, poi: Option<f64>) -> Option<CropWindow> {
    let tw = target_width(height);
    if tw >= width {
        return None;
    }

    let right = width - tw;
    let half = i64::from(tw / 2);
    let x = match poi.filter(|x| *x > 0.0) {
        Some(x) => {
            let x = x as i64;
            if x + half > i64::from(width) {
                right
            } else if x - half < 0 {
                0
            } else {
                ((x - half) as u32).min(right)
            }
        }
        None => right,
    };

    Some(CropWindow { x, width: tw })
}

pub struct PosterCropper {
    quality: u8,
}

impl Default for PosterCropper {
    fn default() -> Self {
        Self::new(DEFAULT_JPEG_QUALITY)
    }
}

impl PosterCropper {
    pub fn new(quality: u8) -> Self {
        Self {
            quality: quality.clamp(1, 100),
        }
    }

    pub fn decode(bytes: &[u8]) -> ImageResult<DynamicImage> {
        image::load_from_memory(bytes)
    }

    /// Cut `window` out of `image` and encode it as JPEG.
    pub fn crop(&self, image: &DynamicImage, window: CropWindow) -> ImageResult<Vec<u8>> {
        let height = image.height();
        let poster = image.crop_imm(window.x, 0, window.width, height).to_rgb8();

        let mut out = Cursor::new(Vec::new());
        JpegEncoder::new_with_quality(&mut out, self.quality).encode_image(&poster)?;
        let out = out.into_inner();

        debug!(
            from = %format!("{}x{}", image.width(), height),
            x = window.x,
            width = window.width,
            size = out.len(),
            "Cropped poster"
        );
        Ok(out)
    }
}
