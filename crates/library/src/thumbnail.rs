//! Cover thumbnails.
//!
//! Thumbnails are stored through the backend under the library's
//! thumbnail directory, one JPEG per file id, and overwritten freely: two
//! scans racing to produce the same thumbnail both write the same bytes.

use crate::error::{ErrorKind, Result};
use comicback_config::ThumbnailConfig;
use exn::ResultExt;
use image::DynamicImage;
use image::codecs::jpeg::JpegEncoder;

/// Turns the first page of a comic into a small raster image.
pub trait Thumbnailer: Send + Sync {
    fn thumbnail(&self, page: &[u8]) -> Result<Vec<u8>>;
}

/// Decodes any supported page format and writes a downscaled JPEG.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageThumbnailer {
    max_width: u32,
    max_height: u32,
    quality: u8,
}

impl ImageThumbnailer {
    pub fn new(max_width: u32, max_height: u32, quality: u8) -> Self {
        Self { max_width, max_height, quality: quality.clamp(1, 100) }
    }
}

impl Default for ImageThumbnailer {
    fn default() -> Self {
        Self::from(&ThumbnailConfig::default())
    }
}

impl From<&ThumbnailConfig> for ImageThumbnailer {
    fn from(config: &ThumbnailConfig) -> Self {
        Self::new(config.max_width, config.max_height, config.quality)
    }
}

impl Thumbnailer for ImageThumbnailer {
    fn thumbnail(&self, page: &[u8]) -> Result<Vec<u8>> {
        let image = image::load_from_memory(page).or_raise(|| ErrorKind::Thumbnail)?;
        // Aspect ratio is kept; images already inside the box are left alone.
        let scaled = if image.width() > self.max_width || image.height() > self.max_height {
            image.thumbnail(self.max_width, self.max_height)
        } else {
            image
        };
        // JPEG has no alpha channel.
        let rgb = DynamicImage::ImageRgb8(scaled.to_rgb8());
        let mut buffer = Vec::new();
        rgb.write_with_encoder(JpegEncoder::new_with_quality(&mut buffer, self.quality))
            .or_raise(|| ErrorKind::Thumbnail)?;
        Ok(buffer)
    }
}
