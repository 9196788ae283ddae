//! QR code rendering

use image::{DynamicImage, ImageFormat, Luma};
use pollbot_core::providers::{DeliveryError, QrRenderer};
use qrcode::QrCode;
use std::io::Cursor;

/// Renders login URLs as grayscale PNG images
pub struct PngQrRenderer {
    min_size: u32,
}

impl PngQrRenderer {
    pub fn new(min_size: u32) -> Self {
        Self { min_size }
    }
}

impl Default for PngQrRenderer {
    fn default() -> Self {
        Self::new(256)
    }
}

impl QrRenderer for PngQrRenderer {
    fn render_png(&self, url: &str) -> Result<Vec<u8>, DeliveryError> {
        let code = QrCode::new(url.as_bytes()).map_err(|e| DeliveryError::Render(e.to_string()))?;
        let pixels = code
            .render::<Luma<u8>>()
            .min_dimensions(self.min_size, self.min_size)
            .build();

        let mut png = Cursor::new(Vec::new());
        DynamicImage::ImageLuma8(pixels)
            .write_to(&mut png, ImageFormat::Png)
            .map_err(|e| DeliveryError::Render(e.to_string()))?;
        Ok(png.into_inner())
    }
}
