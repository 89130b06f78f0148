use image::{DynamicImage, GrayImage};
use imageproc::contrast::{otsu_level, threshold, ThresholdType};
use imageproc::filter::median_filter;
use slipscan_core::PreprocessConfig;
use std::io::Cursor;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum PreprocessError {
    #[error("Failed to decode image: {0}")]
    Decode(#[from] image::ImageError),
    #[error("Failed to encode processed image: {0}")]
    Encode(String),
}

/// Grayscale, two-level image ready for an OCR engine. Every pixel is 0 or 255.
#[derive(Debug, Clone)]
pub struct NormalizedImage(GrayImage);

impl NormalizedImage {
    pub fn width(&self) -> u32 {
        self.0.width()
    }

    pub fn height(&self) -> u32 {
        self.0.height()
    }

    pub fn as_gray(&self) -> &GrayImage {
        &self.0
    }

    /// PNG bytes, for engines that only accept encoded images.
    pub fn to_png(&self) -> Result<Vec<u8>, PreprocessError> {
        let mut buf = Vec::new();
        self.0
            .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
            .map_err(|e| PreprocessError::Encode(e.to_string()))?;
        Ok(buf)
    }
}

/// Grayscale → Otsu binarization → median denoise.
#[derive(Debug, Clone, Copy)]
pub struct Normalizer {
    median_radius: u32,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new(&PreprocessConfig::default())
    }
}

impl Normalizer {
    pub fn new(config: &PreprocessConfig) -> Self {
        Self { median_radius: config.median_radius }
    }

    pub fn normalize(&self, img: &DynamicImage) -> NormalizedImage {
        let gray: GrayImage = img.to_luma8();
        if gray.width() == 0 || gray.height() == 0 {
            return NormalizedImage(gray);
        }

        // Slip photos are unevenly lit, so the cutoff comes from the histogram.
        let level = otsu_level(&gray);
        let binary = threshold(&gray, level, ThresholdType::Binary);
        debug!(level, width = gray.width(), height = gray.height(), "otsu threshold applied");

        if self.median_radius == 0 {
            return NormalizedImage(binary);
        }
        // Median of a two-level neighbourhood is still two-level.
        NormalizedImage(median_filter(&binary, self.median_radius, self.median_radius))
    }

    /// Decode raw bytes (PNG / JPEG / …) and normalize.
    pub fn normalize_bytes(&self, data: &[u8]) -> Result<NormalizedImage, PreprocessError> {
        let img = image::load_from_memory(data)?;
        Ok(self.normalize(&img))
    }
}

/// Normalize with the default 3×3 median window.
pub fn normalize_bytes(data: &[u8]) -> Result<NormalizedImage, PreprocessError> {
    Normalizer::default().normalize_bytes(data)
}
