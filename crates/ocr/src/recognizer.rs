use slipscan_core::OcrConfig;
use thiserror::Error;

use crate::preprocess::NormalizedImage;

#[derive(Debug, Error)]
pub enum OcrError {
    #[error("OCR engine unavailable: {0}")]
    Unavailable(String),
    #[error("OCR engine error: {0}")]
    Engine(String),
    #[error("Failed to hand image to OCR engine: {0}")]
    ImageHandoff(String),
}

/// Abstraction over an OCR engine.
///
/// Implementations receive the normalized image and a language hint such as
/// `eng+tha`, and return the engine's transcription. An empty string is a
/// valid answer; only an engine that cannot run at all should error.
pub trait OcrBackend: Send + Sync {
    fn recognize(&self, image: &NormalizedImage, lang: &str) -> Result<String, OcrError>;
}

impl<T: OcrBackend + ?Sized> OcrBackend for Box<T> {
    fn recognize(&self, image: &NormalizedImage, lang: &str) -> Result<String, OcrError> {
        (**self).recognize(image, lang)
    }
}

// ── Mock backend (always available, used for tests) ───────────────────────────

/// Returns a pre-set string, so the extraction pipeline can be tested
/// without Tesseract installed.
pub struct MockRecognizer {
    pub text: String,
}

impl MockRecognizer {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

impl OcrBackend for MockRecognizer {
    fn recognize(&self, _image: &NormalizedImage, _lang: &str) -> Result<String, OcrError> {
        Ok(self.text.clone())
    }
}

/// Stand-in used when no engine is compiled in.
pub struct UnavailableRecognizer;

impl OcrBackend for UnavailableRecognizer {
    fn recognize(&self, _image: &NormalizedImage, _lang: &str) -> Result<String, OcrError> {
        Err(OcrError::Unavailable(
            "Tesseract not available, build with the `tesseract` feature".to_string(),
        ))
    }
}

/// The engine this build can offer.
pub fn default_backend(config: &OcrConfig) -> Box<dyn OcrBackend> {
    #[cfg(feature = "tesseract")]
    {
        Box::new(tesseract_backend::TesseractRecognizer::new(config.data_path.clone()))
    }
    #[cfg(not(feature = "tesseract"))]
    {
        let _ = config;
        Box::new(UnavailableRecognizer)
    }
}

// ── Tesseract backend (optional, gated behind `tesseract` feature) ─────────────

#[cfg(feature = "tesseract")]
pub mod tesseract_backend {
    use super::{OcrBackend, OcrError};
    use crate::preprocess::NormalizedImage;
    use leptess::LepTess;
    use std::path::PathBuf;

    pub struct TesseractRecognizer {
        data_path: Option<PathBuf>,
    }

    impl TesseractRecognizer {
        pub fn new(data_path: Option<PathBuf>) -> Self {
            Self { data_path }
        }
    }

    impl OcrBackend for TesseractRecognizer {
        fn recognize(&self, image: &NormalizedImage, lang: &str) -> Result<String, OcrError> {
            let data_path = self.data_path.as_deref().and_then(|p| p.to_str());
            let mut lt = LepTess::new(data_path, lang)
                .map_err(|e| OcrError::Unavailable(e.to_string()))?;
            let png = image
                .to_png()
                .map_err(|e| OcrError::ImageHandoff(e.to_string()))?;
            lt.set_image_from_mem(&png)
                .map_err(|e| OcrError::ImageHandoff(e.to_string()))?;
            lt.get_utf8_text().map_err(|e| OcrError::Engine(e.to_string()))
        }
    }
}
