//! Text recognition for image uploads. The engine is a trait object so the
//! pipeline runs without Tesseract installed; [`MockRecognizer`] drives tests
//! and golden fixtures.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OcrError {
    #[error("Could not start OCR engine for languages '{languages}': {reason}")]
    Init { languages: String, reason: String },
    #[error("OCR engine could not load the image: {0}")]
    Image(String),
    #[error("OCR engine failed: {0}")]
    Engine(String),
    #[error("Text recognition is not available; build with the `tesseract` feature")]
    NotAvailable,
}

/// Recognizes text in an encoded PNG or JPEG image.
pub trait OcrBackend: Send + Sync {
    fn recognize(&self, image: &[u8]) -> Result<String, OcrError>;
}

/// Replays one scripted result for every image and counts how often it was
/// asked. Clones share the counter.
#[derive(Debug, Clone)]
pub struct MockRecognizer {
    result: Result<String, OcrError>,
    calls: Arc<AtomicUsize>,
}

impl MockRecognizer {
    pub fn new(text: impl Into<String>) -> Self {
        Self { result: Ok(text.into()), calls: Arc::default() }
    }

    pub fn failing(error: OcrError) -> Self {
        Self { result: Err(error), calls: Arc::default() }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl OcrBackend for MockRecognizer {
    fn recognize(&self, _image: &[u8]) -> Result<String, OcrError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.result.clone()
    }
}

/// Stand-in used when no OCR engine was compiled in.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnavailableRecognizer;

impl OcrBackend for UnavailableRecognizer {
    fn recognize(&self, _image: &[u8]) -> Result<String, OcrError> {
        Err(OcrError::NotAvailable)
    }
}

// ── Tesseract ─────────────────────────────────────────────────────────────────

#[cfg(feature = "tesseract")]
pub mod tesseract_backend {
    use std::path::PathBuf;

    use super::{OcrBackend, OcrError};
    use leptess::LepTess;

    /// Tesseract through `leptess`. An engine is started per image, so the
    /// recognizer is freely shared across blocking tasks.
    #[derive(Debug, Clone)]
    pub struct TesseractRecognizer {
        languages: String,
        tessdata_dir: Option<PathBuf>,
    }

    impl TesseractRecognizer {
        /// `languages` uses Tesseract codes joined with `+`, e.g. `ind+eng`.
        pub fn new(languages: impl Into<String>) -> Self {
            Self { languages: languages.into(), tessdata_dir: None }
        }

        /// Look for trained data in `dir` instead of `TESSDATA_PREFIX`.
        pub fn with_tessdata_dir(mut self, dir: impl Into<PathBuf>) -> Self {
            self.tessdata_dir = Some(dir.into());
            self
        }

        fn init_error(&self, reason: impl ToString) -> OcrError {
            OcrError::Init { languages: self.languages.clone(), reason: reason.to_string() }
        }
    }

    impl OcrBackend for TesseractRecognizer {
        fn recognize(&self, image: &[u8]) -> Result<String, OcrError> {
            let data_path = match &self.tessdata_dir {
                Some(dir) => Some(
                    dir.to_str()
                        .ok_or_else(|| self.init_error("tessdata path is not valid UTF-8"))?,
                ),
                None => None,
            };
            let mut engine =
                LepTess::new(data_path, &self.languages).map_err(|e| self.init_error(e))?;
            engine.set_image_from_mem(image).map_err(|e| OcrError::Image(e.to_string()))?;
            engine.get_utf8_text().map_err(|e| OcrError::Engine(e.to_string()))
        }
    }
}
