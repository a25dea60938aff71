use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use nota_core::UploadedFile;
use thiserror::Error;
use tracing::{debug, warn};

use crate::document::{DocumentBackend, DocumentError, LopdfBackend};
use crate::preprocess::{self, DEFAULT_MAX_DIMENSION};
use crate::recognizer::{OcrBackend, OcrError, UnavailableRecognizer};

#[derive(Debug, Clone, Error)]
pub enum ExtractionError {
    #[error(transparent)]
    Document(#[from] DocumentError),
    #[error("Document has no pages")]
    NoPages,
    #[error("Document contains no extractable text ({pages} page(s) read)")]
    NoExtractableText { pages: u32 },
    #[error("Could not read image: {0}")]
    UnreadableImage(String),
    #[error("Text recognition failed: {0}")]
    Recognition(#[from] OcrError),
    #[error("No extractor for media type '{0}'")]
    UnsupportedMediaType(String),
    #[error("Extraction was cancelled")]
    Cancelled,
    #[error("Extraction timed out after {ms} ms")]
    TimedOut { ms: u64 },
    #[error("Extraction backend failed: {0}")]
    Backend(String),
}

/// Shared cancellation signal for one extraction attempt.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Raw text pulled from one file.
///
/// `unit_count` is the number of pages for paginated documents and 1 for a
/// recognized image. On failure `text` is empty and `unit_count` is 0, except
/// for [`ExtractionError::NoExtractableText`], which keeps both.
#[derive(Debug, Clone)]
pub struct TextExtraction {
    pub text: String,
    pub unit_count: u32,
    pub error: Option<ExtractionError>,
}

impl TextExtraction {
    fn ok(text: String, unit_count: u32) -> Self {
        Self { text, unit_count, error: None }
    }

    pub fn failed(error: ExtractionError) -> Self {
        Self { text: String::new(), unit_count: 0, error: Some(error) }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Routes a file to page-by-page document reading or to image recognition.
#[derive(Clone)]
pub struct TextExtractor {
    documents: Arc<dyn DocumentBackend>,
    recognizer: Arc<dyn OcrBackend>,
    preprocess: bool,
    max_dimension: u32,
}

impl TextExtractor {
    pub fn new(
        documents: impl DocumentBackend + 'static,
        recognizer: impl OcrBackend + 'static,
    ) -> Self {
        Self {
            documents: Arc::new(documents),
            recognizer: Arc::new(recognizer),
            preprocess: true,
            max_dimension: DEFAULT_MAX_DIMENSION,
        }
    }

    /// Toggle grayscale/contrast normalization before recognition.
    pub fn with_preprocessing(mut self, enabled: bool) -> Self {
        self.preprocess = enabled;
        self
    }

    pub fn with_max_dimension(mut self, max_dimension: u32) -> Self {
        self.max_dimension = max_dimension.max(1);
        self
    }

    pub fn extract(&self, file: &UploadedFile) -> TextExtraction {
        self.extract_with_cancel(file, &CancelFlag::new())
    }

    /// Like [`extract`](Self::extract), but gives up with
    /// [`ExtractionError::Cancelled`] once `cancel` is set. The flag is polled
    /// before every page and before the recognizer is called.
    pub fn extract_with_cancel(&self, file: &UploadedFile, cancel: &CancelFlag) -> TextExtraction {
        match file.parsed_media_type() {
            Some(media) if media.is_paginated() => self.extract_pages(&file.bytes, cancel),
            Some(_) => self.extract_image(&file.bytes, cancel),
            None => TextExtraction::failed(ExtractionError::UnsupportedMediaType(file.media_type.clone())),
        }
    }

    fn extract_pages(&self, bytes: &[u8], cancel: &CancelFlag) -> TextExtraction {
        let doc = match self.documents.open(bytes) {
            Ok(doc) => doc,
            Err(e) => return TextExtraction::failed(e.into()),
        };
        let pages = doc.page_count();
        if pages == 0 {
            return TextExtraction::failed(ExtractionError::NoPages);
        }

        let mut text = String::new();
        for page in 1..=pages {
            if cancel.is_cancelled() {
                return TextExtraction::failed(ExtractionError::Cancelled);
            }
            match doc.page_items(page) {
                Ok(items) => {
                    debug!(page, items = items.len(), "page text extracted");
                    text.push_str(&items.join(" "));
                }
                Err(e) => warn!(page, error = %e, "page unreadable, continuing with empty text"),
            }
            text.push('\n');
        }

        if text.trim().is_empty() {
            return TextExtraction {
                text,
                unit_count: pages,
                error: Some(ExtractionError::NoExtractableText { pages }),
            };
        }
        TextExtraction::ok(text, pages)
    }

    fn extract_image(&self, bytes: &[u8], cancel: &CancelFlag) -> TextExtraction {
        let prepared;
        let input: &[u8] = if self.preprocess {
            match preprocess::prepare_for_ocr(bytes, self.max_dimension) {
                Ok(png) => {
                    prepared = png;
                    &prepared
                }
                Err(e) => return TextExtraction::failed(ExtractionError::UnreadableImage(e.to_string())),
            }
        } else {
            bytes
        };

        if cancel.is_cancelled() {
            return TextExtraction::failed(ExtractionError::Cancelled);
        }
        match self.recognizer.recognize(input) {
            Ok(text) => TextExtraction::ok(text.trim().to_string(), 1),
            Err(e) => TextExtraction::failed(e.into()),
        }
    }
}

impl Default for TextExtractor {
    /// `lopdf` for documents; no OCR engine.
    fn default() -> Self {
        Self::new(LopdfBackend, UnavailableRecognizer)
    }
}

impl std::fmt::Debug for TextExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextExtractor")
            .field("preprocess", &self.preprocess)
            .field("max_dimension", &self.max_dimension)
            .finish_non_exhaustive()
    }
}
