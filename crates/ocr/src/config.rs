use std::path::{Path, PathBuf};
use std::time::Duration;

use nota_categorize::{CategorizationService, CategoryKeywordDictionary, DictionaryError};
use nota_core::{Locale, MediaType};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::controller::ExtractionController;
use crate::document::LopdfBackend;
use crate::extract::TextExtractor;
use crate::parser::{TransactionParser, DEFAULT_MAX_DESCRIPTION_LEN};
use crate::recognizer::OcrBackend;
use crate::validate::FileValidator;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Unknown media type in allow-list: '{0}'")]
    UnknownMediaType(String),
    #[error("Failed to load category dictionary: {0}")]
    Dictionary(#[from] DictionaryError),
}

/// Pipeline settings, usually read from `config.toml`. Every field has a
/// default, so an empty file is a valid config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub allowed_media_types: Vec<String>,
    pub max_file_size_bytes: u64,
    pub locale: Locale,
    pub extraction_timeout_ms: u64,
    pub preprocess_images: bool,
    pub max_description_len: usize,
    /// Replaces the built-in dictionary for `locale` when set.
    pub dictionary_path: Option<PathBuf>,
    /// Tesseract language codes, e.g. `ind+eng`. Follows `locale` when unset.
    pub ocr_languages: Option<String>,
    /// Directory holding `*.traineddata`; Tesseract's own lookup when unset.
    pub tessdata_dir: Option<PathBuf>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            allowed_media_types: [MediaType::Pdf, MediaType::Png, MediaType::Jpeg]
                .iter()
                .map(|m| m.mime().to_string())
                .collect(),
            max_file_size_bytes: 10 * 1024 * 1024,
            locale: Locale::default(),
            extraction_timeout_ms: 30_000,
            preprocess_images: true,
            max_description_len: DEFAULT_MAX_DESCRIPTION_LEN,
            dictionary_path: None,
            ocr_languages: None,
            tessdata_dir: None,
        }
    }
}

impl PipelineConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Read a config file. Relative `dictionary_path` and `tessdata_dir` are
    /// resolved against the config file's directory.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let mut config = Self::from_toml_str(&content)?;
        if let Some(base) = path.parent() {
            for p in [config.dictionary_path.as_mut(), config.tessdata_dir.as_mut()]
                .into_iter()
                .flatten()
            {
                if p.is_relative() {
                    *p = base.join(&*p);
                }
            }
        }
        Ok(config)
    }

    /// Languages handed to the OCR engine.
    pub fn ocr_languages(&self) -> &str {
        match (&self.ocr_languages, self.locale) {
            (Some(languages), _) => languages,
            (None, Locale::Id) => "ind+eng",
            (None, Locale::En) => "eng",
        }
    }

    pub fn extraction_timeout(&self) -> Duration {
        Duration::from_millis(self.extraction_timeout_ms)
    }

    pub fn validator(&self) -> Result<FileValidator, ConfigError> {
        let allowed = self
            .allowed_media_types
            .iter()
            .map(|m| MediaType::from_mime(m).ok_or_else(|| ConfigError::UnknownMediaType(m.clone())))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(FileValidator::new(allowed, self.max_file_size_bytes))
    }

    pub fn parser(&self) -> TransactionParser {
        TransactionParser::new(self.locale).with_max_description_len(self.max_description_len)
    }

    pub fn dictionary(&self) -> Result<CategoryKeywordDictionary, ConfigError> {
        match &self.dictionary_path {
            Some(path) => Ok(CategoryKeywordDictionary::load(path)?),
            None => Ok(CategoryKeywordDictionary::builtin(self.locale)),
        }
    }

    pub fn categorizer(&self) -> Result<CategorizationService, ConfigError> {
        Ok(CategorizationService::new(self.dictionary()?))
    }

    /// A controller reading PDFs with `lopdf` and images with `recognizer`.
    pub fn controller(
        &self,
        recognizer: impl OcrBackend + 'static,
    ) -> Result<ExtractionController, ConfigError> {
        let extractor =
            TextExtractor::new(LopdfBackend, recognizer).with_preprocessing(self.preprocess_images);
        Ok(ExtractionController::new(
            self.validator()?,
            extractor,
            self.parser(),
            self.categorizer()?,
        )
        .with_timeout(self.extraction_timeout()))
    }
}
