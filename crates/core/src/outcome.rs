use serde::{Deserialize, Serialize};
use std::fmt;

use super::transaction::ParsedTransaction;

/// Machine-distinguishable failure class of one pipeline attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    ValidationError,
    ExtractionError,
    ParseError,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::ValidationError => write!(f, "ValidationError"),
            ErrorKind::ExtractionError => write!(f, "ExtractionError"),
            ErrorKind::ParseError => write!(f, "ParseError"),
        }
    }
}

/// A classified, human-readable failure carried in controller state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureReport {
    pub kind: ErrorKind,
    pub message: String,
}

impl FailureReport {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into() }
    }
}

impl fmt::Display for FailureReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

/// Result of one `select_file` attempt as reported to the caller.
///
/// Exactly one of `extraction` / `error` is set. Build it through
/// [`ExtractionOutcome::success`] or [`ExtractionOutcome::failure`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionOutcome {
    pub success: bool,
    pub raw_text: Option<String>,
    pub extraction: Option<ParsedTransaction>,
    pub processing_time_ms: Option<u64>,
    pub error: Option<FailureReport>,
}

impl ExtractionOutcome {
    pub fn success(raw_text: String, extraction: ParsedTransaction, processing_time_ms: u64) -> Self {
        Self {
            success: true,
            raw_text: Some(raw_text),
            extraction: Some(extraction),
            processing_time_ms: Some(processing_time_ms),
            error: None,
        }
    }

    /// `raw_text` and `processing_time_ms` are present only when the attempt
    /// got as far as the extractor.
    pub fn failure(
        error: FailureReport,
        raw_text: Option<String>,
        processing_time_ms: Option<u64>,
    ) -> Self {
        Self {
            success: false,
            raw_text,
            extraction: None,
            processing_time_ms,
            error: Some(error),
        }
    }

    pub fn error_kind(&self) -> Option<ErrorKind> {
        self.error.as_ref().map(|e| e.kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_has_extraction_and_no_error() {
        let o = ExtractionOutcome::success("text".into(), ParsedTransaction::default(), 12);
        assert!(o.success);
        assert!(o.extraction.is_some());
        assert!(o.error.is_none());
        assert_eq!(o.processing_time_ms, Some(12));
    }

    #[test]
    fn failure_has_error_and_no_extraction() {
        let o = ExtractionOutcome::failure(
            FailureReport::new(ErrorKind::ValidationError, "too big"),
            None,
            None,
        );
        assert!(!o.success);
        assert!(o.extraction.is_none());
        assert_eq!(o.error_kind(), Some(ErrorKind::ValidationError));
        assert_eq!(o.processing_time_ms, None);
    }

    #[test]
    fn serializes_camel_case() {
        let o = ExtractionOutcome::failure(
            FailureReport::new(ErrorKind::ParseError, "nothing usable"),
            Some("???".into()),
            Some(3),
        );
        let json = serde_json::to_value(&o).unwrap();
        assert_eq!(json["processingTimeMs"], 3);
        assert_eq!(json["rawText"], "???");
        assert_eq!(json["error"]["kind"], "ParseError");
    }

    #[test]
    fn failure_report_display() {
        let r = FailureReport::new(ErrorKind::ExtractionError, "corrupt PDF");
        assert_eq!(r.to_string(), "ExtractionError: corrupt PDF");
    }
}
