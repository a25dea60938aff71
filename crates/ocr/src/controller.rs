use std::time::{Duration, Instant};

use nota_categorize::{CategorizationService, MatchSource};
use nota_core::{ExtractionOutcome, Field, ParsedTransaction, UploadedFile};
use tokio::sync::Mutex;
use tracing::{debug, info, info_span, warn, Instrument};

use crate::error::{ControllerError, PipelineError};
use crate::extract::{CancelFlag, ExtractionError, TextExtraction, TextExtractor};
use crate::parser::TransactionParser;
use crate::state::{transition, Event, PipelineState, Step};
use crate::validate::FileValidator;

pub const DEFAULT_EXTRACTION_TIMEOUT: Duration = Duration::from_secs(30);

const KEYWORD_CATEGORY_CONFIDENCE: f32 = 0.90;
const CLASSIFIER_CATEGORY_CONFIDENCE: f32 = 0.50;

struct Inner {
    state: PipelineState,
    /// Cancel signal of the attempt currently in `Processing`, if any.
    in_flight: Option<CancelFlag>,
}

/// Runs one file at a time through validate → extract → parse → categorize
/// and keeps the result for the caller to review.
pub struct ExtractionController {
    validator: FileValidator,
    extractor: TextExtractor,
    parser: TransactionParser,
    categorizer: CategorizationService,
    timeout: Duration,
    inner: Mutex<Inner>,
}

impl ExtractionController {
    pub fn new(
        validator: FileValidator,
        extractor: TextExtractor,
        parser: TransactionParser,
        categorizer: CategorizationService,
    ) -> Self {
        Self {
            validator,
            extractor,
            parser,
            categorizer,
            timeout: DEFAULT_EXTRACTION_TIMEOUT,
            inner: Mutex::new(Inner { state: PipelineState::default(), in_flight: None }),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Process `file` to a terminal state.
    ///
    /// Validation, extraction and parse failures are not errors here: they
    /// land in the returned outcome and in the `Error` state. `Err` means the
    /// call was refused (another attempt is running) or its result was
    /// discarded because `reset` or `back` ran in the meantime.
    pub async fn select_file(&self, file: UploadedFile) -> Result<ExtractionOutcome, ControllerError> {
        let info = file.info();

        let (generation, cancel) = {
            let mut inner = self.inner.lock().await;
            if let Err(e) = self.validator.validate(&file) {
                let report = PipelineError::from(e).report();
                inner.state = transition(
                    &inner.state,
                    Event::Rejected { file: info, error: report.clone() },
                )?;
                info!("Rejected upload: {}", report.message);
                return Ok(ExtractionOutcome::failure(report, None, None));
            }
            inner.state = transition(&inner.state, Event::Selected { file: info })?;
            let cancel = CancelFlag::new();
            inner.in_flight = Some(cancel.clone());
            (inner.state.generation, cancel)
        };

        let span = info_span!(
            "pipeline.attempt",
            generation,
            media_type = %file.media_type,
            size = file.size
        );
        self.run_attempt(file, generation, cancel).instrument(span).await
    }

    async fn run_attempt(
        &self,
        file: UploadedFile,
        generation: u64,
        cancel: CancelFlag,
    ) -> Result<ExtractionOutcome, ControllerError> {
        info!("Extraction started");
        let started = Instant::now();
        let (text, parsed) = self.read_bounded(file, cancel).await;
        let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        let (event, outcome) = match parsed {
            Ok(mut tx) => {
                self.fill_category(&mut tx);
                info!(elapsed_ms, "Extraction finished");
                (
                    Event::Completed {
                        generation,
                        raw_text: text.clone(),
                        extraction: tx.clone(),
                        processing_time_ms: elapsed_ms,
                    },
                    ExtractionOutcome::success(text, tx, elapsed_ms),
                )
            }
            Err(e) => {
                let report = e.report();
                info!(elapsed_ms, "Extraction failed: {report}");
                (
                    Event::Failed {
                        generation,
                        raw_text: Some(text.clone()),
                        processing_time_ms: Some(elapsed_ms),
                        error: report.clone(),
                    },
                    ExtractionOutcome::failure(report, Some(text), Some(elapsed_ms)),
                )
            }
        };

        let mut inner = self.inner.lock().await;
        match transition(&inner.state, event) {
            Ok(next) => {
                inner.state = next;
                inner.in_flight = None;
                Ok(outcome)
            }
            Err(e) => {
                warn!("Discarding result of attempt {generation}: {e}");
                Err(ControllerError::Superseded { generation })
            }
        }
    }

    /// Extract and parse on the blocking pool, bounded by the timeout. Panics
    /// in the backend or parser come back as [`ExtractionError::Backend`].
    async fn read_bounded(
        &self,
        file: UploadedFile,
        cancel: CancelFlag,
    ) -> (String, Result<ParsedTransaction, PipelineError>) {
        let extractor = self.extractor.clone();
        let parser = self.parser.clone();
        let task_cancel = cancel.clone();
        let handle = tokio::task::spawn_blocking(move || {
            let TextExtraction { text, error, .. } = extractor.extract_with_cancel(&file, &task_cancel);
            let parsed = match error {
                Some(e) => Err(PipelineError::from(e)),
                None => parser.try_parse(&text).map_err(PipelineError::from),
            };
            (text, parsed)
        });

        match tokio::time::timeout(self.timeout, handle).await {
            Ok(Ok(read)) => read,
            Ok(Err(join)) => {
                warn!("Extraction task failed: {join}");
                (String::new(), Err(ExtractionError::Backend(join.to_string()).into()))
            }
            Err(_) => {
                cancel.cancel();
                let ms = u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX);
                warn!("Extraction timed out after {ms} ms");
                (String::new(), Err(ExtractionError::TimedOut { ms }.into()))
            }
        }
    }

    fn fill_category(&self, tx: &mut ParsedTransaction) {
        if tx.category.is_some() {
            return;
        }
        let Some(description) = tx.description.as_deref() else {
            return;
        };
        match self.categorizer.categorize_detailed(description) {
            Some(m) => {
                let confidence = match &m.source {
                    MatchSource::Keyword(keyword) => {
                        debug!("Category '{}' from keyword '{keyword}'", m.category);
                        KEYWORD_CATEGORY_CONFIDENCE
                    }
                    MatchSource::Classifier => {
                        debug!("Category '{}' from classifier", m.category);
                        CLASSIFIER_CATEGORY_CONFIDENCE
                    }
                };
                tx.category = Some(m.category);
                tx.set_confidence(Field::Category, confidence);
            }
            None => debug!("No category for '{description}'"),
        }
    }

    /// The extraction awaiting review, if the controller is in `Preview`.
    pub async fn apply_extraction(&self) -> Option<ParsedTransaction> {
        self.inner.lock().await.state.extraction.clone()
    }

    /// Leave `Preview` or `Error` for `Idle`, dropping the result.
    pub async fn back(&self) -> Result<(), ControllerError> {
        let mut inner = self.inner.lock().await;
        inner.state = transition(&inner.state, Event::Back)?;
        Ok(())
    }

    /// Force `Idle` from any state. An in-flight attempt is cancelled and its
    /// result will be discarded.
    pub async fn reset(&self) {
        let mut inner = self.inner.lock().await;
        if let Some(cancel) = inner.in_flight.take() {
            cancel.cancel();
        }
        if let Ok(next) = transition(&inner.state, Event::Reset) {
            inner.state = next;
        }
    }

    pub async fn snapshot(&self) -> PipelineState {
        self.inner.lock().await.state.clone()
    }

    pub async fn step(&self) -> Step {
        self.inner.lock().await.state.step
    }
}

impl std::fmt::Debug for ExtractionController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtractionController")
            .field("validator", &self.validator)
            .field("parser", &self.parser)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{DocumentBackend, DocumentError, FixtureBackend, PagedDocument};
    use crate::recognizer::MockRecognizer;
    use nota_categorize::{CategoryKeywordDictionary, SecondaryClassifier};
    use nota_core::{ErrorKind, Locale, MediaType, Money};
    use rust_decimal::Decimal;
    use std::str::FromStr;
    use std::sync::Arc;

    /// Document whose single page takes `delay` to read.
    struct SlowBackend {
        delay: Duration,
    }

    struct SlowDocument {
        delay: Duration,
    }

    impl DocumentBackend for SlowBackend {
        fn open(&self, _bytes: &[u8]) -> Result<Box<dyn PagedDocument>, DocumentError> {
            Ok(Box::new(SlowDocument { delay: self.delay }))
        }
    }

    impl PagedDocument for SlowDocument {
        fn page_count(&self) -> u32 {
            1
        }

        fn page_items(&self, _page: u32) -> Result<Vec<String>, DocumentError> {
            std::thread::sleep(self.delay);
            Ok(vec!["Kopi Kenangan".into(), "Total Rp 30.000".into()])
        }
    }

    fn controller_with(extractor: TextExtractor) -> ExtractionController {
        ExtractionController::new(
            FileValidator::default(),
            extractor,
            TransactionParser::new(Locale::Id),
            CategorizationService::new(CategoryKeywordDictionary::builtin(Locale::Id)),
        )
    }

    fn controller(pages: &[&[&str]]) -> ExtractionController {
        controller_with(TextExtractor::new(FixtureBackend::from_pages(pages), MockRecognizer::new("")))
    }

    fn pdf() -> UploadedFile {
        UploadedFile::new("application/pdf", b"%PDF-fixture".to_vec()).with_name("receipt.pdf")
    }

    fn money(s: &str) -> Money {
        Money::from_decimal(Decimal::from_str(s).unwrap())
    }

    async fn wait_for(c: &ExtractionController, step: Step) {
        for _ in 0..200 {
            if c.step().await == step {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("controller never reached {step}");
    }

    #[tokio::test]
    async fn disallowed_media_type_ends_in_validation_error() {
        let c = controller(&[&["unused"]]);
        let outcome = c.select_file(UploadedFile::new("text/plain", b"hello".to_vec())).await.unwrap();

        assert!(!outcome.success);
        assert_eq!(outcome.error_kind(), Some(ErrorKind::ValidationError));
        assert_eq!(outcome.processing_time_ms, None);

        let s = c.snapshot().await;
        assert_eq!(s.step, Step::Error);
        assert!(s.extraction.is_none());
        assert!(s.processing_time_ms.is_none());
        assert!(s.error.unwrap().message.contains("text/plain"));
        assert_eq!(s.file.unwrap().media_type, "text/plain");
    }

    #[tokio::test]
    async fn valid_file_reaches_preview_with_category() {
        let c = controller(&[&["Makan di Restoran Padang"], &["Total Rp 85.000"]]);
        let outcome = c.select_file(pdf()).await.unwrap();

        assert!(outcome.success, "{:?}", outcome.error);
        assert!(outcome.processing_time_ms.is_some());
        let tx = outcome.extraction.unwrap();
        assert_eq!(tx.amount, Some(money("85000")));
        assert_eq!(tx.description.as_deref(), Some("Makan di Restoran Padang"));
        assert_eq!(tx.category.as_deref(), Some("Makanan"));
        assert_eq!(tx.confidence_of(Field::Category), Some(KEYWORD_CATEGORY_CONFIDENCE));

        let s = c.snapshot().await;
        assert_eq!(s.step, Step::Preview);
        assert!(s.extraction.is_some());
        assert!(s.error.is_none());
        assert_eq!(s.raw_text.as_deref(), Some("Makan di Restoran Padang\nTotal Rp 85.000\n"));
        assert_eq!(s.file.unwrap().name.as_deref(), Some("receipt.pdf"));
        assert_eq!(c.apply_extraction().await, Some(tx));
    }

    #[tokio::test]
    async fn image_goes_through_the_recognizer() {
        let extractor = TextExtractor::new(
            FixtureBackend::corrupt(),
            MockRecognizer::new("Gaji Bulan Ini\nJumlah Rp 5.000.000"),
        )
        .with_preprocessing(false);
        let c = controller_with(extractor);

        let outcome = c.select_file(UploadedFile::new("image/jpeg", vec![0xFF; 32])).await.unwrap();
        let tx = outcome.extraction.unwrap();
        assert_eq!(tx.amount, Some(money("5000000")));
        assert_eq!(tx.category.as_deref(), Some("Gaji"));
    }

    #[tokio::test]
    async fn unknown_description_keeps_category_empty() {
        let c = controller(&[&["Unknown Transaction 123"]]);
        let tx = c.select_file(pdf()).await.unwrap().extraction.unwrap();
        assert_eq!(tx.category, None);
        assert_eq!(tx.confidence_of(Field::Category), None);
    }

    #[tokio::test]
    async fn secondary_classifier_fills_the_gap() {
        struct Everything;
        impl SecondaryClassifier for Everything {
            fn classify(&self, _description: &str) -> Option<String> {
                Some("Lainnya".into())
            }
        }

        let c = ExtractionController::new(
            FileValidator::default(),
            TextExtractor::new(FixtureBackend::from_pages(&[&["Unknown Transaction 123"]]), MockRecognizer::new("")),
            TransactionParser::default(),
            CategorizationService::with_classifier(CategoryKeywordDictionary::builtin(Locale::Id), Everything),
        );
        let tx = c.select_file(pdf()).await.unwrap().extraction.unwrap();
        assert_eq!(tx.category.as_deref(), Some("Lainnya"));
        assert_eq!(tx.confidence_of(Field::Category), Some(CLASSIFIER_CATEGORY_CONFIDENCE));
    }

    #[tokio::test]
    async fn corrupt_document_is_an_extraction_error() {
        let c = controller_with(TextExtractor::new(FixtureBackend::corrupt(), MockRecognizer::new("")));
        let outcome = c.select_file(pdf()).await.unwrap();

        assert_eq!(outcome.error_kind(), Some(ErrorKind::ExtractionError));
        assert!(outcome.processing_time_ms.is_some());
        assert_eq!(outcome.raw_text.as_deref(), Some(""));

        let s = c.snapshot().await;
        assert_eq!(s.step, Step::Error);
        assert!(s.processing_time_ms.is_some());
    }

    #[tokio::test]
    async fn unusable_text_is_a_parse_error() {
        let c = controller(&[&["!!! ???"]]);
        let outcome = c.select_file(pdf()).await.unwrap();

        assert_eq!(outcome.error_kind(), Some(ErrorKind::ParseError));
        assert_eq!(outcome.raw_text.as_deref(), Some("!!! ???\n"));
        assert!(c.apply_extraction().await.is_none());
    }

    #[tokio::test]
    async fn reset_clears_every_field() {
        let c = controller(&[&["Netflix Subscription Rp 186.000"]]);
        c.select_file(pdf()).await.unwrap();
        assert_eq!(c.step().await, Step::Preview);

        c.reset().await;
        let s = c.snapshot().await;
        assert_eq!(s.step, Step::Idle);
        assert!(s.file.is_none());
        assert!(s.raw_text.is_none());
        assert!(s.extraction.is_none());
        assert!(s.processing_time_ms.is_none());
        assert!(s.error.is_none());

        c.reset().await;
        assert_eq!(c.step().await, Step::Idle);
    }

    #[tokio::test]
    async fn back_returns_to_idle_only_from_terminal_states() {
        let c = controller(&[&["Netflix Subscription Rp 186.000"]]);
        assert!(matches!(c.back().await, Err(ControllerError::Transition(_))));

        c.select_file(UploadedFile::new("text/csv", b"a,b".to_vec())).await.unwrap();
        assert_eq!(c.step().await, Step::Error);
        c.back().await.unwrap();
        assert_eq!(c.snapshot().await, PipelineState { generation: 2, ..PipelineState::default() });
    }

    #[tokio::test]
    async fn new_file_can_follow_a_finished_attempt() {
        let c = controller(&[&["Topham Gojek Rp 20.000"]]);
        c.select_file(UploadedFile::new("text/plain", vec![1])).await.unwrap();
        let outcome = c.select_file(pdf()).await.unwrap();
        assert!(outcome.success);
        assert_eq!(outcome.extraction.unwrap().category.as_deref(), Some("Transportasi"));
        assert_eq!(c.snapshot().await.generation, 2);
    }

    #[tokio::test]
    async fn second_file_while_processing_is_refused_and_reset_supersedes() {
        let c = Arc::new(controller_with(TextExtractor::new(
            SlowBackend { delay: Duration::from_millis(300) },
            MockRecognizer::new(""),
        )));

        let first = tokio::spawn({
            let c = Arc::clone(&c);
            async move { c.select_file(pdf()).await }
        });
        wait_for(&c, Step::Processing).await;

        assert_eq!(c.select_file(pdf()).await, Err(ControllerError::Busy));
        // A rejected upload is refused too rather than clobbering the attempt.
        assert_eq!(
            c.select_file(UploadedFile::new("text/plain", vec![1])).await,
            Err(ControllerError::Busy)
        );

        c.reset().await;
        assert_eq!(c.step().await, Step::Idle);

        let result = first.await.unwrap();
        assert_eq!(result, Err(ControllerError::Superseded { generation: 1 }));
        assert_eq!(c.step().await, Step::Idle);
    }

    #[tokio::test]
    async fn slow_extraction_times_out() {
        let c = controller_with(TextExtractor::new(
            SlowBackend { delay: Duration::from_millis(300) },
            MockRecognizer::new(""),
        ))
        .with_timeout(Duration::from_millis(20));

        let outcome = c.select_file(pdf()).await.unwrap();
        assert_eq!(outcome.error_kind(), Some(ErrorKind::ExtractionError));
        assert!(outcome.error.unwrap().message.contains("timed out"));
        assert_eq!(c.step().await, Step::Error);
    }

    #[tokio::test]
    async fn long_statement_completes_within_the_timeout() {
        let mut lines = vec!["BANK MANDIRI".to_string(), "Gaji Bulan Ini".to_string()];
        lines.extend((0..4000).map(|i| format!("{:02}/03/2024 TRSF KE {i} Rp 1.000", i % 28 + 1)));
        lines.push("Jumlah Rp 5.000.000".to_string());
        let page: Vec<&str> = lines.iter().map(String::as_str).collect();

        let c = controller(&[page.as_slice()]).with_timeout(Duration::from_secs(10));
        let outcome = c.select_file(pdf()).await.unwrap();
        assert!(outcome.success, "{:?}", outcome.error);
        assert_eq!(outcome.extraction.unwrap().amount, Some(money("5000000")));
        assert_eq!(c.step().await, Step::Preview);
    }

    #[tokio::test]
    async fn allow_list_is_configurable() {
        let c = ExtractionController::new(
            FileValidator::new(vec![MediaType::Pdf], 1024),
            TextExtractor::new(FixtureBackend::from_pages(&[&["Total Rp 5.000"]]), MockRecognizer::new("x")),
            TransactionParser::default(),
            CategorizationService::new(CategoryKeywordDictionary::builtin(Locale::Id)),
        );
        let outcome = c.select_file(UploadedFile::new("image/png", vec![1; 8])).await.unwrap();
        assert_eq!(outcome.error_kind(), Some(ErrorKind::ValidationError));
    }
}
