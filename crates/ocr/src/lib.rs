pub mod config;
pub mod controller;
pub mod document;
pub mod error;
pub mod extract;
pub mod intake;
pub mod parser;
pub mod preprocess;
pub mod recognizer;
pub mod state;
pub mod validate;

pub use config::{ConfigError, PipelineConfig};
pub use controller::ExtractionController;
pub use document::{DocumentBackend, DocumentError, FixtureBackend, LopdfBackend, PagedDocument};
pub use error::{ControllerError, PipelineError};
pub use extract::{CancelFlag, ExtractionError, TextExtraction, TextExtractor};
pub use intake::spawn_intake_watcher;
pub use parser::{ParseError, TransactionParser};
pub use preprocess::{prepare_for_ocr, PreprocessError};
pub use recognizer::{MockRecognizer, OcrBackend, OcrError, UnavailableRecognizer};
pub use state::{transition, Event, PipelineState, Step, TransitionError};
pub use validate::{FileValidator, ValidationError};
