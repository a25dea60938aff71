pub mod file;
pub mod locale;
pub mod money;
pub mod outcome;
pub mod transaction;

pub use file::{FileInfo, MediaType, UploadedFile};
pub use locale::Locale;
pub use money::Money;
pub use outcome::{ErrorKind, ExtractionOutcome, FailureReport};
pub use transaction::{Field, ParsedTransaction};
