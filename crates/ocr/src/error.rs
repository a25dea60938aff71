use nota_core::{ErrorKind, FailureReport};
use thiserror::Error;

use crate::extract::ExtractionError;
use crate::parser::ParseError;
use crate::state::TransitionError;
use crate::validate::ValidationError;

/// Any failure that ends a single pipeline attempt.
#[derive(Debug, Clone, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Extraction(#[from] ExtractionError),
    #[error(transparent)]
    Parse(#[from] ParseError),
}

impl PipelineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PipelineError::Validation(_) => ErrorKind::ValidationError,
            PipelineError::Extraction(_) => ErrorKind::ExtractionError,
            PipelineError::Parse(_) => ErrorKind::ParseError,
        }
    }

    pub fn report(&self) -> FailureReport {
        FailureReport::new(self.kind(), self.to_string())
    }
}

/// Why a controller call was refused outright, as opposed to an attempt that
/// ran and failed (which is reported through the outcome and state).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ControllerError {
    #[error("A file is already being processed")]
    Busy,
    #[error("Attempt {generation} was superseded before it finished")]
    Superseded { generation: u64 },
    #[error(transparent)]
    Transition(TransitionError),
}

impl From<TransitionError> for ControllerError {
    fn from(err: TransitionError) -> Self {
        match err {
            TransitionError::Busy => ControllerError::Busy,
            other => ControllerError::Transition(other),
        }
    }
}
