//! Lifecycle of one extraction controller as plain data.
//!
//! `transition` is a pure function so every legal and illegal move can be
//! checked without a runtime; the controller only feeds it events.

use std::fmt;

use nota_core::{FailureReport, FileInfo, ParsedTransaction};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    #[default]
    Idle,
    Processing,
    /// Terminal success: an extraction is ready for review.
    Preview,
    /// Terminal failure for the attempt.
    Error,
}

impl Step {
    pub fn is_terminal(self) -> bool {
        matches!(self, Step::Preview | Step::Error)
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Step::Idle => "idle",
            Step::Processing => "processing",
            Step::Preview => "preview",
            Step::Error => "error",
        };
        f.write_str(s)
    }
}

/// Everything a caller may render about the current attempt.
///
/// `extraction` is set only in [`Step::Preview`] and `error` only in
/// [`Step::Error`]. `generation` grows on every new attempt, `back` and
/// `reset`, and never resets.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineState {
    pub step: Step,
    pub generation: u64,
    pub file: Option<FileInfo>,
    pub raw_text: Option<String>,
    pub extraction: Option<ParsedTransaction>,
    pub processing_time_ms: Option<u64>,
    pub error: Option<FailureReport>,
}

impl PipelineState {
    fn idle(generation: u64) -> Self {
        Self { generation, ..Self::default() }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// A file passed validation; extraction starts.
    Selected { file: FileInfo },
    /// A file failed validation and never reached the extractor.
    Rejected { file: FileInfo, error: FailureReport },
    Completed {
        generation: u64,
        raw_text: String,
        extraction: ParsedTransaction,
        processing_time_ms: u64,
    },
    Failed {
        generation: u64,
        raw_text: Option<String>,
        processing_time_ms: Option<u64>,
        error: FailureReport,
    },
    Back,
    Reset,
}

impl Event {
    fn name(&self) -> &'static str {
        match self {
            Event::Selected { .. } => "select a file",
            Event::Rejected { .. } => "reject a file",
            Event::Completed { .. } => "complete",
            Event::Failed { .. } => "fail",
            Event::Back => "go back",
            Event::Reset => "reset",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("A file is already being processed")]
    Busy,
    #[error("Result belongs to attempt {got}, but the current attempt is {current}")]
    Stale { got: u64, current: u64 },
    #[error("Cannot {event} while {step}")]
    Invalid { event: &'static str, step: Step },
}

/// Apply `event` to `state`, returning the next state.
pub fn transition(state: &PipelineState, event: Event) -> Result<PipelineState, TransitionError> {
    let invalid = |event: &Event| TransitionError::Invalid { event: event.name(), step: state.step };

    match event {
        Event::Selected { file } => match state.step {
            Step::Processing => Err(TransitionError::Busy),
            _ => Ok(PipelineState {
                step: Step::Processing,
                file: Some(file),
                ..PipelineState::idle(state.generation + 1)
            }),
        },
        Event::Rejected { file, error } => match state.step {
            Step::Processing => Err(TransitionError::Busy),
            _ => Ok(PipelineState {
                step: Step::Error,
                file: Some(file),
                error: Some(error),
                ..PipelineState::idle(state.generation + 1)
            }),
        },
        Event::Completed { generation, .. } | Event::Failed { generation, .. }
            if generation != state.generation =>
        {
            Err(TransitionError::Stale { got: generation, current: state.generation })
        }
        ref e @ (Event::Completed { .. } | Event::Failed { .. }) if state.step != Step::Processing => {
            Err(invalid(e))
        }
        Event::Completed { raw_text, extraction, processing_time_ms, .. } => Ok(PipelineState {
            step: Step::Preview,
            raw_text: Some(raw_text),
            extraction: Some(extraction),
            processing_time_ms: Some(processing_time_ms),
            error: None,
            ..state.clone()
        }),
        Event::Failed { raw_text, processing_time_ms, error, .. } => Ok(PipelineState {
            step: Step::Error,
            raw_text,
            extraction: None,
            processing_time_ms,
            error: Some(error),
            ..state.clone()
        }),
        Event::Back if state.step.is_terminal() => Ok(PipelineState::idle(state.generation + 1)),
        ref e @ Event::Back => Err(invalid(e)),
        Event::Reset => Ok(PipelineState::idle(state.generation + 1)),
    }
}
