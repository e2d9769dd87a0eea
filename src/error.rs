use serde::Serialize;
use thiserror::Error;

use crate::models::SlotKind;
use crate::pipeline::Stage;

/// Why a candidate was refused at intake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Error)]
#[serde(rename_all = "kebab-case")]
pub enum IntakeRejection {
    #[error("no-file")]
    NoFile,
    #[error("invalid-type")]
    InvalidType,
}

impl IntakeRejection {
    pub fn as_str(&self) -> &'static str {
        match self {
            IntakeRejection::NoFile => "no-file",
            IntakeRejection::InvalidType => "invalid-type",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Operation {
    Classify,
    Analyze,
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Operation::Classify => write!(f, "classification"),
            Operation::Analyze => write!(f, "analysis"),
        }
    }
}

/// Every failure the pipeline reports back to the presentation layer.
/// None of them is fatal; the pipeline stays in its last valid state.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PipelineError {
    #[error("invalid file type for {kind} slot: {name}")]
    InvalidFileType { kind: SlotKind, name: String },

    #[error("no file supplied for {0} slot")]
    NoFile(SlotKind),

    #[error("cannot classify without an uploaded {0}")]
    MissingInput(SlotKind),

    #[error("no classification results to analyze")]
    NoResultsYet,

    #[error("pipeline is busy ({0})")]
    Busy(Stage),

    #[error("{operation} failed: {reason}")]
    OperationFailed { operation: Operation, reason: String },

    #[error("invalid data: {0}")]
    InvalidData(String),
}

impl PipelineError {
    pub fn from_rejection(kind: SlotKind, name: Option<&str>, rejection: IntakeRejection) -> Self {
        match rejection {
            IntakeRejection::NoFile => PipelineError::NoFile(kind),
            IntakeRejection::InvalidType => PipelineError::InvalidFileType {
                kind,
                name: name.unwrap_or_default().to_string(),
            },
        }
    }
}
