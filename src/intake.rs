//! Validation of picked or dropped files before they reach an upload slot.
//!
//! A picker yields zero or one candidate and a drop yields any number; both
//! go through [`accept`] so they share the same outcomes.

use crate::error::IntakeRejection;
use crate::models::{FileCandidate, SlotKind, UploadedFile};

/// Accepts the first candidate `kind` allows.
pub fn accept(kind: SlotKind, candidates: &[FileCandidate]) -> Result<UploadedFile, IntakeRejection> {
    if candidates.is_empty() {
        return Err(IntakeRejection::NoFile);
    }

    candidates
        .iter()
        .find(|candidate| kind.accepts(candidate))
        .map(|candidate| UploadedFile::from_candidate(kind, candidate))
        .ok_or(IntakeRejection::InvalidType)
}

/// File-picker entry point. `None` means the picker was cancelled.
pub fn from_pick(kind: SlotKind, picked: Option<FileCandidate>) -> Result<UploadedFile, IntakeRejection> {
    accept(kind, picked.as_slice())
}

pub fn from_drop(kind: SlotKind, dropped: &[FileCandidate]) -> Result<UploadedFile, IntakeRejection> {
    accept(kind, dropped)
}
