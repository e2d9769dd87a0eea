use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

const MODEL_EXTENSIONS: [&str; 3] = [".h5", ".keras", ".zip"];

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum SlotKind {
    Image,
    Model,
}

impl SlotKind {
    /// Image slots take anything with an `image/` MIME prefix; model slots
    /// take Keras HDF5, native Keras, or zipped SavedModel archives.
    pub fn accepts(&self, candidate: &FileCandidate) -> bool {
        match self {
            SlotKind::Image => candidate.mime_type.starts_with("image/"),
            SlotKind::Model => MODEL_EXTENSIONS
                .iter()
                .any(|ext| candidate.name.ends_with(ext)),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SlotKind::Image => "image",
            SlotKind::Model => "model",
        }
    }
}

impl std::fmt::Display for SlotKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw `(name, size, type)` tuple handed over by a file picker or drop event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FileCandidate {
    pub name: String,
    pub size_bytes: u64,
    #[serde(default)]
    pub mime_type: String,
}

impl FileCandidate {
    pub fn new(name: impl Into<String>, size_bytes: u64, mime_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            size_bytes,
            mime_type: mime_type.into(),
        }
    }
}

/// An accepted upload. Replaced wholesale on re-upload, never edited.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UploadedFile {
    pub id: Uuid,
    pub kind: SlotKind,
    pub name: String,
    pub size_bytes: u64,
    pub mime_or_extension_hint: String,
    pub received_at: DateTime<Utc>,
}

impl UploadedFile {
    pub fn from_candidate(kind: SlotKind, candidate: &FileCandidate) -> Self {
        let hint = if candidate.mime_type.is_empty() {
            extension_of(&candidate.name).unwrap_or_default().to_string()
        } else {
            candidate.mime_type.clone()
        };

        Self {
            id: Uuid::new_v4(),
            kind,
            name: candidate.name.clone(),
            size_bytes: candidate.size_bytes,
            mime_or_extension_hint: hint,
            received_at: Utc::now(),
        }
    }

    /// Images read in KB, model archives in MB.
    pub fn display_size(&self) -> String {
        let bytes = self.size_bytes as f64;
        match self.kind {
            SlotKind::Image => format!("{:.1} KB", bytes / 1024.0),
            SlotKind::Model => format!("{:.2} MB", bytes / (1024.0 * 1024.0)),
        }
    }
}

fn extension_of(name: &str) -> Option<&str> {
    name.rfind('.').map(|idx| &name[idx..])
}
