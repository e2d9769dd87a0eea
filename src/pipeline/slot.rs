use serde::Serialize;

use crate::models::{SlotKind, UploadedFile};

/// Holds at most one uploaded file of a fixed kind.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UploadSlot {
    kind: SlotKind,
    content: Option<UploadedFile>,
}

impl UploadSlot {
    pub fn new(kind: SlotKind) -> Self {
        Self {
            kind,
            content: None,
        }
    }

    pub fn kind(&self) -> SlotKind {
        self.kind
    }

    /// Replaces whatever was held, returning the previous file.
    pub fn set(&mut self, file: UploadedFile) -> Option<UploadedFile> {
        self.content.replace(file)
    }

    pub fn clear(&mut self) -> Option<UploadedFile> {
        self.content.take()
    }

    pub fn get(&self) -> Option<&UploadedFile> {
        self.content.as_ref()
    }

    pub fn is_present(&self) -> bool {
        self.content.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FileCandidate;

    fn image(name: &str) -> UploadedFile {
        UploadedFile::from_candidate(SlotKind::Image, &FileCandidate::new(name, 1, "image/png"))
    }

    #[test]
    fn set_then_get_returns_same_file() {
        let mut slot = UploadSlot::new(SlotKind::Image);
        let file = image("a.png");
        assert!(slot.set(file.clone()).is_none());
        assert_eq!(slot.get(), Some(&file));
        assert!(slot.is_present());
    }

    #[test]
    fn clear_empties_slot() {
        let mut slot = UploadSlot::new(SlotKind::Image);
        slot.set(image("a.png"));
        assert!(slot.clear().is_some());
        assert_eq!(slot.get(), None);
        assert!(!slot.is_present());
        assert!(slot.clear().is_none());
    }

    #[test]
    fn set_replaces_without_merging() {
        let mut slot = UploadSlot::new(SlotKind::Image);
        let first = image("a.png");
        let second = image("b.png");
        slot.set(first.clone());
        assert_eq!(slot.set(second.clone()), Some(first));
        assert_eq!(slot.get(), Some(&second));
    }
}
