pub mod analysis;
pub mod classification;
pub mod upload;

pub use analysis::{AnalysisBundle, ImageRef, PerformanceMetrics, PreprocessedImages};
pub use classification::{
    describe, grade_tone, short_describe, ClassificationResult, ClassificationResultSet,
    EmbryoClass, GradeTone, LabelDescription,
};
pub use upload::{FileCandidate, SlotKind, UploadedFile};
