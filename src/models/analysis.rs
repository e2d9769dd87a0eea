use serde::{Deserialize, Serialize};

use crate::error::PipelineError;

/// Opaque reference to a rendered image (a URL or data URI).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct ImageRef(pub String);

impl ImageRef {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PreprocessedImages {
    pub grayscale: ImageRef,
    pub edge_detected: ImageRef,
    pub histogram_equalized: ImageRef,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", try_from = "RawPerformanceMetrics")]
pub struct PerformanceMetrics {
    pub accuracy: f64,
    pub confusion_matrix: Vec<Vec<u32>>,
    pub class_labels: Vec<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawPerformanceMetrics {
    accuracy: f64,
    confusion_matrix: Vec<Vec<u32>>,
    class_labels: Vec<String>,
}

impl TryFrom<RawPerformanceMetrics> for PerformanceMetrics {
    type Error = PipelineError;

    fn try_from(raw: RawPerformanceMetrics) -> Result<Self, Self::Error> {
        Self::new(raw.accuracy, raw.confusion_matrix, raw.class_labels)
    }
}

impl PerformanceMetrics {
    /// The matrix must be N x N where N is the number of class labels.
    pub fn new(
        accuracy: f64,
        confusion_matrix: Vec<Vec<u32>>,
        class_labels: Vec<String>,
    ) -> Result<Self, PipelineError> {
        if !(0.0..=1.0).contains(&accuracy) {
            return Err(PipelineError::InvalidData(format!(
                "accuracy {accuracy} is outside [0, 1]"
            )));
        }

        let n = class_labels.len();
        if confusion_matrix.len() != n {
            return Err(PipelineError::InvalidData(format!(
                "confusion matrix has {} rows for {} labels",
                confusion_matrix.len(),
                n
            )));
        }
        if let Some((idx, row)) = confusion_matrix
            .iter()
            .enumerate()
            .find(|(_, row)| row.len() != n)
        {
            return Err(PipelineError::InvalidData(format!(
                "confusion matrix row {idx} has {} columns, expected {n}",
                row.len()
            )));
        }

        Ok(Self {
            accuracy,
            confusion_matrix,
            class_labels,
        })
    }

    pub fn dimension(&self) -> usize {
        self.class_labels.len()
    }

}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisBundle {
    pub preprocessed: PreprocessedImages,
    pub performance_metrics: PerformanceMetrics,
}
