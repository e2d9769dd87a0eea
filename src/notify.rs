use serde::Serialize;
use tokio::sync::mpsc;

use crate::error::{Operation, PipelineError};
use crate::models::{ClassificationResultSet, SlotKind, UploadedFile};

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum Severity {
    Info,
    Destructive,
}

/// Transient toast-style message for the presentation layer.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub title: String,
    pub description: String,
    pub severity: Severity,
}

impl Notification {
    pub fn info(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            severity: Severity::Info,
        }
    }

    pub fn destructive(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            severity: Severity::Destructive,
        }
    }

    pub fn model_ready(model: &UploadedFile) -> Self {
        Self::info(
            "Model uploaded successfully",
            format!("{} is ready for use", model.name),
        )
    }

    pub fn classification_complete(results: &ClassificationResultSet) -> Self {
        let description = match results.top() {
            Some(top) => format!(
                "Embryo classified as {} with {} confidence",
                top.label,
                top.confidence_percent()
            ),
            None => "No classes were predicted".to_string(),
        };
        Self::info("Classification complete", description)
    }

    pub fn analysis_complete() -> Self {
        Self::info(
            "Analysis complete",
            "Detailed analysis and performance metrics are now available",
        )
    }

    /// Message for a user-facing failure. `Busy`, `NoFile` and data errors stay silent.
    pub fn for_error(error: &PipelineError) -> Option<Self> {
        let notification = match error {
            PipelineError::InvalidFileType { kind: SlotKind::Image, .. } => Self::destructive(
                "Invalid file type",
                "Please upload a valid image file (PNG, JPG, JPEG)",
            ),
            PipelineError::InvalidFileType { kind: SlotKind::Model, .. } => Self::destructive(
                "Invalid file type",
                "Please upload a .h5, .keras, or .zip model file",
            ),
            PipelineError::MissingInput(SlotKind::Image) => {
                Self::destructive("No image uploaded", "Please upload an embryo image first")
            }
            PipelineError::MissingInput(SlotKind::Model) => {
                Self::destructive("No model uploaded", "Please upload your trained model first")
            }
            PipelineError::NoResultsYet => {
                Self::destructive("No classification results", "Please classify an image first")
            }
            PipelineError::OperationFailed { operation: Operation::Classify, .. } => {
                Self::destructive(
                    "Classification failed",
                    "Invalid input. Please upload a valid embryo image.",
                )
            }
            PipelineError::OperationFailed { operation: Operation::Analyze, .. } => {
                Self::destructive(
                    "Analysis failed",
                    "Analysis could not be completed. Please try again.",
                )
            }
            PipelineError::NoFile(_) | PipelineError::Busy(_) | PipelineError::InvalidData(_) => {
                return None
            }
        };
        Some(notification)
    }
}

/// Where notifications end up: a webview event, a log line, a test channel.
pub trait NotificationSink: Send + Sync {
    fn notify(&self, notification: Notification);
}

/// Writes notifications to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl NotificationSink for LogSink {
    fn notify(&self, notification: Notification) {
        match notification.severity {
            Severity::Info => log::info!("{}: {}", notification.title, notification.description),
            Severity::Destructive => {
                log::warn!("{}: {}", notification.title, notification.description)
            }
        }
    }
}

/// Forwards notifications over an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<Notification>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Notification>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl NotificationSink for ChannelSink {
    fn notify(&self, notification: Notification) {
        // Receiver gone means nobody is rendering; dropping is fine.
        let _ = self.tx.send(notification);
    }
}

/// Emits notifications to the webview as `notification` events.
#[cfg(feature = "desktop")]
pub struct EventSink {
    app_handle: tauri::AppHandle,
}

#[cfg(feature = "desktop")]
impl EventSink {
    pub fn new(app_handle: tauri::AppHandle) -> Self {
        Self { app_handle }
    }
}

#[cfg(feature = "desktop")]
impl NotificationSink for EventSink {
    fn notify(&self, notification: Notification) {
        use tauri::Emitter;

        if let Err(err) = self.app_handle.emit("notification", &notification) {
            log::error!("failed to emit notification: {err}");
        }
    }
}
