#[cfg(feature = "desktop")]
pub mod commands;
pub mod controller;
pub mod slot;
pub mod state;

pub use controller::{OperationHandle, PipelineController};
pub use slot::UploadSlot;
pub use state::{
    AnalyzeRequest, ClassifyRequest, Completion, OperationStamp, PipelineSnapshot, PipelineState,
    Stage,
};
