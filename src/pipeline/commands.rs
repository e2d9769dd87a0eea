use tauri::State;

use crate::{
    models::{FileCandidate, LabelDescription, SlotKind},
    pipeline::{PipelineController, PipelineSnapshot},
    settings::PipelineSettings,
};

use crate::AppState;

fn controller_from_state(state: &State<'_, AppState>) -> PipelineController {
    state.pipeline.clone()
}

#[tauri::command]
pub async fn get_pipeline_state(state: State<'_, AppState>) -> Result<PipelineSnapshot, String> {
    let controller = controller_from_state(&state);
    Ok(controller.get_snapshot().await)
}

#[tauri::command]
pub async fn pick_image(
    state: State<'_, AppState>,
    candidate: Option<FileCandidate>,
) -> Result<PipelineSnapshot, String> {
    let controller = controller_from_state(&state);
    controller
        .pick(SlotKind::Image, candidate)
        .await
        .map_err(|e| e.to_string())?;
    Ok(controller.get_snapshot().await)
}

#[tauri::command]
pub async fn drop_image(
    state: State<'_, AppState>,
    candidates: Vec<FileCandidate>,
) -> Result<PipelineSnapshot, String> {
    let controller = controller_from_state(&state);
    controller
        .drop_files(SlotKind::Image, &candidates)
        .await
        .map_err(|e| e.to_string())?;
    Ok(controller.get_snapshot().await)
}

#[tauri::command]
pub async fn pick_model(
    state: State<'_, AppState>,
    candidate: Option<FileCandidate>,
) -> Result<PipelineSnapshot, String> {
    let controller = controller_from_state(&state);
    controller
        .pick(SlotKind::Model, candidate)
        .await
        .map_err(|e| e.to_string())?;
    Ok(controller.get_snapshot().await)
}

#[tauri::command]
pub async fn drop_model(
    state: State<'_, AppState>,
    candidates: Vec<FileCandidate>,
) -> Result<PipelineSnapshot, String> {
    let controller = controller_from_state(&state);
    controller
        .drop_files(SlotKind::Model, &candidates)
        .await
        .map_err(|e| e.to_string())?;
    Ok(controller.get_snapshot().await)
}

#[tauri::command]
pub async fn clear_image(state: State<'_, AppState>) -> Result<PipelineSnapshot, String> {
    let controller = controller_from_state(&state);
    controller.clear_image().await;
    Ok(controller.get_snapshot().await)
}

/// Starts classification and returns immediately; completion arrives as a
/// `pipeline-state-changed` event.
#[tauri::command]
pub async fn classify_embryo(state: State<'_, AppState>) -> Result<PipelineSnapshot, String> {
    let controller = controller_from_state(&state);
    controller.classify().await.map_err(|e| e.to_string())?;
    Ok(controller.get_snapshot().await)
}

#[tauri::command]
pub async fn analyze_embryo(state: State<'_, AppState>) -> Result<PipelineSnapshot, String> {
    let controller = controller_from_state(&state);
    controller.analyze().await.map_err(|e| e.to_string())?;
    Ok(controller.get_snapshot().await)
}

#[tauri::command]
pub fn describe_label(state: State<'_, AppState>, label: String) -> LabelDescription {
    state.pipeline.describe_label(&label)
}

#[tauri::command]
pub fn get_pipeline_settings(state: State<'_, AppState>) -> PipelineSettings {
    state.settings.pipeline()
}

/// Persists new latencies; the next classify or analyze run uses them.
#[tauri::command]
pub fn set_pipeline_settings(
    state: State<'_, AppState>,
    settings: PipelineSettings,
) -> Result<(), String> {
    state
        .settings
        .update_pipeline(settings)
        .map_err(|e| e.to_string())
}
