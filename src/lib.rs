pub mod error;
pub mod intake;
pub mod mock;
pub mod models;
pub mod notify;
pub mod pipeline;
pub mod settings;
pub mod utils;

pub use error::{IntakeRejection, Operation, PipelineError};
pub use mock::{ManualScheduler, MockAnalyzer, MockClassifier, Scheduler, TokioScheduler};
pub use notify::{ChannelSink, LogSink, Notification, NotificationSink, Severity};
pub use pipeline::{PipelineController, PipelineSnapshot, PipelineState, Stage, UploadSlot};
pub use settings::{PipelineSettings, SettingsStore};
pub use utils::init_logging;

#[cfg(feature = "desktop")]
pub use desktop::run;

#[cfg(feature = "desktop")]
mod desktop {
    use std::sync::Arc;

    use tauri::{Emitter, Manager};

    use crate::{
        mock::TokioScheduler,
        notify::EventSink,
        pipeline::{commands, PipelineController},
        settings::SettingsStore,
        utils::init_logging,
    };

    pub(crate) struct AppState {
        pub(crate) pipeline: PipelineController,
        pub(crate) settings: SettingsStore,
    }

    #[cfg_attr(mobile, tauri::mobile_entry_point)]
    pub fn run() {
        init_logging();

        log::info!("Embryo Lens starting up...");

        tauri::Builder::default()
            .plugin(tauri_plugin_opener::init())
            .setup(|app| {
                let result = (|| -> anyhow::Result<()> {
                    let app_data_dir = app
                        .path()
                        .app_data_dir()
                        .map_err(|err| anyhow::anyhow!(err))?;
                    std::fs::create_dir_all(&app_data_dir)?;

                    let settings_path = app_data_dir.join("settings.json");
                    let settings_store = SettingsStore::new(settings_path)?;

                    let pipeline = PipelineController::with_mocks(
                        Arc::new(TokioScheduler),
                        settings_store.subscribe_pipeline(),
                        Arc::new(EventSink::new(app.handle().clone())),
                    );

                    // Push every state change to the webview.
                    let mut updates = pipeline.subscribe();
                    let app_handle = app.handle().clone();
                    tauri::async_runtime::spawn(async move {
                        while updates.changed().await.is_ok() {
                            let snapshot = updates.borrow_and_update().clone();
                            let _ = app_handle.emit("pipeline-state-changed", snapshot);
                        }
                    });

                    app.manage(AppState {
                        pipeline,
                        settings: settings_store,
                    });

                    Ok(())
                })();

                result.map_err(|err| err.into())
            })
            .invoke_handler(tauri::generate_handler![
                commands::get_pipeline_state,
                commands::pick_image,
                commands::drop_image,
                commands::pick_model,
                commands::drop_model,
                commands::clear_image,
                commands::classify_embryo,
                commands::analyze_embryo,
                commands::describe_label,
                commands::get_pipeline_settings,
                commands::set_pipeline_settings,
            ])
            .run(tauri::generate_context!())
            .expect("error while running tauri application");
    }
}

#[cfg(feature = "desktop")]
pub(crate) use desktop::AppState;
