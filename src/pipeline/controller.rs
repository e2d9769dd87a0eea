use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::{
    sync::{watch, Mutex},
    task::JoinHandle,
};
use tokio_util::sync::CancellationToken;

use crate::{
    error::PipelineError,
    intake,
    mock::{Analyzer, Classifier, MockAnalyzer, MockClassifier, Scheduler},
    models::{
        AnalysisBundle, ClassificationResultSet, FileCandidate, LabelDescription, SlotKind,
        UploadedFile,
    },
    notify::{Notification, NotificationSink},
    settings::PipelineSettings,
};
use crate::{log_debug, log_info, log_warn};

use super::state::{Completion, OperationStamp, PipelineSnapshot, PipelineState};

const ENABLE_LOGS: bool = true;

struct Shared {
    state: PipelineState,
    cancel: Option<CancellationToken>,
}

/// A running classify or analyze task.
#[derive(Debug)]
pub struct OperationHandle {
    stamp: OperationStamp,
    handle: JoinHandle<()>,
}

impl OperationHandle {
    pub fn stamp(&self) -> &OperationStamp {
        &self.stamp
    }

    /// Resolves once the result has been applied, rejected, or discarded.
    pub async fn wait(self) -> Result<()> {
        self.handle
            .await
            .context("pipeline operation task failed to join")
    }
}

/// Single owner of the pipeline state. Cloning shares the same pipeline.
#[derive(Clone)]
pub struct PipelineController {
    shared: Arc<Mutex<Shared>>,
    classifier: Arc<dyn Classifier>,
    analyzer: Arc<dyn Analyzer>,
    sink: Arc<dyn NotificationSink>,
    snapshots: Arc<watch::Sender<PipelineSnapshot>>,
}

impl PipelineController {
    pub fn new(
        classifier: Arc<dyn Classifier>,
        analyzer: Arc<dyn Analyzer>,
        sink: Arc<dyn NotificationSink>,
    ) -> Self {
        let state = PipelineState::new();
        let (snapshots, _) = watch::channel(state.snapshot());

        Self {
            shared: Arc::new(Mutex::new(Shared {
                state,
                cancel: None,
            })),
            classifier,
            analyzer,
            sink,
            snapshots: Arc::new(snapshots),
        }
    }

    /// Controller backed by the mock classifier and analyzer. Latencies are
    /// read from `settings` each time an operation starts.
    pub fn with_mocks(
        scheduler: Arc<dyn Scheduler>,
        settings: watch::Receiver<PipelineSettings>,
        sink: Arc<dyn NotificationSink>,
    ) -> Self {
        Self::new(
            Arc::new(MockClassifier::from_settings(scheduler.clone(), settings.clone())),
            Arc::new(MockAnalyzer::from_settings(scheduler, settings)),
            sink,
        )
    }

    pub async fn get_snapshot(&self) -> PipelineSnapshot {
        self.shared.lock().await.state.snapshot()
    }

    /// Receives a fresh snapshot after every state change.
    pub fn subscribe(&self) -> watch::Receiver<PipelineSnapshot> {
        self.snapshots.subscribe()
    }

    pub fn describe_label(&self, label: &str) -> LabelDescription {
        LabelDescription::for_label(label)
    }

    pub async fn pick(
        &self,
        kind: SlotKind,
        picked: Option<FileCandidate>,
    ) -> Result<UploadedFile, PipelineError> {
        let name = picked.as_ref().map(|c| c.name.clone());
        let outcome = intake::from_pick(kind, picked);
        self.store(kind, outcome.map_err(|r| PipelineError::from_rejection(kind, name.as_deref(), r)))
            .await
    }

    pub async fn drop_files(
        &self,
        kind: SlotKind,
        dropped: &[FileCandidate],
    ) -> Result<UploadedFile, PipelineError> {
        let name = dropped.first().map(|c| c.name.as_str());
        let outcome = intake::from_drop(kind, dropped);
        self.store(kind, outcome.map_err(|r| PipelineError::from_rejection(kind, name, r)))
            .await
    }

    async fn store(
        &self,
        kind: SlotKind,
        outcome: Result<UploadedFile, PipelineError>,
    ) -> Result<UploadedFile, PipelineError> {
        let file = match outcome {
            Ok(file) => file,
            Err(err) => {
                self.report(&err);
                return Err(err);
            }
        };

        {
            let mut shared = self.shared.lock().await;
            match kind {
                SlotKind::Image => {
                    let abandoned = shared.state.set_image(file.clone());
                    Self::cancel_abandoned(&mut shared, abandoned);
                }
                SlotKind::Model => {
                    if let Err(err) = shared.state.set_model(file.clone()) {
                        drop(shared);
                        self.report(&err);
                        return Err(err);
                    }
                }
            }
            self.publish(&shared.state);
        }

        log_info!(
            "{} uploaded: {} ({})",
            kind,
            file.name,
            file.display_size()
        );
        if kind == SlotKind::Model {
            self.sink.notify(Notification::model_ready(&file));
        }
        Ok(file)
    }

    pub async fn clear_image(&self) {
        let mut shared = self.shared.lock().await;
        let abandoned = shared.state.clear_image();
        Self::cancel_abandoned(&mut shared, abandoned);
        self.publish(&shared.state);
        log_info!("Image cleared");
    }

    fn cancel_abandoned(shared: &mut Shared, abandoned: Option<OperationStamp>) {
        if let Some(stamp) = abandoned {
            log_info!(
                "Abandoning {} #{} after image change",
                stamp.operation,
                stamp.seq
            );
        }
        if let Some(token) = shared.cancel.take() {
            token.cancel();
        }
    }

    pub async fn classify(&self) -> Result<OperationHandle, PipelineError> {
        let (stamp, pending, token) = {
            let mut shared = self.shared.lock().await;
            let request = match shared.state.begin_classify() {
                Ok(request) => request,
                Err(err) => {
                    drop(shared);
                    self.report(&err);
                    return Err(err);
                }
            };

            let pending = self.classifier.classify(&request.image, &request.model);
            let token = CancellationToken::new();
            shared.cancel = Some(token.clone());
            self.publish(&shared.state);
            log_info!(
                "Classifying {} with {} (#{})",
                request.image.name,
                request.model.name,
                request.stamp.seq
            );
            (request.stamp, pending, token)
        };

        let controller = self.clone();
        let handle = tokio::spawn(async move {
            let outcome = tokio::select! {
                _ = token.cancelled() => None,
                result = pending => Some(result),
            };
            match outcome {
                Some(result) => controller.complete_classify(stamp, result).await,
                None => log_debug!("Classification #{} cancelled", stamp.seq),
            }
        });

        Ok(OperationHandle { stamp, handle })
    }

    async fn complete_classify(
        &self,
        stamp: OperationStamp,
        result: Result<ClassificationResultSet>,
    ) {
        let (completion, results) = {
            let mut shared = self.shared.lock().await;
            let completion = shared
                .state
                .finish_classify(stamp, result.map_err(|err| format!("{err:#}")));
            if completion != Completion::Stale {
                shared.cancel = None;
                self.publish(&shared.state);
            }
            (completion, shared.state.results().cloned())
        };

        match completion {
            Completion::Applied => {
                if let Some(results) = results {
                    self.sink
                        .notify(Notification::classification_complete(&results));
                }
            }
            Completion::Failed(err) => self.report(&err),
            Completion::Stale => {
                log_warn!("Discarding stale classification result #{}", stamp.seq)
            }
        }
    }

    pub async fn analyze(&self) -> Result<OperationHandle, PipelineError> {
        let (stamp, pending, token) = {
            let mut shared = self.shared.lock().await;
            let request = match shared.state.begin_analyze() {
                Ok(request) => request,
                Err(err) => {
                    drop(shared);
                    self.report(&err);
                    return Err(err);
                }
            };

            let pending = self.analyzer.analyze(&request.image, &request.results);
            let token = CancellationToken::new();
            shared.cancel = Some(token.clone());
            self.publish(&shared.state);
            log_info!(
                "Analyzing {} (#{})",
                request.image.name,
                request.stamp.seq
            );
            (request.stamp, pending, token)
        };

        let controller = self.clone();
        let handle = tokio::spawn(async move {
            let outcome = tokio::select! {
                _ = token.cancelled() => None,
                result = pending => Some(result),
            };
            match outcome {
                Some(result) => controller.complete_analyze(stamp, result).await,
                None => log_debug!("Analysis #{} cancelled", stamp.seq),
            }
        });

        Ok(OperationHandle { stamp, handle })
    }

    async fn complete_analyze(
        &self,
        stamp: OperationStamp,
        result: Result<AnalysisBundle>,
    ) {
        let completion = {
            let mut shared = self.shared.lock().await;
            let completion = shared
                .state
                .finish_analyze(stamp, result.map_err(|err| format!("{err:#}")));
            if completion != Completion::Stale {
                shared.cancel = None;
                self.publish(&shared.state);
            }
            completion
        };

        match completion {
            Completion::Applied => self.sink.notify(Notification::analysis_complete()),
            Completion::Failed(err) => self.report(&err),
            Completion::Stale => log_warn!("Discarding stale analysis result #{}", stamp.seq),
        }
    }

    fn report(&self, err: &PipelineError) {
        match Notification::for_error(err) {
            Some(notification) => {
                log_warn!("{}", err);
                self.sink.notify(notification);
            }
            None => log_debug!("{}", err),
        }
    }

    fn publish(&self, state: &PipelineState) {
        self.snapshots.send_replace(state.snapshot());
    }
}
