use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Operation, PipelineError};
use crate::models::{AnalysisBundle, ClassificationResultSet, SlotKind, UploadedFile};

use super::slot::UploadSlot;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum Stage {
    #[default]
    Idle,
    Classifying,
    Classified,
    Analyzing,
    Analyzed,
}

impl Stage {
    pub fn is_busy(&self) -> bool {
        matches!(self, Stage::Classifying | Stage::Analyzing)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Idle => "idle",
            Stage::Classifying => "classifying",
            Stage::Classified => "classified",
            Stage::Analyzing => "analyzing",
            Stage::Analyzed => "analyzed",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifies one backend invocation and the slot contents it was started
/// against. A completion is only applied while its stamp is still current.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct OperationStamp {
    pub seq: u64,
    pub operation: Operation,
    pub image_id: Uuid,
    pub model_id: Option<Uuid>,
}

#[derive(Debug, Clone)]
struct InFlight {
    stamp: OperationStamp,
    resume: Stage,
}

#[derive(Debug, Clone)]
pub struct ClassifyRequest {
    pub stamp: OperationStamp,
    pub image: UploadedFile,
    pub model: UploadedFile,
}

#[derive(Debug, Clone)]
pub struct AnalyzeRequest {
    pub stamp: OperationStamp,
    pub image: UploadedFile,
    pub results: ClassificationResultSet,
}

/// What happened to a backend result handed back to the state machine.
#[derive(Debug, Clone, PartialEq)]
pub enum Completion {
    Applied,
    Failed(PipelineError),
    /// The slots changed while the operation ran; the result was dropped.
    Stale,
}

/// Render view of the pipeline.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PipelineSnapshot {
    pub stage: Stage,
    pub image: Option<UploadedFile>,
    pub model: Option<UploadedFile>,
    pub image_present: bool,
    pub model_present: bool,
    pub results: Option<ClassificationResultSet>,
    pub analysis: Option<AnalysisBundle>,
    pub can_classify: bool,
    pub can_analyze: bool,
}

/// The upload / classify / analyze state machine. All mutation goes through
/// these methods; none of them suspends.
#[derive(Debug, Clone)]
pub struct PipelineState {
    image: UploadSlot,
    model: UploadSlot,
    stage: Stage,
    results: Option<ClassificationResultSet>,
    analysis: Option<AnalysisBundle>,
    in_flight: Option<InFlight>,
    next_seq: u64,
}

impl Default for PipelineState {
    fn default() -> Self {
        Self {
            image: UploadSlot::new(SlotKind::Image),
            model: UploadSlot::new(SlotKind::Model),
            stage: Stage::Idle,
            results: None,
            analysis: None,
            in_flight: None,
            next_seq: 1,
        }
    }
}

impl PipelineState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn image(&self) -> &UploadSlot {
        &self.image
    }

    pub fn model(&self) -> &UploadSlot {
        &self.model
    }

    pub fn results(&self) -> Option<&ClassificationResultSet> {
        self.results.as_ref()
    }

    pub fn analysis(&self) -> Option<&AnalysisBundle> {
        self.analysis.as_ref()
    }

    pub fn in_flight(&self) -> Option<&OperationStamp> {
        self.in_flight.as_ref().map(|op| &op.stamp)
    }

    pub fn can_classify(&self) -> bool {
        !self.stage.is_busy() && self.image.is_present() && self.model.is_present()
    }

    pub fn can_analyze(&self) -> bool {
        !self.stage.is_busy() && self.results.as_ref().is_some_and(|r| !r.is_empty())
    }

    pub fn snapshot(&self) -> PipelineSnapshot {
        PipelineSnapshot {
            stage: self.stage,
            image: self.image.get().cloned(),
            model: self.model.get().cloned(),
            image_present: self.image.is_present(),
            model_present: self.model.is_present(),
            results: self.results.clone(),
            analysis: self.analysis.clone(),
            can_classify: self.can_classify(),
            can_analyze: self.can_analyze(),
        }
    }

    /// Sets or replaces the image. Allowed in every stage; drops results and
    /// abandons any outstanding operation, which is returned.
    pub fn set_image(&mut self, file: UploadedFile) -> Option<OperationStamp> {
        self.image.set(file);
        self.reset()
    }

    pub fn clear_image(&mut self) -> Option<OperationStamp> {
        self.image.clear();
        self.reset()
    }

    fn reset(&mut self) -> Option<OperationStamp> {
        self.results = None;
        self.analysis = None;
        self.stage = Stage::Idle;
        self.in_flight.take().map(|op| op.stamp)
    }

    /// Sets or replaces the model. Existing results are kept.
    pub fn set_model(&mut self, file: UploadedFile) -> Result<(), PipelineError> {
        if self.stage.is_busy() {
            return Err(PipelineError::Busy(self.stage));
        }
        self.model.set(file);
        Ok(())
    }

    fn stamp(&mut self, operation: Operation, image_id: Uuid) -> OperationStamp {
        let seq = self.next_seq;
        self.next_seq += 1;
        OperationStamp {
            seq,
            operation,
            image_id,
            model_id: self.model.get().map(|m| m.id),
        }
    }

    pub fn begin_classify(&mut self) -> Result<ClassifyRequest, PipelineError> {
        if self.stage.is_busy() {
            return Err(PipelineError::Busy(self.stage));
        }
        let image = self
            .image
            .get()
            .cloned()
            .ok_or(PipelineError::MissingInput(self.image.kind()))?;
        let model = self
            .model
            .get()
            .cloned()
            .ok_or(PipelineError::MissingInput(self.model.kind()))?;

        let stamp = self.stamp(Operation::Classify, image.id);
        self.in_flight = Some(InFlight {
            stamp,
            resume: self.stage,
        });
        self.stage = Stage::Classifying;

        Ok(ClassifyRequest {
            stamp,
            image,
            model,
        })
    }

    pub fn finish_classify(
        &mut self,
        stamp: OperationStamp,
        outcome: Result<ClassificationResultSet, String>,
    ) -> Completion {
        let Some(resume) = self.take_current(&stamp, Stage::Classifying) else {
            return Completion::Stale;
        };

        match outcome {
            Ok(results) if !results.is_empty() => {
                self.results = Some(results);
                self.analysis = None;
                self.stage = Stage::Classified;
                Completion::Applied
            }
            Ok(_) => {
                self.stage = resume;
                Completion::Failed(PipelineError::OperationFailed {
                    operation: Operation::Classify,
                    reason: "classifier returned no results".into(),
                })
            }
            Err(reason) => {
                self.stage = resume;
                Completion::Failed(PipelineError::OperationFailed {
                    operation: Operation::Classify,
                    reason,
                })
            }
        }
    }

    pub fn begin_analyze(&mut self) -> Result<AnalyzeRequest, PipelineError> {
        if self.stage.is_busy() {
            return Err(PipelineError::Busy(self.stage));
        }
        let results = match &self.results {
            Some(results) if !results.is_empty() => results.clone(),
            _ => return Err(PipelineError::NoResultsYet),
        };
        let image = self
            .image
            .get()
            .cloned()
            .ok_or(PipelineError::MissingInput(self.image.kind()))?;

        let stamp = self.stamp(Operation::Analyze, image.id);
        self.in_flight = Some(InFlight {
            stamp,
            resume: self.stage,
        });
        self.stage = Stage::Analyzing;

        Ok(AnalyzeRequest {
            stamp,
            image,
            results,
        })
    }

    pub fn finish_analyze(
        &mut self,
        stamp: OperationStamp,
        outcome: Result<AnalysisBundle, String>,
    ) -> Completion {
        let Some(resume) = self.take_current(&stamp, Stage::Analyzing) else {
            return Completion::Stale;
        };

        match outcome {
            Ok(bundle) => {
                self.analysis = Some(bundle);
                self.stage = Stage::Analyzed;
                Completion::Applied
            }
            Err(reason) => {
                self.stage = resume;
                Completion::Failed(PipelineError::OperationFailed {
                    operation: Operation::Analyze,
                    reason,
                })
            }
        }
    }

    /// Clears the in-flight record if `stamp` still describes it and the
    /// slots still hold the files it was started against.
    fn take_current(&mut self, stamp: &OperationStamp, expected: Stage) -> Option<Stage> {
        let current = self.in_flight.as_ref()?;
        let matches = current.stamp == *stamp
            && self.stage == expected
            && self.image.get().map(|f| f.id) == Some(stamp.image_id)
            && self.model.get().map(|f| f.id) == stamp.model_id;
        if !matches {
            return None;
        }
        self.in_flight.take().map(|op| op.resume)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ClassificationResult, FileCandidate};
    use crate::mock::{MockAnalyzer, MockClassifier};

    fn image(name: &str) -> UploadedFile {
        UploadedFile::from_candidate(SlotKind::Image, &FileCandidate::new(name, 20480, "image/png"))
    }

    fn model(name: &str) -> UploadedFile {
        UploadedFile::from_candidate(SlotKind::Model, &FileCandidate::new(name, 1024, ""))
    }

    fn results() -> ClassificationResultSet {
        MockClassifier::fixed_results().unwrap()
    }

    fn ready() -> PipelineState {
        let mut state = PipelineState::new();
        state.set_image(image("embryo1.png"));
        state.set_model(model("model.h5")).unwrap();
        state
    }

    fn classified() -> PipelineState {
        let mut state = ready();
        let req = state.begin_classify().unwrap();
        assert_eq!(state.finish_classify(req.stamp, Ok(results())), Completion::Applied);
        state
    }

    fn analyzed() -> PipelineState {
        let mut state = classified();
        let req = state.begin_analyze().unwrap();
        let bundle = MockAnalyzer::fixed_bundle().unwrap();
        assert_eq!(state.finish_analyze(req.stamp, Ok(bundle)), Completion::Applied);
        state
    }

    #[test]
    fn starts_idle_and_empty() {
        let state = PipelineState::new();
        assert_eq!(state.stage(), Stage::Idle);
        assert!(!state.image().is_present());
        assert!(!state.model().is_present());
        assert!(state.results().is_none());
        assert!(!state.can_classify());
        assert!(!state.can_analyze());
    }

    #[test]
    fn classify_needs_both_slots() {
        let mut state = PipelineState::new();
        state.set_model(model("model.h5")).unwrap();
        let before = state.snapshot();
        assert_eq!(
            state.begin_classify().unwrap_err(),
            PipelineError::MissingInput(SlotKind::Image)
        );
        assert_eq!(state.snapshot(), before);

        let mut state = PipelineState::new();
        state.set_image(image("embryo1.png"));
        assert_eq!(
            state.begin_classify().unwrap_err(),
            PipelineError::MissingInput(SlotKind::Model)
        );
        assert_eq!(state.stage(), Stage::Idle);
        assert!(state.in_flight().is_none());
    }

    #[test]
    fn classify_moves_through_classifying() {
        let mut state = ready();
        let req = state.begin_classify().unwrap();
        assert_eq!(state.stage(), Stage::Classifying);
        assert_eq!(state.in_flight(), Some(&req.stamp));
        assert!(!state.can_classify());

        assert_eq!(state.finish_classify(req.stamp, Ok(results())), Completion::Applied);
        assert_eq!(state.stage(), Stage::Classified);
        assert_eq!(state.results().unwrap().top().unwrap().label, "3-2-2");
        assert!(state.can_analyze());
        assert!(state.in_flight().is_none());
    }

    #[test]
    fn second_classify_while_classifying_is_refused() {
        let mut state = ready();
        let first = state.begin_classify().unwrap();
        assert_eq!(
            state.begin_classify().unwrap_err(),
            PipelineError::Busy(Stage::Classifying)
        );
        assert_eq!(state.in_flight(), Some(&first.stamp));
    }

    #[test]
    fn failed_classify_restores_previous_stage() {
        let mut state = ready();
        let req = state.begin_classify().unwrap();
        let completion = state.finish_classify(req.stamp, Err("boom".into()));
        assert!(matches!(
            completion,
            Completion::Failed(PipelineError::OperationFailed { operation: Operation::Classify, .. })
        ));
        assert_eq!(state.stage(), Stage::Idle);
        assert!(state.results().is_none());

        let mut state = analyzed();
        let req = state.begin_classify().unwrap();
        state.finish_classify(req.stamp, Err("boom".into()));
        assert_eq!(state.stage(), Stage::Analyzed);
        assert!(state.results().is_some());
        assert!(state.analysis().is_some());
    }

    #[test]
    fn empty_classification_counts_as_failure() {
        let mut state = ready();
        let req = state.begin_classify().unwrap();
        let empty = ClassificationResultSet::new(Vec::new()).unwrap();
        assert!(matches!(state.finish_classify(req.stamp, Ok(empty)), Completion::Failed(_)));
        assert_eq!(state.stage(), Stage::Idle);
    }

    #[test]
    fn analyze_needs_results() {
        let mut state = ready();
        assert_eq!(state.begin_analyze().unwrap_err(), PipelineError::NoResultsYet);
        assert_eq!(state.stage(), Stage::Idle);
    }

    #[test]
    fn analyze_reaches_analyzed() {
        let state = analyzed();
        assert_eq!(state.stage(), Stage::Analyzed);
        let metrics = &state.analysis().unwrap().performance_metrics;
        assert_eq!(metrics.confusion_matrix.len(), metrics.class_labels.len());
    }

    #[test]
    fn failed_analyze_returns_to_classified() {
        let mut state = classified();
        let req = state.begin_analyze().unwrap();
        assert_eq!(state.stage(), Stage::Analyzing);
        assert!(matches!(
            state.finish_analyze(req.stamp, Err("nope".into())),
            Completion::Failed(PipelineError::OperationFailed { operation: Operation::Analyze, .. })
        ));
        assert_eq!(state.stage(), Stage::Classified);
        assert!(state.analysis().is_none());
    }

    #[test]
    fn image_change_resets_from_any_result_stage() {
        for mut state in [classified(), analyzed()] {
            state.clear_image();
            assert_eq!(state.stage(), Stage::Idle);
            assert!(state.results().is_none());
            assert!(state.analysis().is_none());
        }
        for mut state in [classified(), analyzed()] {
            state.set_image(image("embryo2.png"));
            assert_eq!(state.stage(), Stage::Idle);
            assert!(state.results().is_none());
            assert!(state.analysis().is_none());
            assert!(state.can_classify());
        }
    }

    #[test]
    fn model_change_keeps_results() {
        let mut state = analyzed();
        state.set_model(model("better.keras")).unwrap();
        assert_eq!(state.stage(), Stage::Analyzed);
        assert!(state.results().is_some());
        assert!(state.analysis().is_some());
        assert_eq!(state.model().get().unwrap().name, "better.keras");
    }

    #[test]
    fn model_change_while_busy_is_refused() {
        let mut state = ready();
        state.begin_classify().unwrap();
        assert_eq!(
            state.set_model(model("other.h5")).unwrap_err(),
            PipelineError::Busy(Stage::Classifying)
        );
    }

    #[test]
    fn clearing_image_mid_classification_discards_result() {
        let mut state = ready();
        let req = state.begin_classify().unwrap();
        assert_eq!(state.clear_image(), Some(req.stamp));
        assert_eq!(state.stage(), Stage::Idle);

        assert_eq!(state.finish_classify(req.stamp, Ok(results())), Completion::Stale);
        assert!(state.results().is_none());
        assert_eq!(state.stage(), Stage::Idle);
    }

    #[test]
    fn stale_result_cannot_land_on_new_operation() {
        let mut state = ready();
        let old = state.begin_classify().unwrap();
        state.set_image(image("embryo2.png"));
        let new = state.begin_classify().unwrap();
        assert_ne!(old.stamp, new.stamp);

        assert_eq!(state.finish_classify(old.stamp, Ok(results())), Completion::Stale);
        assert_eq!(state.stage(), Stage::Classifying);

        let other = ClassificationResultSet::new(vec![ClassificationResult::new("Early", 0.5)]).unwrap();
        assert_eq!(state.finish_classify(new.stamp, Ok(other)), Completion::Applied);
        assert_eq!(state.results().unwrap().top().unwrap().label, "Early");
    }

    #[test]
    fn reclassify_drops_previous_bundle() {
        let mut state = analyzed();
        let req = state.begin_classify().unwrap();
        assert_eq!(state.finish_classify(req.stamp, Ok(results())), Completion::Applied);
        assert_eq!(state.stage(), Stage::Classified);
        assert!(state.analysis().is_none());
    }

    #[test]
    fn reanalyze_from_analyzed_is_allowed() {
        let mut state = analyzed();
        assert!(state.can_analyze());
        let req = state.begin_analyze().unwrap();
        let bundle = MockAnalyzer::fixed_bundle().unwrap();
        assert_eq!(state.finish_analyze(req.stamp, Ok(bundle)), Completion::Applied);
        assert_eq!(state.stage(), Stage::Analyzed);
    }

    #[test]
    fn snapshot_serializes_camel_case() {
        let json = serde_json::to_value(classified().snapshot()).unwrap();
        assert_eq!(json["stage"], "classified");
        assert_eq!(json["imagePresent"], true);
        assert_eq!(json["canAnalyze"], true);
        assert_eq!(json["results"][0]["label"], "3-2-2");
    }
}
