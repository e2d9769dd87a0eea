//! Stand-in backends for classification and analysis.
//!
//! Both mocks wait a fixed latency on an injected [`Scheduler`] and then
//! resolve to a fixed payload. The traits are the seam a real inference
//! backend would plug into.

pub mod scheduler;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use futures::future::BoxFuture;
use futures::FutureExt;
use tokio::sync::watch;

use crate::models::{
    AnalysisBundle, ClassificationResult, ClassificationResultSet, EmbryoClass, ImageRef,
    PerformanceMetrics, PreprocessedImages, UploadedFile,
};
use crate::settings::PipelineSettings;

pub use scheduler::{ManualScheduler, Scheduler, TokioScheduler};

pub const DEFAULT_CLASSIFY_LATENCY: Duration = Duration::from_millis(2000);
pub const DEFAULT_ANALYZE_LATENCY: Duration = Duration::from_millis(1500);

pub trait Classifier: Send + Sync {
    /// Latency starts counting when this is called.
    fn classify(
        &self,
        image: &UploadedFile,
        model: &UploadedFile,
    ) -> BoxFuture<'static, Result<ClassificationResultSet>>;
}

pub trait Analyzer: Send + Sync {
    fn analyze(
        &self,
        image: &UploadedFile,
        results: &ClassificationResultSet,
    ) -> BoxFuture<'static, Result<AnalysisBundle>>;
}

pub struct MockClassifier {
    scheduler: Arc<dyn Scheduler>,
    settings: watch::Receiver<PipelineSettings>,
}

impl MockClassifier {
    pub fn new(scheduler: Arc<dyn Scheduler>, latency: Duration) -> Self {
        let settings = PipelineSettings {
            classify_latency_ms: latency.as_millis() as u64,
            ..PipelineSettings::default()
        };
        Self::from_settings(scheduler, fixed(settings))
    }

    /// The latency is read from `settings` on every call.
    pub fn from_settings(
        scheduler: Arc<dyn Scheduler>,
        settings: watch::Receiver<PipelineSettings>,
    ) -> Self {
        Self { scheduler, settings }
    }

    pub fn fixed_results() -> Result<ClassificationResultSet> {
        Ok(ClassificationResultSet::new(vec![
            ClassificationResult::new(EmbryoClass::ThreeTwoTwo.label(), 0.87),
            ClassificationResult::new(EmbryoClass::TwoTwoTwo.label(), 0.09),
            ClassificationResult::new(EmbryoClass::Morula.label(), 0.03),
            ClassificationResult::new(EmbryoClass::TwoOneThree.label(), 0.01),
        ])?)
    }
}

impl Classifier for MockClassifier {
    fn classify(
        &self,
        _image: &UploadedFile,
        _model: &UploadedFile,
    ) -> BoxFuture<'static, Result<ClassificationResultSet>> {
        let latency = self.settings.borrow().classify_latency();
        let delay = self.scheduler.sleep(latency);
        async move {
            delay.await;
            MockClassifier::fixed_results()
        }
        .boxed()
    }
}

pub struct MockAnalyzer {
    scheduler: Arc<dyn Scheduler>,
    settings: watch::Receiver<PipelineSettings>,
}

impl MockAnalyzer {
    pub fn new(scheduler: Arc<dyn Scheduler>, latency: Duration) -> Self {
        let settings = PipelineSettings {
            analyze_latency_ms: latency.as_millis() as u64,
            ..PipelineSettings::default()
        };
        Self::from_settings(scheduler, fixed(settings))
    }

    pub fn from_settings(
        scheduler: Arc<dyn Scheduler>,
        settings: watch::Receiver<PipelineSettings>,
    ) -> Self {
        Self { scheduler, settings }
    }

    pub fn fixed_bundle() -> Result<AnalysisBundle> {
        let confusion_matrix = vec![
            vec![45, 2, 1, 0, 1, 0, 1],
            vec![1, 38, 2, 1, 0, 1, 0],
            vec![0, 1, 42, 1, 0, 0, 1],
            vec![2, 0, 1, 35, 2, 1, 0],
            vec![0, 0, 0, 1, 28, 0, 0],
            vec![1, 0, 0, 0, 0, 33, 1],
            vec![0, 1, 0, 0, 1, 0, 31],
        ];
        let class_labels = EmbryoClass::ALL
            .iter()
            .map(|class| class.label().to_string())
            .collect();

        Ok(AnalysisBundle {
            preprocessed: PreprocessedImages {
                grayscale: placeholder_image("Grayscale", Backdrop::Solid("#f4f4f4"), "#666666"),
                edge_detected: placeholder_image(
                    "Edge Detected",
                    Backdrop::Solid("#000000"),
                    "#ffffff",
                ),
                histogram_equalized: placeholder_image(
                    "Histogram Equalized",
                    Backdrop::Diagonal("#eeeeee", "#999999"),
                    "#333333",
                ),
            },
            performance_metrics: PerformanceMetrics::new(0.9234, confusion_matrix, class_labels)?,
        })
    }
}

impl Analyzer for MockAnalyzer {
    fn analyze(
        &self,
        _image: &UploadedFile,
        _results: &ClassificationResultSet,
    ) -> BoxFuture<'static, Result<AnalysisBundle>> {
        let latency = self.settings.borrow().analyze_latency();
        let delay = self.scheduler.sleep(latency);
        async move {
            delay.await;
            MockAnalyzer::fixed_bundle()
        }
        .boxed()
    }
}

/// Settings feed that never changes.
fn fixed(settings: PipelineSettings) -> watch::Receiver<PipelineSettings> {
    watch::channel(settings).1
}

/// Fill behind a placeholder caption.
enum Backdrop<'a> {
    Solid(&'a str),
    Diagonal(&'a str, &'a str),
}

/// 200x200 SVG tile with a centred caption, as a data URI.
fn placeholder_image(caption: &str, backdrop: Backdrop<'_>, foreground: &str) -> ImageRef {
    let (defs, fill) = match backdrop {
        Backdrop::Solid(color) => (String::new(), color.to_string()),
        Backdrop::Diagonal(from, to) => (
            format!(
                "<defs><linearGradient id='a' x1='0%' y1='0%' x2='100%' y2='100%'>\
                 <stop offset='0%' stop-color='{from}'/>\
                 <stop offset='100%' stop-color='{to}'/></linearGradient></defs>"
            ),
            "url(#a)".to_string(),
        ),
    };
    let svg = format!(
        "<svg width='200' height='200' xmlns='http://www.w3.org/2000/svg'>{defs}\
         <rect width='200' height='200' fill='{fill}'/>\
         <text x='50%' y='50%' font-family='Arial' font-size='14' fill='{foreground}' \
         text-anchor='middle' dy='.3em'>{caption}</text></svg>"
    );
    let encoded: String = svg
        .chars()
        .map(|c| match c {
            '#' => "%23".to_string(),
            '%' => "%25".to_string(),
            '<' => "%3C".to_string(),
            '>' => "%3E".to_string(),
            ' ' => "%20".to_string(),
            other => other.to_string(),
        })
        .collect();
    ImageRef(format!("data:image/svg+xml;charset=utf-8,{encoded}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FileCandidate, SlotKind};
    use crate::settings::SettingsStore;

    fn files() -> (UploadedFile, UploadedFile) {
        (
            UploadedFile::from_candidate(SlotKind::Image, &FileCandidate::new("e.png", 1, "image/png")),
            UploadedFile::from_candidate(SlotKind::Model, &FileCandidate::new("m.h5", 1, "")),
        )
    }

    #[test]
    fn fixed_results_are_ranked() {
        let results = MockClassifier::fixed_results().unwrap();
        assert_eq!(results.len(), 4);
        assert_eq!(results.top().unwrap().label, "3-2-2");
        let sum: f32 = results.iter().map(|r| r.confidence).sum();
        assert!((sum - 1.0).abs() < 0.01);
    }

    #[test]
    fn fixed_bundle_has_square_matrix() {
        let bundle = MockAnalyzer::fixed_bundle().unwrap();
        let metrics = &bundle.performance_metrics;
        assert_eq!(metrics.dimension(), 7);
        assert_eq!(metrics.confusion_matrix.len(), 7);
        assert!(metrics.confusion_matrix.iter().all(|row| row.len() == 7));
        assert!(bundle.preprocessed.grayscale.as_str().starts_with("data:image/svg+xml"));
        assert!(!bundle.preprocessed.edge_detected.as_str().contains('#'));
    }

    #[test]
    fn histogram_placeholder_is_a_gradient() {
        let bundle = MockAnalyzer::fixed_bundle().unwrap();
        let histogram = bundle.preprocessed.histogram_equalized.as_str();
        assert!(histogram.contains("linearGradient"));
        assert!(histogram.contains("stop-color='%23eeeeee'"));
        assert!(histogram.contains("stop-color='%23999999'"));
        assert!(histogram.contains("fill='url(%23a)'"));
        assert!(!histogram.contains('#'));
        assert!(!bundle.preprocessed.grayscale.as_str().contains("linearGradient"));
    }

    #[tokio::test]
    async fn classifier_waits_for_latency() {
        let scheduler = Arc::new(ManualScheduler::new());
        let classifier = MockClassifier::new(scheduler.clone(), DEFAULT_CLASSIFY_LATENCY);
        let (image, model) = files();

        let mut pending = classifier.classify(&image, &model);
        assert!((&mut pending).now_or_never().is_none());

        scheduler.advance(DEFAULT_CLASSIFY_LATENCY);
        let results = pending.await.unwrap();
        assert_eq!(results.top().unwrap().label, "3-2-2");
    }

    #[tokio::test]
    async fn classifier_follows_stored_latency() {
        let dir = tempfile::tempdir().unwrap();
        let store = SettingsStore::new(dir.path().join("settings.json")).unwrap();
        let scheduler = Arc::new(ManualScheduler::new());
        let classifier = MockClassifier::from_settings(scheduler.clone(), store.subscribe_pipeline());
        let (image, model) = files();

        store
            .update_pipeline(PipelineSettings {
                classify_latency_ms: 50,
                analyze_latency_ms: 50,
            })
            .unwrap();

        let pending = classifier.classify(&image, &model);
        assert_eq!(scheduler.pending(), 1);
        scheduler.advance(Duration::from_millis(50));
        assert_eq!(scheduler.pending(), 0);
        assert_eq!(pending.await.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn analyzer_waits_for_latency() {
        let scheduler = Arc::new(ManualScheduler::new());
        let analyzer = MockAnalyzer::new(scheduler.clone(), DEFAULT_ANALYZE_LATENCY);
        let (image, _) = files();
        let results = MockClassifier::fixed_results().unwrap();

        let pending = analyzer.analyze(&image, &results);
        assert_eq!(scheduler.pending(), 1);
        scheduler.advance(DEFAULT_ANALYZE_LATENCY);
        assert_eq!(pending.await.unwrap().performance_metrics.dimension(), 7);
    }
}
