use serde::{Deserialize, Serialize};

use crate::error::PipelineError;

const GENERIC_DESCRIPTION: &str = "Embryo classification result";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ClassificationResult {
    pub label: String,
    pub confidence: f32,
}

impl ClassificationResult {
    pub fn new(label: impl Into<String>, confidence: f32) -> Self {
        Self {
            label: label.into(),
            confidence,
        }
    }

    pub fn confidence_percent(&self) -> String {
        format!("{:.1}%", self.confidence * 100.0)
    }
}

/// Ranked display list, highest confidence first. Confidences are not
/// required to sum to one.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(
    try_from = "Vec<ClassificationResult>",
    into = "Vec<ClassificationResult>"
)]
pub struct ClassificationResultSet(Vec<ClassificationResult>);

impl TryFrom<Vec<ClassificationResult>> for ClassificationResultSet {
    type Error = PipelineError;

    fn try_from(results: Vec<ClassificationResult>) -> Result<Self, Self::Error> {
        Self::new(results)
    }
}

impl From<ClassificationResultSet> for Vec<ClassificationResult> {
    fn from(set: ClassificationResultSet) -> Self {
        set.0
    }
}

impl ClassificationResultSet {
    pub fn new(mut results: Vec<ClassificationResult>) -> Result<Self, PipelineError> {
        if let Some(bad) = results
            .iter()
            .find(|r| !(0.0..=1.0).contains(&r.confidence))
        {
            return Err(PipelineError::InvalidData(format!(
                "confidence {} for '{}' is outside [0, 1]",
                bad.confidence, bad.label
            )));
        }

        results.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        Ok(Self(results))
    }

    pub fn top(&self) -> Option<&ClassificationResult> {
        self.0.first()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ClassificationResult> {
        self.0.iter()
    }

    pub fn as_slice(&self) -> &[ClassificationResult] {
        &self.0
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum EmbryoClass {
    #[serde(rename = "1-1-2")]
    OneOneTwo,
    #[serde(rename = "2-2-2")]
    TwoTwoTwo,
    #[serde(rename = "3-2-2")]
    ThreeTwoTwo,
    #[serde(rename = "2-1-3")]
    TwoOneThree,
    Arrested,
    Morula,
    Early,
}

impl EmbryoClass {
    pub const ALL: [EmbryoClass; 7] = [
        EmbryoClass::OneOneTwo,
        EmbryoClass::TwoTwoTwo,
        EmbryoClass::ThreeTwoTwo,
        EmbryoClass::TwoOneThree,
        EmbryoClass::Arrested,
        EmbryoClass::Morula,
        EmbryoClass::Early,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            EmbryoClass::OneOneTwo => "1-1-2",
            EmbryoClass::TwoTwoTwo => "2-2-2",
            EmbryoClass::ThreeTwoTwo => "3-2-2",
            EmbryoClass::TwoOneThree => "2-1-3",
            EmbryoClass::Arrested => "Arrested",
            EmbryoClass::Morula => "Morula",
            EmbryoClass::Early => "Early",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|class| class.label() == label)
    }

    pub fn description(&self) -> &'static str {
        match self {
            EmbryoClass::OneOneTwo => "Day 2: 2-cell stage embryo with even blastomeres",
            EmbryoClass::TwoTwoTwo => "Day 2: 4-cell stage embryo with good morphology",
            EmbryoClass::ThreeTwoTwo => "Day 3: 8-cell stage embryo with excellent quality",
            EmbryoClass::TwoOneThree => "Day 2-3: Embryo with fragmentation",
            EmbryoClass::Arrested => "Development arrested - poor prognosis",
            EmbryoClass::Morula => "Day 4: Morula stage with compaction",
            EmbryoClass::Early => "Early cleavage stage embryo",
        }
    }

    /// Description up to the first " - " separator.
    pub fn short_description(&self) -> &'static str {
        let full = self.description();
        full.split(" - ").next().unwrap_or(full)
    }
}

/// Badge tone used when rendering a label.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum GradeTone {
    Excellent,
    Good,
    Poor,
    Compacted,
    Neutral,
}

pub fn describe(label: &str) -> &'static str {
    EmbryoClass::from_label(label)
        .map(|class| class.description())
        .unwrap_or(GENERIC_DESCRIPTION)
}

pub fn short_describe(label: &str) -> &str {
    match EmbryoClass::from_label(label) {
        Some(class) => class.short_description(),
        None => label,
    }
}

// Substring match, so composite labels such as "3-2-2 (borderline)" keep their tone.
pub fn grade_tone(label: &str) -> GradeTone {
    if label.contains("3-2-2") {
        GradeTone::Excellent
    } else if label.contains("2-2-2") {
        GradeTone::Good
    } else if label.contains("Arrested") {
        GradeTone::Poor
    } else if label.contains("Morula") {
        GradeTone::Compacted
    } else {
        GradeTone::Neutral
    }
}

/// Everything the results view needs to render one label.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LabelDescription {
    pub label: String,
    pub description: String,
    pub short_description: String,
    pub tone: GradeTone,
}

impl LabelDescription {
    pub fn for_label(label: &str) -> Self {
        Self {
            label: label.to_string(),
            description: describe(label).to_string(),
            short_description: short_describe(label).to_string(),
            tone: grade_tone(label),
        }
    }
}
