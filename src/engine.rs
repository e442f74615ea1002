//! # Analysis Engine
//! Turns a completed diary into an [`AnalysisResult`] through one of two
//! interchangeable strategies, picked by configuration:
//!
//! - `allergen`: majority-allergen scoring biased by model adjustments.
//! - `classifier`: the same scoring, plus a learned culprit-food
//!   prediction from recent confirmed feedback (falls back to the
//!   most-eaten food while training data is scarce).
//!
//! Reference data is passed in explicitly; there is no process-wide state.

use std::sync::Arc;

use metrics::counter;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::classifier::{self, ClassifierConfig};
use crate::diary::Diary;
use crate::feedback::{FeedbackRecord, ModelAdjustments};
use crate::reference::ReferenceData;
use crate::scoring::{score_allergens, AnalysisResult};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    #[default]
    Allergen,
    Classifier,
}

impl StrategyKind {
    pub fn as_str(self) -> &'static str {
        match self {
            StrategyKind::Allergen => "allergen",
            StrategyKind::Classifier => "classifier",
        }
    }
}

/// Everything one analysis reads. Borrowed, never mutated.
#[derive(Debug, Clone, Copy)]
pub struct AnalysisInput<'a> {
    pub diary: &'a Diary,
    pub reference: &'a ReferenceData,
    pub adjustments: &'a ModelAdjustments,
    /// Most recent feedback, oldest first (classifier training data).
    pub recent_feedback: &'a [FeedbackRecord],
}

pub trait CulpritStrategy: Send + Sync {
    fn kind(&self) -> StrategyKind;
    fn analyze(&self, input: &AnalysisInput<'_>) -> AnalysisResult;
}

/// Majority-allergen scoring.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllergenScoring;

impl CulpritStrategy for AllergenScoring {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Allergen
    }

    fn analyze(&self, input: &AnalysisInput<'_>) -> AnalysisResult {
        let scores = score_allergens(input.diary, input.reference, input.adjustments);
        AnalysisResult::from_scores(scores, &input.reference.foods)
            .with_food_view(input.diary, input.reference)
    }
}

/// Allergen scoring plus a learned culprit-food prediction.
#[derive(Debug, Clone, Default)]
pub struct LearnedClassifier {
    cfg: ClassifierConfig,
}

impl LearnedClassifier {
    pub fn new(cfg: ClassifierConfig) -> Self {
        Self { cfg }
    }

    pub fn config(&self) -> &ClassifierConfig {
        &self.cfg
    }
}

impl CulpritStrategy for LearnedClassifier {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Classifier
    }

    fn analyze(&self, input: &AnalysisInput<'_>) -> AnalysisResult {
        let mut result = AllergenScoring.analyze(input);
        let pairs = classifier::training_pairs(input.recent_feedback, &self.cfg);
        let prediction = classifier::predict(&pairs, input.diary, &self.cfg);
        if prediction.is_fallback() {
            counter!("classifier_fallback_total").increment(1);
        }
        debug!(
            pairs = pairs.len(),
            fallback = prediction.is_fallback(),
            food = ?prediction.food(),
            "classifier prediction"
        );
        result.strategy = StrategyKind::Classifier;
        result.prediction = Some(prediction);
        result
    }
}

pub fn strategy_for(kind: StrategyKind, cfg: &ClassifierConfig) -> Box<dyn CulpritStrategy> {
    match kind {
        StrategyKind::Allergen => Box::new(AllergenScoring),
        StrategyKind::Classifier => Box::new(LearnedClassifier::new(cfg.clone())),
    }
}

/// Reference data + the configured strategy.
pub struct Engine {
    reference: Arc<ReferenceData>,
    strategy: Box<dyn CulpritStrategy>,
    training_window: usize,
}

impl Engine {
    pub fn new(reference: Arc<ReferenceData>, strategy: Box<dyn CulpritStrategy>) -> Self {
        Self {
            reference,
            strategy,
            training_window: classifier::DEFAULT_TRAINING_WINDOW,
        }
    }

    pub fn with_strategy(
        reference: Arc<ReferenceData>,
        kind: StrategyKind,
        cfg: &ClassifierConfig,
    ) -> Self {
        Self {
            reference,
            strategy: strategy_for(kind, cfg),
            training_window: cfg.training_window,
        }
    }

    pub fn reference(&self) -> &ReferenceData {
        &self.reference
    }

    pub fn kind(&self) -> StrategyKind {
        self.strategy.kind()
    }

    /// How many recent feedback records the strategy wants to see.
    pub fn training_window(&self) -> usize {
        match self.kind() {
            StrategyKind::Allergen => 0,
            StrategyKind::Classifier => self.training_window,
        }
    }

    pub fn analyze(
        &self,
        diary: &Diary,
        adjustments: &ModelAdjustments,
        recent_feedback: &[FeedbackRecord],
    ) -> AnalysisResult {
        let input = AnalysisInput {
            diary,
            reference: &self.reference,
            adjustments,
            recent_feedback,
        };
        let result = self.strategy.analyze(&input);

        counter!("analyses_total", "strategy" => self.kind().as_str()).increment(1);
        if !result.has_clear_culprit() {
            counter!("no_culprit_total").increment(1);
        }
        info!(
            strategy = self.kind().as_str(),
            days = diary.days(),
            max_score = result.max_score,
            probable = result.probable_ingredients.len(),
            "analysis complete"
        );
        result
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("strategy", &self.kind())
            .field("foods", &self.reference.foods.len())
            .field("allergens", &self.reference.allergies.len())
            .finish()
    }
}
