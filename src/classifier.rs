//! # Adaptive Classifier
//! Predicts a culprit food straight from the bag of reported issue words,
//! once enough confirmed feedback exists.
//!
//! Training pairs come from the most recent feedback window: every record
//! with a confirmed culprit and at least one recorded culprit food yields
//! `(probable ingredients joined by spaces, label)`. With fewer than
//! `min_training_pairs` pairs the learned path is skipped entirely and the
//! diary's most-eaten food is returned instead.
//!
//! Model: multinomial naive Bayes over whitespace tokens, Laplace smoothing
//! (alpha = 1). Tokens never seen in training are ignored. Equal posteriors
//! resolve to the lexicographically smallest label.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::diary::Diary;
use crate::feedback::FeedbackRecord;

/// Feedback records considered for training.
pub const DEFAULT_TRAINING_WINDOW: usize = 5;
/// Below this many pairs the fallback is used.
pub const DEFAULT_MIN_TRAINING_PAIRS: usize = 2;

const SMOOTHING: f64 = 1.0;
const TIE_EPSILON: f64 = 1e-12;

/// Which value of a feedback record becomes the training label.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LabelSource {
    /// First culprit food recorded in the stored result.
    #[default]
    FirstCulpritFood,
    /// The culprit the user confirmed.
    ConfirmedCulprit,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    pub training_window: usize,
    pub min_training_pairs: usize,
    pub label: LabelSource,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            training_window: DEFAULT_TRAINING_WINDOW,
            min_training_pairs: DEFAULT_MIN_TRAINING_PAIRS,
            label: LabelSource::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrainingPair {
    pub text: String,
    pub label: String,
}

impl TrainingPair {
    pub fn new(text: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            label: label.into(),
        }
    }
}

/// Outcome of [`predict`]. A fallback is a normal result, not a failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Prediction {
    /// Learned path: highest-posterior label for `issue_text`.
    Classified { food: String, issue_text: String },
    /// Not enough training data; most-eaten food (none for an empty diary).
    Fallback { food: Option<String> },
}

impl Prediction {
    pub fn food(&self) -> Option<&str> {
        match self {
            Prediction::Classified { food, .. } => Some(food.as_str()),
            Prediction::Fallback { food } => food.as_deref(),
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, Prediction::Fallback { .. })
    }
}

/// Build training pairs from the last `training_window` records.
pub fn training_pairs(feedback: &[FeedbackRecord], cfg: &ClassifierConfig) -> Vec<TrainingPair> {
    let start = feedback.len().saturating_sub(cfg.training_window);
    feedback[start..]
        .iter()
        .filter(|r| r.has_confirmation())
        .filter_map(|r| {
            let first_food = r.results.culprit_foods.first()?;
            let label = match cfg.label {
                LabelSource::FirstCulpritFood => first_food.clone(),
                LabelSource::ConfirmedCulprit => r.confirmed_culprit.clone(),
            };
            Some(TrainingPair::new(r.results.probable_ingredients.join(" "), label))
        })
        .collect()
}

/// Space-joined, deduplicated, sorted issues of the whole diary.
pub fn issue_text(diary: &Diary) -> String {
    diary
        .reported_issues()
        .into_iter()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Learned prediction when enough pairs exist, most-eaten food otherwise.
pub fn predict(pairs: &[TrainingPair], diary: &Diary, cfg: &ClassifierConfig) -> Prediction {
    let fallback = || Prediction::Fallback {
        food: diary.most_eaten_food(),
    };
    if pairs.len() < cfg.min_training_pairs {
        return fallback();
    }
    let Some(model) = NaiveBayes::fit(pairs) else {
        return fallback();
    };
    let text = issue_text(diary);
    match model.classify(&text) {
        Some(food) => Prediction::Classified {
            food,
            issue_text: text,
        },
        None => fallback(),
    }
}

#[derive(Debug, Clone)]
struct ClassStats {
    docs: usize,
    token_counts: Vec<u64>,
    total_tokens: u64,
}

/// Multinomial event-count model over a fixed vocabulary.
#[derive(Debug, Clone)]
pub struct NaiveBayes {
    vocab: BTreeMap<String, usize>,
    classes: BTreeMap<String, ClassStats>,
    docs: usize,
}

impl NaiveBayes {
    /// `None` when there is nothing to learn from.
    pub fn fit(pairs: &[TrainingPair]) -> Option<Self> {
        if pairs.is_empty() {
            return None;
        }

        let mut vocab: BTreeMap<String, usize> = BTreeMap::new();
        for p in pairs {
            for tok in tokenize(&p.text) {
                let next = vocab.len();
                vocab.entry(tok).or_insert(next);
            }
        }

        let mut classes: BTreeMap<String, ClassStats> = BTreeMap::new();
        for p in pairs {
            let stats = classes.entry(p.label.clone()).or_insert_with(|| ClassStats {
                docs: 0,
                token_counts: vec![0; vocab.len()],
                total_tokens: 0,
            });
            stats.docs += 1;
            for tok in tokenize(&p.text) {
                if let Some(&i) = vocab.get(&tok) {
                    stats.token_counts[i] += 1;
                    stats.total_tokens += 1;
                }
            }
        }

        Some(Self {
            vocab,
            classes,
            docs: pairs.len(),
        })
    }

    pub fn vocabulary_len(&self) -> usize {
        self.vocab.len()
    }

    /// Unnormalized log posterior per label, in label order.
    pub fn log_posteriors(&self, text: &str) -> Vec<(String, f64)> {
        let mut counts: BTreeMap<usize, u64> = BTreeMap::new();
        for tok in tokenize(text) {
            if let Some(&i) = self.vocab.get(&tok) {
                *counts.entry(i).or_insert(0) += 1;
            }
        }

        let v = self.vocab.len() as f64;
        self.classes
            .iter()
            .map(|(label, stats)| {
                let prior = (stats.docs as f64 / self.docs as f64).ln();
                let denom = stats.total_tokens as f64 + SMOOTHING * v;
                let likelihood: f64 = counts
                    .iter()
                    .map(|(&i, &n)| {
                        n as f64 * ((stats.token_counts[i] as f64 + SMOOTHING) / denom).ln()
                    })
                    .sum();
                (label.clone(), prior + likelihood)
            })
            .collect()
    }

    /// Highest-posterior label; the smallest label wins a tie.
    pub fn classify(&self, text: &str) -> Option<String> {
        let mut best: Option<(String, f64)> = None;
        for (label, score) in self.log_posteriors(text) {
            match &best {
                Some((_, b)) if score <= *b + TIE_EPSILON => {}
                _ => best = Some((label, score)),
            }
        }
        best.map(|(label, _)| label)
    }
}

fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split_whitespace().map(|t| t.to_lowercase())
}
