//! # Scoring Engine
//! Pure, testable logic that maps `(diary, reference, adjustments)` to a
//! ranked culprit list. No I/O.
//!
//! Allergen score: for every day, every eaten food, every allergen of that
//! food, add the number of *that day's* issues found in the allergen's
//! related issues. Confirmed-culprit counts from feedback are then added on
//! top. All allergens sharing the maximum positive score are reported
//! together; ties are not broken.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::classifier::Prediction;
use crate::diary::Diary;
use crate::engine::StrategyKind;
use crate::feedback::ModelAdjustments;
use crate::reference::{normalize_key, FoodRecord, FoodTable, ReferenceData};

/// Default number of alternatives a caller shows.
pub const DEFAULT_MAX_ALTERNATIVES: usize = 10;

/// Whether the analysis produced a culprit. Both are successful outcomes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Finding {
    Culprit,
    #[default]
    NoClearCulprit,
}

/// Raw allergen scores of one diary.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AllergenScores {
    /// Allergen → score (evidence + adjustment).
    pub scores: BTreeMap<String, u32>,
    /// Allergen → foods containing it, in first-eaten order.
    pub foods: BTreeMap<String, Vec<String>>,
    /// Foods in first-eaten order (reference display names, known foods only).
    pub eaten: Vec<String>,
}

impl AllergenScores {
    pub fn max_score(&self) -> u32 {
        self.scores.values().copied().max().unwrap_or(0)
    }

    /// Allergens at the maximum score, lexicographic; empty if max is 0.
    pub fn probable(&self) -> Vec<String> {
        let max = self.max_score();
        if max == 0 {
            return Vec::new();
        }
        self.scores
            .iter()
            .filter(|(_, s)| **s == max)
            .map(|(a, _)| a.clone())
            .collect()
    }
}

/// Score every allergen seen in the diary, plus every adjusted culprit.
pub fn score_allergens(
    diary: &Diary,
    reference: &ReferenceData,
    adjustments: &ModelAdjustments,
) -> AllergenScores {
    let mut out = AllergenScores::default();

    for entry in diary.entries() {
        for food in entry.foods() {
            // Foods out of sync with the reference table contribute nothing.
            let Some(rec) = reference.foods.get(food) else {
                debug!(food = %food, "food not in reference table");
                continue;
            };
            if !out.eaten.contains(&rec.name) {
                out.eaten.push(rec.name.clone());
            }
            for allergen in &rec.allergens {
                let hits = entry
                    .issues()
                    .iter()
                    .filter(|i| reference.allergies.is_related(allergen, i))
                    .count() as u32;
                *out.scores.entry(allergen.clone()).or_insert(0) += hits;
                let foods = out.foods.entry(allergen.clone()).or_default();
                if !foods.contains(&rec.name) {
                    foods.push(rec.name.clone());
                }
            }
        }
    }

    for (culprit, count) in adjustments.iter() {
        let slot = out.scores.entry(culprit.to_string()).or_insert(0);
        *slot = slot.saturating_add(count);
    }

    out
}

/// Snapshot of one analysis. Persisted verbatim inside feedback records.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    #[serde(default)]
    pub strategy: StrategyKind,
    #[serde(default)]
    pub finding: Finding,
    pub ingredient_issue_map: BTreeMap<String, u32>,
    #[serde(default)]
    pub max_score: u32,
    pub probable_ingredients: Vec<String>,
    pub culprit_foods: Vec<String>,
    /// Allergen → foods that contained it ("in foods: ..." display).
    #[serde(default)]
    pub ingredient_foods: BTreeMap<String, Vec<String>>,
    /// Every food free of the probable ingredients, loader order.
    #[serde(default)]
    pub alternative_foods: Vec<String>,
    /// Food-level view: each eaten food against the issues its allergens explain.
    #[serde(default)]
    pub food_scores: FoodScores,
    /// Culprit food → first food sharing no allergen with it.
    #[serde(default)]
    pub culprit_swaps: BTreeMap<String, String>,
    /// Only set by the classifier strategy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prediction: Option<Prediction>,
}

impl AnalysisResult {
    /// Derive culprit foods and alternatives from raw scores.
    pub fn from_scores(scores: AllergenScores, foods: &FoodTable) -> Self {
        let probable = scores.probable();
        let max_score = scores.max_score();
        let probable_set: BTreeSet<&str> = probable.iter().map(String::as_str).collect();

        let culprit_foods: Vec<String> = scores
            .eaten
            .iter()
            .filter(|name| {
                foods
                    .allergens_of(name)
                    .iter()
                    .any(|a| probable_set.contains(a.as_str()))
            })
            .cloned()
            .collect();

        let alternative_foods = if probable.is_empty() {
            Vec::new()
        } else {
            foods
                .iter()
                .filter(|f| !f.allergens.iter().any(|a| probable_set.contains(a.as_str())))
                .map(|f| f.name.clone())
                .collect()
        };

        let ingredient_foods = scores
            .foods
            .into_iter()
            .filter(|(a, _)| probable_set.contains(a.as_str()))
            .collect();

        Self {
            strategy: StrategyKind::Allergen,
            finding: if probable.is_empty() {
                Finding::NoClearCulprit
            } else {
                Finding::Culprit
            },
            ingredient_issue_map: scores.scores,
            max_score,
            probable_ingredients: probable,
            culprit_foods,
            ingredient_foods,
            alternative_foods,
            food_scores: FoodScores::default(),
            culprit_swaps: BTreeMap::new(),
            prediction: None,
        }
    }

    /// Fill in the food-level culprits and a swap for every culprit food.
    pub fn with_food_view(mut self, diary: &Diary, reference: &ReferenceData) -> Self {
        self.food_scores = score_foods(diary, reference);
        self.culprit_swaps = self
            .culprit_foods
            .iter()
            .filter_map(|food| {
                suggest_alternative(food, &reference.foods).map(|alt| (food.clone(), alt.name.clone()))
            })
            .collect();
        self
    }

    pub fn has_clear_culprit(&self) -> bool {
        self.finding == Finding::Culprit
    }

    /// At most `limit` alternatives, for display.
    pub fn top_alternatives(&self, limit: usize) -> &[String] {
        &self.alternative_foods[..self.alternative_foods.len().min(limit)]
    }
}

/// Food-level culprit scores: each eaten food against the issues reported
/// on the days it was eaten, restricted to issues its allergens explain.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FoodScores {
    /// Food → matched issue count, in first-eaten order.
    pub scores: Vec<(String, u32)>,
    pub probable: Vec<String>,
}

pub fn score_foods(diary: &Diary, reference: &ReferenceData) -> FoodScores {
    let patterns = diary.patterns(&reference.foods);
    let mut order: Vec<&String> = Vec::new();
    for food in diary.entries().iter().flat_map(|e| e.foods()) {
        if !order.contains(&food) {
            order.push(food);
        }
    }

    let scores: Vec<(String, u32)> = order
        .into_iter()
        .map(|food| {
            let possible: BTreeSet<&str> = reference
                .foods
                .allergens_of(food)
                .iter()
                .flat_map(|a| reference.allergies.issues_of(a))
                .map(String::as_str)
                .collect();
            let hits = patterns
                .food_issues
                .get(food)
                .map(|issues| issues.iter().filter(|i| possible.contains(i.as_str())).count())
                .unwrap_or(0) as u32;
            (food.clone(), hits)
        })
        .collect();

    let max = scores.iter().map(|(_, s)| *s).max().unwrap_or(0);
    let probable = if max == 0 {
        Vec::new()
    } else {
        scores
            .iter()
            .filter(|(_, s)| *s == max)
            .map(|(f, _)| f.clone())
            .collect()
    };
    FoodScores { scores, probable }
}

/// First food (loader order) other than `culprit` that shares no allergen
/// with it.
pub fn suggest_alternative<'a>(culprit: &str, foods: &'a FoodTable) -> Option<&'a FoodRecord> {
    let key = normalize_key(culprit);
    let culprit_allergens = foods.allergens_of(culprit);
    foods.iter().find(|f| {
        normalize_key(&f.name) != key && !f.allergens.iter().any(|a| culprit_allergens.contains(a))
    })
}
