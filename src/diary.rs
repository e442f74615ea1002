//! # Diary
//! Immutable multi-day record of meals and tracked issues.
//!
//! The wizard builds it incrementally through [`DiaryBuilder`]: meals are
//! added one by one, and closing a day replicates the user's pre-declared
//! tracked issues onto that day. Dropping the builder abandons the diary
//! with no side effect. Once built, a [`Diary`] is handed to the engine
//! wholesale and never mutated; derived views are computed on demand.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use crate::reference::{normalize_key, FoodTable};

/// Meals the wizard asks for each day.
pub const MEALS: [&str; 3] = ["Breakfast", "Lunch", "Dinner"];

/// Days the reference wizard tracks.
pub const DEFAULT_DAYS: usize = 4;

/// One closed day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiaryEntry {
    foods: Vec<String>,
    issues: BTreeSet<String>,
}

impl DiaryEntry {
    /// Issues are normalized (trimmed, lowercased); empty ones dropped.
    pub fn new<F, I>(foods: F, issues: I) -> Self
    where
        F: IntoIterator,
        F::Item: Into<String>,
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        Self {
            foods: foods.into_iter().map(Into::into).collect(),
            issues: issues
                .into_iter()
                .map(|i| normalize_key(i.as_ref()))
                .filter(|i| !i.is_empty())
                .collect(),
        }
    }

    pub fn foods(&self) -> &[String] {
        &self.foods
    }

    pub fn issues(&self) -> &BTreeSet<String> {
        &self.issues
    }
}

/// Ordered sequence of days.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Diary {
    entries: Vec<DiaryEntry>,
}

impl Diary {
    pub fn new(entries: Vec<DiaryEntry>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[DiaryEntry] {
        &self.entries
    }

    pub fn days(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Per-day allergens of every eaten food (unknown foods contribute none).
    pub fn allergens_by_day(&self, foods: &FoodTable) -> Vec<Vec<String>> {
        self.entries
            .iter()
            .map(|e| {
                e.foods
                    .iter()
                    .flat_map(|f| foods.allergens_of(f).iter().cloned())
                    .collect()
            })
            .collect()
    }

    /// Sorted allergens across every eaten food: the choices offered when
    /// the user confirms a culprit.
    pub fn eaten_allergens(&self, foods: &FoodTable) -> Vec<String> {
        self.allergens_by_day(foods)
            .into_iter()
            .flatten()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Deduplicated, sorted issues reported across the whole diary.
    pub fn reported_issues(&self) -> BTreeSet<String> {
        self.entries
            .iter()
            .flat_map(|e| e.issues.iter().cloned())
            .collect()
    }

    /// Most frequently eaten food; ties go to the first one encountered.
    /// Foods are counted case-insensitively and reported as first written.
    pub fn most_eaten_food(&self) -> Option<String> {
        let mut counts: HashMap<String, (usize, usize, &str)> = HashMap::new();
        let mut order = 0usize;
        for food in self.entries.iter().flat_map(|e| e.foods.iter()) {
            let key = normalize_key(food);
            if key.is_empty() {
                continue;
            }
            let slot = counts.entry(key).or_insert_with(|| {
                order += 1;
                (0, order, food.as_str())
            });
            slot.0 += 1;
        }
        counts
            .into_values()
            .max_by(|a, b| a.0.cmp(&b.0).then(b.1.cmp(&a.1)))
            .map(|(_, _, name)| name.to_string())
    }

    pub fn patterns(&self, foods: &FoodTable) -> DiaryPatterns {
        DiaryPatterns::collect(self, foods)
    }
}

/// Counters over a diary: how often each food, allergen, and issue shows
/// up, and which issues were reported on the days each food was eaten.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DiaryPatterns {
    pub food_counts: BTreeMap<String, usize>,
    pub allergen_counts: BTreeMap<String, usize>,
    pub issue_counts: BTreeMap<String, usize>,
    /// Food → issues of every day it was eaten (repeats kept).
    pub food_issues: BTreeMap<String, Vec<String>>,
}

impl DiaryPatterns {
    fn collect(diary: &Diary, foods: &FoodTable) -> Self {
        let mut p = Self::default();
        for entry in &diary.entries {
            for food in &entry.foods {
                *p.food_counts.entry(food.clone()).or_default() += 1;
                for allergen in foods.allergens_of(food) {
                    *p.allergen_counts.entry(allergen.clone()).or_default() += 1;
                }
                p.food_issues
                    .entry(food.clone())
                    .or_default()
                    .extend(entry.issues.iter().cloned());
            }
            for issue in &entry.issues {
                *p.issue_counts.entry(issue.clone()).or_default() += 1;
            }
        }
        p
    }
}

/// Incremental, wizard-side construction of a [`Diary`].
#[derive(Debug, Clone)]
pub struct DiaryBuilder {
    tracked_issues: BTreeSet<String>,
    days: usize,
    meals_per_day: usize,
    current: Vec<String>,
    entries: Vec<DiaryEntry>,
}

/// What happened after adding a meal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    /// Waiting for the next meal of `day` (1-based), `meal` index into [`MEALS`].
    NextMeal { day: usize, meal: usize },
    /// All days are closed; call [`DiaryBuilder::finish`].
    Complete,
}

impl DiaryBuilder {
    /// Tracked issues are declared once up front and replicated onto each day.
    pub fn new<I>(tracked_issues: I) -> Self
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        Self::with_shape(tracked_issues, DEFAULT_DAYS, MEALS.len())
    }

    pub fn with_shape<I>(tracked_issues: I, days: usize, meals_per_day: usize) -> Self
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        Self {
            tracked_issues: tracked_issues
                .into_iter()
                .map(|i| normalize_key(i.as_ref()))
                .filter(|i| !i.is_empty())
                .collect(),
            days: days.max(1),
            meals_per_day: meals_per_day.max(1),
            current: Vec::new(),
            entries: Vec::new(),
        }
    }

    /// Record the next meal; closes the day when its last meal is in.
    /// Meals after completion are ignored.
    pub fn add_meal(&mut self, food: impl Into<String>) -> Progress {
        if self.is_complete() {
            return Progress::Complete;
        }
        self.current.push(food.into());
        if self.current.len() >= self.meals_per_day {
            let foods = std::mem::take(&mut self.current);
            self.entries.push(DiaryEntry {
                foods,
                issues: self.tracked_issues.clone(),
            });
        }
        self.progress()
    }

    pub fn progress(&self) -> Progress {
        if self.is_complete() {
            Progress::Complete
        } else {
            Progress::NextMeal {
                day: self.entries.len() + 1,
                meal: self.current.len(),
            }
        }
    }

    pub fn is_complete(&self) -> bool {
        self.entries.len() >= self.days
    }

    /// Closed days so far; a half-entered day is not included.
    pub fn finish(self) -> Diary {
        Diary {
            entries: self.entries,
        }
    }
}
