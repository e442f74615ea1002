// tests/properties.rs
//
// Generated-input checks for scoring and classifier fallback.

use allergen_inference::classifier::{predict, ClassifierConfig, Prediction, TrainingPair};
use allergen_inference::reference::{AllergyRecord, AllergyTable, FoodRecord, FoodTable};
use allergen_inference::scoring::score_allergens;
use allergen_inference::{Diary, DiaryEntry, ModelAdjustments, ReferenceData};
use proptest::prelude::*;

const FOODS: [&str; 5] = ["Pizza", "Salad", "Bread", "Sushi", "Mystery"];
const ALLERGENS: [&str; 4] = ["dairy", "gluten", "fish", "soy"];
const ISSUES: [&str; 4] = ["bloating", "fatigue", "hives", "headache"];

fn reference() -> ReferenceData {
    ReferenceData::new(
        FoodTable::from_records([
            FoodRecord::new("Pizza", ["dairy", "gluten"], ["cheese"]),
            FoodRecord::new("Salad", ["none"], ["lettuce"]),
            FoodRecord::new("Bread", ["gluten"], ["flour"]),
            FoodRecord::new("Sushi", ["fish", "soy"], ["rice"]),
        ]),
        AllergyTable::from_records([
            AllergyRecord::new("dairy", ["bloating"]),
            AllergyRecord::new("gluten", ["bloating", "fatigue"]),
            AllergyRecord::new("fish", ["hives"]),
        ]),
    )
}

fn day_strategy(with_issues: bool) -> impl Strategy<Value = DiaryEntry> {
    let foods = prop::collection::vec(prop::sample::select(FOODS.to_vec()), 0..4);
    let issues = if with_issues {
        prop::collection::vec(prop::sample::select(ISSUES.to_vec()), 0..3).boxed()
    } else {
        Just(Vec::new()).boxed()
    };
    (foods, issues).prop_map(|(f, i)| DiaryEntry::new(f, i))
}

fn adjustments_strategy() -> impl Strategy<Value = ModelAdjustments> {
    prop::collection::btree_map(prop::sample::select(ALLERGENS.to_vec()), 0u32..10, 0..4)
        .prop_map(|m| m.into_iter().collect())
}

proptest! {
    #[test]
    fn issue_free_diaries_have_no_culprit(days in prop::collection::vec(day_strategy(false), 0..5)) {
        let s = score_allergens(&Diary::new(days), &reference(), &ModelAdjustments::new());
        prop_assert_eq!(s.max_score(), 0);
        prop_assert!(s.probable().is_empty());
    }

    #[test]
    fn adjustments_never_lower_scores(
        days in prop::collection::vec(day_strategy(true), 0..5),
        adj in adjustments_strategy(),
    ) {
        let diary = Diary::new(days);
        let base = score_allergens(&diary, &reference(), &ModelAdjustments::new());
        let boosted = score_allergens(&diary, &reference(), &adj);
        for (allergen, score) in &base.scores {
            prop_assert!(boosted.scores.get(allergen).copied().unwrap_or(0) >= *score);
        }
    }

    #[test]
    fn fewer_than_two_pairs_always_fall_back(
        days in prop::collection::vec(day_strategy(true), 0..5),
        n_pairs in 0usize..2,
    ) {
        let diary = Diary::new(days);
        let pairs: Vec<TrainingPair> = (0..n_pairs)
            .map(|i| TrainingPair::new("dairy", format!("food{i}")))
            .collect();
        let p = predict(&pairs, &diary, &ClassifierConfig::default());
        prop_assert_eq!(p, Prediction::Fallback { food: diary.most_eaten_food() });
    }
}
