//! # Reference Data
//! Loads the two reference tables the engine reads from:
//!
//! - foods table: `dish_name`, `allergens` (comma list), `main_ingredients` (comma list)
//! - allergies table: `Allergy`, `Related_Diseases_or_Issues` (semicolon list)
//!
//! List elements are trimmed and lowercased, empty elements dropped. Dish
//! names keep their case for display but are looked up case-insensitively.
//! Any missing file, malformed row, or missing column is a `DataLoadError`
//! and no partial table is returned.

use std::collections::{BTreeSet, HashMap};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info};

use crate::error::DataLoadError;

const COL_DISH: &str = "dish_name";
const COL_ALLERGENS: &str = "allergens";
const COL_INGREDIENTS: &str = "main_ingredients";
const COL_ALLERGY: &str = "Allergy";
const COL_ISSUES: &str = "Related_Diseases_or_Issues";

/// One dish from the foods table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FoodRecord {
    /// Display name, trimmed, case preserved.
    pub name: String,
    /// Lowercased, deduplicated, in table order.
    pub allergens: Vec<String>,
    /// Lowercased, deduplicated, in table order.
    pub main_ingredients: Vec<String>,
}

impl FoodRecord {
    pub fn new<A, I>(name: &str, allergens: A, main_ingredients: I) -> Self
    where
        A: IntoIterator,
        A::Item: AsRef<str>,
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        Self {
            name: name.trim().to_string(),
            allergens: clean_items(allergens),
            main_ingredients: clean_items(main_ingredients),
        }
    }
}

/// One allergen from the allergies table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AllergyRecord {
    /// Lowercased key.
    pub allergen: String,
    /// Lowercased, ordered, no duplicates.
    pub related_issues: Vec<String>,
}

impl AllergyRecord {
    pub fn new<I>(allergen: &str, related_issues: I) -> Self
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        Self {
            allergen: normalize_key(allergen),
            related_issues: clean_items(related_issues),
        }
    }
}

/// Foods in loader order with a case-insensitive name index.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FoodTable {
    records: Vec<FoodRecord>,
    index: HashMap<String, usize>,
}

impl FoodTable {
    /// Later records with the same (case-insensitive) name replace earlier
    /// ones in place, keeping the first position.
    pub fn from_records<I: IntoIterator<Item = FoodRecord>>(records: I) -> Self {
        let mut table = Self::default();
        for rec in records {
            table.insert(rec);
        }
        table
    }

    fn insert(&mut self, rec: FoodRecord) {
        let key = normalize_key(&rec.name);
        match self.index.get(&key) {
            Some(&i) => self.records[i] = rec,
            None => {
                self.index.insert(key, self.records.len());
                self.records.push(rec);
            }
        }
    }

    /// Case-insensitive lookup. Unknown names are not an error.
    pub fn get(&self, name: &str) -> Option<&FoodRecord> {
        self.index
            .get(&normalize_key(name))
            .map(|&i| &self.records[i])
    }

    /// Allergens of a food, empty for unknown foods.
    pub fn allergens_of(&self, name: &str) -> &[String] {
        self.get(name).map(|r| r.allergens.as_slice()).unwrap_or(&[])
    }

    /// Records in loader order.
    pub fn iter(&self) -> impl Iterator<Item = &FoodRecord> {
        self.records.iter()
    }

    /// Display names sorted ascending, the order the meal picker shows them in.
    pub fn sorted_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.records.iter().map(|r| r.name.clone()).collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Allergen → related issues, plus the sorted union of all issues.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AllergyTable {
    entries: HashMap<String, AllergyRecord>,
    all_issues: Vec<String>,
}

impl AllergyTable {
    pub fn from_records<I: IntoIterator<Item = AllergyRecord>>(records: I) -> Self {
        let mut entries = HashMap::new();
        for rec in records {
            entries.insert(rec.allergen.clone(), rec);
        }
        let all_issues = entries
            .values()
            .flat_map(|r| r.related_issues.iter().cloned())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        Self {
            entries,
            all_issues,
        }
    }

    /// Related issues of an allergen; empty when the allergen is unmapped.
    pub fn issues_of(&self, allergen: &str) -> &[String] {
        self.entries
            .get(allergen)
            .map(|r| r.related_issues.as_slice())
            .unwrap_or(&[])
    }

    pub fn is_related(&self, allergen: &str, issue: &str) -> bool {
        self.issues_of(allergen).iter().any(|i| i == issue)
    }

    /// Union of every allergen's issues, sorted for stable display.
    pub fn all_issues(&self) -> &[String] {
        &self.all_issues
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Both tables, loaded together at startup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReferenceData {
    pub foods: FoodTable,
    pub allergies: AllergyTable,
}

impl ReferenceData {
    pub fn new(foods: FoodTable, allergies: AllergyTable) -> Self {
        Self { foods, allergies }
    }

    pub fn load(foods_path: &Path, allergies_path: &Path) -> Result<Self, DataLoadError> {
        let foods = load_foods(foods_path)?;
        let allergies = load_allergies(allergies_path)?;
        info!(
            foods = foods.len(),
            allergens = allergies.len(),
            issues = allergies.all_issues().len(),
            "reference data loaded"
        );
        Ok(Self { foods, allergies })
    }
}

pub fn load_foods(path: &Path) -> Result<FoodTable, DataLoadError> {
    let file = open(path)?;
    read_foods(file, path)
}

pub fn load_allergies(path: &Path) -> Result<AllergyTable, DataLoadError> {
    let file = open(path)?;
    read_allergies(file, path)
}

/// Parse a foods table from any reader; `origin` only labels errors.
pub fn read_foods<R: Read>(reader: R, origin: &Path) -> Result<FoodTable, DataLoadError> {
    let mut rdr = csv::Reader::from_reader(reader);
    let headers = rdr.headers().map_err(|e| csv_err(origin, e))?.clone();
    let dish = column(&headers, COL_DISH, origin)?;
    let allergens = column(&headers, COL_ALLERGENS, origin)?;
    let ingredients = column(&headers, COL_INGREDIENTS, origin)?;

    let mut records = Vec::new();
    for row in rdr.records() {
        let row = row.map_err(|e| csv_err(origin, e))?;
        let name = row.get(dish).unwrap_or_default();
        if name.trim().is_empty() {
            debug!(line = row.position().map(|p| p.line()), "skipping row without dish name");
            continue;
        }
        records.push(FoodRecord::new(
            name,
            row.get(allergens).unwrap_or_default().split(','),
            row.get(ingredients).unwrap_or_default().split(','),
        ));
    }
    Ok(FoodTable::from_records(records))
}

pub fn read_allergies<R: Read>(reader: R, origin: &Path) -> Result<AllergyTable, DataLoadError> {
    let mut rdr = csv::Reader::from_reader(reader);
    let headers = rdr.headers().map_err(|e| csv_err(origin, e))?.clone();
    let allergy = column(&headers, COL_ALLERGY, origin)?;
    let issues = column(&headers, COL_ISSUES, origin)?;

    let mut records = Vec::new();
    for row in rdr.records() {
        let row = row.map_err(|e| csv_err(origin, e))?;
        let key = row.get(allergy).unwrap_or_default();
        if key.trim().is_empty() {
            continue;
        }
        records.push(AllergyRecord::new(
            key,
            row.get(issues).unwrap_or_default().split(';'),
        ));
    }
    Ok(AllergyTable::from_records(records))
}

/// Trim + lowercase, the comparison key for every name in the engine.
pub fn normalize_key(s: &str) -> String {
    s.trim().to_lowercase()
}

fn clean_items<I>(items: I) -> Vec<String>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    let mut out: Vec<String> = Vec::new();
    for it in items {
        let v = normalize_key(it.as_ref());
        if !v.is_empty() && !out.contains(&v) {
            out.push(v);
        }
    }
    out
}

fn open(path: &Path) -> Result<File, DataLoadError> {
    File::open(path).map_err(|source| DataLoadError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn csv_err(path: &Path, source: csv::Error) -> DataLoadError {
    DataLoadError::Csv {
        path: PathBuf::from(path),
        source,
    }
}

fn column(
    headers: &csv::StringRecord,
    name: &'static str,
    path: &Path,
) -> Result<usize, DataLoadError> {
    headers
        .iter()
        .position(|h| h.trim_start_matches('\u{feff}').trim() == name)
        .ok_or_else(|| DataLoadError::MissingColumn {
            path: path.to_path_buf(),
            column: name,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    const FOODS: &str = "dish_name,allergens,main_ingredients\n\
        Pizza,\"Dairy, Gluten\",\"cheese, flour ,tomato\"\n\
        Salad,none,\"lettuce,,cucumber\"\n";

    const ALLERGIES: &str = "Allergy,Related_Diseases_or_Issues\n\
        Dairy,Bloating; Diarrhea ;\n\
        Gluten,bloating;Fatigue\n";

    fn origin() -> &'static Path {
        Path::new("inline.csv")
    }

    #[test]
    fn foods_are_trimmed_and_lowercased() {
        let t = read_foods(FOODS.as_bytes(), origin()).unwrap();
        assert_eq!(t.len(), 2);
        let pizza = t.get("pizza").unwrap();
        assert_eq!(pizza.name, "Pizza");
        assert_eq!(pizza.allergens, vec!["dairy", "gluten"]);
        assert_eq!(pizza.main_ingredients, vec!["cheese", "flour", "tomato"]);
        assert_eq!(t.get("Salad").unwrap().main_ingredients, vec!["lettuce", "cucumber"]);
    }

    #[test]
    fn allergies_collect_sorted_issue_union() {
        let t = read_allergies(ALLERGIES.as_bytes(), origin()).unwrap();
        assert_eq!(t.issues_of("dairy"), ["bloating", "diarrhea"]);
        assert_eq!(t.all_issues(), ["bloating", "diarrhea", "fatigue"]);
        assert!(t.issues_of("peanut").is_empty());
    }

    #[test]
    fn missing_column_is_reported() {
        let err = read_foods("dish_name,allergens\nPizza,dairy\n".as_bytes(), origin()).unwrap_err();
        assert!(matches!(
            err,
            DataLoadError::MissingColumn { column: COL_INGREDIENTS, .. }
        ));
    }

    #[test]
    fn ragged_row_is_malformed() {
        let bad = "Allergy,Related_Diseases_or_Issues\nDairy,bloating,extra\n";
        let err = read_allergies(bad.as_bytes(), origin()).unwrap_err();
        assert!(matches!(err, DataLoadError::Csv { .. }));
    }

    #[test]
    fn duplicate_dish_replaces_in_place() {
        let t = FoodTable::from_records([
            FoodRecord::new("Toast", ["gluten"], ["bread"]),
            FoodRecord::new("Soup", ["celery"], ["celery"]),
            FoodRecord::new("toast", ["gluten", "dairy"], ["bread", "butter"]),
        ]);
        let names: Vec<_> = t.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["toast", "Soup"]);
        assert_eq!(t.allergens_of("TOAST"), ["gluten", "dairy"]);
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = load_foods(Path::new("/definitely/not/here.csv")).unwrap_err();
        assert!(matches!(err, DataLoadError::Io { .. }));
    }
}
