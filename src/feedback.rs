//! # Feedback Store
//! Durable, append-only feedback log plus the confirmed-culprit frequency
//! table ("model adjustments") that biases future scoring.
//!
//! Layout: two independent JSON documents.
//! - feedback file: `[FeedbackRecord, ...]` in chronological order
//! - adjustments file: `{ "<culprit>": <count>, ... }`
//!
//! Every mutation is a whole-file read-modify-write. That is only safe for a
//! single writer process; callers inside one process serialize access
//! (the HTTP layer keeps the store behind a mutex). No file locking.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{RatingError, StorageError};
use crate::reference::normalize_key;
use crate::scoring::AnalysisResult;

/// Default number of records returned as "recent".
pub const DEFAULT_RECENT_WINDOW: usize = 5;

/// Accuracy rating on a 1..=5 scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Rating(u8);

impl Rating {
    pub const NEUTRAL: Rating = Rating(3);

    pub fn value(self) -> u8 {
        self.0
    }

    /// Human label shown next to the rating slider.
    pub fn label(self) -> &'static str {
        match self.0 {
            1 => "Very Inaccurate (1)",
            2 => "Somewhat Inaccurate (2)",
            4 => "Somewhat Accurate (4)",
            5 => "Very Accurate (5)",
            _ => "Neutral (3)",
        }
    }
}

impl Default for Rating {
    fn default() -> Self {
        Self::NEUTRAL
    }
}

impl TryFrom<u8> for Rating {
    type Error = RatingError;

    fn try_from(v: u8) -> Result<Self, Self::Error> {
        if (1..=5).contains(&v) {
            Ok(Rating(v))
        } else {
            Err(RatingError(v))
        }
    }
}

impl From<Rating> for u8 {
    fn from(r: Rating) -> u8 {
        r.0
    }
}

/// One submitted piece of feedback, with a verbatim copy of the result it rates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackRecord {
    pub timestamp: DateTime<Utc>,
    pub rating: Rating,
    #[serde(default)]
    pub comments: String,
    /// Lowercased ingredient or food name; empty means "no confirmation".
    #[serde(default)]
    pub confirmed_culprit: String,
    pub results: AnalysisResult,
}

impl FeedbackRecord {
    /// Stamps the record with the current time and normalizes the culprit.
    pub fn new(
        rating: Rating,
        comments: impl Into<String>,
        confirmed_culprit: &str,
        results: AnalysisResult,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            rating,
            comments: comments.into().trim().to_string(),
            confirmed_culprit: normalize_key(confirmed_culprit),
            results,
        }
    }

    pub fn has_confirmation(&self) -> bool {
        !self.confirmed_culprit.is_empty()
    }
}

/// Confirmed culprit → cumulative confirmation count. Only ever grows.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModelAdjustments(BTreeMap<String, u32>);

impl ModelAdjustments {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count for a culprit; 0 when never confirmed.
    pub fn get(&self, culprit: &str) -> u32 {
        self.0.get(culprit).copied().unwrap_or(0)
    }

    /// Adds one confirmation and returns the new count.
    pub fn increment(&mut self, culprit: &str) -> u32 {
        let slot = self.0.entry(culprit.to_string()).or_insert(0);
        *slot = slot.saturating_add(1);
        *slot
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u32)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>> FromIterator<(K, u32)> for ModelAdjustments {
    fn from_iter<T: IntoIterator<Item = (K, u32)>>(iter: T) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

/// Read-only summary for the "view feedback" screen.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeedbackStats {
    pub total_count: usize,
    /// Last N records, oldest first.
    pub recent: Vec<FeedbackRecord>,
}

/// File-backed feedback log and adjustment table.
#[derive(Debug, Clone)]
pub struct FeedbackStore {
    feedback_path: PathBuf,
    adjustments_path: PathBuf,
    recent_window: usize,
}

impl FeedbackStore {
    /// Open the store, creating empty documents for whichever file is
    /// absent. Existing data is never touched.
    pub fn open(
        feedback_path: impl Into<PathBuf>,
        adjustments_path: impl Into<PathBuf>,
    ) -> Result<Self, StorageError> {
        let store = Self {
            feedback_path: feedback_path.into(),
            adjustments_path: adjustments_path.into(),
            recent_window: DEFAULT_RECENT_WINDOW,
        };
        bootstrap(&store.feedback_path, &Vec::<FeedbackRecord>::new())?;
        bootstrap(&store.adjustments_path, &ModelAdjustments::new())?;
        Ok(store)
    }

    /// How many records `stats()` reports as recent.
    pub fn with_recent_window(mut self, n: usize) -> Self {
        self.recent_window = n;
        self
    }

    pub fn feedback_path(&self) -> &Path {
        &self.feedback_path
    }

    pub fn adjustments_path(&self) -> &Path {
        &self.adjustments_path
    }

    /// Append one record, then bump the adjustment count of its confirmed
    /// culprit (if any). Resubmitting the same feedback counts again.
    ///
    /// Both documents are read before either is written, so a corrupt or
    /// unreadable adjustments file fails the call with the log untouched.
    pub fn record_feedback(&self, record: &FeedbackRecord) -> Result<(), StorageError> {
        let mut adj: ModelAdjustments = read_json(&self.adjustments_path)?;
        let mut all: Vec<FeedbackRecord> = read_json(&self.feedback_path)?;
        all.push(record.clone());
        write_json(&self.feedback_path, &all)?;
        metrics::counter!("feedback_recorded_total").increment(1);
        info!(
            total = all.len(),
            rating = record.rating.value(),
            confirmed = %record.confirmed_culprit,
            "feedback recorded"
        );

        if record.has_confirmation() {
            let count = adj.increment(&record.confirmed_culprit);
            write_json(&self.adjustments_path, &adj)?;
            debug!(culprit = %record.confirmed_culprit, count, "model adjustment applied");
        }
        Ok(())
    }

    /// Increment the count for a confirmed culprit. Empty names are a no-op
    /// and return 0.
    pub fn apply_adjustment(&self, culprit: &str) -> Result<u32, StorageError> {
        let key = normalize_key(culprit);
        if key.is_empty() {
            return Ok(0);
        }
        let mut adj: ModelAdjustments = read_json(&self.adjustments_path)?;
        let count = adj.increment(&key);
        write_json(&self.adjustments_path, &adj)?;
        debug!(culprit = %key, count, "model adjustment applied");
        Ok(count)
    }

    /// Full log in chronological order.
    pub fn all_feedback(&self) -> Result<Vec<FeedbackRecord>, StorageError> {
        read_json(&self.feedback_path)
    }

    /// Last `n` records, oldest first.
    pub fn recent(&self, n: usize) -> Result<Vec<FeedbackRecord>, StorageError> {
        let mut all = self.all_feedback()?;
        let start = all.len().saturating_sub(n);
        Ok(all.split_off(start))
    }

    pub fn stats(&self) -> Result<FeedbackStats, StorageError> {
        let all = self.all_feedback()?;
        let total_count = all.len();
        let start = total_count.saturating_sub(self.recent_window);
        Ok(FeedbackStats {
            total_count,
            recent: all[start..].to_vec(),
        })
    }

    /// Snapshot of the current adjustment table.
    pub fn adjustments(&self) -> Result<ModelAdjustments, StorageError> {
        read_json(&self.adjustments_path)
    }
}

fn bootstrap<T: Serialize>(path: &Path, empty: &T) -> Result<(), StorageError> {
    if path.exists() {
        return Ok(());
    }
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|source| io_err(path, source))?;
    }
    write_json(path, empty)?;
    info!(path = %path.display(), "initialized empty feedback document");
    Ok(())
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, StorageError> {
    let bytes = fs::read(path).map_err(|source| io_err(path, source))?;
    serde_json::from_slice(&bytes).map_err(|source| StorageError::Corrupt {
        path: path.to_path_buf(),
        source,
    })
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), StorageError> {
    let bytes = serde_json::to_vec_pretty(value).map_err(|source| StorageError::Corrupt {
        path: path.to_path_buf(),
        source,
    })?;
    fs::write(path, bytes).map_err(|source| io_err(path, source))
}

fn io_err(path: &Path, source: std::io::Error) -> StorageError {
    StorageError::Io {
        path: path.to_path_buf(),
        source,
    }
}
