// src/lib.rs
// Public library surface for the binary, integration tests, and other front ends.

pub mod api;
pub mod classifier;
pub mod config;
pub mod diary;
pub mod engine;
pub mod error;
pub mod feedback;
pub mod metrics;
pub mod reference;
pub mod scoring;

// ---- Re-exports for stable public API ----
pub use crate::api::{create_router, AppState};
pub use crate::classifier::Prediction;
pub use crate::diary::{Diary, DiaryBuilder, DiaryEntry};
pub use crate::engine::{Engine, StrategyKind};
pub use crate::error::{DataLoadError, StorageError};
pub use crate::feedback::{FeedbackRecord, FeedbackStore, ModelAdjustments, Rating};
pub use crate::reference::ReferenceData;
pub use crate::scoring::{AnalysisResult, Finding};
