// src/config/mod.rs
//! Application configuration (TOML).
//!
//! Resolution order for [`AppConfig::load_default`]:
//! 1) `$ALLERGEN_CONFIG_PATH` (must exist)
//! 2) `config/engine.toml`
//! 3) built-in defaults
//!
//! ```toml
//! [data]
//! foods_path = "data/foods_allergies.csv"
//! allergies_path = "data/allergies_diseases.csv"
//!
//! [feedback]
//! feedback_path = "feedback.json"
//! adjustments_path = "model_adjustments.json"
//! recent_window = 5
//!
//! [scoring]
//! strategy = "allergen"      # or "classifier"
//! max_alternatives = 10
//!
//! [classifier]
//! training_window = 5
//! min_training_pairs = 2
//! label = "first_culprit_food"   # or "confirmed_culprit"
//!
//! [server]
//! bind = "0.0.0.0:8080"
//! ```

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::classifier::ClassifierConfig;
use crate::engine::StrategyKind;
use crate::error::ConfigError;
use crate::feedback::DEFAULT_RECENT_WINDOW;
use crate::scoring::DEFAULT_MAX_ALTERNATIVES;

pub const ENV_CONFIG_PATH: &str = "ALLERGEN_CONFIG_PATH";
pub const DEFAULT_CONFIG_PATH: &str = "config/engine.toml";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub data: DataConfig,
    pub feedback: FeedbackConfig,
    pub scoring: ScoringConfig,
    pub classifier: ClassifierConfig,
    pub server: ServerConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    pub foods_path: PathBuf,
    pub allergies_path: PathBuf,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            foods_path: PathBuf::from("data/foods_allergies.csv"),
            allergies_path: PathBuf::from("data/allergies_diseases.csv"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedbackConfig {
    pub feedback_path: PathBuf,
    pub adjustments_path: PathBuf,
    /// Records shown as "recent" in stats.
    pub recent_window: usize,
}

impl Default for FeedbackConfig {
    fn default() -> Self {
        Self {
            feedback_path: PathBuf::from("feedback.json"),
            adjustments_path: PathBuf::from("model_adjustments.json"),
            recent_window: DEFAULT_RECENT_WINDOW,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub strategy: StrategyKind,
    /// Alternatives shown to the user.
    pub max_alternatives: usize,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            strategy: StrategyKind::Allergen,
            max_alternatives: DEFAULT_MAX_ALTERNATIVES,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8080".to_string(),
        }
    }
}

impl AppConfig {
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let data = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&data).map_err(|e| match e {
            ConfigError::Parse { source, .. } => ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            },
            other => other,
        })
    }

    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let cfg: AppConfig = toml::from_str(s).map_err(|source| ConfigError::Parse {
            path: PathBuf::new(),
            source,
        })?;
        cfg.sanitized()
    }

    /// Env path, then `config/engine.toml`, then defaults.
    pub fn load_default() -> Result<Self> {
        if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if !pb.exists() {
                return Err(anyhow!("{ENV_CONFIG_PATH} points to non-existent path"));
            }
            return Ok(Self::load_from_file(&pb)?);
        }
        let default_p = PathBuf::from(DEFAULT_CONFIG_PATH);
        if default_p.exists() {
            return Ok(Self::load_from_file(&default_p)?);
        }
        Ok(Self::default())
    }

    /// Zero-sized windows fall back to defaults; an empty bind address is rejected.
    fn sanitized(mut self) -> Result<Self, ConfigError> {
        let defaults = AppConfig::default();
        if self.feedback.recent_window == 0 {
            warn!("feedback.recent_window = 0, using default");
            self.feedback.recent_window = defaults.feedback.recent_window;
        }
        if self.scoring.max_alternatives == 0 {
            warn!("scoring.max_alternatives = 0, using default");
            self.scoring.max_alternatives = defaults.scoring.max_alternatives;
        }
        if self.classifier.training_window == 0 {
            warn!("classifier.training_window = 0, using default");
            self.classifier.training_window = defaults.classifier.training_window;
        }
        if self.server.bind.trim().is_empty() {
            return Err(ConfigError::Invalid("server.bind must not be empty".into()));
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::LabelSource;
    use std::env;

    #[test]
    fn partial_toml_keeps_defaults() {
        let cfg = AppConfig::from_toml_str(
            r#"
[scoring]
strategy = "classifier"

[classifier]
min_training_pairs = 3
label = "confirmed_culprit"
"#,
        )
        .unwrap();
        assert_eq!(cfg.scoring.strategy, StrategyKind::Classifier);
        assert_eq!(cfg.scoring.max_alternatives, 10);
        assert_eq!(cfg.classifier.min_training_pairs, 3);
        assert_eq!(cfg.classifier.training_window, 5);
        assert_eq!(cfg.classifier.label, LabelSource::ConfirmedCulprit);
        assert_eq!(cfg.data, DataConfig::default());
    }

    #[test]
    fn zero_windows_are_reset() {
        let cfg = AppConfig::from_toml_str(
            "[feedback]\nrecent_window = 0\n[classifier]\ntraining_window = 0\n",
        )
        .unwrap();
        assert_eq!(cfg.feedback.recent_window, 5);
        assert_eq!(cfg.classifier.training_window, 5);
    }

    #[test]
    fn unknown_strategy_is_parse_error() {
        let err = AppConfig::from_toml_str("[scoring]\nstrategy = \"magic\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[serial_test::serial]
    #[test]
    fn default_uses_env_then_fallbacks() {
        let old = env::current_dir().unwrap();
        let tmp = tempfile::tempdir().unwrap();
        env::set_current_dir(tmp.path()).unwrap();
        env::remove_var(ENV_CONFIG_PATH);

        assert_eq!(AppConfig::load_default().unwrap(), AppConfig::default());

        fs::create_dir_all(tmp.path().join("config")).unwrap();
        fs::write(
            tmp.path().join(DEFAULT_CONFIG_PATH),
            "[server]\nbind = \"127.0.0.1:9000\"\n",
        )
        .unwrap();
        assert_eq!(AppConfig::load_default().unwrap().server.bind, "127.0.0.1:9000");

        let p_env = tmp.path().join("other.toml");
        fs::write(&p_env, "[scoring]\nmax_alternatives = 3\n").unwrap();
        env::set_var(ENV_CONFIG_PATH, p_env.display().to_string());
        assert_eq!(AppConfig::load_default().unwrap().scoring.max_alternatives, 3);

        env::set_var(ENV_CONFIG_PATH, tmp.path().join("missing.toml"));
        assert!(AppConfig::load_default().is_err());
        env::remove_var(ENV_CONFIG_PATH);

        env::set_current_dir(&old).unwrap();
    }
}
