//! Formula 1 race outcome prediction
//!
//! Rolling driver/team form features feed a two-stage random forest
//! (finishing position, then win likelihood), with heuristic podium and
//! confidence scores layered on top.

pub mod data;
pub mod features;
pub mod model;
pub mod predict;
pub mod training;

#[cfg(test)]
pub(crate) mod testutil;

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::model::ForestParams;

/// Lowest and highest finishing position a prediction may report
pub const MIN_POSITION: u8 = 1;
pub const MAX_POSITION: u8 = 20;

/// Which kind of entity a statistic or code belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    Driver,
    Team,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKind::Driver => write!(f, "driver"),
            EntityKind::Team => write!(f, "team"),
        }
    }
}

/// One entrant's result in one event.
///
/// Only entries with both a grid and a finish position are ever built;
/// rows missing either are dropped during collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RaceEntry {
    pub year: u16,
    pub round: u8,
    pub event_name: String,
    /// Three-letter driver code, e.g. "VER"
    pub driver: String,
    pub driver_number: u32,
    /// Constructor identifier, e.g. "red_bull"
    pub team: String,
    pub grid_position: u8,
    pub finish_position: u8,
    pub points: f64,
    /// Free-text classification ("Finished", "+1 Lap", "Engine", ...)
    pub status: String,
    /// Qualifying segment times in seconds
    pub q1_time: Option<f64>,
    pub q2_time: Option<f64>,
    pub q3_time: Option<f64>,
}

impl RaceEntry {
    /// Identifier of this entry's driver or team
    pub fn entity(&self, kind: EntityKind) -> &str {
        match kind {
            EntityKind::Driver => &self.driver,
            EntityKind::Team => &self.team,
        }
    }

    /// Chronological ordering key
    pub fn event_key(&self) -> (u16, u8) {
        (self.year, self.round)
    }

    pub fn won(&self) -> bool {
        self.finish_position == 1
    }

    pub fn podium(&self) -> bool {
        self.finish_position <= 3
    }

    /// True if the car was classified as running at the flag
    pub fn finished(&self) -> bool {
        self.status.contains("Finished") || self.status.contains('+')
    }
}

/// Prediction request for a single entrant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionRequest {
    pub driver_id: String,
    #[serde(alias = "constructor_id")]
    pub team_id: String,
    pub grid_position: u32,
    /// Overrides the driver's historical mean finish
    #[serde(default)]
    pub avg_recent_finish: Option<f64>,
    /// Overrides the driver's historical points form
    #[serde(default)]
    pub recent_points: Option<f64>,
}

impl PredictionRequest {
    pub fn new(driver_id: impl Into<String>, team_id: impl Into<String>, grid_position: u32) -> Self {
        PredictionRequest {
            driver_id: driver_id.into(),
            team_id: team_id.into(),
            grid_position,
            avg_recent_finish: None,
            recent_points: None,
        }
    }
}

/// Model prediction output
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub predicted_position: u8,
    pub win_probability: f64,
    pub podium_probability: f64,
    pub confidence: f64,
}

/// Why a prediction degraded to the grid-based fallback
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FallbackReason {
    /// Never trained and no persisted artifact
    NoModel,
    /// No entity of the needed kind exists to substitute
    EmptyVocabulary(EntityKind),
    /// Unexpected failure anywhere on the inference path
    InferenceError(String),
}

impl fmt::Display for FallbackReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FallbackReason::NoModel => write!(f, "no trained model"),
            FallbackReason::EmptyVocabulary(kind) => write!(f, "no known {} to substitute", kind),
            FallbackReason::InferenceError(msg) => write!(f, "inference error: {}", msg),
        }
    }
}

/// How a prediction was produced
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PredictionSource {
    Model,
    /// Model output after replacing unknown ids with known ones
    Substituted {
        driver: Option<String>,
        team: Option<String>,
    },
    Fallback(FallbackReason),
}

impl fmt::Display for PredictionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PredictionSource::Model => write!(f, "model"),
            PredictionSource::Substituted { driver, team } => {
                let mut parts = Vec::new();
                if let Some(d) = driver {
                    parts.push(format!("driver->{}", d));
                }
                if let Some(t) = team {
                    parts.push(format!("team->{}", t));
                }
                write!(f, "model (substituted {})", parts.join(", "))
            }
            PredictionSource::Fallback(reason) => write!(f, "fallback ({})", reason),
        }
    }
}

/// A prediction together with the path that produced it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionOutcome {
    pub prediction: Prediction,
    pub source: PredictionSource,
}

impl PredictionOutcome {
    pub fn is_fallback(&self) -> bool {
        matches!(self.source, PredictionSource::Fallback(_))
    }
}

/// Application-wide errors
#[derive(Debug, Error)]
pub enum PredictorError {
    #[error("Unknown {kind}: {value}")]
    UnknownCategory { kind: EntityKind, value: String },

    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("Training failed: {0}")]
    Training(String),

    #[error("Inference failed: {0}")]
    Inference(String),

    #[error("Model not trained - run `f1 train` first")]
    NoModel,

    #[error("Data source failed for {year} round {round}: {message}")]
    Source { year: u16, round: u8, message: String },

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(String),
}

pub type Result<T> = std::result::Result<T, PredictorError>;

/// Application configuration loaded from config.toml
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub position_model: ForestParams,
    pub win_model: ForestParams,
    pub training: TrainingConfig,
    pub data: DataConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingConfig {
    /// Fraction of entries held out to score the position model
    pub test_size: f64,
    pub split_seed: u64,
    /// Number of prior events in the rolling form window
    pub form_window: usize,
    /// Average finish assumed when no history exists
    pub neutral_finish: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    pub database_path: String,
    pub model_path: String,
    pub api_base_url: String,
    pub start_year: u16,
    /// Defaults to the current season
    pub end_year: Option<u16>,
    pub skip_sprint_weekends: bool,
    pub max_retries: u32,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        TrainingConfig {
            test_size: 0.2,
            split_seed: 42,
            form_window: 3,
            neutral_finish: 10.0,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            position_model: ForestParams::position_default(),
            win_model: ForestParams::win_default(),
            training: TrainingConfig::default(),
            data: DataConfig {
                database_path: "data/f1.db".to_string(),
                model_path: "model/race_predictor.json".to_string(),
                api_base_url: "https://api.jolpi.ca/ergast/f1".to_string(),
                start_year: 2025,
                end_year: None,
                skip_sprint_weekends: true,
                max_retries: 3,
            },
        }
    }
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            PredictorError::Config(format!("Failed to read config file {}: {}", path, e))
        })?;
        toml::from_str(&content)
            .map_err(|e| PredictorError::Config(format!("Failed to parse config: {}", e)))
    }

    pub fn save(&self, path: &str) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| PredictorError::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, content)?;
        Ok(())
    }
}
