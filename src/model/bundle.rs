//! Trained model artifact
//!
//! Everything inference needs, saved as a single JSON file.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::features::assembler::PREDICTED_POSITION_FEATURE;
use crate::features::{CategoricalEncoder, StatisticsTable, FEATURE_NAMES};
use crate::model::heads::{PositionHead, WinHead};
use crate::training::TrainingReport;
use crate::{PredictorError, Result};

/// Fitted heads, encoders and entity statistics from one training run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainedModel {
    pub position: PositionHead,
    pub win: WinHead,
    pub driver_encoder: CategoricalEncoder,
    pub team_encoder: CategoricalEncoder,
    pub driver_stats: StatisticsTable,
    pub team_stats: StatisticsTable,
    /// Input column order of the win head
    pub feature_names: Vec<String>,
    pub report: TrainingReport,
    pub trained_at: DateTime<Utc>,
}

impl TrainedModel {
    /// Column order the heads were fitted with
    pub fn expected_feature_names() -> Vec<String> {
        FEATURE_NAMES
            .iter()
            .chain(std::iter::once(&PREDICTED_POSITION_FEATURE))
            .map(|s| s.to_string())
            .collect()
    }

    /// Write the artifact, replacing any previous one only once the new
    /// file is complete
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let tmp = temp_path(path);
        {
            let mut writer = BufWriter::new(fs::File::create(&tmp)?);
            serde_json::to_writer(&mut writer, self)?;
            writer.flush()?;
        }
        if let Err(e) = fs::rename(&tmp, path) {
            let _ = fs::remove_file(&tmp);
            return Err(e.into());
        }

        log::info!("Saved model to {}", path.display());
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let reader = BufReader::new(fs::File::open(path)?);
        let model: TrainedModel = serde_json::from_reader(reader)?;

        if model.feature_names != Self::expected_feature_names() {
            return Err(PredictorError::Parse(format!(
                "{} was trained with features {:?}",
                path.display(),
                model.feature_names
            )));
        }

        log::info!(
            "Loaded model from {} (trained {})",
            path.display(),
            model.trained_at.format("%Y-%m-%d %H:%M")
        );
        Ok(model)
    }

    /// Copy a validated artifact to another path
    pub fn export(source: impl AsRef<Path>, destination: impl AsRef<Path>) -> Result<Self> {
        let model = Self::load(source)?;
        model.save(destination)?;
        Ok(model)
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
