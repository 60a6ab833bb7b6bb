//! Two-stage training pipeline
//!
//! The position head is fitted on a seeded random train split and scored
//! on the held-out rows. Its raw predictions over *every* row then become
//! the extra input column for the win head, which is fitted on all rows.
//! Inference feeds the win head the same column, so the stacking is
//! consistent between fitting and prediction.

use chrono::Utc;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::features::{assemble_all, AssembledRow, CategoricalEncoder, FeatureVector, FormAggregator, StatisticsTable};
use crate::model::{ForestParams, PositionHead, TrainedModel, WinHead};
use crate::training::metrics::{RegressionMetrics, TrainingReport};
use crate::{Config, EntityKind, PredictorError, RaceEntry, Result, TrainingConfig};

/// Fits a `TrainedModel` from collected race entries
pub struct Trainer {
    position_params: ForestParams,
    win_params: ForestParams,
    config: TrainingConfig,
}

impl Trainer {
    pub fn new(config: &Config) -> Self {
        Trainer {
            position_params: config.position_model.clone(),
            win_params: config.win_model.clone(),
            config: config.training.clone(),
        }
    }

    /// Run the full pipeline; nothing is persisted here
    pub fn train(&self, entries: &[RaceEntry]) -> Result<TrainedModel> {
        if entries.len() < 2 {
            return Err(PredictorError::InsufficientData(format!(
                "need at least 2 race entries to train, have {}",
                entries.len()
            )));
        }
        if !(self.config.test_size > 0.0 && self.config.test_size < 1.0) {
            return Err(PredictorError::Config(format!(
                "test_size must be in (0, 1), got {}",
                self.config.test_size
            )));
        }

        let mut entries = entries.to_vec();
        entries.sort_by_key(|e| (e.year, e.round, e.grid_position));

        log::info!("Training on {} race entries", entries.len());

        let aggregator = FormAggregator::new(self.config.form_window, self.config.neutral_finish);
        let driver_form = aggregator.table(&entries, EntityKind::Driver);
        let team_form = aggregator.table(&entries, EntityKind::Team);

        let driver_encoder = CategoricalEncoder::fit(EntityKind::Driver, entries.iter().map(|e| &e.driver));
        let team_encoder = CategoricalEncoder::fit(EntityKind::Team, entries.iter().map(|e| &e.team));

        let rows = assemble_all(&entries, &driver_encoder, &team_encoder, &driver_form, &team_form)?;
        let features: Vec<FeatureVector> = rows.iter().map(|r| r.features).collect();

        let (train_idx, test_idx) = train_test_split(rows.len(), self.config.test_size, self.config.split_seed);
        log::info!(
            "Split {} rows: train={}, test={}",
            rows.len(),
            train_idx.len(),
            test_idx.len()
        );

        let position = self.fit_position(&rows, &train_idx)?;
        let position_metrics = evaluate_position(&position, &rows, &test_idx)?;
        log::info!("Position model held-out {}", position_metrics);

        let predicted_positions = position.predict_raw_batch(&features)?;
        let won: Vec<f64> = rows.iter().map(|r| if r.won() { 1.0 } else { 0.0 }).collect();
        let win = WinHead::fit(&self.win_params, &features, &predicted_positions, &won)?;
        log::info!("Win model fitted on {} rows", rows.len());

        let driver_stats = StatisticsTable::from_entries(EntityKind::Driver, &entries);
        let team_stats = StatisticsTable::from_entries(EntityKind::Team, &entries);

        let report = TrainingReport {
            position: position_metrics,
            train_samples: train_idx.len(),
            test_samples: test_idx.len(),
            drivers: driver_encoder.len(),
            teams: team_encoder.len(),
        };

        Ok(TrainedModel {
            position,
            win,
            driver_encoder,
            team_encoder,
            driver_stats,
            team_stats,
            feature_names: TrainedModel::expected_feature_names(),
            report,
            trained_at: Utc::now(),
        })
    }

    fn fit_position(&self, rows: &[AssembledRow], train_idx: &[usize]) -> Result<PositionHead> {
        let features: Vec<FeatureVector> = train_idx.iter().map(|&i| rows[i].features).collect();
        let targets: Vec<f64> = train_idx
            .iter()
            .map(|&i| rows[i].finish_position as f64)
            .collect();
        PositionHead::fit(&self.position_params, &features, &targets)
    }
}

fn evaluate_position(
    position: &PositionHead,
    rows: &[AssembledRow],
    test_idx: &[usize],
) -> Result<RegressionMetrics> {
    let mut predictions = Vec::with_capacity(test_idx.len());
    let mut targets = Vec::with_capacity(test_idx.len());
    for &i in test_idx {
        predictions.push(position.predict_raw(&rows[i].features)?);
        targets.push(rows[i].finish_position as f64);
    }
    Ok(RegressionMetrics::compute(&predictions, &targets))
}

/// Shuffle row indices with `seed` and hold out `ceil(n * test_size)` of
/// them, keeping at least one row on each side
pub fn train_test_split(n: usize, test_size: f64, seed: u64) -> (Vec<usize>, Vec<usize>) {
    let mut indices: Vec<usize> = (0..n).collect();
    let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
    indices.shuffle(&mut rng);

    if n < 2 {
        return (indices, Vec::new());
    }
    let n_test = ((n as f64 * test_size).ceil() as usize).clamp(1, n - 1);
    let train = indices.split_off(n_test);
    (train, indices)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{entry, synthetic_season};
    use std::collections::HashSet;

    fn fast_config() -> Config {
        let mut config = Config::default();
        config.position_model.n_estimators = 25;
        config.win_model.n_estimators = 25;
        config
    }

    #[test]
    fn test_split_sizes_and_disjoint() {
        let (train, test) = train_test_split(50, 0.2, 42);
        assert_eq!(test.len(), 10);
        assert_eq!(train.len(), 40);

        let all: HashSet<usize> = train.iter().chain(&test).copied().collect();
        assert_eq!(all.len(), 50);
    }

    #[test]
    fn test_split_is_seeded() {
        assert_eq!(train_test_split(30, 0.2, 42), train_test_split(30, 0.2, 42));
        assert_ne!(train_test_split(30, 0.2, 42), train_test_split(30, 0.2, 43));
    }

    #[test]
    fn test_split_keeps_both_sides() {
        let (train, test) = train_test_split(2, 0.2, 1);
        assert_eq!((train.len(), test.len()), (1, 1));
        let (train, test) = train_test_split(3, 0.9, 1);
        assert_eq!((train.len(), test.len()), (1, 2));
    }

    #[test]
    fn test_train_synthetic_season() {
        let entries = synthetic_season(5);
        let model = Trainer::new(&fast_config()).train(&entries).unwrap();

        assert_eq!(model.report.train_samples + model.report.test_samples, 50);
        assert_eq!(model.report.test_samples, 10);
        assert_eq!(model.report.drivers, 10);
        assert_eq!(model.report.teams, 5);
        assert_eq!(model.driver_stats.get("VER").unwrap().wins, 5);
        assert_eq!(model.team_stats.get("mclaren").unwrap().total_races, 10);
        assert!(model.report.position.mae < 3.0);
    }

    #[test]
    fn test_train_requires_data() {
        let trainer = Trainer::new(&fast_config());
        assert!(matches!(
            trainer.train(&[]),
            Err(PredictorError::InsufficientData(_))
        ));
        assert!(trainer
            .train(&[entry(2025, 1, "VER", "red_bull", 1, 1)])
            .is_err());
    }

    #[test]
    fn test_train_rejects_bad_test_size() {
        let mut config = fast_config();
        config.training.test_size = 1.0;
        let result = Trainer::new(&config).train(&synthetic_season(2));
        assert!(matches!(result, Err(PredictorError::Config(_))));
    }
}
