//! Prediction heads for finishing position and win probability
//!
//! The two heads are stacked: the win head takes the position head's
//! output as an extra input column, both when fitting and when predicting.

use serde::{Deserialize, Serialize};

use crate::features::FeatureVector;
use crate::model::{ForestParams, RandomForestRegressor};
use crate::{Result, MAX_POSITION, MIN_POSITION};

/// Win probability is never reported as certain or impossible
pub const WIN_PROBABILITY_FLOOR: f64 = 0.01;
pub const WIN_PROBABILITY_CEILING: f64 = 0.95;

/// Finishing position regression head
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionHead {
    forest: RandomForestRegressor,
}

impl PositionHead {
    pub fn fit(params: &ForestParams, rows: &[FeatureVector], finish_positions: &[f64]) -> Result<Self> {
        let x: Vec<Vec<f64>> = rows.iter().map(FeatureVector::to_vec).collect();
        Ok(PositionHead {
            forest: RandomForestRegressor::fit(params, &x, finish_positions)?,
        })
    }

    /// Unrounded forest output
    pub fn predict_raw(&self, features: &FeatureVector) -> Result<f64> {
        self.forest.predict_one(&features.to_array())
    }

    pub fn predict_raw_batch(&self, rows: &[FeatureVector]) -> Result<Vec<f64>> {
        rows.iter().map(|fv| self.predict_raw(fv)).collect()
    }

    /// Rounded to the nearest place and clamped to the grid size
    pub fn predict(&self, features: &FeatureVector) -> Result<u8> {
        Ok(round_position(self.predict_raw(features)?))
    }

    pub fn forest(&self) -> &RandomForestRegressor {
        &self.forest
    }
}

/// Round a continuous position estimate to a reportable place
pub fn round_position(raw: f64) -> u8 {
    if raw.is_nan() {
        return MAX_POSITION;
    }
    raw.round_ties_even()
        .clamp(MIN_POSITION as f64, MAX_POSITION as f64) as u8
}

/// Win likelihood regression head
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WinHead {
    forest: RandomForestRegressor,
}

impl WinHead {
    /// Fit on features plus the position head's prediction for each row,
    /// against a 0/1 won indicator
    pub fn fit(
        params: &ForestParams,
        rows: &[FeatureVector],
        predicted_positions: &[f64],
        won: &[f64],
    ) -> Result<Self> {
        let x: Vec<Vec<f64>> = rows
            .iter()
            .zip(predicted_positions)
            .map(|(fv, &pos)| fv.with_predicted_position(pos))
            .collect();
        Ok(WinHead {
            forest: RandomForestRegressor::fit(params, &x, won)?,
        })
    }

    /// Clamped win probability
    pub fn predict(&self, features: &FeatureVector, predicted_position: f64) -> Result<f64> {
        let raw = self
            .forest
            .predict_one(&features.with_predicted_position(predicted_position))?;
        Ok(raw.clamp(WIN_PROBABILITY_FLOOR, WIN_PROBABILITY_CEILING))
    }

    pub fn forest(&self) -> &RandomForestRegressor {
        &self.forest
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> ForestParams {
        ForestParams {
            n_estimators: 10,
            max_depth: Some(4),
            min_samples_split: 2,
            min_samples_leaf: 1,
            seed: 3,
        }
    }

    fn rows() -> Vec<FeatureVector> {
        (0..20)
            .map(|i| FeatureVector {
                driver_code: i as f64,
                team_code: (i / 2) as f64,
                grid_position: (i + 1) as f64,
                avg_recent_finish: (i + 1) as f64,
                recent_points: 0.0,
                team_avg_finish: 10.0,
            })
            .collect()
    }

    #[test]
    fn test_round_position_bounds() {
        assert_eq!(round_position(-4.0), 1);
        assert_eq!(round_position(0.4), 1);
        assert_eq!(round_position(3.5), 4);
        assert_eq!(round_position(2.5), 2);
        assert_eq!(round_position(4.5), 4);
        assert_eq!(round_position(2.51), 3);
        assert_eq!(round_position(27.0), 20);
        assert_eq!(round_position(f64::NAN), 20);
    }

    #[test]
    fn test_position_head_tracks_grid() {
        let rows = rows();
        let targets: Vec<f64> = rows.iter().map(|r| r.grid_position).collect();
        let head = PositionHead::fit(&params(), &rows, &targets).unwrap();

        assert!(head.predict(&rows[0]).unwrap() <= 4);
        assert!(head.predict(&rows[19]).unwrap() >= 16);
    }

    #[test]
    fn test_win_head_is_clamped() {
        let rows = rows();
        let positions: Vec<f64> = rows.iter().map(|r| r.grid_position).collect();
        let won: Vec<f64> = (0..20).map(|i| if i == 0 { 1.0 } else { 0.0 }).collect();
        let head = WinHead::fit(&params(), &rows, &positions, &won).unwrap();

        for (fv, &pos) in rows.iter().zip(&positions) {
            let p = head.predict(fv, pos).unwrap();
            assert!((WIN_PROBABILITY_FLOOR..=WIN_PROBABILITY_CEILING).contains(&p));
        }
        assert_eq!(head.forest().n_features(), FeatureVector::DIM + 1);
    }
}
