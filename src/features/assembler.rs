//! Fixed-width model features for one (event, entrant) pair

use crate::features::form::{EntityFormRecord, FormTable};
use crate::features::CategoricalEncoder;
use crate::{RaceEntry, Result};

/// Defaults for form columns with no matching record
pub const DEFAULT_AVG_RECENT_FINISH: f64 = 10.0;
pub const DEFAULT_RECENT_POINTS: f64 = 0.0;
pub const DEFAULT_TEAM_AVG_FINISH: f64 = 10.0;

/// Column names, in model input order
pub const FEATURE_NAMES: [&str; FeatureVector::DIM] = [
    "driver_enc",
    "team_enc",
    "grid_position",
    "avg_recent_finish",
    "recent_points",
    "team_avg_finish",
];

/// Extra column appended for the win-probability stage
pub const PREDICTED_POSITION_FEATURE: &str = "predicted_position";

/// Model input vector
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureVector {
    pub driver_code: f64,
    pub team_code: f64,
    pub grid_position: f64,
    pub avg_recent_finish: f64,
    pub recent_points: f64,
    pub team_avg_finish: f64,
}

impl FeatureVector {
    pub const DIM: usize = 6;

    pub fn to_array(&self) -> [f64; Self::DIM] {
        [
            self.driver_code,
            self.team_code,
            self.grid_position,
            self.avg_recent_finish,
            self.recent_points,
            self.team_avg_finish,
        ]
    }

    pub fn to_vec(&self) -> Vec<f64> {
        self.to_array().to_vec()
    }

    /// Input row for the win-probability stage
    pub fn with_predicted_position(&self, predicted_position: f64) -> Vec<f64> {
        let mut v = self.to_vec();
        v.push(predicted_position);
        v
    }

    pub fn from_vec(v: &[f64]) -> Option<Self> {
        if v.len() != Self::DIM {
            return None;
        }
        Some(FeatureVector {
            driver_code: v[0],
            team_code: v[1],
            grid_position: v[2],
            avg_recent_finish: v[3],
            recent_points: v[4],
            team_avg_finish: v[5],
        })
    }
}

/// An entry's features plus label and diagnostic columns
#[derive(Debug, Clone, PartialEq)]
pub struct AssembledRow {
    pub features: FeatureVector,
    pub finish_position: u8,
    /// 1 if classified as running at the flag
    pub finished: u8,
    /// finish - grid; negative means places gained
    pub grid_to_finish_delta: i32,
}

impl AssembledRow {
    pub fn won(&self) -> bool {
        self.finish_position == 1
    }
}

/// Join an entry with its driver and team form into a feature row
pub fn assemble(
    entry: &RaceEntry,
    driver_code: usize,
    team_code: usize,
    driver_form: Option<&EntityFormRecord>,
    team_form: Option<&EntityFormRecord>,
) -> AssembledRow {
    let avg_recent_finish = driver_form
        .map(|r| r.avg_recent_finish)
        .unwrap_or(DEFAULT_AVG_RECENT_FINISH);
    let recent_points = driver_form
        .and_then(|r| r.recent_points)
        .unwrap_or(DEFAULT_RECENT_POINTS);
    let team_avg_finish = team_form
        .map(|r| r.avg_recent_finish)
        .unwrap_or(DEFAULT_TEAM_AVG_FINISH);

    AssembledRow {
        features: FeatureVector {
            driver_code: driver_code as f64,
            team_code: team_code as f64,
            grid_position: entry.grid_position as f64,
            avg_recent_finish,
            recent_points,
            team_avg_finish,
        },
        finish_position: entry.finish_position,
        finished: u8::from(entry.finished()),
        grid_to_finish_delta: entry.finish_position as i32 - entry.grid_position as i32,
    }
}

/// Assemble every entry using fitted encoders and precomputed form tables
pub fn assemble_all(
    entries: &[RaceEntry],
    driver_encoder: &CategoricalEncoder,
    team_encoder: &CategoricalEncoder,
    driver_form: &FormTable,
    team_form: &FormTable,
) -> Result<Vec<AssembledRow>> {
    entries
        .iter()
        .map(|entry| {
            let driver_code = driver_encoder.encode(&entry.driver)?;
            let team_code = team_encoder.encode(&entry.team)?;
            Ok(assemble(
                entry,
                driver_code,
                team_code,
                driver_form.get(entry),
                team_form.get(entry),
            ))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::FormAggregator;
    use crate::testutil::entry;
    use crate::EntityKind;

    #[test]
    fn test_defaults_without_form() {
        let e = entry(2025, 3, "GAS", "alpine", 12, 9);
        let row = assemble(&e, 4, 1, None, None);
        assert_eq!(
            row.features.to_array(),
            [4.0, 1.0, 12.0, 10.0, 0.0, 10.0]
        );
        assert_eq!(row.finished, 1);
        assert_eq!(row.grid_to_finish_delta, -3);
    }

    #[test]
    fn test_uses_form_records() {
        let e = entry(2025, 3, "GAS", "alpine", 12, 9);
        let driver_form = EntityFormRecord {
            year: 2025,
            round: 3,
            entity: "GAS".to_string(),
            avg_recent_finish: 7.5,
            recent_points: Some(14.0),
        };
        let team_form = EntityFormRecord {
            year: 2025,
            round: 3,
            entity: "alpine".to_string(),
            avg_recent_finish: 11.0,
            recent_points: None,
        };
        let row = assemble(&e, 0, 0, Some(&driver_form), Some(&team_form));
        assert_eq!(row.features.avg_recent_finish, 7.5);
        assert_eq!(row.features.recent_points, 14.0);
        assert_eq!(row.features.team_avg_finish, 11.0);
    }

    #[test]
    fn test_retirement_not_finished() {
        let mut e = entry(2025, 1, "ALB", "williams", 9, 18);
        e.status = "Hydraulics".to_string();
        let row = assemble(&e, 0, 0, None, None);
        assert_eq!(row.finished, 0);
        assert_eq!(row.grid_to_finish_delta, 9);
    }

    #[test]
    fn test_assemble_all_encodes_in_vocabulary_order() {
        let entries = vec![
            entry(2025, 1, "VER", "red_bull", 1, 1),
            entry(2025, 1, "ALO", "aston_martin", 2, 2),
        ];
        let drivers = CategoricalEncoder::fit(EntityKind::Driver, entries.iter().map(|e| &e.driver));
        let teams = CategoricalEncoder::fit(EntityKind::Team, entries.iter().map(|e| &e.team));
        let agg = FormAggregator::default();
        let rows = assemble_all(
            &entries,
            &drivers,
            &teams,
            &agg.table(&entries, EntityKind::Driver),
            &agg.table(&entries, EntityKind::Team),
        )
        .unwrap();

        assert_eq!(rows[0].features.driver_code, 1.0);
        assert_eq!(rows[1].features.driver_code, 0.0);
        assert_eq!(rows[0].features.team_code, 1.0);
    }

    #[test]
    fn test_with_predicted_position() {
        let fv = FeatureVector::from_vec(&[0.0, 1.0, 2.0, 3.0, 4.0, 5.0]).unwrap();
        let v = fv.with_predicted_position(6.0);
        assert_eq!(v.len(), FEATURE_NAMES.len() + 1);
        assert_eq!(v[6], 6.0);
        assert!(FeatureVector::from_vec(&v).is_none());
    }
}
