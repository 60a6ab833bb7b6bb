//! Career summary statistics for drivers and teams
//!
//! Computed once over the full training set and used only at inference
//! time, for default feature values and the heuristic probabilities.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{EntityKind, RaceEntry};

/// Summary statistics for one driver or team
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntityStatistics {
    /// Total races entered
    pub total_races: usize,
    /// Race wins
    pub wins: usize,
    /// Top-three finishes
    pub podiums: usize,
    /// Sum of finishing positions
    pub finish_sum: u64,
    /// Sum of grid positions
    pub grid_sum: u64,
    /// Total points scored
    pub points_sum: f64,
}

impl EntityStatistics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one race result
    pub fn update(&mut self, entry: &RaceEntry) {
        self.total_races += 1;
        self.finish_sum += entry.finish_position as u64;
        self.grid_sum += entry.grid_position as u64;
        self.points_sum += entry.points;
        if entry.won() {
            self.wins += 1;
        }
        if entry.podium() {
            self.podiums += 1;
        }
    }

    /// Mean finishing position
    pub fn avg_finish(&self) -> Option<f64> {
        if self.total_races == 0 {
            None
        } else {
            Some(self.finish_sum as f64 / self.total_races as f64)
        }
    }

    /// Mean grid position
    pub fn avg_grid(&self) -> Option<f64> {
        if self.total_races == 0 {
            None
        } else {
            Some(self.grid_sum as f64 / self.total_races as f64)
        }
    }

    /// Mean points per race
    pub fn avg_points(&self) -> Option<f64> {
        if self.total_races == 0 {
            None
        } else {
            Some(self.points_sum / self.total_races as f64)
        }
    }

    /// Podiums per race entered
    pub fn podium_rate(&self) -> f64 {
        self.podiums as f64 / self.total_races.max(1) as f64
    }

    pub fn win_rate(&self) -> f64 {
        self.wins as f64 / self.total_races.max(1) as f64
    }
}

/// Statistics for every entity of one kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatisticsTable {
    kind: EntityKind,
    stats: BTreeMap<String, EntityStatistics>,
}

impl StatisticsTable {
    pub fn new(kind: EntityKind) -> Self {
        StatisticsTable {
            kind,
            stats: BTreeMap::new(),
        }
    }

    /// Build a table in a single pass over `entries`
    pub fn from_entries(kind: EntityKind, entries: &[RaceEntry]) -> Self {
        let mut table = Self::new(kind);
        table.process_entries(entries);
        table
    }

    pub fn process_entries(&mut self, entries: &[RaceEntry]) {
        for entry in entries {
            self.stats
                .entry(entry.entity(self.kind).to_string())
                .or_default()
                .update(entry);
        }
    }

    pub fn get(&self, id: &str) -> Option<&EntityStatistics> {
        self.stats.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.stats.contains_key(id)
    }

    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    pub fn len(&self) -> usize {
        self.stats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stats.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &EntityStatistics)> {
        self.stats.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::entry;
    use approx::assert_relative_eq;

    #[test]
    fn test_driver_statistics() {
        let mut a = entry(2025, 1, "NOR", "mclaren", 2, 1);
        a.points = 25.0;
        let mut b = entry(2025, 2, "NOR", "mclaren", 4, 3);
        b.points = 15.0;
        let c = entry(2025, 3, "NOR", "mclaren", 6, 14);

        let table = StatisticsTable::from_entries(EntityKind::Driver, &[a, b, c]);
        let s = table.get("NOR").unwrap();

        assert_eq!(s.total_races, 3);
        assert_eq!(s.wins, 1);
        assert_eq!(s.podiums, 2);
        assert_relative_eq!(s.avg_finish().unwrap(), 6.0);
        assert_relative_eq!(s.avg_grid().unwrap(), 4.0);
        assert_relative_eq!(s.avg_points().unwrap(), 40.0 / 3.0);
        assert_relative_eq!(s.podium_rate(), 2.0 / 3.0);
    }

    #[test]
    fn test_team_aggregates_both_cars() {
        let entries = vec![
            entry(2025, 1, "LEC", "ferrari", 1, 2),
            entry(2025, 1, "HAM", "ferrari", 3, 4),
        ];
        let table = StatisticsTable::from_entries(EntityKind::Team, &entries);
        assert_eq!(table.len(), 1);
        let s = table.get("ferrari").unwrap();
        assert_eq!(s.total_races, 2);
        assert_relative_eq!(s.avg_finish().unwrap(), 3.0);
    }

    #[test]
    fn test_empty_statistics() {
        let s = EntityStatistics::new();
        assert!(s.avg_finish().is_none());
        assert_eq!(s.podium_rate(), 0.0);
        assert!(!StatisticsTable::new(EntityKind::Driver).contains("VER"));
    }
}
