//! Rolling driver/team form
//!
//! Trailing-window finish and points statistics per entity, computed from
//! the entity's own event history in (year, round) order.

use std::collections::HashMap;

use crate::{EntityKind, RaceEntry};

/// Form of one entity going into one event
#[derive(Debug, Clone, PartialEq)]
pub struct EntityFormRecord {
    pub year: u16,
    pub round: u8,
    pub entity: String,
    pub avg_recent_finish: f64,
    /// Only tracked for drivers
    pub recent_points: Option<f64>,
}

/// Computes rolling form records for drivers or teams.
///
/// For the entry at index `i` of an entity's sorted history:
/// - `i == 0`: the neutral finish and zero points;
/// - `0 < i < window`: mean finish / summed points over indices `0..=i`,
///   i.e. the current entry is included while the history is short;
/// - `i >= window`: the `window` entries immediately before `i`.
///
/// The short-history window intentionally keeps the inclusive behaviour the
/// model was originally trained with.
#[derive(Debug, Clone, Copy)]
pub struct FormAggregator {
    window: usize,
    neutral_finish: f64,
}

impl Default for FormAggregator {
    fn default() -> Self {
        FormAggregator::new(3, 10.0)
    }
}

impl FormAggregator {
    pub fn new(window: usize, neutral_finish: f64) -> Self {
        FormAggregator {
            window: window.max(1),
            neutral_finish,
        }
    }

    pub fn neutral_finish(&self) -> f64 {
        self.neutral_finish
    }

    /// One record per entry, in partition order (entity by entity)
    pub fn compute(&self, entries: &[RaceEntry], kind: EntityKind) -> Vec<EntityFormRecord> {
        let mut records = Vec::with_capacity(entries.len());

        for history in partition(entries, kind) {
            for idx in 0..history.len() {
                let window = self.window_for(idx);
                let (avg_finish, points) = match window {
                    None => (self.neutral_finish, 0.0),
                    Some(range) => {
                        let slice = &history[range];
                        let n = slice.len() as f64;
                        let finish_sum: f64 = slice.iter().map(|e| e.finish_position as f64).sum();
                        let points_sum: f64 = slice.iter().map(|e| e.points).sum();
                        (finish_sum / n, points_sum)
                    }
                };

                let current = history[idx];
                records.push(EntityFormRecord {
                    year: current.year,
                    round: current.round,
                    entity: current.entity(kind).to_string(),
                    avg_recent_finish: avg_finish,
                    recent_points: match kind {
                        EntityKind::Driver => Some(points),
                        EntityKind::Team => None,
                    },
                });
            }
        }

        records
    }

    /// Index range aggregated for position `idx`, or None for the neutral prior
    fn window_for(&self, idx: usize) -> Option<std::ops::Range<usize>> {
        if idx == 0 {
            None
        } else if idx < self.window {
            Some(0..idx + 1)
        } else {
            Some(idx - self.window..idx)
        }
    }

    /// Compute records and index them for merging back onto entries
    pub fn table(&self, entries: &[RaceEntry], kind: EntityKind) -> FormTable {
        FormTable::from_records(kind, self.compute(entries, kind))
    }
}

/// Group entries by entity, each group in (year, round, grid) order
fn partition(entries: &[RaceEntry], kind: EntityKind) -> Vec<Vec<&RaceEntry>> {
    let mut sorted: Vec<&RaceEntry> = entries.iter().collect();
    sorted.sort_by_key(|e| (e.year, e.round, e.grid_position));

    let mut order: Vec<&str> = Vec::new();
    let mut groups: HashMap<&str, Vec<&RaceEntry>> = HashMap::new();
    for entry in sorted {
        let id = entry.entity(kind);
        groups
            .entry(id)
            .or_insert_with(|| {
                order.push(id);
                Vec::new()
            })
            .push(entry);
    }

    order
        .into_iter()
        .filter_map(|id| groups.remove(id))
        .collect()
}

/// Form records keyed by (year, round, entity)
#[derive(Debug, Clone)]
pub struct FormTable {
    kind: EntityKind,
    records: HashMap<(u16, u8, String), EntityFormRecord>,
}

impl FormTable {
    /// Keeps the first record per key; a team's second car in the same
    /// event does not overwrite the first.
    pub fn from_records(kind: EntityKind, records: Vec<EntityFormRecord>) -> Self {
        let mut map = HashMap::with_capacity(records.len());
        for record in records {
            map.entry((record.year, record.round, record.entity.clone()))
                .or_insert(record);
        }
        FormTable { kind, records: map }
    }

    pub fn get(&self, entry: &RaceEntry) -> Option<&EntityFormRecord> {
        self.records
            .get(&(entry.year, entry.round, entry.entity(self.kind).to_string()))
    }

    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
