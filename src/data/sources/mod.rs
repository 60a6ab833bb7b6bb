//! Race result sources and season collection

pub mod jolpica;

pub use jolpica::JolpicaClient;

use std::fmt;

use crate::data::Database;
use crate::{DataConfig, PredictorError, RaceEntry, Result};

/// One event on a season schedule
#[derive(Debug, Clone, PartialEq)]
pub struct EventInfo {
    pub year: u16,
    pub round: u8,
    pub name: String,
    /// Weekend includes a sprint race
    pub sprint: bool,
}

impl EventInfo {
    pub fn is_conventional(&self) -> bool {
        !self.sprint
    }
}

/// Qualifying classification row; segment times in seconds
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QualifyingRow {
    pub driver: String,
    pub q1: Option<f64>,
    pub q2: Option<f64>,
    pub q3: Option<f64>,
}

/// Race classification row as reported by a source
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RaceRow {
    pub driver: String,
    pub driver_number: Option<u32>,
    pub team: String,
    pub grid_position: Option<u32>,
    pub finish_position: Option<u32>,
    pub points: Option<f64>,
    pub status: Option<String>,
}

/// Qualifying and race results for one event
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventResults {
    pub qualifying: Vec<QualifyingRow>,
    pub race: Vec<RaceRow>,
}

/// Trait for all race result sources
pub trait RaceDataSource {
    fn name(&self) -> &str;

    /// Events of a season in round order
    fn schedule(&self, year: u16) -> Result<Vec<EventInfo>>;

    fn event_results(&self, year: u16, round: u8) -> Result<EventResults>;
}

/// Retry an operation with exponential backoff
pub fn with_retry<T, F>(mut operation: F, max_attempts: u32) -> Result<T>
where
    F: FnMut() -> Result<T>,
{
    let attempts = max_attempts.max(1);
    let mut attempt = 0;
    loop {
        match operation() {
            Ok(result) => return Ok(result),
            Err(e) => {
                attempt += 1;
                log::warn!("Attempt {} failed: {}", attempt, e);
                if attempt >= attempts {
                    return Err(e);
                }
                std::thread::sleep(retry_delay(attempt));
            }
        }
    }
}

const RETRY_BASE_MS: u64 = 100;
const RETRY_MAX_MS: u64 = 30_000;

/// Exponential backoff before the next attempt, capped at 30s
fn retry_delay(attempt: u32) -> std::time::Duration {
    let ms = 2u64
        .checked_pow(attempt.saturating_sub(1))
        .and_then(|factor| factor.checked_mul(RETRY_BASE_MS))
        .map_or(RETRY_MAX_MS, |ms| ms.min(RETRY_MAX_MS));
    std::time::Duration::from_millis(ms)
}

/// Join race rows to qualifying rows by driver.
///
/// Rows without a qualifying match, or missing a grid or finish position,
/// are dropped.
pub fn merge_event(event: &EventInfo, results: &EventResults) -> Vec<RaceEntry> {
    results
        .race
        .iter()
        .filter_map(|row| {
            let quali = results.qualifying.iter().find(|q| q.driver == row.driver)?;
            let grid_position = u8::try_from(row.grid_position?).ok()?;
            let finish_position = u8::try_from(row.finish_position?).ok()?;

            Some(RaceEntry {
                year: event.year,
                round: event.round,
                event_name: event.name.clone(),
                driver: row.driver.clone(),
                driver_number: row.driver_number.unwrap_or(0),
                team: row.team.clone(),
                grid_position,
                finish_position,
                points: row.points.unwrap_or(0.0),
                status: row.status.clone().unwrap_or_else(|| "Unknown".to_string()),
                q1_time: quali.q1,
                q2_time: quali.q2,
                q3_time: quali.q3,
            })
        })
        .collect()
}

/// Options for `collect_seasons`
#[derive(Debug, Clone)]
pub struct CollectOptions {
    pub skip_sprint_weekends: bool,
    /// Re-fetch events already in the database
    pub refresh: bool,
    pub max_retries: u32,
}

impl CollectOptions {
    pub fn from_config(config: &DataConfig, refresh: bool) -> Self {
        CollectOptions {
            skip_sprint_weekends: config.skip_sprint_weekends,
            refresh,
            max_retries: config.max_retries,
        }
    }
}

/// Outcome of a collection run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CollectionSummary {
    pub seasons: usize,
    pub events_collected: usize,
    /// Sprint weekends and events already stored
    pub events_skipped: usize,
    pub events_failed: usize,
    /// Seasons whose schedule could not be fetched
    pub seasons_failed: usize,
    pub entries: usize,
}

impl fmt::Display for CollectionSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} entries from {} events over {} seasons ({} skipped, {} failed",
            self.entries, self.events_collected, self.seasons, self.events_skipped, self.events_failed
        )?;
        if self.seasons_failed > 0 {
            write!(f, ", {} seasons unavailable", self.seasons_failed)?;
        }
        write!(f, ")")
    }
}

/// Collect every event from `start_year` to `end_year` into `db`.
///
/// A failing event or season is logged and counted; it never stops the
/// rest of the run. Only database errors abort.
pub fn collect_seasons<S: RaceDataSource + ?Sized>(
    source: &S,
    db: &mut Database,
    start_year: u16,
    end_year: u16,
    options: &CollectOptions,
) -> Result<CollectionSummary> {
    let mut summary = CollectionSummary::default();

    for year in start_year..=end_year {
        log::info!("Processing {} season from {}", year, source.name());
        let schedule = match with_retry(|| source.schedule(year), options.max_retries) {
            Ok(schedule) => schedule,
            Err(e) => {
                log::warn!("Skipping {} season: {}", year, e);
                summary.seasons_failed += 1;
                continue;
            }
        };
        summary.seasons += 1;

        for event in &schedule {
            if options.skip_sprint_weekends && !event.is_conventional() {
                log::debug!("Skipping sprint weekend {} {}", year, event.name);
                summary.events_skipped += 1;
                continue;
            }
            if !options.refresh && db.has_event(event.year, event.round)? {
                log::debug!("Already stored: {} round {}", event.year, event.round);
                summary.events_skipped += 1;
                continue;
            }

            match collect_event(source, event, options.max_retries) {
                Ok(entries) => {
                    let count = db.upsert_entries(&entries)?;
                    log::info!("  {} (round {}): {} entries", event.name, event.round, count);
                    summary.events_collected += 1;
                    summary.entries += count;
                }
                Err(e) => {
                    log::warn!("  Failed {}: {}", event.name, e);
                    summary.events_failed += 1;
                }
            }
        }
    }

    log::info!("Collected {}", summary);
    Ok(summary)
}

fn collect_event<S: RaceDataSource + ?Sized>(
    source: &S,
    event: &EventInfo,
    max_retries: u32,
) -> Result<Vec<RaceEntry>> {
    let results = with_retry(|| source.event_results(event.year, event.round), max_retries)
        .map_err(|e| PredictorError::Source {
            year: event.year,
            round: event.round,
            message: e.to_string(),
        })?;

    let entries = merge_event(event, &results);
    if entries.is_empty() && !results.race.is_empty() {
        log::warn!(
            "  {}: none of {} race rows matched qualifying",
            event.name,
            results.race.len()
        );
    }
    Ok(entries)
}
