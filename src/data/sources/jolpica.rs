//! Jolpica client for Ergast-compatible F1 results
//!
//! Endpoints used:
//! - `{base}/{year}.json` for the schedule
//! - `{base}/{year}/{round}/results.json` for the race
//! - `{base}/{year}/{round}/qualifying.json` for qualifying

use serde::Deserialize;

use super::{EventInfo, EventResults, QualifyingRow, RaceDataSource, RaceRow};
use crate::{PredictorError, Result};

/// Page size large enough for a full season or a full grid
const PAGE_LIMIT: u32 = 100;

/// Blocking HTTP client for the Jolpica API
pub struct JolpicaClient {
    client: reqwest::blocking::Client,
    base_url: String,
}

impl JolpicaClient {
    pub fn new(base_url: &str) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .user_agent("f1-predictor/0.1")
            .timeout(std::time::Duration::from_secs(30))
            .build()?;

        Ok(JolpicaClient {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn get_json(&self, path: &str) -> Result<String> {
        let url = format!("{}/{}?limit={}", self.base_url, path, PAGE_LIMIT);
        log::debug!("GET {}", url);
        let response = self.client.get(&url).send()?.error_for_status()?;
        Ok(response.text()?)
    }
}

impl RaceDataSource for JolpicaClient {
    fn name(&self) -> &str {
        "jolpica"
    }

    fn schedule(&self, year: u16) -> Result<Vec<EventInfo>> {
        parse_schedule(&self.get_json(&format!("{}.json", year))?)
    }

    fn event_results(&self, year: u16, round: u8) -> Result<EventResults> {
        let race = parse_race_results(&self.get_json(&format!("{}/{}/results.json", year, round))?)?;
        let qualifying =
            parse_qualifying(&self.get_json(&format!("{}/{}/qualifying.json", year, round))?)?;
        Ok(EventResults { qualifying, race })
    }
}

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(rename = "MRData")]
    data: MrData,
}

#[derive(Debug, Deserialize)]
struct MrData {
    #[serde(rename = "RaceTable")]
    race_table: RaceTable,
}

#[derive(Debug, Deserialize)]
struct RaceTable {
    #[serde(rename = "Races", default)]
    races: Vec<ApiRace>,
}

#[derive(Debug, Deserialize)]
struct ApiRace {
    season: String,
    round: String,
    #[serde(rename = "raceName")]
    race_name: String,
    #[serde(rename = "Sprint")]
    sprint: Option<serde_json::Value>,
    #[serde(rename = "Results", default)]
    results: Vec<ApiResult>,
    #[serde(rename = "QualifyingResults", default)]
    qualifying: Vec<ApiQualifying>,
}

#[derive(Debug, Deserialize)]
struct ApiDriver {
    #[serde(rename = "driverId")]
    driver_id: String,
    code: Option<String>,
}

impl ApiDriver {
    fn identifier(&self) -> String {
        self.code
            .clone()
            .unwrap_or_else(|| self.driver_id.to_uppercase())
    }
}

#[derive(Debug, Deserialize)]
struct ApiConstructor {
    #[serde(rename = "constructorId")]
    constructor_id: String,
}

#[derive(Debug, Deserialize)]
struct ApiResult {
    number: Option<String>,
    position: Option<String>,
    points: Option<String>,
    grid: Option<String>,
    status: Option<String>,
    #[serde(rename = "Driver")]
    driver: ApiDriver,
    #[serde(rename = "Constructor")]
    constructor: ApiConstructor,
}

#[derive(Debug, Deserialize)]
struct ApiQualifying {
    #[serde(rename = "Driver")]
    driver: ApiDriver,
    #[serde(rename = "Q1")]
    q1: Option<String>,
    #[serde(rename = "Q2")]
    q2: Option<String>,
    #[serde(rename = "Q3")]
    q3: Option<String>,
}

fn races(json: &str) -> Result<Vec<ApiRace>> {
    let envelope: Envelope = serde_json::from_str(json)?;
    Ok(envelope.data.race_table.races)
}

fn parse_number<T: std::str::FromStr>(field: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| PredictorError::Parse(format!("invalid {}: {:?}", field, value)))
}

/// Optional numeric field; empty strings count as missing
fn parse_optional<T: std::str::FromStr>(value: Option<&String>) -> Option<T> {
    value.and_then(|v| v.trim().parse().ok())
}

/// Parse a schedule response
pub fn parse_schedule(json: &str) -> Result<Vec<EventInfo>> {
    let mut events = races(json)?
        .into_iter()
        .map(|race| {
            Ok(EventInfo {
                year: parse_number("season", &race.season)?,
                round: parse_number("round", &race.round)?,
                name: race.race_name,
                sprint: race.sprint.is_some(),
            })
        })
        .collect::<Result<Vec<_>>>()?;
    events.sort_by_key(|e| e.round);
    Ok(events)
}

/// Parse a race results response; an empty race table yields no rows
pub fn parse_race_results(json: &str) -> Result<Vec<RaceRow>> {
    Ok(races(json)?
        .into_iter()
        .next()
        .map(|race| {
            race.results
                .into_iter()
                .map(|r| RaceRow {
                    driver: r.driver.identifier(),
                    driver_number: parse_optional(r.number.as_ref()),
                    team: r.constructor.constructor_id,
                    grid_position: parse_optional(r.grid.as_ref()),
                    finish_position: parse_optional(r.position.as_ref()),
                    points: parse_optional(r.points.as_ref()),
                    status: r.status,
                })
                .collect()
        })
        .unwrap_or_default())
}

/// Parse a qualifying response
pub fn parse_qualifying(json: &str) -> Result<Vec<QualifyingRow>> {
    Ok(races(json)?
        .into_iter()
        .next()
        .map(|race| {
            race.qualifying
                .into_iter()
                .map(|q| QualifyingRow {
                    driver: q.driver.identifier(),
                    q1: q.q1.as_deref().and_then(parse_lap_time),
                    q2: q.q2.as_deref().and_then(parse_lap_time),
                    q3: q.q3.as_deref().and_then(parse_lap_time),
                })
                .collect()
        })
        .unwrap_or_default())
}

/// Lap time like "1:29.179" or "58.123" in seconds
pub fn parse_lap_time(text: &str) -> Option<f64> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    let seconds = match text.split_once(':') {
        Some((minutes, rest)) => minutes.parse::<u32>().ok()? as f64 * 60.0 + rest.parse::<f64>().ok()?,
        None => text.parse::<f64>().ok()?,
    };
    (seconds.is_finite() && seconds > 0.0).then_some(seconds)
}
