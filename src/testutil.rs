//! Shared fixtures for unit tests

use crate::RaceEntry;

pub const DRIVERS: [(&str, &str); 10] = [
    ("VER", "red_bull"),
    ("PER", "red_bull"),
    ("NOR", "mclaren"),
    ("PIA", "mclaren"),
    ("LEC", "ferrari"),
    ("HAM", "ferrari"),
    ("RUS", "mercedes"),
    ("ANT", "mercedes"),
    ("ALO", "aston_martin"),
    ("STR", "aston_martin"),
];

const POINTS: [f64; 10] = [25.0, 18.0, 15.0, 12.0, 10.0, 8.0, 6.0, 4.0, 2.0, 1.0];

pub fn entry(year: u16, round: u8, driver: &str, team: &str, grid: u8, finish: u8) -> RaceEntry {
    RaceEntry {
        year,
        round,
        event_name: format!("Round {} Grand Prix", round),
        driver: driver.to_string(),
        driver_number: 0,
        team: team.to_string(),
        grid_position: grid,
        finish_position: finish,
        points: 0.0,
        status: "Finished".to_string(),
        q1_time: None,
        q2_time: None,
        q3_time: None,
    }
}

/// 10 drivers x `rounds` events where everyone finishes where they start,
/// in the fixed order of `DRIVERS`
pub fn synthetic_season(rounds: u8) -> Vec<RaceEntry> {
    let mut entries = Vec::new();
    for round in 1..=rounds {
        for (i, (driver, team)) in DRIVERS.iter().enumerate() {
            let pos = i as u8 + 1;
            let mut e = entry(2025, round, driver, team, pos, pos);
            e.points = POINTS[i];
            entries.push(e);
        }
    }
    entries
}
