//! Rule-based podium, confidence and fallback scores
//!
//! These sit on top of the forests: podium probability and confidence are
//! never learned, and the fallback is used whenever the model can't be.

use crate::features::EntityStatistics;
use crate::model::heads::WIN_PROBABILITY_FLOOR;
use crate::{Prediction, MAX_POSITION, MIN_POSITION};

/// Confidence reported for every fallback prediction
pub const FALLBACK_CONFIDENCE: f64 = 0.3;

/// Podium likelihood from the predicted place, the driver's record and
/// the starting slot
pub fn podium_probability(
    predicted_position: u8,
    grid_position: u32,
    driver_stats: Option<&EntityStatistics>,
) -> f64 {
    let mut prob = match predicted_position {
        0..=3 => 0.70,
        4..=5 => 0.40,
        6..=10 => 0.10,
        _ => 0.02,
    };

    if let Some(stats) = driver_stats {
        prob = (prob + stats.podium_rate()) / 2.0;
    }

    let grid_bonus = match grid_position {
        0..=3 => 1.2,
        4..=5 => 1.1,
        _ => 1.0,
    };

    (prob * grid_bonus).clamp(0.0, 1.0)
}

/// Confidence grows with the driver's race count and a front-half start
pub fn confidence(grid_position: u32, driver_stats: Option<&EntityStatistics>) -> f64 {
    let mut score = 0.7;
    if let Some(stats) = driver_stats {
        score += (stats.total_races as f64 / 100.0).min(0.2);
    }
    if (1..=10).contains(&grid_position) {
        score += 0.1;
    }
    score.clamp(0.0, 1.0)
}

/// Grid-only estimate used when the model is unavailable or fails
pub fn fallback_prediction(grid_position: u32) -> Prediction {
    let grid = grid_position.max(1);
    let win_probability = (0.5 / grid as f64).max(WIN_PROBABILITY_FLOOR);
    let predicted_position = grid.clamp(MIN_POSITION as u32, MAX_POSITION as u32) as u8;

    Prediction {
        predicted_position,
        win_probability: round4(win_probability),
        podium_probability: round4((win_probability * 3.0).min(1.0)),
        confidence: FALLBACK_CONFIDENCE,
    }
}

/// Round to four decimal places for reporting
pub fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn stats(races: usize, podiums: usize) -> EntityStatistics {
        EntityStatistics {
            total_races: races,
            podiums,
            ..EntityStatistics::default()
        }
    }

    #[test]
    fn test_podium_buckets_without_history() {
        assert_relative_eq!(podium_probability(2, 8, None), 0.70);
        assert_relative_eq!(podium_probability(5, 8, None), 0.40);
        assert_relative_eq!(podium_probability(9, 8, None), 0.10);
        assert_relative_eq!(podium_probability(15, 8, None), 0.02);
    }

    #[test]
    fn test_podium_averages_history_and_grid_bonus() {
        let s = stats(10, 5);
        // (0.7 + 0.5) / 2 * 1.2
        assert_relative_eq!(podium_probability(1, 2, Some(&s)), 0.72);
        // (0.4 + 0.5) / 2 * 1.1
        assert_relative_eq!(podium_probability(4, 5, Some(&s)), 0.495);
    }

    #[test]
    fn test_podium_clamped() {
        let s = stats(4, 4);
        assert_relative_eq!(podium_probability(1, 1, Some(&s)), 1.0);
    }

    #[test]
    fn test_confidence() {
        assert_relative_eq!(confidence(15, None), 0.7);
        assert_relative_eq!(confidence(3, None), 0.8);
        assert_relative_eq!(confidence(3, Some(&stats(5, 0))), 0.85);
        assert_relative_eq!(confidence(3, Some(&stats(300, 0))), 1.0);
        assert_relative_eq!(confidence(0, Some(&stats(300, 0))), 0.9);
    }

    #[test]
    fn test_fallback_formula() {
        let p = fallback_prediction(4);
        assert_eq!(p.predicted_position, 4);
        assert_relative_eq!(p.win_probability, 0.125);
        assert_relative_eq!(p.podium_probability, 0.375);
        assert_relative_eq!(p.confidence, 0.3);

        let back = fallback_prediction(20);
        assert_relative_eq!(back.win_probability, 0.025);
    }

    #[test]
    fn test_fallback_stays_in_range() {
        let front = fallback_prediction(1);
        assert_relative_eq!(front.win_probability, 0.5);
        assert_relative_eq!(front.podium_probability, 1.0);

        let deep = fallback_prediction(60);
        assert_eq!(deep.predicted_position, 20);
        assert_relative_eq!(deep.win_probability, 0.01);

        assert_eq!(fallback_prediction(0).predicted_position, 1);
    }

    #[test]
    fn test_round4() {
        assert_relative_eq!(round4(0.123456), 0.1235);
        assert_relative_eq!(round4(1.0 / 3.0), 0.3333);
    }
}
