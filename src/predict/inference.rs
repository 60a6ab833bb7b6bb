//! Predictor facade
//!
//! Owns the trained model behind a read/write lock. Training and loading
//! build a complete model before swapping it in; predictions only take a
//! read lock and never fail outwardly.

use parking_lot::RwLock;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::features::assembler::{DEFAULT_AVG_RECENT_FINISH, DEFAULT_RECENT_POINTS, DEFAULT_TEAM_AVG_FINISH};
use crate::features::{CategoricalEncoder, FeatureVector};
use crate::model::TrainedModel;
use crate::predict::heuristics::{confidence, fallback_prediction, podium_probability, round4};
use crate::training::{Trainer, TrainingReport};
use crate::{
    Config, EntityKind, FallbackReason, Prediction, PredictionOutcome, PredictionRequest,
    PredictionSource, PredictorError, RaceEntry, Result,
};

/// Recent points are estimated as this many races at the driver's mean
const RECENT_POINTS_RACES: f64 = 3.0;

enum PredictorState {
    Untrained,
    Trained(Arc<TrainedModel>),
}

/// Race outcome predictor
pub struct Predictor {
    config: Config,
    model_path: PathBuf,
    state: RwLock<PredictorState>,
}

impl Predictor {
    /// Create an untrained predictor; the artifact at the configured model
    /// path is loaded on first use
    pub fn new(config: Config) -> Self {
        let model_path = PathBuf::from(&config.data.model_path);
        Predictor {
            config,
            model_path,
            state: RwLock::new(PredictorState::Untrained),
        }
    }

    /// Create a predictor around an already trained model
    pub fn with_model(config: Config, model: TrainedModel) -> Self {
        let predictor = Self::new(config);
        *predictor.state.write() = PredictorState::Trained(Arc::new(model));
        predictor
    }

    pub fn model_path(&self) -> &Path {
        &self.model_path
    }

    pub fn is_trained(&self) -> bool {
        matches!(*self.state.read(), PredictorState::Trained(_))
    }

    /// Currently loaded model, if any
    pub fn model(&self) -> Option<Arc<TrainedModel>> {
        match &*self.state.read() {
            PredictorState::Trained(model) => Some(Arc::clone(model)),
            PredictorState::Untrained => None,
        }
    }

    /// Fit both heads, persist the artifact, then start serving the new
    /// model. On error the previous state is left untouched.
    pub fn train(&self, entries: &[RaceEntry]) -> Result<TrainingReport> {
        let model = Trainer::new(&self.config).train(entries)?;
        model.save(&self.model_path)?;

        let report = model.report.clone();
        *self.state.write() = PredictorState::Trained(Arc::new(model));
        log::info!("Training complete: {}", report.position);
        Ok(report)
    }

    /// Replace the current state with the persisted artifact
    pub fn load(&self) -> Result<Arc<TrainedModel>> {
        let model = Arc::new(TrainedModel::load(&self.model_path)?);
        *self.state.write() = PredictorState::Trained(Arc::clone(&model));
        Ok(model)
    }

    /// Predict one entrant, degrading to the grid-based fallback instead of
    /// failing
    pub fn predict(&self, request: &PredictionRequest) -> PredictionOutcome {
        let model = match self.current_model() {
            Ok(model) => model,
            Err(reason) => return fallback(request, reason),
        };

        match infer(&model, request) {
            Ok(outcome) => outcome,
            Err(e) => fallback(request, FallbackReason::InferenceError(e.to_string())),
        }
    }

    /// Predict every entrant of an event independently
    pub fn predict_field(&self, requests: &[PredictionRequest]) -> Vec<PredictionOutcome> {
        requests.iter().map(|r| self.predict(r)).collect()
    }

    fn current_model(&self) -> std::result::Result<Arc<TrainedModel>, FallbackReason> {
        if let Some(model) = self.model() {
            return Ok(model);
        }
        if !self.model_path.exists() {
            return Err(FallbackReason::NoModel);
        }
        self.load()
            .map_err(|e| FallbackReason::InferenceError(e.to_string()))
    }
}

fn fallback(request: &PredictionRequest, reason: FallbackReason) -> PredictionOutcome {
    log::warn!(
        "Falling back to grid estimate for {} ({}): {}",
        request.driver_id,
        request.team_id,
        reason
    );
    PredictionOutcome {
        prediction: fallback_prediction(request.grid_position),
        source: PredictionSource::Fallback(reason),
    }
}

/// Known id, or the first vocabulary entry in its place
fn resolve<'a>(encoder: &'a CategoricalEncoder, id: &'a str) -> Option<(&'a str, bool)> {
    if encoder.contains(id) {
        return Some((id, false));
    }
    let substitute = encoder.first()?;
    log::debug!("Unknown {} {}, substituting {}", encoder.kind(), id, substitute);
    Some((substitute, true))
}

fn checked_override(value: Option<f64>, name: &str) -> Result<Option<f64>> {
    match value {
        Some(v) if !v.is_finite() => Err(PredictorError::Inference(format!("{} is not finite", name))),
        other => Ok(other),
    }
}

fn infer(model: &TrainedModel, request: &PredictionRequest) -> Result<PredictionOutcome> {
    let Some((driver, driver_substituted)) = resolve(&model.driver_encoder, &request.driver_id) else {
        return Ok(fallback(request, FallbackReason::EmptyVocabulary(EntityKind::Driver)));
    };
    let Some((team, team_substituted)) = resolve(&model.team_encoder, &request.team_id) else {
        return Ok(fallback(request, FallbackReason::EmptyVocabulary(EntityKind::Team)));
    };

    let driver_stats = model.driver_stats.get(driver);
    let team_stats = model.team_stats.get(team);

    let avg_recent_finish = checked_override(request.avg_recent_finish, "avg_recent_finish")?
        .or_else(|| driver_stats.and_then(|s| s.avg_finish()))
        .unwrap_or(DEFAULT_AVG_RECENT_FINISH);
    let recent_points = checked_override(request.recent_points, "recent_points")?
        .or_else(|| driver_stats.and_then(|s| s.avg_points()).map(|p| p * RECENT_POINTS_RACES))
        .unwrap_or(DEFAULT_RECENT_POINTS);
    let team_avg_finish = team_stats
        .and_then(|s| s.avg_finish())
        .unwrap_or(DEFAULT_TEAM_AVG_FINISH);

    let features = FeatureVector {
        driver_code: model.driver_encoder.encode(driver)? as f64,
        team_code: model.team_encoder.encode(team)? as f64,
        grid_position: request.grid_position as f64,
        avg_recent_finish,
        recent_points,
        team_avg_finish,
    };

    let predicted_position = model.position.predict(&features)?;
    let win_probability = model.win.predict(&features, predicted_position as f64)?;

    let prediction = Prediction {
        predicted_position,
        win_probability: round4(win_probability),
        podium_probability: round4(podium_probability(
            predicted_position,
            request.grid_position,
            driver_stats,
        )),
        confidence: round4(confidence(request.grid_position, driver_stats)),
    };

    let source = if driver_substituted || team_substituted {
        PredictionSource::Substituted {
            driver: driver_substituted.then(|| driver.to_string()),
            team: team_substituted.then(|| team.to_string()),
        }
    } else {
        PredictionSource::Model
    };

    Ok(PredictionOutcome { prediction, source })
}

/// Human-readable summary of one prediction
pub fn format_prediction(request: &PredictionRequest, outcome: &PredictionOutcome) -> String {
    let p = &outcome.prediction;
    format!(
        r#"
┌─────────────────────────────────────────────────┐
│  {} ({}) from P{}
├─────────────────────────────────────────────────┤
│  Predicted finish:  P{}
│  Win probability:   {:.1}%
│  Podium:            {:.1}%
│  Confidence:        {:.2}
│  Source:            {}
└─────────────────────────────────────────────────┘
"#,
        request.driver_id,
        request.team_id,
        request.grid_position,
        p.predicted_position,
        p.win_probability * 100.0,
        p.podium_probability * 100.0,
        p.confidence,
        outcome.source
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::synthetic_season;
    use approx::assert_relative_eq;
    use tempfile::TempDir;

    fn config_in(dir: &TempDir, trees: usize) -> Config {
        let mut config = Config::default();
        config.data.model_path = dir
            .path()
            .join("model")
            .join("race_predictor.json")
            .to_string_lossy()
            .into_owned();
        config.position_model.n_estimators = trees;
        config.win_model.n_estimators = trees;
        config
    }

    fn trained(dir: &TempDir, trees: usize) -> Predictor {
        let predictor = Predictor::new(config_in(dir, trees));
        predictor.train(&synthetic_season(5)).unwrap();
        predictor
    }

    fn assert_in_contract(p: &Prediction) {
        assert!((1..=20).contains(&p.predicted_position));
        assert!((0.01..=0.95).contains(&p.win_probability));
        assert!((0.0..=1.0).contains(&p.podium_probability));
        assert!((0.0..=1.0).contains(&p.confidence));
    }

    #[test]
    fn test_untrained_without_artifact_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let predictor = Predictor::new(config_in(&dir, 10));

        for grid in [1u32, 2, 4, 7, 20] {
            let outcome = predictor.predict(&PredictionRequest::new("VER", "red_bull", grid));
            assert_eq!(outcome.source, PredictionSource::Fallback(FallbackReason::NoModel));
            assert_relative_eq!(
                outcome.prediction.win_probability,
                round4((0.5 / grid as f64).max(0.01))
            );
            assert_relative_eq!(outcome.prediction.confidence, 0.3);
        }
        assert!(!predictor.is_trained());
    }

    #[test]
    fn test_end_to_end_front_runner() {
        let dir = tempfile::tempdir().unwrap();
        let predictor = trained(&dir, 200);

        let outcome = predictor.predict(&PredictionRequest::new("VER", "red_bull", 1));
        assert_eq!(outcome.source, PredictionSource::Model);
        assert!(outcome.prediction.predicted_position <= 5);
        assert!(outcome.prediction.win_probability > fallback_prediction(1).win_probability);
    }

    #[test]
    fn test_unknown_driver_is_substituted() {
        let dir = tempfile::tempdir().unwrap();
        let predictor = trained(&dir, 20);

        let outcome = predictor.predict(&PredictionRequest::new("BOR", "red_bull", 8));
        assert!(!outcome.is_fallback());
        assert_eq!(
            outcome.source,
            PredictionSource::Substituted {
                driver: Some("ALO".to_string()),
                team: None,
            }
        );

        let outcome = predictor.predict(&PredictionRequest::new("HUL", "sauber", 12));
        assert_eq!(
            outcome.source,
            PredictionSource::Substituted {
                driver: Some("ALO".to_string()),
                team: Some("aston_martin".to_string()),
            }
        );
    }

    #[test]
    fn test_outputs_stay_in_contract() {
        let dir = tempfile::tempdir().unwrap();
        let predictor = trained(&dir, 20);

        for grid in [0u32, 1, 3, 10, 20, 25, 100] {
            for (driver, team) in [("VER", "red_bull"), ("STR", "aston_martin"), ("XXX", "yyy")] {
                let outcome = predictor.predict(&PredictionRequest::new(driver, team, grid));
                assert_in_contract(&outcome.prediction);
            }
        }
    }

    #[test]
    fn test_non_finite_override_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let predictor = trained(&dir, 10);

        let mut request = PredictionRequest::new("VER", "red_bull", 3);
        request.recent_points = Some(f64::NAN);
        let outcome = predictor.predict(&request);
        assert!(matches!(
            outcome.source,
            PredictionSource::Fallback(FallbackReason::InferenceError(_))
        ));
        assert_in_contract(&outcome.prediction);
    }

    #[test]
    fn test_empty_vocabulary_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(&dir, 10);
        let model = Trainer::new(&config).train(&synthetic_season(5)).unwrap();

        let mut no_drivers = model.clone();
        no_drivers.driver_encoder = CategoricalEncoder::fit(EntityKind::Driver, Vec::<String>::new());
        let mut no_teams = model;
        no_teams.team_encoder = CategoricalEncoder::fit(EntityKind::Team, Vec::<String>::new());

        for (model, kind) in [(no_drivers, EntityKind::Driver), (no_teams, EntityKind::Team)] {
            let predictor = Predictor::with_model(config.clone(), model);
            for grid in [1u32, 5, 12] {
                let outcome = predictor.predict(&PredictionRequest::new("VER", "red_bull", grid));
                assert_eq!(
                    outcome.source,
                    PredictionSource::Fallback(FallbackReason::EmptyVocabulary(kind))
                );
                assert_eq!(outcome.prediction, fallback_prediction(grid));
            }
        }
    }

    #[test]
    fn test_reload_gives_identical_predictions() {
        let dir = tempfile::tempdir().unwrap();
        let first = trained(&dir, 30);
        assert!(first.model_path().exists());

        let second = Predictor::new(config_in(&dir, 30));
        assert!(!second.is_trained());

        let requests = vec![
            PredictionRequest::new("VER", "red_bull", 1),
            PredictionRequest::new("LEC", "ferrari", 6),
            PredictionRequest::new("NEW", "mclaren", 14),
        ];
        assert_eq!(first.predict_field(&requests), second.predict_field(&requests));
        assert!(second.is_trained());
        assert_eq!(first.model(), second.model());
    }

    #[test]
    fn test_overrides_change_features() {
        let dir = tempfile::tempdir().unwrap();
        let predictor = trained(&dir, 30);

        let mut request = PredictionRequest::new("STR", "aston_martin", 10);
        let baseline = predictor.predict(&request);
        request.avg_recent_finish = Some(1.0);
        request.recent_points = Some(75.0);
        let boosted = predictor.predict(&request);

        assert_eq!(boosted.source, PredictionSource::Model);
        assert!(boosted.prediction.predicted_position <= baseline.prediction.predicted_position);
    }

    #[test]
    fn test_format_prediction() {
        let request = PredictionRequest::new("LEC", "ferrari", 4);
        let outcome = PredictionOutcome {
            prediction: fallback_prediction(4),
            source: PredictionSource::Fallback(FallbackReason::NoModel),
        };
        let text = format_prediction(&request, &outcome);
        assert!(text.contains("LEC (ferrari) from P4"));
        assert!(text.contains("12.5%"));
        assert!(text.contains("fallback (no trained model)"));
    }

    #[test]
    fn test_failed_training_keeps_state() {
        let dir = tempfile::tempdir().unwrap();
        let predictor = Predictor::new(config_in(&dir, 10));
        assert!(predictor.train(&[]).is_err());
        assert!(!predictor.is_trained());
        assert!(!predictor.model_path().exists());
    }
}
