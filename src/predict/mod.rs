//! Prediction and inference
//!
//! Load trained models and generate predictions, with rule-based scores
//! and a grid-only fallback.

pub mod heuristics;
pub mod inference;

pub use heuristics::fallback_prediction;
pub use inference::{format_prediction, Predictor};
