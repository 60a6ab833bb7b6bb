//! Model training
//!
//! Train/test split, two-stage fitting, and evaluation metrics.

pub mod metrics;
pub mod trainer;

pub use metrics::{RegressionMetrics, TrainingReport};
pub use trainer::{train_test_split, Trainer};
