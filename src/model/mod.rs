//! Regression models
//!
//! Two stacked random forests:
//! - Position head: features -> finishing position
//! - Win head: features + predicted position -> win likelihood

pub mod bundle;
pub mod forest;
pub mod heads;

pub use bundle::TrainedModel;
pub use forest::{ForestParams, RandomForestRegressor};
pub use heads::{PositionHead, WinHead};
