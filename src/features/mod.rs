//! Feature extraction and encoding
//!
//! Converts collected race entries into model-ready features.

pub mod assembler;
pub mod encoding;
pub mod entity_stats;
pub mod form;

pub use assembler::{assemble, assemble_all, AssembledRow, FeatureVector, FEATURE_NAMES};
pub use encoding::CategoricalEncoder;
pub use entity_stats::{EntityStatistics, StatisticsTable};
pub use form::{EntityFormRecord, FormAggregator, FormTable};
