//! Data ingestion and storage
//!
//! Race result sources and SQLite database management.

pub mod database;
pub mod sources;

pub use database::{Database, DatabaseStats};
pub use sources::{collect_seasons, CollectOptions, CollectionSummary, JolpicaClient, RaceDataSource};
