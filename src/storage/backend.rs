//! Time-series store trait definition

use async_trait::async_trait;
use serde::Serialize;

use super::error::StorageResult;
use crate::assemble::Row;
use crate::schema::Series;

/// One named series write: column list plus rows in that column order
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesBatch {
    pub name: String,
    pub columns: Vec<String>,
    pub points: Vec<Row>,
}

impl SeriesBatch {
    pub fn new(series: Series, points: Vec<Row>) -> Self {
        Self {
            name: series.name().to_string(),
            columns: series.columns().iter().map(|c| c.to_string()).collect(),
            points,
        }
    }
}

/// Trait for time-series stores the writer can persist to
///
/// Implementations must be `Send + Sync`: one store is shared by every
/// host's poller.
#[async_trait]
pub trait SeriesStore: Send + Sync {
    /// Create the destination database.
    ///
    /// Called before the first write and again after a schema mismatch.
    /// An already existing database is not an error.
    async fn create_database(&self, name: &str) -> StorageResult<()>;

    /// Write one batch with second time precision
    async fn write_series(&self, batch: &SeriesBatch) -> StorageResult<()>;

    /// Human-readable description for logs (e.g. "InfluxDB at http://...")
    fn describe(&self) -> String;
}
