//! Time-series storage for assembled rows
//!
//! ## Design
//!
//! - **Trait-based**: `SeriesStore` hides the concrete store behind the writer
//! - **Async**: all operations are async for use from the poller tasks
//! - **Best effort**: failed batches are dropped, never queued
//!
//! ## Stores
//!
//! - **InfluxDB** (default): 0.8 HTTP API
//! - **In-Memory**: records writes, used by tests
//!
//! ## Usage
//!
//! ```no_run
//! use pcp_collector::config::Config;
//! use pcp_collector::storage::{InfluxDbStore, Writer};
//!
//! # fn example() -> anyhow::Result<()> {
//! let config = Config::development();
//! let store = InfluxDbStore::new(&config.influxdb)?;
//! let writer = Writer::new(Box::new(store), config.influxdb.database.clone());
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod error;
pub mod influxdb;
pub mod memory;
pub mod writer;

pub use backend::{SeriesBatch, SeriesStore};
pub use error::{StorageError, StorageResult};
pub use influxdb::InfluxDbStore;
pub use memory::MemoryStore;
pub use writer::Writer;
