//! Writer: batches rows per series and persists them
//!
//! ## Provisioning
//!
//! The destination database is created lazily, right before the first write of
//! the process. The `provisioned` flag is shared by every poller and lives
//! behind an async mutex; provisioning runs while holding it, so concurrent
//! writers wait instead of racing ahead of the creation call.
//!
//! ```text
//! write() ──► unknown series? ──yes──► false (no network call)
//!                  │ no
//!                  ▼
//!             no well-formed rows? ──yes──► false (no network call)
//!                  │
//!                  ▼
//!             provisioned? ──no──► create_database (failure only logged)
//!                  │
//!                  ▼
//!             write_series ──ok──► true
//!                  │ err
//!                  ▼
//!             400? ──yes──► provisioned = false
//!                  ▼
//!                false (batch dropped)
//! ```

use tokio::sync::Mutex;
use tracing::{debug, error, info, instrument, trace, warn};

use super::backend::{SeriesBatch, SeriesStore};
use crate::assemble::Row;
use crate::schema::Series;

pub struct Writer {
    store: Box<dyn SeriesStore>,

    /// Database created on first write
    database: String,

    /// Whether the database was (attempted to be) created
    provisioned: Mutex<bool>,
}

impl Writer {
    pub fn new(store: Box<dyn SeriesStore>, database: impl Into<String>) -> Self {
        let store_description = store.describe();
        let database = database.into();
        debug!("creating writer for {store_description}");

        Self {
            store,
            database,
            provisioned: Mutex::new(false),
        }
    }

    pub async fn is_provisioned(&self) -> bool {
        *self.provisioned.lock().await
    }

    /// Persist `rows` as one write of `series`.
    ///
    /// Returns `false` on any failure; callers carry on with the next cycle.
    #[instrument(skip(self, rows), fields(rows = rows.len()))]
    pub async fn write(&self, rows: Vec<Row>, series: &str) -> bool {
        let series = match Series::from_name(series) {
            Ok(series) => series,
            Err(e) => {
                error!("{e}, skipping write");
                return false;
            }
        };

        let width = series.columns().len();
        let (points, malformed): (Vec<_>, Vec<_>) =
            rows.into_iter().partition(|row| row.len() == width);
        if !malformed.is_empty() {
            warn!(
                "dropping {} {series} rows not matching the {width} column layout",
                malformed.len()
            );
        }
        if points.is_empty() {
            warn!("no {series} rows left to write");
            return false;
        }

        self.provision().await;

        let batch = SeriesBatch::new(series, points);
        trace!("submitting {batch:?}");

        match self.store.write_series(&batch).await {
            Ok(()) => {
                trace!("wrote {} {series} rows", batch.points.len());
                true
            }
            Err(e) => {
                error!("failed to write {series} to {}: {e}", self.store.describe());
                error!(
                    "data: {}",
                    serde_json::to_string(&batch).unwrap_or_else(|_| format!("{batch:?}"))
                );

                if e.is_schema_mismatch() {
                    warn!("store rejected {series}, database will be provisioned again");
                    *self.provisioned.lock().await = false;
                }
                false
            }
        }
    }

    async fn provision(&self) {
        let mut provisioned = self.provisioned.lock().await;
        if *provisioned {
            return;
        }
        *provisioned = true;

        match self.store.create_database(&self.database).await {
            Ok(()) => info!("created database {}", self.database),
            Err(e) => error!("database creation failed with: {e}"),
        }
    }
}
