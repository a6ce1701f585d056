//! PollerActor - Pulls metrics from one host and writes them as rows
//!
//! Every discovered host gets its own poller task. Hosts never wait on each
//! other: a failing host only loses its own cycles.
//!
//! ## Cycle
//!
//! ```text
//! Timer tick ─► for each configured series:
//!                 Query (fetch raw metrics)
//!                   ─► Resolve (catalog + instance names)
//!                   ─► Assemble (rows in column order)
//!                   ─► Dispatch (Writer)
//!     ↑
//!     └─── Commands (PollNow, Shutdown) / CancellationToken
//! ```
//!
//! Cancellation is observed while sleeping between cycles and raced against
//! the cycle itself, so a pending network call never delays shutdown.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, instrument, trace, warn};

use crate::assemble::{Row, assemble};
use crate::pcp::MetricSourceHandle;
use crate::schema::{HOSTNAME, SchemaMapper, Series};
use crate::storage::Writer;

use super::messages::{CycleReport, PollerCommand, SeriesOutcome};

/// The per-host cycle: owns the host's metric source handle
pub struct Poller {
    source: MetricSourceHandle,

    schema: Arc<SchemaMapper>,

    writer: Arc<Writer>,

    /// Refetch the catalog once it is older than this
    catalog_refresh: Option<Duration>,
}

impl Poller {
    pub fn new(
        source: MetricSourceHandle,
        schema: Arc<SchemaMapper>,
        writer: Arc<Writer>,
        catalog_refresh: Option<Duration>,
    ) -> Self {
        Self {
            source,
            schema,
            writer,
            catalog_refresh,
        }
    }

    pub fn host(&self) -> &str {
        self.source.host()
    }

    /// Run one Query -> Resolve -> Assemble -> Dispatch pass over every
    /// configured series.
    #[instrument(skip(self), fields(host = %self.source.host()))]
    pub async fn poll_cycle(&mut self) -> CycleReport {
        self.refresh_catalog_if_due().await;

        let mut report = CycleReport::new(self.source.host());
        let schema = self.schema.clone();

        for name in schema.series_names() {
            let outcome = self.poll_series(&schema, name).await;
            trace!("{name}: {outcome:?}");
            report.series.insert(name.to_string(), outcome);
        }

        report
    }

    async fn poll_series(&mut self, schema: &SchemaMapper, name: &str) -> SeriesOutcome {
        let series = match Series::from_name(name) {
            Ok(series) => series,
            Err(e) => {
                error!("{e}, skipping");
                return SeriesOutcome::UnknownSeries;
            }
        };

        let metrics = schema.metrics_for(name);
        if metrics.is_empty() {
            debug!("no metrics configured for {series}");
            return SeriesOutcome::NoRows;
        }

        let response = match self.source.fetch(metrics).await {
            Ok(response) => response,
            Err(e) => {
                error!("{series}: {e:#}");
                return SeriesOutcome::QueryFailed;
            }
        };

        let resolved = self.source.resolve(response.values).await;

        let time = if response.timestamp.s > 0 {
            response.timestamp.s
        } else {
            Utc::now().timestamp()
        };
        let rows = assemble(series, metrics, self.source.host(), time, &resolved);

        if rows.is_empty() {
            debug!("no complete {series} rows this cycle");
            return SeriesOutcome::NoRows;
        }

        if missing_hostname(series, &rows) {
            warn!("empty host identifier, not dispatching {series}");
            return SeriesOutcome::EmptyHost;
        }

        let count = rows.len();
        if self.writer.write(rows, name).await {
            SeriesOutcome::Written { rows: count }
        } else {
            SeriesOutcome::WriteFailed { rows: count }
        }
    }

    /// An empty catalog is retried every cycle; a filled one only when
    /// `catalog_refresh` is set and has elapsed.
    async fn refresh_catalog_if_due(&mut self) {
        let due = match (self.source.catalog_age(), self.catalog_refresh) {
            _ if self.source.catalog().is_empty() => true,
            (Some(age), Some(every)) => age >= every,
            _ => false,
        };

        if due {
            match self.source.refresh_catalog().await {
                Ok(count) => debug!("refreshed catalog ({count} metrics)"),
                Err(e) => warn!("catalog refresh failed: {e:#}"),
            }
        }
    }
}

/// True when any row of the payload lacks a host identifier
fn missing_hostname(series: Series, rows: &[Row]) -> bool {
    let Some(index) = series.column_index(HOSTNAME) else {
        return true;
    };

    rows.iter().any(|row| match row.get(index) {
        Some(Value::String(host)) => host.trim().is_empty(),
        _ => true,
    })
}

/// Actor driving a [`Poller`] on a fixed interval
pub struct PollerActor {
    poller: Poller,

    /// Command receiver for control messages
    command_rx: mpsc::Receiver<PollerCommand>,

    /// Process-wide shutdown signal
    cancel: CancellationToken,

    interval_duration: Duration,
}

impl PollerActor {
    pub fn new(
        poller: Poller,
        command_rx: mpsc::Receiver<PollerCommand>,
        cancel: CancellationToken,
        interval_duration: Duration,
    ) -> Self {
        Self {
            poller,
            command_rx,
            cancel,
            interval_duration,
        }
    }

    /// Run the actor's main loop
    ///
    /// Runs until the cancellation token fires, a Shutdown command arrives or
    /// every handle has been dropped.
    #[instrument(skip(self), fields(host = %self.poller.host()))]
    pub async fn run(mut self) {
        debug!(
            "starting poller with interval {}s",
            self.interval_duration.as_secs()
        );

        let mut ticker = interval(self.interval_duration);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let cancel = self.cancel.clone();

        loop {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => {
                    debug!("cancelled");
                    break;
                }

                _ = ticker.tick() => {
                    tokio::select! {
                        _ = cancel.cancelled() => {
                            debug!("cancelled during poll cycle");
                            break;
                        }
                        report = self.poller.poll_cycle() => {
                            trace!("cycle done, {} rows written", report.rows_written());
                        }
                    }
                }

                cmd = self.command_rx.recv() => {
                    match cmd {
                        Some(PollerCommand::PollNow { respond_to }) => {
                            debug!("received PollNow command");
                            let report = self.poller.poll_cycle().await;
                            let _ = respond_to.send(report);
                        }

                        Some(PollerCommand::Shutdown) => {
                            debug!("received shutdown command");
                            break;
                        }

                        None => {
                            warn!("command channel closed, shutting down");
                            break;
                        }
                    }
                }
            }
        }

        debug!("poller stopped");
    }
}

/// Handle for controlling a PollerActor
///
/// Cheap to clone; all clones talk to the same task.
#[derive(Clone)]
pub struct PollerHandle {
    sender: mpsc::Sender<PollerCommand>,

    /// Host the poller is bound to
    pub host: String,
}

impl PollerHandle {
    /// Spawn the actor as a tokio task and return its handle
    pub fn spawn(poller: Poller, interval: Duration, cancel: CancellationToken) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel(32);
        let host = poller.host().to_string();

        let actor = PollerActor::new(poller, cmd_rx, cancel, interval);
        tokio::spawn(actor.run());

        Self {
            sender: cmd_tx,
            host,
        }
    }

    /// Trigger an immediate poll cycle and wait for its report
    pub async fn poll_now(&self) -> Result<CycleReport> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(PollerCommand::PollNow { respond_to: tx })
            .await
            .context("failed to send PollNow command")?;

        rx.await.context("failed to receive cycle report")
    }

    /// Gracefully shut down the poller
    pub async fn shutdown(&self) -> Result<()> {
        self.sender
            .send(PollerCommand::Shutdown)
            .await
            .context("failed to send Shutdown command")?;
        Ok(())
    }

    /// Resolves once the actor task has exited
    pub async fn stopped(&self) {
        self.sender.closed().await
    }

    pub fn host(&self) -> &str {
        &self.host
    }
}
