//! Message types for poller communication

use std::collections::BTreeMap;

use tokio::sync::oneshot;

/// Commands that can be sent to a [`PollerActor`](super::poller::PollerActor)
#[derive(Debug)]
pub enum PollerCommand {
    /// Run one poll cycle now (bypassing the interval timer)
    ///
    /// Used for testing and manual refresh operations.
    PollNow {
        /// Channel to send the cycle report back
        respond_to: oneshot::Sender<CycleReport>,
    },

    /// Stop the poller after the current command
    Shutdown,
}

/// What happened to one series during a poll cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeriesOutcome {
    /// Rows were handed to the writer and persisted
    Written { rows: usize },

    /// Rows were handed to the writer, which dropped them
    WriteFailed { rows: usize },

    /// Nothing survived assembly, nothing was written
    NoRows,

    /// The metric query failed
    QueryFailed,

    /// The series name has no known column layout
    UnknownSeries,

    /// The payload carried no host identifier; dispatch suppressed
    EmptyHost,
}

/// Summary of one poll cycle of one host
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub host: String,

    /// Outcome per configured series name
    pub series: BTreeMap<String, SeriesOutcome>,
}

impl CycleReport {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            series: BTreeMap::new(),
        }
    }

    pub fn outcome(&self, series: &str) -> Option<SeriesOutcome> {
        self.series.get(series).copied()
    }

    /// Rows successfully written across all series
    pub fn rows_written(&self) -> usize {
        self.series
            .values()
            .map(|outcome| match outcome {
                SeriesOutcome::Written { rows } => *rows,
                _ => 0,
            })
            .sum()
    }
}
