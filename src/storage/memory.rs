//! In-memory store (no persistence)
//!
//! Records every created database and written batch. Failures can be queued
//! up front, which makes it the store of choice for exercising the writer and
//! the pollers without a running InfluxDB.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use tracing::debug;

use super::backend::{SeriesBatch, SeriesStore};
use super::error::{StorageError, StorageResult};
use crate::assemble::Row;

#[derive(Debug, Default)]
struct MemoryState {
    databases: Vec<String>,
    batches: Vec<SeriesBatch>,
    create_calls: usize,
    write_calls: usize,
    create_failures: VecDeque<StorageError>,
    write_failures: VecDeque<StorageError>,
}

/// Cloneable handle to a shared in-memory store
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        // a panicking test thread must not hide the recorded data from others
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Make the next `create_database` call fail with `err`
    pub fn fail_next_create(&self, err: StorageError) {
        self.state().create_failures.push_back(err);
    }

    /// Make the next `write_series` call fail with `err`
    pub fn fail_next_write(&self, err: StorageError) {
        self.state().write_failures.push_back(err);
    }

    pub fn create_calls(&self) -> usize {
        self.state().create_calls
    }

    pub fn write_calls(&self) -> usize {
        self.state().write_calls
    }

    pub fn databases(&self) -> Vec<String> {
        self.state().databases.clone()
    }

    pub fn batches(&self) -> Vec<SeriesBatch> {
        self.state().batches.clone()
    }

    /// All rows written for `series`, in write order
    pub fn rows_for(&self, series: &str) -> Vec<Row> {
        self.state()
            .batches
            .iter()
            .filter(|b| b.name == series)
            .flat_map(|b| b.points.iter().cloned())
            .collect()
    }
}

#[async_trait]
impl SeriesStore for MemoryStore {
    async fn create_database(&self, name: &str) -> StorageResult<()> {
        let mut state = self.state();
        state.create_calls += 1;

        if let Some(err) = state.create_failures.pop_front() {
            return Err(err);
        }

        if !state.databases.iter().any(|d| d == name) {
            debug!("in-memory store: created database {name}");
            state.databases.push(name.to_string());
        }
        Ok(())
    }

    async fn write_series(&self, batch: &SeriesBatch) -> StorageResult<()> {
        let mut state = self.state();
        state.write_calls += 1;

        if let Some(err) = state.write_failures.pop_front() {
            return Err(err);
        }

        state.batches.push(batch.clone());
        Ok(())
    }

    fn describe(&self) -> String {
        let state = self.state();
        format!(
            "In-Memory: {} batches across {} databases",
            state.batches.len(),
            state.databases.len()
        )
    }
}
