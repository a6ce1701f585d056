//! InfluxDB (0.8 HTTP API) store
//!
//! - `POST /db` creates a database
//! - `POST /db/{database}/series?time_precision=s` writes series
//!
//! Credentials travel as the `u` and `p` query parameters.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{StatusCode, Url};
use tracing::{debug, trace};

use super::backend::{SeriesBatch, SeriesStore};
use super::error::{StorageError, StorageResult};
use crate::config::InfluxdbConfig;

pub struct InfluxDbStore {
    endpoint: Url,
    username: String,
    password: String,
    database: String,

    /// HTTP client (reused across requests)
    client: reqwest::Client,
}

impl InfluxDbStore {
    pub fn new(config: &InfluxdbConfig) -> StorageResult<Self> {
        let endpoint = Url::parse(&config.endpoint())
            .map_err(|e| StorageError::InvalidConfig(format!("{}: {e}", config.endpoint())))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| StorageError::InvalidConfig(e.to_string()))?;

        Ok(Self {
            endpoint,
            username: config.username.clone(),
            password: config.password.clone(),
            database: config.database.clone(),
            client,
        })
    }

    fn url(&self, path: &str) -> StorageResult<Url> {
        self.endpoint
            .join(path)
            .map_err(|e| StorageError::InvalidConfig(format!("{path}: {e}")))
    }

    fn credentials(&self) -> [(&str, &str); 2] {
        [("u", self.username.as_str()), ("p", self.password.as_str())]
    }

    async fn rejection(response: reqwest::Response) -> StorageError {
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "failed to retrieve response text".to_string());
        StorageError::Rejected { status, body }
    }
}

#[async_trait]
impl SeriesStore for InfluxDbStore {
    async fn create_database(&self, name: &str) -> StorageResult<()> {
        let response = self
            .client
            .post(self.url("db")?)
            .query(&self.credentials())
            .json(&serde_json::json!({ "name": name }))
            .send()
            .await?;

        match response.status() {
            status if status.is_success() => Ok(()),
            StatusCode::CONFLICT => {
                debug!("database {name} already exists");
                Ok(())
            }
            _ => Err(Self::rejection(response).await),
        }
    }

    async fn write_series(&self, batch: &SeriesBatch) -> StorageResult<()> {
        let url = self.url(&format!("db/{}/series", self.database))?;
        trace!("writing {} points of {} to {url}", batch.points.len(), batch.name);

        let response = self
            .client
            .post(url)
            .query(&self.credentials())
            .query(&[("time_precision", "s")])
            .json(&[batch])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::rejection(response).await);
        }

        Ok(())
    }

    fn describe(&self) -> String {
        format!("InfluxDB at {} (database {})", self.endpoint, self.database)
    }
}
