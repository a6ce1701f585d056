//! Redis-backed host registry
//!
//! The scheduler publishes the fleet as a Redis set; every member is a host
//! name running the metrics agent.

use std::time::Duration;

use async_trait::async_trait;
use redis::AsyncCommands;
use tracing::trace;

use super::{DiscoveryError, HostRegistry, HostSet};
use crate::config::RedisConfig;

const QUERY_TIMEOUT: Duration = Duration::from_secs(5);

pub struct RedisRegistry {
    client: redis::Client,
    url: String,
    key: String,
}

impl RedisRegistry {
    pub fn new(config: &RedisConfig) -> Result<Self, DiscoveryError> {
        let url = config.url();
        let client = redis::Client::open(url.as_str())
            .map_err(|e| DiscoveryError::Registry(format!("{url}: {e}")))?;

        Ok(Self {
            client,
            url,
            key: config.key.clone(),
        })
    }

    async fn members(&self) -> redis::RedisResult<Vec<String>> {
        let mut connection = self.client.get_multiplexed_async_connection().await?;
        connection.smembers(&self.key).await
    }
}

#[async_trait]
impl HostRegistry for RedisRegistry {
    async fn resolve(&self) -> Result<HostSet, DiscoveryError> {
        let mut members = tokio::time::timeout(QUERY_TIMEOUT, self.members())
            .await
            .map_err(|_| DiscoveryError::Registry(format!("{}: query timed out", self.url)))?
            .map_err(|e| DiscoveryError::Registry(format!("{}: {e}", self.url)))?;

        // set members come back unordered
        members.sort();
        trace!("registry key {} holds {members:?}", self.key);

        Ok(members.into_iter().collect())
    }

    fn describe(&self) -> String {
        format!("{} (key {})", self.url, self.key)
    }
}
