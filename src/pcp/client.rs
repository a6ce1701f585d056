//! Per-host handle to a `pmwebd` agent
//!
//! The handle owns the pmwebd context id and the host's metric catalog. It is
//! created once at startup and then owned by the host's poller.
//!
//! ## Context revalidation
//!
//! pmwebd forgets a context after `polltimeout` seconds without requests. Any
//! non-success answer drops the cached context id; the next request creates a
//! fresh one.

use std::collections::HashMap;
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::Url;
use serde::de::DeserializeOwned;
use tokio::time::Instant;
use tracing::{debug, error, instrument, trace, warn};

use crate::config::PcpConfig;

use super::types::{
    Catalog, ContextResponse, FetchResponse, InstanceDomain, MetricList, MetricValue,
    NULL_INSTANCE, ResolvedInstance, ResolvedMetric,
};

pub struct MetricSourceHandle {
    /// Host identifier as returned by the registry
    host: String,

    /// Base URL of the agent (`http://host:port/`)
    endpoint: Url,

    client: reqwest::Client,

    poll_timeout: u32,

    /// pmwebd context, `None` until created or after it was invalidated
    context: Option<u64>,

    catalog: Catalog,

    catalog_fetched_at: Option<Instant>,
}

impl MetricSourceHandle {
    /// Open a handle for `host`.
    ///
    /// Only an unusable endpoint is an error. A failing context or catalog
    /// request is logged and leaves the handle without context or with an
    /// empty catalog; the host is kept either way.
    #[instrument(skip(config, client))]
    pub async fn open(host: &str, config: &PcpConfig, client: reqwest::Client) -> Result<Self> {
        let endpoint = Url::parse(&format!("http://{host}:{}/", config.port))
            .with_context(|| format!("invalid metric source endpoint for host '{host}'"))?;

        let mut handle = Self {
            host: host.to_string(),
            endpoint,
            client,
            poll_timeout: config.poll_timeout,
            context: None,
            catalog: Catalog::default(),
            catalog_fetched_at: None,
        };

        if let Err(e) = handle.refresh_context().await {
            warn!("failed to create context: {e:#}");
        }

        if let Err(e) = handle.refresh_catalog().await {
            error!("error fetching metrics for client: {e:#}");
        }

        Ok(handle)
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Time since the catalog was last fetched successfully
    pub fn catalog_age(&self) -> Option<Duration> {
        self.catalog_fetched_at.map(|at| at.elapsed())
    }

    pub fn invalidate_context(&mut self) {
        if let Some(context) = self.context.take() {
            debug!("dropping pmwebd context {context} for {}", self.host);
        }
    }

    /// Create a new pmwebd context, replacing the current one
    pub async fn refresh_context(&mut self) -> Result<u64> {
        self.context = None;
        let timeout = self.poll_timeout.to_string();
        let response: ContextResponse = self
            .get_json(
                "pmapi/context",
                &[("hostname", "localhost"), ("polltimeout", timeout.as_str())],
            )
            .await
            .context("failed to create pmwebd context")?;

        trace!("created context {} for {}", response.context, self.host);
        self.context = Some(response.context);
        Ok(response.context)
    }

    /// Fetch the full, unfiltered metric catalog
    pub async fn refresh_catalog(&mut self) -> Result<usize> {
        let context = self.ensure_context().await?;
        let list: MetricList = self
            .get_json(&format!("pmapi/{context}/_metric"), &[])
            .await
            .context("failed to fetch metric catalog")?;

        self.catalog = Catalog::from(list);
        self.catalog_fetched_at = Some(Instant::now());
        debug!(
            "cached {} metric descriptors for {}",
            self.catalog.len(),
            self.host
        );
        Ok(self.catalog.len())
    }

    /// Fetch current values for the given metric names
    pub async fn fetch(&mut self, names: &[String]) -> Result<FetchResponse> {
        let context = self.ensure_context().await?;
        let names = names.join(",");
        self.get_json(
            &format!("pmapi/{context}/_fetch"),
            &[("names", names.as_str())],
        )
        .await
        .context("failed to retrieve metric values")
    }

    pub async fn instance_domain(&mut self, indom: u64) -> Result<InstanceDomain> {
        let context = self.ensure_context().await?;
        let indom = indom.to_string();
        self.get_json(
            &format!("pmapi/{context}/_indom"),
            &[("indom", indom.as_str())],
        )
        .await
        .context("failed to get indom for metric")
    }

    /// Attach instance names to fetched values.
    ///
    /// Values whose metric is not in the catalog, or whose instance domain
    /// cannot be fetched, are logged and dropped. Instance domains are
    /// fetched once per call.
    pub async fn resolve(&mut self, values: Vec<MetricValue>) -> Vec<ResolvedMetric> {
        let mut domains: HashMap<u64, InstanceDomain> = HashMap::new();
        let mut resolved = Vec::with_capacity(values.len());

        for value in values {
            let Some(descriptor) = self.catalog.find(&value.name) else {
                warn!("metric {} not found in catalog of {}", value.name, self.host);
                continue;
            };

            if !descriptor.has_instances() {
                resolved.push(ResolvedMetric {
                    name: value.name,
                    instances: value
                        .instances
                        .into_iter()
                        .map(|i| ResolvedInstance {
                            name: String::new(),
                            value: i.value,
                        })
                        .collect(),
                });
                continue;
            }

            let indom = descriptor.indom;
            if !domains.contains_key(&indom) {
                match self.instance_domain(indom).await {
                    Ok(domain) => {
                        domains.insert(indom, domain);
                    }
                    Err(e) => {
                        warn!("dropping {}: {e:#}", value.name);
                        continue;
                    }
                }
            }
            let Some(domain) = domains.get(&indom) else {
                continue;
            };

            let instances = value
                .instances
                .into_iter()
                .filter_map(|i| {
                    let name = if i.instance == NULL_INSTANCE {
                        Some(String::new())
                    } else {
                        domain.name_of(i.instance).map(str::to_string)
                    };
                    if name.is_none() {
                        debug!("unknown instance {} of {}", i.instance, value.name);
                    }
                    name.map(|name| ResolvedInstance {
                        name,
                        value: i.value,
                    })
                })
                .collect();

            resolved.push(ResolvedMetric {
                name: value.name,
                instances,
            });
        }

        resolved
    }

    async fn ensure_context(&mut self) -> Result<u64> {
        match self.context {
            Some(context) => Ok(context),
            None => self.refresh_context().await,
        }
    }

    async fn get_json<T: DeserializeOwned>(
        &mut self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T> {
        let url = self.endpoint.join(path).context("invalid request path")?;
        trace!("requesting {url}");

        let response = self
            .client
            .get(url)
            .query(query)
            .send()
            .await
            .context("failed to send HTTP request")?;

        if !response.status().is_success() {
            let status = response.status();
            self.invalidate_context();
            anyhow::bail!("HTTP error: {status}");
        }

        let body = response
            .text()
            .await
            .context("failed to read response body")?;

        serde_json::from_str(&body).context("failed to parse pmwebd response")
    }
}
