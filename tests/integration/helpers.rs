//! Helper functions for integration tests

use std::sync::Arc;

use pcp_collector::{
    actors::poller::Poller,
    config::{InfluxdbConfig, PcpConfig, SchemaConfig},
    pcp::MetricSourceHandle,
    schema::SchemaMapper,
    storage::{SeriesStore, Writer},
};
use serde_json::{Value, json};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const CONTEXT: u64 = 17;

/// A mocked pmwebd agent
pub struct MockAgent {
    pub server: MockServer,
}

impl MockAgent {
    /// Agent that hands out context [`CONTEXT`] and nothing else yet
    pub async fn start() -> Self {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/pmapi/context"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "context": CONTEXT })))
            .mount(&server)
            .await;
        Self { server }
    }

    pub async fn catalog(&self, metrics: Value) -> &Self {
        Mock::given(method("GET"))
            .and(path(format!("/pmapi/{CONTEXT}/_metric")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "metrics": metrics })))
            .mount(&self.server)
            .await;
        self
    }

    pub async fn failing_catalog(&self) -> &Self {
        Mock::given(method("GET"))
            .and(path(format!("/pmapi/{CONTEXT}/_metric")))
            .respond_with(ResponseTemplate::new(500))
            .mount(&self.server)
            .await;
        self
    }

    pub async fn fetch(&self, timestamp: i64, values: Value) -> &Self {
        Mock::given(method("GET"))
            .and(path(format!("/pmapi/{CONTEXT}/_fetch")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "timestamp": { "s": timestamp, "us": 0 },
                "values": values
            })))
            .mount(&self.server)
            .await;
        self
    }

    pub async fn failing_fetch(&self, status: u16) -> &Self {
        Mock::given(method("GET"))
            .and(path(format!("/pmapi/{CONTEXT}/_fetch")))
            .respond_with(ResponseTemplate::new(status))
            .mount(&self.server)
            .await;
        self
    }

    pub async fn indom(&self, indom: u64, names: &[(i64, &str)]) -> &Self {
        let instances: Vec<Value> = names
            .iter()
            .map(|(instance, name)| json!({ "instance": instance, "name": name }))
            .collect();

        Mock::given(method("GET"))
            .and(path(format!("/pmapi/{CONTEXT}/_indom")))
            .and(wiremock::matchers::query_param("indom", indom.to_string()))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "indom": indom,
                "instances": instances
            })))
            .mount(&self.server)
            .await;
        self
    }

    pub fn pcp_config(&self) -> PcpConfig {
        let url = url::Url::parse(&self.server.uri()).unwrap();
        PcpConfig {
            port: url.port().unwrap(),
            poll_timeout: 12,
            catalog_refresh: None,
        }
    }

    pub async fn open(&self) -> MetricSourceHandle {
        MetricSourceHandle::open("127.0.0.1", &self.pcp_config(), reqwest::Client::new())
            .await
            .unwrap()
    }
}

/// A metric value with one entry per `(instance, value)`
pub fn value(name: &str, instances: &[(i64, u64)]) -> Value {
    json!({
        "name": name,
        "instances": instances
            .iter()
            .map(|(instance, value)| json!({ "instance": instance, "value": value }))
            .collect::<Vec<_>>()
    })
}

pub fn schema(entries: &[(&str, &[&str])]) -> SchemaConfig {
    entries
        .iter()
        .map(|(series, metrics)| {
            (
                series.to_string(),
                metrics.iter().map(|m| m.to_string()).collect(),
            )
        })
        .collect()
}

pub fn writer_for(store: impl SeriesStore + 'static) -> Arc<Writer> {
    Arc::new(Writer::new(Box::new(store), "charmander-dc"))
}

pub async fn poller_for(agent: &MockAgent, schema: SchemaConfig, writer: Arc<Writer>) -> Poller {
    Poller::new(
        agent.open().await,
        Arc::new(SchemaMapper::new(schema)),
        writer,
        None,
    )
}

pub fn influxdb_config(server: &MockServer) -> InfluxdbConfig {
    let url = url::Url::parse(&server.uri()).unwrap();
    InfluxdbConfig {
        host: url.host_str().unwrap().to_string(),
        port: url.port().unwrap(),
        username: "root".to_string(),
        password: "root".to_string(),
        database: "charmander-dc".to_string(),
        schema: SchemaConfig::new(),
    }
}
