use std::collections::BTreeMap;
use std::time::Duration;

use anyhow::Context;
use tracing::{trace, warn};

use crate::util::{
    FALLBACK_INTERVAL, INTERVAL_RANGE, get_default_agent_port, get_default_poll_timeout,
    get_default_registry_key,
};

/// Series name -> ordered list of raw PCP metric names.
pub type SchemaConfig = BTreeMap<String, Vec<String>>;

/// Collector configuration, loaded once at startup.
///
/// Keys are PascalCase to stay compatible with existing deployment files.
#[derive(Debug, Clone, serde::Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Config {
    /// Poll interval in seconds (see [`Config::effective_interval`])
    #[serde(default)]
    pub interval: i64,

    pub redis: RedisConfig,

    pub influxdb: InfluxdbConfig,

    /// Accepted for compatibility with existing files, not used by the collector
    #[serde(default)]
    pub mesos: Option<MesosConfig>,

    #[serde(default)]
    pub pcp: PcpConfig,
}

#[derive(Debug, Clone, serde::Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RedisConfig {
    pub host: String,
    pub port: u16,
    /// Key of the set holding the host names
    #[serde(default = "get_default_registry_key")]
    pub key: String,
}

#[derive(Debug, Clone, serde::Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct InfluxdbConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub database: String,
    #[serde(default)]
    pub schema: SchemaConfig,
}

#[derive(Debug, Clone, serde::Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MesosConfig {
    pub port: u16,
}

/// Settings for talking to the per-host `pmwebd` agents
#[derive(Debug, Clone, serde::Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PcpConfig {
    #[serde(default = "get_default_agent_port")]
    pub port: u16,

    /// Seconds of inactivity after which pmwebd drops a context
    #[serde(default = "get_default_poll_timeout")]
    pub poll_timeout: u32,

    /// Refetch a host's metric catalog after this many seconds.
    /// Unset means the catalog fetched at startup is kept forever.
    #[serde(default)]
    pub catalog_refresh: Option<u64>,
}

impl Default for PcpConfig {
    fn default() -> Self {
        PcpConfig {
            port: get_default_agent_port(),
            poll_timeout: get_default_poll_timeout(),
            catalog_refresh: None,
        }
    }
}

impl RedisConfig {
    pub fn url(&self) -> String {
        format!("redis://{}:{}/", self.host, self.port)
    }
}

impl InfluxdbConfig {
    /// Base URL of the InfluxDB HTTP API
    pub fn endpoint(&self) -> String {
        if self.host.starts_with("http://") || self.host.starts_with("https://") {
            format!("{}:{}", self.host, self.port)
        } else {
            format!("http://{}:{}", self.host, self.port)
        }
    }
}

impl Config {
    /// Built-in configuration used when no `--config` is given.
    pub fn development() -> Self {
        let schema = SchemaConfig::from([
            (
                "machine".to_string(),
                vec![
                    "kernel.all.cpu.user".to_string(),
                    "kernel.all.cpu.sys".to_string(),
                    "mem.util.used".to_string(),
                ],
            ),
            (
                "stats".to_string(),
                vec![
                    "cgroup.cpuacct.stat.user".to_string(),
                    "cgroup.cpuacct.stat.system".to_string(),
                    "cgroup.memory.usage".to_string(),
                ],
            ),
            (
                "network".to_string(),
                vec![
                    "network.interface.in.bytes".to_string(),
                    "network.interface.out.bytes".to_string(),
                    "network.interface.in.drops".to_string(),
                    "network.interface.out.drops".to_string(),
                ],
            ),
        ]);

        Config {
            interval: 5,
            redis: RedisConfig {
                host: "172.31.2.11".to_string(),
                port: 31600,
                key: get_default_registry_key(),
            },
            influxdb: InfluxdbConfig {
                host: "172.31.2.11".to_string(),
                port: 31410,
                username: "root".to_string(),
                password: "root".to_string(),
                database: "charmander-dc".to_string(),
                schema,
            },
            mesos: None,
            pcp: PcpConfig::default(),
        }
    }

    /// Poll interval actually used by the pollers.
    ///
    /// Anything outside `[1, 5]` seconds falls back to 5 seconds.
    pub fn effective_interval(&self) -> Duration {
        let (min, max) = INTERVAL_RANGE;
        if (min..=max).contains(&self.interval) {
            Duration::from_secs(self.interval as u64)
        } else {
            warn!(
                "interval {} outside of range, using {} seconds",
                self.interval,
                FALLBACK_INTERVAL.as_secs()
            );
            FALLBACK_INTERVAL
        }
    }

    pub fn catalog_refresh(&self) -> Option<Duration> {
        self.pcp
            .catalog_refresh
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }
}

pub fn read_config_file(path: &str) -> anyhow::Result<Config> {
    let file_content = std::fs::read_to_string(path)
        .with_context(|| format!("error reading config file {path}"))?;
    serde_json::from_str(&file_content)
        .with_context(|| format!("invalid configuration file {path}"))
        .inspect(|config| trace!("loaded config: {config:?}"))
}

/// Read `path` if given, otherwise fall back to [`Config::development`].
pub fn load(path: Option<&str>) -> anyhow::Result<Config> {
    match path {
        Some(path) => read_config_file(path),
        None => Ok(Config::development()),
    }
}
