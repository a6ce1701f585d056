//! Series definitions and the mapping from raw PCP metrics to columns
//!
//! Three series are known, each with a fixed column order that the time-series
//! store expects:
//!
//! | series    | instance column  |
//! |-----------|------------------|
//! | `machine` | -                |
//! | `stats`   | `container_name` |
//! | `network` | `interface_name` |

use std::fmt;

use crate::config::SchemaConfig;

pub const TIME: &str = "time";
pub const HOSTNAME: &str = "hostname";

const MACHINE_COLUMNS: &[&str] = &[
    TIME,
    HOSTNAME,
    "memory_usage",
    "cpu_usage_system",
    "cpu_usage_user",
];

const STATS_COLUMNS: &[&str] = &[
    TIME,
    "memory_usage",
    HOSTNAME,
    "container_name",
    "cpu_usage_user",
    "cpu_usage_system",
];

const NETWORK_COLUMNS: &[&str] = &[
    TIME,
    HOSTNAME,
    "network_in_bytes",
    "network_out_bytes",
    "interface_name",
    "network_in_drops",
    "network_out_drops",
];

/// Known PCP metric names and the column they feed, per series
const MACHINE_METRICS: &[(&str, &str)] = &[
    ("kernel.all.cpu.user", "cpu_usage_user"),
    ("kernel.all.cpu.sys", "cpu_usage_system"),
    ("mem.util.used", "memory_usage"),
];

const STATS_METRICS: &[(&str, &str)] = &[
    ("cgroup.cpuacct.stat.user", "cpu_usage_user"),
    ("cgroup.cpuacct.stat.system", "cpu_usage_system"),
    ("cgroup.memory.usage", "memory_usage"),
];

const NETWORK_METRICS: &[(&str, &str)] = &[
    ("network.interface.in.bytes", "network_in_bytes"),
    ("network.interface.out.bytes", "network_out_bytes"),
    ("network.interface.in.drops", "network_in_drops"),
    ("network.interface.out.drops", "network_out_drops"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Series {
    Machine,
    Stats,
    Network,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    UnknownSeries(String),
}

impl fmt::Display for SchemaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchemaError::UnknownSeries(name) => write!(f, "unrecognized series '{name}'"),
        }
    }
}

impl std::error::Error for SchemaError {}

impl Series {
    pub const ALL: [Series; 3] = [Series::Machine, Series::Stats, Series::Network];

    pub fn from_name(name: &str) -> Result<Self, SchemaError> {
        match name {
            "machine" => Ok(Series::Machine),
            "stats" => Ok(Series::Stats),
            "network" => Ok(Series::Network),
            other => Err(SchemaError::UnknownSeries(other.to_string())),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Series::Machine => "machine",
            Series::Stats => "stats",
            Series::Network => "network",
        }
    }

    pub fn columns(&self) -> &'static [&'static str] {
        match self {
            Series::Machine => MACHINE_COLUMNS,
            Series::Stats => STATS_COLUMNS,
            Series::Network => NETWORK_COLUMNS,
        }
    }

    /// Column carrying the instance name, if rows are split per instance
    pub fn instance_column(&self) -> Option<&'static str> {
        match self {
            Series::Machine => None,
            Series::Stats => Some("container_name"),
            Series::Network => Some("interface_name"),
        }
    }

    /// Columns filled from metric values
    pub fn value_columns(&self) -> impl Iterator<Item = &'static str> + '_ {
        let instance = self.instance_column();
        self.columns()
            .iter()
            .copied()
            .filter(move |c| *c != TIME && *c != HOSTNAME && Some(*c) != instance)
    }

    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.columns().iter().position(|c| *c == column)
    }

    fn known_metrics(&self) -> &'static [(&'static str, &'static str)] {
        match self {
            Series::Machine => MACHINE_METRICS,
            Series::Stats => STATS_METRICS,
            Series::Network => NETWORK_METRICS,
        }
    }

    /// Column a raw metric feeds in this series.
    ///
    /// Known PCP names are translated; a name that already is one of the
    /// series' value columns maps to itself.
    pub fn column_for_metric(&self, metric: &str) -> Option<&'static str> {
        self.known_metrics()
            .iter()
            .find(|(name, _)| *name == metric)
            .map(|(_, column)| *column)
            .or_else(|| self.value_columns().find(|c| *c == metric))
    }
}

impl fmt::Display for Series {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Resolves configured series names to columns and raw metric names
#[derive(Debug, Clone)]
pub struct SchemaMapper {
    schema: SchemaConfig,
}

impl SchemaMapper {
    pub fn new(schema: SchemaConfig) -> Self {
        Self { schema }
    }

    pub fn columns_for(&self, series: &str) -> Result<&'static [&'static str], SchemaError> {
        Series::from_name(series).map(|s| s.columns())
    }

    pub fn metrics_for(&self, series: &str) -> &[String] {
        self.schema.get(series).map(Vec::as_slice).unwrap_or_default()
    }

    /// Configured series names in a stable order
    pub fn series_names(&self) -> impl Iterator<Item = &str> {
        self.schema.keys().map(String::as_str)
    }
}
