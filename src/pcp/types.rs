//! Wire types of the pmwebd REST API (`/pmapi`)

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// `PM_INDOM_NULL`: the metric has a single value and no instance domain
pub const NULL_INDOM: u64 = 0xffff_ffff;

/// `PM_IN_NULL`: instance id used for singular values
pub const NULL_INSTANCE: i64 = -1;

fn null_indom() -> u64 {
    NULL_INDOM
}

#[derive(Debug, Clone, Deserialize)]
pub struct ContextResponse {
    pub context: u64,
}

/// One entry of a host's metric catalog
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricDescriptor {
    pub name: String,

    #[serde(default)]
    pub pmid: u64,

    #[serde(default = "null_indom")]
    pub indom: u64,

    #[serde(default)]
    pub sem: String,

    #[serde(default)]
    pub units: String,

    #[serde(default, rename = "type")]
    pub value_type: String,

    #[serde(default, rename = "text-oneline")]
    pub text_oneline: String,
}

impl MetricDescriptor {
    pub fn has_instances(&self) -> bool {
        self.indom != NULL_INDOM
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricList {
    #[serde(default)]
    pub metrics: Vec<MetricDescriptor>,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct Timestamp {
    #[serde(default)]
    pub s: i64,
    #[serde(default)]
    pub us: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FetchResponse {
    #[serde(default)]
    pub timestamp: Timestamp,

    #[serde(default)]
    pub values: Vec<MetricValue>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricValue {
    #[serde(default)]
    pub pmid: u64,

    pub name: String,

    #[serde(default)]
    pub instances: Vec<InstanceValue>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InstanceValue {
    pub instance: i64,
    pub value: serde_json::Value,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InstanceDomain {
    pub indom: u64,

    #[serde(default)]
    pub instances: Vec<Instance>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Instance {
    pub instance: i64,
    pub name: String,
}

impl InstanceDomain {
    pub fn name_of(&self, instance: i64) -> Option<&str> {
        self.instances
            .iter()
            .find(|i| i.instance == instance)
            .map(|i| i.name.as_str())
    }
}

/// Cached catalog of the metrics a host exposes, keyed by name
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    metrics: HashMap<String, MetricDescriptor>,
}

impl Catalog {
    pub fn find(&self, name: &str) -> Option<&MetricDescriptor> {
        self.metrics.get(name)
    }

    pub fn len(&self) -> usize {
        self.metrics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }
}

impl From<MetricList> for Catalog {
    fn from(list: MetricList) -> Self {
        Catalog {
            metrics: list
                .metrics
                .into_iter()
                .map(|m| (m.name.clone(), m))
                .collect(),
        }
    }
}

/// A fetched metric value with instance names attached
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedMetric {
    pub name: String,
    pub instances: Vec<ResolvedInstance>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedInstance {
    /// Empty for singular values
    pub name: String,
    pub value: serde_json::Value,
}
