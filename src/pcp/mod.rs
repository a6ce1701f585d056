//! Metric source access: one cached `pmwebd` handle per host
//!
//! ```no_run
//! use pcp_collector::{config::PcpConfig, pcp::MetricSourceHandle};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let mut handle =
//!     MetricSourceHandle::open("node-1", &PcpConfig::default(), reqwest::Client::new()).await?;
//! let values = handle.fetch(&["cgroup.memory.usage".to_string()]).await?;
//! let resolved = handle.resolve(values.values).await;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod types;

pub use client::MetricSourceHandle;
pub use types::{Catalog, MetricDescriptor, ResolvedInstance, ResolvedMetric};
