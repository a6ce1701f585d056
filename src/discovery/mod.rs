//! Fleet discovery
//!
//! The host set is read from an external registry once at startup. An empty
//! answer or a transport failure is retried every 5 seconds; when no host was
//! found 5 minutes after the first attempt, bootstrap gives up.

pub mod registry;

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;
use tracing::{debug, error, info, instrument};

pub use registry::RedisRegistry;

/// Delay between two registry attempts
pub const RETRY_DELAY: Duration = Duration::from_secs(5);

/// Give up when no hosts were found this long after the first attempt
pub const BOOTSTRAP_DEADLINE: Duration = Duration::from_secs(5 * 60);

/// Ordered, de-duplicated set of host identifiers
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HostSet(Vec<String>);

impl HostSet {
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for HostSet {
    /// Blank entries are skipped, duplicates keep their first position.
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut hosts: Vec<String> = Vec::new();
        for host in iter {
            let host = host.into().trim().to_string();
            if !host.is_empty() && !hosts.contains(&host) {
                hosts.push(host);
            }
        }
        HostSet(hosts)
    }
}

#[derive(Debug)]
pub enum DiscoveryError {
    /// The registry could not be queried
    Registry(String),

    /// No host was found before the bootstrap deadline
    DeadlineExceeded { attempts: usize, elapsed: Duration },
}

impl fmt::Display for DiscoveryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiscoveryError::Registry(msg) => write!(f, "host registry error: {msg}"),
            DiscoveryError::DeadlineExceeded { attempts, elapsed } => write!(
                f,
                "could not obtain hosts after {attempts} attempts in {}s",
                elapsed.as_secs()
            ),
        }
    }
}

impl std::error::Error for DiscoveryError {}

/// Source of the current host list
#[async_trait]
pub trait HostRegistry: Send + Sync {
    async fn resolve(&self) -> Result<HostSet, DiscoveryError>;

    fn describe(&self) -> String;
}

/// Bounded retry around [`HostRegistry::resolve`]
#[derive(Debug, Clone)]
pub struct Bootstrap {
    pub retry_delay: Duration,
    pub deadline: Duration,
}

impl Default for Bootstrap {
    fn default() -> Self {
        Self {
            retry_delay: RETRY_DELAY,
            deadline: BOOTSTRAP_DEADLINE,
        }
    }
}

impl Bootstrap {
    /// Resolve a non-empty host set or fail once the deadline has passed.
    #[instrument(skip_all, fields(registry = %registry.describe()))]
    pub async fn run(&self, registry: &dyn HostRegistry) -> Result<HostSet, DiscoveryError> {
        let started = Instant::now();
        let mut attempts = 0;

        loop {
            attempts += 1;
            match registry.resolve().await {
                Ok(hosts) if !hosts.is_empty() => {
                    info!("discovered {} hosts after {attempts} attempts", hosts.len());
                    return Ok(hosts);
                }
                Ok(_) => debug!("registry returned no hosts"),
                Err(e) => debug!("{e}"),
            }

            let elapsed = started.elapsed();
            if elapsed >= self.deadline {
                return Err(DiscoveryError::DeadlineExceeded { attempts, elapsed });
            }

            error!(
                "could not obtain hosts, retrying in {} seconds",
                self.retry_delay.as_secs()
            );
            tokio::time::sleep(self.retry_delay).await;
        }
    }
}
