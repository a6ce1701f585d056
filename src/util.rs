use std::time::Duration;

const PCP_AGENT_PORT: &str = "PCP_AGENT_PORT";

const DEFAULT_AGENT_PORT: u16 = 44323;

const DEFAULT_POLL_TIMEOUT: u32 = 12;

const DEFAULT_REGISTRY_KEY: &str = "charmander:nodes";

/// Smallest and largest accepted poll interval, in seconds.
pub const INTERVAL_RANGE: (i64, i64) = (1, 5);

/// Interval used when the configured one is out of range.
pub const FALLBACK_INTERVAL: Duration = Duration::from_secs(5);

pub fn get_default_agent_port() -> u16 {
    let port_from_env = std::env::var(PCP_AGENT_PORT);
    port_from_env.map_or(DEFAULT_AGENT_PORT, |res| {
        res.parse().unwrap_or(DEFAULT_AGENT_PORT)
    })
}

pub fn get_default_poll_timeout() -> u32 {
    DEFAULT_POLL_TIMEOUT
}

pub fn get_default_registry_key() -> String {
    DEFAULT_REGISTRY_KEY.to_string()
}
