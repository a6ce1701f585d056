use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use futures::future::join_all;
use pcp_collector::{
    actors::poller::{Poller, PollerHandle},
    config::{self, Config},
    discovery::{Bootstrap, RedisRegistry},
    pcp::MetricSourceHandle,
    schema::SchemaMapper,
    storage::{InfluxDbStore, Writer},
};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, level_filters::LevelFilter, trace, warn};
use tracing_subscriber::{filter, layer::SubscriberExt, util::SubscriberInitExt};

/// Upper bound for a single pmwebd request
const SOURCE_TIMEOUT: Duration = Duration::from_secs(10);

/// How long to wait for pollers to stop after Ctrl-C
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Parser)]
#[command(about = "Collects PCP metrics from a fleet and writes them to InfluxDB")]
struct Args {
    /// Data collector config file (built-in development defaults if absent)
    #[arg(long)]
    config: Option<String>,
}

fn init() {
    dotenv::dotenv().ok();

    let filter = filter::Targets::new().with_target("pcp_collector", LevelFilter::DEBUG);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .compact()
                .with_ansi(false),
        )
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init();
    let args = Args::parse();
    trace!("started with args: {args:?}");

    info!("data collector initialization...");
    let config = config::load(args.config.as_deref())?;

    let registry = RedisRegistry::new(&config.redis)?;
    let hosts = Bootstrap::default().run(&registry).await?;

    let cancel = CancellationToken::new();
    let pollers = dispatch_pollers(&config, hosts.iter(), &cancel).await?;

    tokio::signal::ctrl_c().await?;
    info!("shutting down {} pollers", pollers.len());
    cancel.cancel();

    let stopped = join_all(pollers.iter().map(|poller| poller.stopped()));
    if tokio::time::timeout(SHUTDOWN_GRACE, stopped).await.is_err() {
        warn!("pollers did not stop within {}s", SHUTDOWN_GRACE.as_secs());
    }

    Ok(())
}

async fn dispatch_pollers<'a>(
    config: &Config,
    hosts: impl Iterator<Item = &'a str>,
    cancel: &CancellationToken,
) -> anyhow::Result<Vec<PollerHandle>> {
    let interval = config.effective_interval();
    let store = InfluxDbStore::new(&config.influxdb)?;
    let writer = Arc::new(Writer::new(
        Box::new(store),
        config.influxdb.database.clone(),
    ));
    let schema = Arc::new(SchemaMapper::new(config.influxdb.schema.clone()));

    let client = reqwest::Client::builder().timeout(SOURCE_TIMEOUT).build()?;
    let sources = join_all(
        hosts.map(|host| MetricSourceHandle::open(host, &config.pcp, client.clone())),
    )
    .await;

    let mut handles = vec![];
    for source in sources {
        match source {
            Ok(source) => {
                let poller = Poller::new(
                    source,
                    schema.clone(),
                    writer.clone(),
                    config.catalog_refresh(),
                );
                handles.push(PollerHandle::spawn(poller, interval, cancel.child_token()));
            }
            Err(e) => error!("skipping host: {e:#}"),
        }
    }

    if handles.is_empty() {
        anyhow::bail!("no usable hosts to poll");
    }

    info!("polling {} hosts every {}s", handles.len(), interval.as_secs());
    Ok(handles)
}
