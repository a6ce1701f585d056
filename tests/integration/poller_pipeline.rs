//! End-to-end tests of the poll cycle
//!
//! mocked pmwebd -> Poller -> Writer -> store

use pcp_collector::{
    actors::messages::SeriesOutcome,
    storage::{InfluxDbStore, MemoryStore},
};
use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::helpers::*;

#[tokio::test]
async fn test_stats_row_per_container_instance() {
    let agent = MockAgent::start().await;
    agent
        .catalog(json!([{ "name": "cpu_usage_user", "pmid": 11, "indom": 5 }]))
        .await
        .fetch(1_420_070_400, json!([value("cpu_usage_user", &[(0, 120), (1, 340)])]))
        .await
        .indom(5, &[(0, "/docker/web"), (1, "/docker/db")])
        .await;

    let store = MemoryStore::new();
    let mut poller = poller_for(
        &agent,
        schema(&[("stats", &["cpu_usage_user"])]),
        writer_for(store.clone()),
    )
    .await;

    let report = poller.poll_cycle().await;
    assert_eq!(report.outcome("stats"), Some(SeriesOutcome::Written { rows: 2 }));

    let batches = store.batches();
    assert_eq!(batches.len(), 1);
    assert_eq!(
        batches[0].columns,
        vec![
            "time",
            "memory_usage",
            "hostname",
            "container_name",
            "cpu_usage_user",
            "cpu_usage_system",
        ]
    );

    let rows: Vec<Vec<Value>> = batches[0].points.iter().map(|r| r.0.clone()).collect();
    assert_eq!(
        rows,
        vec![
            vec![
                json!(1_420_070_400),
                Value::Null,
                json!("127.0.0.1"),
                json!("/docker/db"),
                json!(340),
                Value::Null,
            ],
            vec![
                json!(1_420_070_400),
                Value::Null,
                json!("127.0.0.1"),
                json!("/docker/web"),
                json!(120),
                Value::Null,
            ],
        ]
    );
}

#[tokio::test]
async fn test_failed_catalog_produces_no_rows() {
    let agent = MockAgent::start().await;
    agent
        .failing_catalog()
        .await
        .fetch(1_420_070_400, json!([value("cpu_usage_user", &[(0, 120)])]))
        .await
        .indom(5, &[(0, "/docker/web")])
        .await;

    let store = MemoryStore::new();
    let mut poller = poller_for(
        &agent,
        schema(&[("stats", &["cpu_usage_user"])]),
        writer_for(store.clone()),
    )
    .await;

    let report = poller.poll_cycle().await;

    assert_eq!(report.outcome("stats"), Some(SeriesOutcome::NoRows));
    assert_eq!(report.rows_written(), 0);
    assert!(store.batches().is_empty());
    assert_eq!(store.create_calls(), 0);
}

#[tokio::test]
async fn test_network_series_with_pcp_names() {
    let agent = MockAgent::start().await;
    agent
        .catalog(json!([
            { "name": "network.interface.in.bytes", "indom": 9 },
            { "name": "network.interface.out.bytes", "indom": 9 },
            { "name": "network.interface.in.drops", "indom": 9 },
            { "name": "network.interface.out.drops", "indom": 9 }
        ]))
        .await
        .fetch(
            60,
            json!([
                value("network.interface.in.bytes", &[(0, 1000), (1, 10)]),
                value("network.interface.out.bytes", &[(0, 2000), (1, 20)]),
                value("network.interface.in.drops", &[(0, 1), (1, 0)]),
                // lo reports no out.drops this cycle
                value("network.interface.out.drops", &[(0, 2)])
            ]),
        )
        .await
        .indom(9, &[(0, "eth0"), (1, "lo")])
        .await;

    let store = MemoryStore::new();
    let mut poller = poller_for(
        &agent,
        schema(&[(
            "network",
            &[
                "network.interface.in.bytes",
                "network.interface.out.bytes",
                "network.interface.in.drops",
                "network.interface.out.drops",
            ],
        )]),
        writer_for(store.clone()),
    )
    .await;

    let report = poller.poll_cycle().await;
    assert_eq!(report.outcome("network"), Some(SeriesOutcome::Written { rows: 1 }));

    let rows = store.rows_for("network");
    assert_eq!(
        rows[0].0,
        vec![
            json!(60),
            json!("127.0.0.1"),
            json!(1000),
            json!(2000),
            json!("eth0"),
            json!(1),
            json!(2),
        ]
    );
}

#[tokio::test]
async fn test_value_missing_from_catalog_does_not_abort_siblings() {
    let agent = MockAgent::start().await;
    agent
        .catalog(json!([{ "name": "cgroup.memory.usage", "indom": 3 }]))
        .await
        .fetch(
            5,
            json!([
                value("cgroup.memory.usage.rss", &[(0, 1)]),
                value("cgroup.memory.usage", &[(0, 4096)])
            ]),
        )
        .await
        .indom(3, &[(0, "/docker/app")])
        .await;

    let store = MemoryStore::new();
    let mut poller = poller_for(
        &agent,
        schema(&[("stats", &["cgroup.memory.usage"])]),
        writer_for(store.clone()),
    )
    .await;

    let report = poller.poll_cycle().await;
    assert_eq!(report.outcome("stats"), Some(SeriesOutcome::Written { rows: 1 }));
    assert_eq!(store.rows_for("stats")[0].get(1), Some(&json!(4096)));
}

#[tokio::test]
async fn test_configured_metric_missing_from_catalog_keeps_sibling_rows() {
    let agent = MockAgent::start().await;
    agent
        .catalog(json!([{ "name": "cgroup.cpuacct.stat.user", "indom": 3 }]))
        .await
        .fetch(
            5,
            json!([
                value("cgroup.cpuacct.stat.user", &[(0, 250)]),
                value("cgroup.memory.usage", &[(0, 4096)])
            ]),
        )
        .await
        .indom(3, &[(0, "/docker/app")])
        .await;

    let store = MemoryStore::new();
    let mut poller = poller_for(
        &agent,
        schema(&[("stats", &["cgroup.cpuacct.stat.user", "cgroup.memory.usage"])]),
        writer_for(store.clone()),
    )
    .await;

    let report = poller.poll_cycle().await;
    assert_eq!(report.outcome("stats"), Some(SeriesOutcome::Written { rows: 1 }));
    assert_eq!(
        store.rows_for("stats")[0].0,
        vec![
            json!(5),
            Value::Null,
            json!("127.0.0.1"),
            json!("/docker/app"),
            json!(250),
            Value::Null,
        ]
    );
}

#[tokio::test]
async fn test_multiple_series_in_one_cycle() {
    let agent = MockAgent::start().await;
    agent
        .catalog(json!([
            { "name": "mem.util.used" },
            { "name": "cgroup.memory.usage", "indom": 3 }
        ]))
        .await
        .fetch(
            5,
            json!([
                value("mem.util.used", &[(-1, 8192)]),
                value("cgroup.memory.usage", &[(0, 4096)])
            ]),
        )
        .await
        .indom(3, &[(0, "/docker/app")])
        .await;

    let store = MemoryStore::new();
    let mut poller = poller_for(
        &agent,
        schema(&[
            ("machine", &["mem.util.used"]),
            ("stats", &["cgroup.memory.usage"]),
        ]),
        writer_for(store.clone()),
    )
    .await;

    let report = poller.poll_cycle().await;

    assert_eq!(report.rows_written(), 2);
    assert_eq!(store.rows_for("machine").len(), 1);
    assert_eq!(store.rows_for("stats").len(), 1);
    assert_eq!(store.create_calls(), 1);
}

#[tokio::test]
async fn test_bad_request_triggers_reprovisioning_against_influxdb() {
    let agent = MockAgent::start().await;
    agent
        .catalog(json!([{ "name": "mem.util.used" }]))
        .await
        .fetch(5, json!([value("mem.util.used", &[(-1, 8192)])]))
        .await;

    let influx = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/db"))
        .respond_with(ResponseTemplate::new(201))
        .mount(&influx)
        .await;
    Mock::given(method("POST"))
        .and(path("/db/charmander-dc/series"))
        .respond_with(
            ResponseTemplate::new(400).set_body_string("Database charmander-dc doesn't exist"),
        )
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&influx)
        .await;
    Mock::given(method("POST"))
        .and(path("/db/charmander-dc/series"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&influx)
        .await;

    let store = InfluxDbStore::new(&influxdb_config(&influx)).unwrap();
    let mut poller = poller_for(
        &agent,
        schema(&[("machine", &["mem.util.used"])]),
        writer_for(store),
    )
    .await;

    let first = poller.poll_cycle().await;
    let second = poller.poll_cycle().await;
    let third = poller.poll_cycle().await;

    assert_eq!(first.outcome("machine"), Some(SeriesOutcome::WriteFailed { rows: 1 }));
    assert_eq!(second.outcome("machine"), Some(SeriesOutcome::Written { rows: 1 }));
    assert_eq!(third.outcome("machine"), Some(SeriesOutcome::Written { rows: 1 }));

    let requests = influx.received_requests().await.unwrap();
    let creates = requests.iter().filter(|r| r.url.path() == "/db").count();
    let writes = requests
        .iter()
        .filter(|r| r.url.path() == "/db/charmander-dc/series")
        .count();
    assert_eq!(creates, 2);
    assert_eq!(writes, 3);
}
