//! Orchestrator integration tests.
//!
//! Tests the full flow: config -> build -> start -> UDP ingest -> shutdown flush -> sink file.

use std::path::Path;
use std::time::Duration;

use serde_json::Value;
use tokio::net::UdpSocket;
use tokio::time::sleep;

use sluice_core::config::SluiceConfig;
use sluice_daemon::orchestrator::Orchestrator;

/// Config writing both record kinds to a file sink under `dir`.
fn file_sink_config(dir: &Path) -> SluiceConfig {
    let toml_str = format!(
        r#"
[general]
pid_file = ""

[dns_log]
sinks = ["archive"]

[l7_log]
per_node_limit = 2
sinks = ["archive"]

[receiver]
bind_addr = "127.0.0.1:0"

[[sinks]]
name = "archive"
kind = "file"
path = "{}"
"#,
        dir.join("records").display()
    );
    SluiceConfig::parse(&toml_str).expect("failed to parse test config")
}

fn read_records(path: &Path) -> Vec<Value> {
    std::fs::read_to_string(path)
        .unwrap_or_default()
        .lines()
        .map(|l| serde_json::from_str(l).expect("each line should be JSON"))
        .collect()
}

async fn send_all(target: std::net::SocketAddr, datagrams: &[String]) {
    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    for datagram in datagrams {
        socket.send_to(datagram.as_bytes(), target).await.unwrap();
    }
}

fn l7_datagram(path: &str) -> String {
    serde_json::json!({
        "kind": "l7",
        "src": {"type": "wep", "namespace": "shop", "name": "web-1", "name_aggr": "web-*"},
        "dst": {"type": "wep", "namespace": "shop", "name": "api-1", "name_aggr": "api-*"},
        "dst_port": 8080,
        "duration_ms": 10,
        "duration_max_ms": 10,
        "response_code": "200",
        "method": "GET",
        "domain": "api.shop.svc.cluster.local:8080",
        "path": path,
        "type": "http/1.1"
    })
    .to_string()
}

#[tokio::test]
async fn test_udp_events_reach_file_sink_on_shutdown() {
    // Given: A running orchestrator with a file sink
    let dir = tempfile::tempdir().unwrap();
    let mut orchestrator = Orchestrator::build_from_config(file_sink_config(dir.path()))
        .await
        .expect("orchestrator should build");
    orchestrator.start().await.expect("orchestrator should start");
    let addr = orchestrator.receiver_addr().expect("receiver should be bound");

    // When: Sending the same L7 request twice and one distinct request
    send_all(
        addr,
        &[l7_datagram("/items"), l7_datagram("/items"), l7_datagram("/cart")],
    )
    .await;
    sleep(Duration::from_millis(200)).await;
    orchestrator.shutdown().await.unwrap();

    // Then: The final flush wrote two merged L7 records
    let records = read_records(&dir.path().join("records.l7.jsonl"));
    assert_eq!(records.len(), 2, "records: {records:?}");
    let items = records
        .iter()
        .find(|r| r["url"] == "api.shop.svc.cluster.local:8080/items")
        .expect("merged /items record");
    assert_eq!(items["count"], 2);
    assert_eq!(items["type"], "log");
    assert_eq!(items["dest_service_name"], "api");
    assert_eq!(items["dest_service_namespace"], "shop");
}

#[tokio::test]
async fn test_overflow_is_reported_as_unlogged() {
    // Given: An L7 cache limited to two records
    let dir = tempfile::tempdir().unwrap();
    let mut orchestrator = Orchestrator::build_from_config(file_sink_config(dir.path()))
        .await
        .unwrap();
    orchestrator.start().await.unwrap();
    let addr = orchestrator.receiver_addr().unwrap();

    // When: Sending four distinct requests
    let datagrams: Vec<String> = (0..4).map(|i| l7_datagram(&format!("/p{i}"))).collect();
    send_all(addr, &datagrams).await;
    sleep(Duration::from_millis(200)).await;
    orchestrator.shutdown().await.unwrap();

    // Then: Two logged records plus one unlogged summary counting the rest
    let records = read_records(&dir.path().join("records.l7.jsonl"));
    let logged = records.iter().filter(|r| r["type"] == "log").count();
    let unlogged: Vec<_> = records.iter().filter(|r| r["type"] == "unlogged").collect();
    assert_eq!(logged, 2);
    assert_eq!(unlogged.len(), 1);
    assert_eq!(unlogged[0]["count"], 2);
}

#[tokio::test]
async fn test_garbage_datagrams_do_not_stop_receiver() {
    // Given: A running orchestrator
    let dir = tempfile::tempdir().unwrap();
    let mut orchestrator = Orchestrator::build_from_config(file_sink_config(dir.path()))
        .await
        .unwrap();
    orchestrator.start().await.unwrap();
    let addr = orchestrator.receiver_addr().unwrap();

    // When: Garbage arrives before a valid event
    send_all(
        addr,
        &[
            "not json".to_owned(),
            r#"{"kind": "tcp"}"#.to_owned(),
            r#"{"kind": "l7", "count": 0, "type": "http/1.1"}"#.to_owned(),
            l7_datagram("/ok"),
        ],
    )
    .await;
    sleep(Duration::from_millis(200)).await;

    // Then: The receiver stays healthy and the valid event is recorded
    let health = orchestrator.health().await;
    assert!(
        health
            .modules
            .iter()
            .any(|m| m.name == "receiver" && m.status.is_healthy())
    );
    orchestrator.shutdown().await.unwrap();

    let records = read_records(&dir.path().join("records.l7.jsonl"));
    assert_eq!(records.len(), 1);
}

#[tokio::test]
async fn test_dns_events_are_aggregated() {
    // Given: A running orchestrator
    let dir = tempfile::tempdir().unwrap();
    let mut orchestrator = Orchestrator::build_from_config(file_sink_config(dir.path()))
        .await
        .unwrap();
    orchestrator.start().await.unwrap();
    let addr = orchestrator.receiver_addr().unwrap();

    // When: Sending the same DNS lookup twice
    let dns = serde_json::json!({
        "kind": "dns",
        "client": {"type": "wep", "namespace": "default", "name": "client-abc", "name_aggr": "client-*"},
        "client_ip": "10.0.0.7",
        "server": {"type": "wep", "namespace": "kube-system", "name": "coredns-1", "name_aggr": "coredns-*", "ip": "10.96.0.10"},
        "message": {"questions": [{"name": "example.com", "class": "IN", "type": "A"}]}
    })
    .to_string();
    send_all(addr, &[dns.clone(), dns]).await;
    sleep(Duration::from_millis(200)).await;
    orchestrator.shutdown().await.unwrap();

    // Then: One DNS record with count 2
    let records = read_records(&dir.path().join("records.dns.jsonl"));
    assert_eq!(records.len(), 1, "records: {records:?}");
    assert_eq!(records[0]["count"], 2);
}

#[tokio::test]
async fn test_build_from_missing_file_fails() {
    // Given: A config path that does not exist
    let path = Path::new("/nonexistent/sluice/sluice.toml");

    // When: Building from the path
    let result = Orchestrator::build(path).await;

    // Then: The error mentions loading
    let err = result.err().expect("build should fail").to_string();
    assert!(err.contains("failed to load config"), "got: {err}");
}
