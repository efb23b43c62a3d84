//! Discovery sweeps over mock servers.

use std::sync::Arc;
use std::time::{Duration, Instant};

use backend_pilot::config::{ProbeConfig, ScanConfig};
use backend_pilot::discovery::{PortSpec, ScanHost, Scanner};
use backend_pilot::probe::{Classification, ProbeExecutor, ProbeTarget, Scheme};

mod common;
use common::Reply;

fn scanner(probe_timeout_ms: u64, concurrency: usize) -> Scanner {
    let probe = ProbeExecutor::new(&ProbeConfig {
        timeout_ms: probe_timeout_ms,
        ..ProbeConfig::default()
    })
    .unwrap();
    Scanner::new(
        probe,
        &ScanConfig {
            concurrency,
            timeout_secs: 10,
        },
    )
}

#[tokio::test]
async fn test_scan_reports_every_target_including_down() {
    let ready = common::start_mock_backend(Reply::Status(200)).await;
    let loading = common::start_mock_backend(Reply::Status(503)).await;
    let closed = common::unused_port().await;

    let spec = PortSpec::parse(&format!("{},{},{}", ready.port(), loading.port(), closed)).unwrap();
    let hosts = [ScanHost::new(Scheme::Http, "127.0.0.1")];
    let report = scanner(500, 2).scan(&hosts, &spec.ports()).await;

    assert_eq!(report.results.len(), 3);
    assert!(!report.deadline_hit);
    assert_eq!(report.unreachable(), 1);

    let at = |port| ProbeTarget::new(Scheme::Http, "127.0.0.1", port);
    assert_eq!(report.get(&at(ready.port())).unwrap().classification, Classification::Ready);
    assert_eq!(report.get(&at(loading.port())).unwrap().classification, Classification::Loading);
    assert_eq!(report.get(&at(closed)).unwrap().classification, Classification::Down);
    assert_eq!(report.ready().count(), 1);
}

#[tokio::test]
async fn test_results_sorted_by_target() {
    let a = common::start_mock_backend(Reply::Status(200)).await;
    let b = common::start_mock_backend(Reply::Status(200)).await;

    let targets = vec![
        ProbeTarget::new(Scheme::Http, "127.0.0.1", a.port().max(b.port())),
        ProbeTarget::new(Scheme::Http, "127.0.0.1", a.port().min(b.port())),
    ];
    let report = scanner(500, 1).scan_targets(targets).await;

    let ports: Vec<u16> = report.results.iter().map(|r| r.target.port).collect();
    assert_eq!(ports, vec![a.port().min(b.port()), a.port().max(b.port())]);
}

#[tokio::test]
async fn test_scan_deadline_bounds_hanging_targets() {
    let mut ports = Vec::new();
    for _ in 0..4 {
        ports.push(common::start_mock_backend(Reply::Hang).await.port());
    }
    let hosts = [ScanHost::new(Scheme::Http, "127.0.0.1")];
    let targets = Scanner::expand(&hosts, &ports);

    let started = Instant::now();
    let report = scanner(10_000, 1)
        .scan_until(targets, Instant::now() + Duration::from_millis(300))
        .await;

    assert!(started.elapsed() < Duration::from_secs(2));
    assert_eq!(report.results.len(), 4);
    assert!(report
        .results
        .iter()
        .all(|r| r.classification == Classification::Down));
}

#[tokio::test]
async fn test_scan_never_exceeds_concurrency() {
    let in_flight = Arc::new(common::InFlight::default());
    let mut ports = Vec::new();
    for _ in 0..10 {
        let mock = common::start_counted_backend(in_flight.clone(), Duration::from_millis(150)).await;
        ports.push(mock.port());
    }
    let hosts = [ScanHost::new(Scheme::Http, "127.0.0.1")];

    let report = scanner(2_000, 2).scan(&hosts, &ports).await;

    assert_eq!(report.results.len(), 10);
    assert_eq!(report.ready().count(), 10);
    assert!(in_flight.peak() >= 1);
    assert!(in_flight.peak() <= 2, "peak of {} requests in flight", in_flight.peak());
}
