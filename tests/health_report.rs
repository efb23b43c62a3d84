//! Health reports over configured and discovered targets.

use backend_pilot::discovery::{PortSpec, Scanner};
use backend_pilot::probe::{Classification, ProbeExecutor};
use backend_pilot::report::{HealthReporter, HealthRequest, Origin};
use backend_pilot::PilotConfig;

mod common;
use common::Reply;

fn reporter(config: &PilotConfig) -> HealthReporter {
    let probe = ProbeExecutor::new(&config.probe).unwrap();
    HealthReporter::new(Scanner::new(probe, &config.scan))
}

#[tokio::test]
async fn test_configured_backend_scanned_on_its_own_port_is_one_row() {
    let mock = common::start_mock_backend(Reply::Status(200)).await;
    let config = common::fast_config(vec![common::local_backend("local", mock.port())]);
    let spec = PortSpec::parse(&mock.port().to_string()).unwrap();

    let report = reporter(&config)
        .report(
            &config,
            HealthRequest {
                scan: Some(&spec),
                ..HealthRequest::default()
            },
        )
        .await;

    assert_eq!(report.rows.len(), 1);
    let row = &report.rows[0];
    assert_eq!(row.origin, Origin::Configured);
    assert_eq!(row.backend.as_deref(), Some("local"));
    assert_eq!(row.classification, Classification::Ready);
    assert_eq!(report.scanned, 1);
}

#[tokio::test]
async fn test_discovered_rows_follow_configured_and_down_is_hidden() {
    let configured = common::start_mock_backend(Reply::Status(200)).await;
    let loading = common::start_mock_backend(Reply::Status(503)).await;
    let closed = common::unused_port().await;
    let config = common::fast_config(vec![common::local_backend("local", configured.port())]);
    let spec = PortSpec::parse(&format!("{},{},{}", configured.port(), loading.port(), closed)).unwrap();

    let report = reporter(&config)
        .report(
            &config,
            HealthRequest {
                scan: Some(&spec),
                ..HealthRequest::default()
            },
        )
        .await;

    assert_eq!(report.rows.len(), 2);
    assert_eq!(report.rows[0].origin, Origin::Configured);
    assert_eq!(report.rows[1].origin, Origin::Discovered);
    assert_eq!(report.rows[1].target.port, loading.port());
    assert_eq!(report.rows[1].classification, Classification::Loading);
    assert_eq!(report.scanned, 3);
    assert_eq!(report.unreachable, 1);
    assert_eq!(report.hidden_down, 1);

    let all = reporter(&config)
        .report(
            &config,
            HealthRequest {
                scan: Some(&spec),
                show_all: true,
                ..HealthRequest::default()
            },
        )
        .await;

    assert_eq!(all.rows.len(), 3);
    assert_eq!(all.hidden_down, 0);
    assert!(all
        .discovered()
        .any(|r| r.target.port == closed && r.classification == Classification::Down));
}

#[tokio::test]
async fn test_explicit_host_without_backends() {
    let mock = common::start_mock_backend(Reply::Status(200)).await;
    let config = common::fast_config(Vec::new());
    let spec = PortSpec::parse(&mock.port().to_string()).unwrap();
    let hosts = vec!["127.0.0.1".to_string()];

    let report = reporter(&config)
        .report(
            &config,
            HealthRequest {
                scan: Some(&spec),
                hosts: &hosts,
                show_all: false,
            },
        )
        .await;

    assert_eq!(report.configured().count(), 0);
    let row = report.discovered().next().unwrap();
    assert!(row.backend.is_none());
    assert_eq!(row.classification, Classification::Ready);
}

#[tokio::test]
async fn test_configured_backends_probed_without_scan() {
    let up = common::start_mock_backend(Reply::Status(200)).await;
    let down = common::unused_port().await;
    let config = common::fast_config(vec![
        common::local_backend("up", up.port()),
        common::local_backend("down", down),
    ]);

    let report = reporter(&config).report(&config, HealthRequest::default()).await;

    // Configured rows are never hidden, even when down.
    assert_eq!(report.rows.len(), 2);
    assert_eq!(report.rows[0].backend.as_deref(), Some("up"));
    assert_eq!(report.rows[0].classification, Classification::Ready);
    assert_eq!(report.rows[1].backend.as_deref(), Some("down"));
    assert_eq!(report.rows[1].classification, Classification::Down);
}
