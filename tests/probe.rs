mod mock_printer;

use mock_printer::{PrinterBehavior, spawn_mock_printer};
use std::time::Duration;
use zebra_console::probe::{PingPolicy, ProbeOptions, probe};

fn options(ports: Vec<u16>) -> ProbeOptions {
    ProbeOptions {
        ports,
        connect_timeout: Duration::from_secs(2),
        http_timeout: Duration::from_secs(2),
        // keep the tests independent of the host's ICMP setup
        ping_policy: PingPolicy::Disabled,
    }
}

#[tokio::test]
async fn listening_console_is_reachable_via_tcp_and_http() {
    let (port, _requests) = spawn_mock_printer(PrinterBehavior::Healthy).await;

    let report = probe(&format!("127.0.0.1:{port}"), &options(vec![port]))
        .await
        .unwrap();

    assert!(report.reachable);
    assert!(report.http_reachable);
    assert_eq!(report.ports.len(), 1);
    assert!(report.ports[0].open);
    assert_eq!(report.ping_reachable, None);
}

#[tokio::test]
async fn closed_port_and_dead_http_root_are_unreachable() {
    // bind and drop to get a port that is almost certainly closed
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let report = probe(&format!("127.0.0.1:{port}"), &options(vec![port]))
        .await
        .unwrap();

    assert!(!report.reachable);
    assert!(!report.http_reachable);
    assert!(!report.ports[0].open);
    assert!(!report.details.is_empty());
}

#[tokio::test]
async fn probe_tests_every_requested_port() {
    let (open_port, _requests) = spawn_mock_printer(PrinterBehavior::Healthy).await;

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let closed_port = listener.local_addr().unwrap().port();
    drop(listener);

    let report = probe(
        &format!("127.0.0.1:{open_port}"),
        &options(vec![open_port, closed_port]),
    )
    .await
    .unwrap();

    assert!(report.reachable);
    assert_eq!(report.ports.len(), 2);
    assert!(report.ports[0].open);
    assert!(!report.ports[1].open);
}

#[tokio::test]
async fn non_success_root_page_does_not_count_as_http_reachable() {
    let (port, _requests) = spawn_mock_printer(PrinterBehavior::ErrorRoot).await;

    let report = probe(&format!("127.0.0.1:{port}"), &options(vec![port]))
        .await
        .unwrap();

    // the socket accepted, so the printer is reachable, but a 500 on the
    // root page must not be reported as a live console
    assert!(report.reachable);
    assert!(report.ports[0].open);
    assert!(!report.http_reachable);
    assert!(report.details.iter().any(|line| line.starts_with("http:")));
}
