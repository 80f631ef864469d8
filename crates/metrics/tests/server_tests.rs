//! Socket-level tests for the metrics endpoint

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use rollup_client_metrics::exposition::exposition_name;
use rollup_client_metrics::metrics::{ALL_INSTRUMENT_NAMES, PROVER_QUEUED_PROOFS};
use rollup_client_metrics::{
    start, ClientMetrics, MetricsServer, MetricsServerError, Registry, ServeOutcome, METRICS_PATH,
};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

async fn spawn_server(
    registry: Arc<Registry>,
) -> (
    SocketAddr,
    CancellationToken,
    JoinHandle<Result<ServeOutcome, MetricsServerError>>,
) {
    let server = MetricsServer::new(registry, "127.0.0.1", 0)
        .bind()
        .await
        .expect("bind metrics server");
    let addr = server.local_addr();
    let cancel = CancellationToken::new();
    let handle = tokio::spawn(server.serve(cancel.clone()));
    (addr, cancel, handle)
}

async fn scrape(addr: SocketAddr) -> (reqwest::StatusCode, String) {
    let response = reqwest::get(format!("http://{addr}{METRICS_PATH}"))
        .await
        .expect("scrape request");
    let status = response.status();
    (status, response.text().await.expect("response body"))
}

const KEEP_ALIVE_GET: &[u8] = b"GET /metrics HTTP/1.1\r\nHost: localhost\r\n\r\n";

/// Read one response off a keep-alive connection, without waiting for EOF.
async fn read_response(stream: &mut TcpStream) -> String {
    let mut buf = vec![0u8; 64 * 1024];
    let mut response = String::new();
    loop {
        let n = stream.read(&mut buf).await.expect("read response");
        assert!(n > 0, "connection closed mid-response");
        response.push_str(&String::from_utf8_lossy(&buf[..n]));
        if let Some((head, body)) = response.split_once("\r\n\r\n") {
            let length = head
                .lines()
                .find_map(|line| line.strip_prefix("content-length: "))
                .and_then(|v| v.trim().parse::<usize>().ok())
                .expect("content-length header");
            if body.len() >= length {
                return response;
            }
        }
    }
}

/// Find a port nothing is listening on.
async fn free_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap().port()
}

#[tokio::test]
async fn test_disabled_opens_no_socket() {
    let port = free_port().await;
    let registry = Arc::new(Registry::new());

    let outcome = start(false, "127.0.0.1", port, registry, CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(outcome, ServeOutcome::Disabled);
    assert!(TcpStream::connect(("127.0.0.1", port)).await.is_err());
}

#[tokio::test]
async fn test_scrape_renders_every_instrument() {
    let registry = Arc::new(Registry::new());
    let metrics = ClientMetrics::register(&registry).unwrap();
    metrics.driver.l2_head_height.set(4_242);
    metrics.proposer.proposed_tx_lists.add(7);
    metrics.prover.pse_proof_generation_time.observe(30);
    metrics.prover.pse_proof_generation_time.observe(50);

    let (addr, cancel, handle) = spawn_server(registry).await;
    let (status, body) = scrape(addr).await;

    assert_eq!(status, reqwest::StatusCode::OK);
    for name in ALL_INSTRUMENT_NAMES {
        assert!(
            body.contains(&exposition_name(name)),
            "missing {name} in scrape:\n{body}"
        );
    }
    assert!(body.contains("driver_l2Head_height 4242"));
    assert!(body.contains("proposer_proposed_txLists 7"));
    assert!(body.contains("prover_proof_pse_generation_time_count 2"));

    cancel.cancel();
    assert_eq!(handle.await.unwrap().unwrap(), ServeOutcome::Closed);
}

#[tokio::test]
async fn test_scrape_sees_later_updates() {
    let registry = Arc::new(Registry::new());
    let metrics = ClientMetrics::register(&registry).unwrap();
    let (addr, cancel, handle) = spawn_server(registry).await;

    let (_, before) = scrape(addr).await;
    assert!(before.contains("prover_latestProven_id 0"));

    metrics.prover.latest_proven_id.set(901);
    let (_, after) = scrape(addr).await;
    assert!(after.contains("prover_latestProven_id 901"));

    cancel.cancel();
    handle.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_cancellation_closes_listener() {
    let registry = Arc::new(Registry::new());
    ClientMetrics::register(&registry).unwrap();
    let (addr, cancel, handle) = spawn_server(registry).await;

    assert!(TcpStream::connect(addr).await.is_ok());

    cancel.cancel();
    let outcome = tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("server stops after cancellation")
        .unwrap()
        .unwrap();

    assert_eq!(outcome, ServeOutcome::Closed);
    assert!(TcpStream::connect(addr).await.is_err());
}

#[tokio::test]
async fn test_cancellation_closes_open_connections() {
    let registry = Arc::new(Registry::new());
    let metrics = ClientMetrics::register(&registry).unwrap();
    let (addr, cancel, handle) = spawn_server(registry).await;

    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(KEEP_ALIVE_GET).await.unwrap();
    let first = read_response(&mut stream).await;
    assert!(first.starts_with("HTTP/1.1 200"));
    assert!(first.contains("proposer_epoch 0"));

    cancel.cancel();
    let outcome = tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("server stops after cancellation")
        .unwrap()
        .unwrap();
    assert_eq!(outcome, ServeOutcome::Closed);

    // The idle keep-alive connection must not be served any more.
    metrics.proposer.epoch.add(77);
    let _ = stream.write_all(KEEP_ALIVE_GET).await;
    let mut rest = Vec::new();
    let read = tokio::time::timeout(Duration::from_secs(5), stream.read_to_end(&mut rest))
        .await
        .expect("connection is closed after cancellation");
    if read.is_ok() {
        assert!(rest.is_empty(), "served after close: {}", String::from_utf8_lossy(&rest));
    }
}

#[tokio::test]
async fn test_start_blocks_until_cancelled() {
    let port = free_port().await;
    let registry = Arc::new(Registry::new());
    let cancel = CancellationToken::new();

    let handle = tokio::spawn(start(true, "127.0.0.1", port, registry, cancel.clone()));

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(!handle.is_finished());

    cancel.cancel();
    let outcome = tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(outcome, ServeOutcome::Closed);
}

#[tokio::test]
async fn test_occupied_port_is_bind_error() {
    let occupied = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = occupied.local_addr().unwrap().port();

    let result = start(
        true,
        "127.0.0.1",
        port,
        Arc::new(Registry::new()),
        CancellationToken::new(),
    )
    .await;

    match result {
        Err(MetricsServerError::BindError { addr, .. }) => {
            assert_eq!(addr, format!("127.0.0.1:{port}"));
        }
        other => panic!("expected bind error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_unassignable_host_is_bind_error() {
    // TEST-NET-1, never assigned to a local interface
    let result = start(
        true,
        "192.0.2.1",
        6060,
        Arc::new(Registry::new()),
        CancellationToken::new(),
    )
    .await;

    assert!(matches!(result, Err(MetricsServerError::BindError { .. })));
}

#[tokio::test]
async fn test_concurrent_producers() {
    const PRODUCERS: u64 = 16;
    const UPDATES: u64 = 1_000;

    let registry = Arc::new(Registry::new());
    let metrics = ClientMetrics::register(&registry).unwrap();
    let (addr, cancel, handle) = spawn_server(registry).await;

    let producers: Vec<_> = (0..PRODUCERS)
        .map(|_| {
            let queued = metrics.prover.queued_proofs.clone();
            tokio::spawn(async move {
                for _ in 0..UPDATES {
                    queued.add(1);
                    tokio::task::yield_now().await;
                }
            })
        })
        .collect();

    // scrape while producers are running
    let (status, _) = scrape(addr).await;
    assert_eq!(status, reqwest::StatusCode::OK);

    for producer in producers {
        producer.await.unwrap();
    }

    let (_, body) = scrape(addr).await;
    let expected = format!(
        "{} {}",
        exposition_name(PROVER_QUEUED_PROOFS),
        PRODUCERS * UPDATES
    );
    assert!(body.contains(&expected), "missing {expected:?}");

    cancel.cancel();
    handle.await.unwrap().unwrap();
}
