use std::time::Duration;
use tokio::{
    sync::mpsc,
    time::{Instant, timeout},
};
use volume_feed::{
    ChannelTransport, ConnectionStatus, FeedClient, FeedConfig, FeedError, FeedEvent,
    SnapshotMessage, SnapshotSource, ValidationError,
};

const REAL_SNAPSHOT: &str = r#"{"exchange":"binance","timestamp":1700000000000,
    "buy_volume":1.25,"sell_volume":0.5,"buy_avg_price":27100,"sell_avg_price":27090,
    "buy_count":2,"sell_count":1}"#;

fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .try_init();
}

fn synthetic_source() -> impl SnapshotSource {
    |now: i64| SnapshotMessage {
        exchange: Some("synthetic".into()),
        timestamp: Some(now as f64),
        buy_volume: Some(1.0),
        buy_avg_price: Some(27_500.0),
        ..Default::default()
    }
}

fn is_synthetic(event: &FeedEvent) -> bool {
    matches!(event, FeedEvent::Snapshot(snapshot) if snapshot.exchange == "synthetic")
}

async fn next_event(events: &mut mpsc::Receiver<FeedEvent>) -> FeedEvent {
    timeout(Duration::from_secs(60), events.recv())
        .await
        .expect("timed out waiting for feed event")
        .expect("feed task stopped")
}

#[tokio::test(start_paused = true)]
async fn test_backoff_schedule_and_retry_cap() {
    init_test_logging();
    let transport = ChannelTransport::new();
    let (mut events, handle) = FeedClient::with_config(FeedConfig::new("ws://feed.test"))
        .with_transport(transport.clone())
        .with_source(synthetic_source())
        .start();

    let mut connect_errors = 0;
    loop {
        match next_event(&mut events).await {
            FeedEvent::Error(FeedError::RetriesExhausted { attempts }) => {
                assert_eq!(attempts, 5);
                break;
            }
            FeedEvent::Error(FeedError::Connect(_)) => connect_errors += 1,
            _ => {}
        }
    }

    // Initial attempt plus five retries
    assert_eq!(connect_errors, 6);
    let attempts = transport.attempts();
    let gaps: Vec<u128> = attempts
        .windows(2)
        .map(|pair| (pair[1] - pair[0]).as_millis())
        .collect();
    assert_eq!(gaps, vec![1_000, 2_000, 4_000, 8_000, 16_000]);

    // No sixth retry, synthetic data keeps flowing
    let mut synthetic = 0;
    let deadline = Instant::now() + Duration::from_secs(60);
    while Instant::now() < deadline {
        if is_synthetic(&next_event(&mut events).await) {
            synthetic += 1;
        }
    }
    assert_eq!(transport.attempts().len(), 6);
    assert!(synthetic >= 59, "only {synthetic} synthetic snapshots");

    handle.disconnect().await;
}

#[tokio::test(start_paused = true)]
async fn test_close_falls_back_until_real_connect() {
    init_test_logging();
    let transport = ChannelTransport::new();
    let first = transport.accept_next();
    let (mut events, handle) = FeedClient::with_config(FeedConfig::new("ws://feed.test"))
        .with_transport(transport.clone())
        .with_source(synthetic_source())
        .start();

    assert_eq!(
        next_event(&mut events).await,
        FeedEvent::Status(ConnectionStatus::Connecting)
    );
    assert_eq!(
        next_event(&mut events).await,
        FeedEvent::Status(ConnectionStatus::Connected)
    );

    assert!(first.send_text(REAL_SNAPSHOT));
    match next_event(&mut events).await {
        FeedEvent::Snapshot(snapshot) => assert_eq!(snapshot.exchange, "binance"),
        other => panic!("expected snapshot, got {other:?}"),
    }

    let second = transport.accept_next_after(Duration::from_millis(500));
    drop(first);
    let closed_at = Instant::now();
    assert_eq!(
        next_event(&mut events).await,
        FeedEvent::Status(ConnectionStatus::Disconnected)
    );

    let mut first_synthetic_after = None;
    loop {
        let event = next_event(&mut events).await;
        if is_synthetic(&event) && first_synthetic_after.is_none() {
            first_synthetic_after = Some(closed_at.elapsed());
        }
        if event == FeedEvent::Status(ConnectionStatus::Connected) {
            break;
        }
    }

    let elapsed = first_synthetic_after.expect("no synthetic snapshot before reconnect");
    assert!(elapsed <= Duration::from_secs(1), "fallback took {elapsed:?}");

    // Real connection is up again: the fallback timer is gone
    assert!(
        timeout(Duration::from_secs(5), events.recv()).await.is_err(),
        "unexpected event after reconnect"
    );

    assert!(second.send_text(REAL_SNAPSHOT));
    match next_event(&mut events).await {
        FeedEvent::Snapshot(snapshot) => assert_eq!(snapshot.exchange, "binance"),
        other => panic!("expected snapshot, got {other:?}"),
    }

    handle.disconnect().await;
    assert!(second.is_closed());
}

#[tokio::test(start_paused = true)]
async fn test_malformed_payload_keeps_connection_open() {
    let transport = ChannelTransport::new();
    let sender = transport.accept_next();
    let (mut events, handle) = FeedClient::with_config(FeedConfig::new("ws://feed.test"))
        .with_transport(transport.clone())
        .with_source(synthetic_source())
        .start();

    while next_event(&mut events).await != FeedEvent::Status(ConnectionStatus::Connected) {}

    assert!(sender.send_text(r#"{"type":"welcome"}"#));
    assert!(sender.send_text("not json"));
    assert!(matches!(
        next_event(&mut events).await,
        FeedEvent::Error(FeedError::Validation(ValidationError::Json(_)))
    ));

    assert!(is_synthetic(&next_event(&mut events).await));

    assert!(sender.send_text(REAL_SNAPSHOT));
    loop {
        match next_event(&mut events).await {
            FeedEvent::Snapshot(snapshot) if snapshot.exchange == "binance" => break,
            FeedEvent::Snapshot(_) => {}
            other => panic!("unexpected event {other:?}"),
        }
    }

    assert_eq!(transport.attempts().len(), 1);
    handle.disconnect().await;
}

#[tokio::test(start_paused = true)]
async fn test_invalid_url_falls_back_without_connecting() {
    let transport = ChannelTransport::new();
    let (mut events, handle) = FeedClient::with_config(FeedConfig::new("https://feed.test"))
        .with_transport(transport.clone())
        .with_source(synthetic_source())
        .start();

    assert!(matches!(
        next_event(&mut events).await,
        FeedEvent::Error(FeedError::InvalidUrl { .. })
    ));
    for _ in 0..3 {
        assert!(is_synthetic(&next_event(&mut events).await));
    }
    assert!(transport.attempts().is_empty());

    handle.disconnect().await;
}

#[tokio::test(start_paused = true)]
async fn test_disconnect_cancels_pending_reconnect() {
    let transport = ChannelTransport::new();
    let (mut events, handle) = FeedClient::with_config(FeedConfig::new("ws://feed.test"))
        .with_transport(transport.clone())
        .with_source(synthetic_source())
        .start();

    while !matches!(
        next_event(&mut events).await,
        FeedEvent::Error(FeedError::Connect(_))
    ) {}

    handle.disconnect().await;

    let mut remaining = Vec::new();
    while let Some(event) = events.recv().await {
        remaining.push(event);
    }
    assert_eq!(
        remaining.last(),
        Some(&FeedEvent::Status(ConnectionStatus::Disconnected))
    );

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(transport.attempts().len(), 1);
}
