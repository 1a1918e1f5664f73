use super::*;
use crate::frame::decompress;
use cinder_config::Lz4BlockSize;
use std::sync::Arc;
use std::sync::atomic::AtomicUsize;
use tokio::io::AsyncReadExt;
use tokio::net::TcpListener;

fn lines(count: usize) -> Vec<String> {
    (0..count)
        .map(|i| format!("prometheus.up.instance.host-{i}.job.node 1.000000 1700000000\n"))
        .collect()
}

fn joined(lines: &[String]) -> Vec<u8> {
    lines.concat().into_bytes()
}

/// Accept connections forever, collecting what each one sends
async fn spawn_collector() -> (SocketAddr, Arc<AtomicUsize>, mpsc::UnboundedReceiver<Vec<u8>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let accepted = Arc::new(AtomicUsize::new(0));
    let (tx, rx) = mpsc::unbounded_channel();

    let counter = Arc::clone(&accepted);
    tokio::spawn(async move {
        while let Ok((mut stream, _)) = listener.accept().await {
            counter.fetch_add(1, Ordering::SeqCst);
            let tx = tx.clone();
            tokio::spawn(async move {
                let mut data = Vec::new();
                let _ = stream.read_to_end(&mut data).await;
                let _ = tx.send(data);
            });
        }
    });

    (addr, accepted, rx)
}

// =============================================================================
// Config tests
// =============================================================================

#[test]
fn test_config_defaults() {
    let config = TransportConfig::new("carbon:2003");
    assert_eq!(config.address, "carbon:2003");
    assert_eq!(config.kind, TransportKind::Tcp);
    assert_eq!(config.reconnect_interval, Duration::from_secs(3600));
    assert!(config.tcp_keepalive);
    assert_eq!(config.compress, CompressType::Plain);
}

#[test]
fn test_config_from_write_settings() {
    let write = GraphiteWriteConfig {
        carbon_address: "10.0.0.1:2003".into(),
        carbon_transport: TransportKind::Udp,
        carbon_reconnect_interval: Duration::from_secs(90),
        tcp_keepalive: false,
        compress_type: CompressType::Lz4,
        lz4_preferences: Lz4Preferences {
            block_size: Lz4BlockSize::Max1Mb,
            ..Default::default()
        },
        ..Default::default()
    };

    let config = TransportConfig::from_config(&write, Duration::from_secs(7));
    assert_eq!(config.address, "10.0.0.1:2003");
    assert_eq!(config.kind, TransportKind::Udp);
    assert_eq!(config.reconnect_interval, Duration::from_secs(90));
    assert_eq!(config.dial_timeout, Duration::from_secs(7));
    assert_eq!(config.write_timeout, Duration::from_secs(7));
    assert!(!config.tcp_keepalive);
    assert_eq!(config.compress, CompressType::Lz4);
    assert_eq!(config.lz4.block_size, Lz4BlockSize::Max1Mb);
}

// =============================================================================
// Buffer preparation tests
// =============================================================================

#[test]
fn test_prepare_tcp_single_buffer() {
    let lines = lines(50);
    let buffers = prepare(TransportKind::Tcp, &lines);
    assert_eq!(buffers.len(), 1);
    assert_eq!(&buffers[0][..], &joined(&lines)[..]);
}

#[test]
fn test_prepare_empty() {
    let none: [&str; 0] = [];
    assert!(prepare(TransportKind::Tcp, &none).is_empty());
    assert!(prepare(TransportKind::Udp, &none).is_empty());
}

#[test]
fn test_prepare_udp_packs_under_limit() {
    let lines = lines(100);
    let buffers = prepare(TransportKind::Udp, &lines);

    assert!(buffers.len() > 1);
    for buffer in &buffers {
        assert!(buffer.len() <= UDP_MAX_BYTES);
        assert!(buffer.ends_with(b"\n"), "lines are never split");
    }

    let rejoined: Vec<u8> = buffers.iter().flat_map(|b| b.iter().copied()).collect();
    assert_eq!(rejoined, joined(&lines));
}

#[test]
fn test_prepare_udp_packs_greedily() {
    // Ten 100-byte lines fit in one datagram; the eleventh does not
    let line = format!("{}\n", "a".repeat(99));
    let lines = vec![line; 11];
    let buffers = prepare(TransportKind::Udp, &lines);
    assert_eq!(buffers.len(), 2);
    assert_eq!(buffers[0].len(), 1000);
    assert_eq!(buffers[1].len(), 100);
}

#[test]
fn test_prepare_udp_oversized_line_alone() {
    let big = format!("{}\n", "b".repeat(2000));
    let lines = vec!["small 1 1\n".to_string(), big.clone(), "small 2 2\n".to_string()];
    let buffers = prepare(TransportKind::Udp, &lines);

    assert_eq!(buffers.len(), 3);
    assert_eq!(&buffers[0][..], b"small 1 1\n");
    assert_eq!(&buffers[1][..], big.as_bytes());
    assert_eq!(&buffers[2][..], b"small 2 2\n");
}

// =============================================================================
// Send tests
// =============================================================================

#[tokio::test]
async fn test_send_tcp_plain() {
    let (addr, _, mut received) = spawn_collector().await;
    let transport = CarbonTransport::new(TransportConfig::new(addr.to_string()));

    let lines = lines(20);
    let buffers = transport.prepare(&lines);
    let sent = transport
        .send(&buffers, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(sent, joined(&lines).len());
    assert_eq!(transport.target().await, addr.to_string());

    transport.shutdown().await;
    assert_eq!(received.recv().await.unwrap(), joined(&lines));

    let metrics = transport.metrics().snapshot();
    assert_eq!(metrics.buffers_sent, 1);
    assert_eq!(metrics.bytes_sent, sent as u64);
    assert_eq!(metrics.reconnects, 1);
}

#[tokio::test]
async fn test_send_tcp_lz4() {
    let (addr, _, mut received) = spawn_collector().await;
    let prefs = Lz4Preferences {
        block_checksum: true,
        content_checksum: true,
        ..Default::default()
    };
    let transport = CarbonTransport::new(
        TransportConfig::new(addr.to_string()).with_compression(CompressType::Lz4, prefs),
    );

    // Big enough to span several pipeline chunks
    let lines = lines(5000);
    let buffers = transport.prepare(&lines);
    transport
        .send(&buffers, &CancellationToken::new())
        .await
        .unwrap();
    transport.shutdown().await;

    let wire = received.recv().await.unwrap();
    assert_eq!(&wire[..4], &[0x04, 0x22, 0x4D, 0x18]);
    assert_eq!(decompress(&wire).unwrap(), joined(&lines));
}

#[tokio::test]
async fn test_send_udp_one_datagram_per_buffer() {
    let server = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let addr = server.local_addr().unwrap();
    let transport = CarbonTransport::new(
        TransportConfig::new(addr.to_string()).with_kind(TransportKind::Udp),
    );

    let lines = lines(40);
    let buffers = transport.prepare(&lines);
    assert!(buffers.len() > 1);
    transport
        .send(&buffers, &CancellationToken::new())
        .await
        .unwrap();

    let mut buf = vec![0u8; 65536];
    for expected in &buffers {
        let n = server.recv(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], &expected[..]);
    }
}

#[tokio::test]
async fn test_send_udp_lz4_frame_per_datagram() {
    let server = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let addr = server.local_addr().unwrap();
    let transport = CarbonTransport::new(
        TransportConfig::new(addr.to_string())
            .with_kind(TransportKind::Udp)
            .with_compression(CompressType::Lz4, Lz4Preferences::default()),
    );

    let lines = lines(3);
    let buffers = transport.prepare(&lines);
    assert_eq!(buffers.len(), 1);
    transport
        .send(&buffers, &CancellationToken::new())
        .await
        .unwrap();

    let mut buf = vec![0u8; 65536];
    let n = server.recv(&mut buf).await.unwrap();
    assert_eq!(decompress(&buf[..n]).unwrap(), joined(&lines));
}

#[tokio::test]
async fn test_send_udp_lz4_limit_applies_before_framing() {
    let server = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let addr = server.local_addr().unwrap();
    let transport = CarbonTransport::new(
        TransportConfig::new(addr.to_string())
            .with_kind(TransportKind::Udp)
            .with_compression(CompressType::Lz4, Lz4Preferences::default()),
    );

    let lines = lines(40);
    let buffers = transport.prepare(&lines);
    assert!(buffers.len() > 1);
    transport
        .send(&buffers, &CancellationToken::new())
        .await
        .unwrap();

    let mut buf = vec![0u8; 65536];
    for expected in &buffers {
        assert!(expected.len() <= UDP_MAX_BYTES);
        let n = server.recv(&mut buf).await.unwrap();
        assert_eq!(decompress(&buf[..n]).unwrap(), expected.to_vec());
    }
}

#[tokio::test]
async fn test_send_nothing_does_not_dial() {
    let transport = CarbonTransport::new(TransportConfig::new("127.0.0.1:1"));
    let sent = transport.send(&[], &CancellationToken::new()).await.unwrap();
    assert_eq!(sent, 0);
    assert_eq!(transport.metrics().snapshot().reconnects, 0);
}

// =============================================================================
// Connection lifecycle tests
// =============================================================================

#[tokio::test]
async fn test_connection_reused_within_interval() {
    let (addr, accepted, _received) = spawn_collector().await;
    let transport = CarbonTransport::new(TransportConfig::new(addr.to_string()));
    let cancel = CancellationToken::new();

    for _ in 0..3 {
        let buffers = transport.prepare(&lines(2));
        transport.send(&buffers, &cancel).await.unwrap();
    }

    assert_eq!(transport.metrics().snapshot().reconnects, 1);
    transport.shutdown().await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(accepted.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_connection_redialed_after_interval() {
    let (addr, _, mut received) = spawn_collector().await;
    let transport = CarbonTransport::new(
        TransportConfig::new(addr.to_string()).with_reconnect_interval(Duration::ZERO),
    );
    let cancel = CancellationToken::new();

    transport
        .send(&transport.prepare(&["a 1 1\n"]), &cancel)
        .await
        .unwrap();
    transport
        .send(&transport.prepare(&["b 2 2\n"]), &cancel)
        .await
        .unwrap();
    transport.shutdown().await;

    assert_eq!(transport.metrics().snapshot().reconnects, 2);

    // The first connection closes when it is replaced
    let mut payloads = vec![
        received.recv().await.unwrap(),
        received.recv().await.unwrap(),
    ];
    payloads.sort();
    assert_eq!(payloads, vec![b"a 1 1\n".to_vec(), b"b 2 2\n".to_vec()]);
}

#[tokio::test]
async fn test_cancelled_before_send() {
    let (addr, accepted, _received) = spawn_collector().await;
    let transport = CarbonTransport::new(TransportConfig::new(addr.to_string()));

    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = transport
        .send(&transport.prepare(&["a 1 1\n"]), &cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, TransportError::Cancelled));
    assert_eq!(transport.metrics().snapshot().reconnects, 0);
    assert_eq!(accepted.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_dial_failure() {
    // Bind then drop to get a port nobody listens on
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let transport = CarbonTransport::new(TransportConfig::new(addr.to_string()));
    let err = transport
        .send(&transport.prepare(&["a 1 1\n"]), &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, TransportError::Dial { .. }));
    assert!(!err.is_connection_fault());
    assert_eq!(transport.target().await, "unknown");
}

#[tokio::test]
async fn test_broken_pipe_drops_connection() {
    // Server closes every connection as soon as it is accepted
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            drop(stream);
        }
    });

    let transport = CarbonTransport::new(TransportConfig::new(addr.to_string()));
    let cancel = CancellationToken::new();
    let buffers = transport.prepare(&lines(10));

    let mut failure = None;
    for _ in 0..100 {
        if let Err(e) = transport.send(&buffers, &cancel).await {
            failure = Some(e);
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    let err = failure.expect("writes to a closed peer eventually fail");
    assert!(err.is_connection_fault(), "unexpected error: {err}");
    assert_eq!(transport.target().await, "unknown");

    let metrics = transport.metrics().snapshot();
    assert_eq!(metrics.buffers_failed, 1);
    assert_eq!(metrics.reconnects, 1);

    // The next send dials again
    let _ = transport.send(&buffers, &cancel).await;
    assert_eq!(transport.metrics().snapshot().reconnects, 2);
}
