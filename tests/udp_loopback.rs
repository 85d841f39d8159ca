//! End-to-end decoding over a real UDP socket on loopback.

use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;

use groundlink::{
    FrameMarkers, FramePacker, FrameSchema, Groundlink, GroundlinkConfig, UpdateRate, flight_fields,
};

fn frame(overrides: &[(&str, f64)]) -> Vec<u8> {
    let packer =
        FramePacker::new(Arc::new(FrameSchema::flight().unwrap()), FrameMarkers::default());
    let values = flight_fields().into_iter().filter(|f| !f.reserved).map(|f| {
        let value = overrides.iter().find(|(n, _)| *n == f.name).map_or(0.0, |(_, v)| *v);
        (f.name, value)
    });
    packer.encode_frame(values).unwrap()
}

fn loopback_config() -> GroundlinkConfig {
    GroundlinkConfig { bind: "127.0.0.1:0".parse().unwrap(), ..Default::default() }
}

#[tokio::test]
async fn decodes_frames_and_survives_garbage() {
    let connection = Groundlink::listen(&loopback_config()).await.unwrap();
    let target = connection.local_addr().unwrap();
    let mut records = connection.subscribe(UpdateRate::Native);

    let sender = UdpSocket::bind("127.0.0.1:0").await.unwrap();

    // No sync marker: rejected, loop keeps going
    sender.send_to(b"hello world", target).await.unwrap();
    // Sync but no terminator
    sender.send_to(&[0x5E, 0xD5, 0x00, 0x01], target).await.unwrap();
    // Leading junk before the sync marker is skipped
    let mut noisy = vec![0xFF, 0x00, 0x13];
    noisy.extend_from_slice(&frame(&[("Az", -1.6), ("volts", 12.6), ("fps", 42.0)]));
    sender.send_to(&noisy, target).await.unwrap();

    let record = tokio::time::timeout(Duration::from_secs(2), records.next())
        .await
        .expect("record should arrive")
        .expect("stream open");
    assert_eq!(record.f64("Az"), Some(-1.6));
    assert_eq!(record.f64("volts"), Some(12.6));
    assert_eq!(record.i64("fps"), Some(42));
    assert_eq!(record.consumed_bits(), 128);

    let stats = connection.shutdown().await.unwrap();
    assert_eq!(stats.datagrams, 3);
    assert_eq!(stats.records, 1);
    assert_eq!(stats.sync_not_found, 1);
    assert_eq!(stats.terminator_not_found, 1);
}

#[tokio::test]
async fn all_zero_frame_decodes_to_zeros() {
    let connection = Groundlink::listen(&loopback_config()).await.unwrap();
    let target = connection.local_addr().unwrap();
    let mut records = connection.subscribe(UpdateRate::Native);

    let sender = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    sender.send_to(&frame(&[]), target).await.unwrap();

    let record = tokio::time::timeout(Duration::from_secs(2), records.next())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.len(), 14);
    assert!(record.iter().all(|(_, value)| value.as_f64() == 0.0));
}

#[tokio::test]
async fn short_payload_is_counted_not_decoded() {
    let connection = Groundlink::listen(&loopback_config()).await.unwrap();
    let target = connection.local_addr().unwrap();
    let mut stats = connection.stats_updates();

    let sender = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let mut short = vec![0x5E, 0xD5];
    short.extend_from_slice(&[0u8; 10]);
    short.extend_from_slice(b"\r\n");
    sender.send_to(&short, target).await.unwrap();

    let seen = tokio::time::timeout(Duration::from_secs(2), async {
        while let Some(stats) = stats.next().await {
            if stats.datagrams == 1 {
                return stats;
            }
        }
        panic!("stats stream ended");
    })
    .await
    .unwrap();
    assert_eq!(seen.insufficient_bits, 1);
    assert!(connection.latest().is_none());
}

#[tokio::test]
async fn bind_conflict_is_reported() {
    let first = Groundlink::listen(&loopback_config()).await.unwrap();
    let taken = GroundlinkConfig { bind: first.local_addr().unwrap(), ..Default::default() };
    let err = Groundlink::listen(&taken).await.err().unwrap();
    assert!(err.is_retryable());
    assert!(!err.recovery_suggestions().is_empty());
}
