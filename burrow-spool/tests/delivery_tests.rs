#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::{collections::HashSet, path::Path, sync::Arc, time::Duration};

use burrow_common::Signal;
use burrow_spool::{
    Delivered, DeliveryService, Envelope, LocalDelivery, SpooledMessage, SpooledMessageId,
};
use tempfile::TempDir;
use tokio::{io::AsyncWriteExt, sync::broadcast, time::timeout};

const WAIT: Duration = Duration::from_secs(5);
const QUIET: Duration = Duration::from_millis(300);

fn message(n: usize) -> SpooledMessage {
    SpooledMessage::new(
        Envelope::new("client.example.com", "alice@example.com").recipient("bob@example.com"),
        format!("Subject: message {n}\r\n\r\nbody {n}\r\n").into_bytes(),
    )
}

fn entries(dir: &Path) -> usize {
    std::fs::read_dir(dir).unwrap().count()
}

async fn next(deliveries: &mut burrow_spool::Deliveries) -> Delivered {
    timeout(WAIT, deliveries.recv())
        .await
        .expect("delivery within timeout")
        .expect("stream still open")
}

#[tokio::test]
async fn test_nothing_published_while_body_in_flight() {
    let temp = TempDir::new().unwrap();
    let delivery = Arc::new(LocalDelivery::new(temp.path().join("spool")).unwrap());

    let (mut writer, mut reader) = tokio::io::duplex(16);
    let envelope = Envelope::new("mx", "alice@example.com").recipient("bob@example.com");

    let task = {
        let delivery = Arc::clone(&delivery);
        tokio::spawn(async move { delivery.deliver_from(&envelope, &mut reader).await })
    };

    for chunk in ["Subject: slow\r\n", "\r\n", "line one\r\n", "line two\r\n"] {
        writer.write_all(chunk.as_bytes()).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(entries(delivery.spool().new_dir()), 0);
        assert_eq!(entries(delivery.spool().tmp()), 1);
    }

    drop(writer);
    let id = task.await.unwrap().unwrap();

    assert_eq!(entries(delivery.spool().tmp()), 0);
    assert_eq!(delivery.list().await.unwrap(), vec![id.clone()]);
    assert_eq!(
        &*delivery.read(&id).await.unwrap().data,
        b"Subject: slow\r\n\r\nline one\r\nline two\r\n"
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_deliveries_keep_their_own_payloads() {
    let temp = TempDir::new().unwrap();
    let delivery = Arc::new(LocalDelivery::new(temp.path()).unwrap());

    let tasks: Vec<_> = (0..50)
        .map(|n| {
            let delivery = Arc::clone(&delivery);
            tokio::spawn(async move { (n, delivery.deliver(&message(n)).await) })
        })
        .collect();

    let mut ids = HashSet::new();
    for task in tasks {
        let (n, id) = task.await.unwrap();
        let id = id.unwrap();
        assert!(ids.insert(id.clone()));

        let stored = delivery.read(&id).await.unwrap();
        assert_eq!(stored, message(n), "payload {n} under {id}");
    }

    let listed: HashSet<SpooledMessageId> = delivery.list().await.unwrap().into_iter().collect();
    assert_eq!(listed, ids);
    assert_eq!(entries(delivery.spool().tmp()), 0);
}

#[tokio::test]
async fn test_watcher_yields_existing_then_new_messages_once() {
    let temp = TempDir::new().unwrap();
    let delivery = LocalDelivery::new(temp.path()).unwrap();

    let mut existing = Vec::new();
    for n in 0..3 {
        existing.push(delivery.deliver(&message(n)).await.unwrap());
    }

    let (shutdown, _) = broadcast::channel(1);
    let mut deliveries = delivery.deliveries(shutdown.subscribe()).unwrap();

    let mut received = Vec::new();
    for _ in 0..3 {
        received.push(next(&mut deliveries).await.id);
    }
    assert_eq!(received, existing);

    let fourth = delivery.deliver(&message(3)).await.unwrap();
    let delivered = next(&mut deliveries).await;
    assert_eq!(delivered.id, fourth);
    assert_eq!(delivered.message, message(3));

    assert!(
        timeout(QUIET, deliveries.recv()).await.is_err(),
        "no message should be yielded twice"
    );
}

#[tokio::test]
async fn test_watcher_skips_unparseable_entries() {
    let temp = TempDir::new().unwrap();
    let delivery = LocalDelivery::new(temp.path()).unwrap();

    let junk = SpooledMessageId::generate();
    std::fs::write(
        delivery.spool().new_dir().join(junk.to_string()),
        b"not an envelope",
    )
    .unwrap();
    std::fs::write(delivery.spool().new_dir().join("README"), b"hello").unwrap();
    let good = delivery.deliver(&message(1)).await.unwrap();

    let (shutdown, _) = broadcast::channel(1);
    let mut deliveries = delivery.deliveries(shutdown.subscribe()).unwrap();

    assert_eq!(next(&mut deliveries).await.id, good);
    assert!(timeout(QUIET, deliveries.recv()).await.is_err());
}

#[tokio::test]
async fn test_watcher_stops_on_shutdown() {
    let temp = TempDir::new().unwrap();
    let delivery = LocalDelivery::new(temp.path()).unwrap();

    let (shutdown, _) = broadcast::channel(1);
    let mut deliveries = delivery.deliveries(shutdown.subscribe()).unwrap();

    // Let the initial scan finish before signalling.
    tokio::time::sleep(Duration::from_millis(50)).await;
    shutdown.send(Signal::Shutdown).unwrap();

    assert!(
        timeout(WAIT, deliveries.recv())
            .await
            .expect("stream ends promptly")
            .is_none()
    );
}
