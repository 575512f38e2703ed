// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::connected;
use crate::{CreateMode, EventType, Store, WatchedEvent, Watcher};

fn counting_watcher(count: &Arc<AtomicUsize>) -> Watcher {
    let count = count.clone();
    Watcher::new(move |_| {
        _ = count.fetch_add(1, Ordering::SeqCst);
    })
}

#[tokio::test]
async fn test_children_changed_across_sessions() {
    let store = Store::new();
    let zk1 = connected(&store, "localhost:2181").await;
    let zk2 = connected(&store, "localhost:2181").await;
    let top = "/workflow-engine-data-source";

    zk2.create(top, Some(Vec::new()), CreateMode::Persistent)
        .unwrap()
        .await
        .unwrap();
    let (watcher, rx) = Watcher::channel();
    let (children, _) = zk2.get_children(top, Some(watcher)).unwrap().await.unwrap();
    assert!(children.is_empty());

    zk1.create(
        "/workflow-engine-data-source/xxx",
        Some(b"{prop1: \"foo\", prop2: \"bar\"}".to_vec()),
        CreateMode::Ephemeral,
    )
    .unwrap()
    .await
    .unwrap();
    _ = store.run_until_idle();
    assert_eq!(
        rx.await.unwrap(),
        WatchedEvent {
            event_type: EventType::NodeChildrenChanged,
            path: top.to_string(),
        }
    );

    // One-shot: observing the close needs a fresh registration.
    let (watcher, rx) = Watcher::channel();
    let (children, _) = zk2.get_children(top, Some(watcher)).unwrap().await.unwrap();
    assert_eq!(children, vec!["xxx"]);

    zk1.close().await;
    _ = store.run_until_idle();
    assert_eq!(rx.await.unwrap().event_type, EventType::NodeChildrenChanged);

    let (children, _) = zk2.get_children(top, None).unwrap().await.unwrap();
    assert!(children.is_empty());
}

#[tokio::test]
async fn test_data_watcher_is_one_shot() {
    let store = Store::new();
    let zk = connected(&store, "localhost:2181").await;
    zk.create("/w", None, CreateMode::Persistent)
        .unwrap()
        .await
        .unwrap();

    let count = Arc::new(AtomicUsize::new(0));
    zk.get_data("/w", Some(counting_watcher(&count)))
        .unwrap()
        .await
        .unwrap();
    for data in [b"1", b"2", b"3"] {
        zk.set_data("/w", Some(data.to_vec()), None)
            .unwrap()
            .await
            .unwrap();
    }
    _ = store.run_until_idle();
    assert_eq!(count.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_watcher_fires_after_mutation_returns() {
    let store = Store::new();
    let zk = connected(&store, "localhost:2181").await;
    zk.create("/w", None, CreateMode::Persistent)
        .unwrap()
        .await
        .unwrap();
    let (watcher, mut rx) = Watcher::channel();
    zk.get_data("/w", Some(watcher)).unwrap().await.unwrap();

    let pending = zk.set_data("/w", Some(b"x".to_vec()), None).unwrap();
    assert_eq!(rx.try_recv(), Ok(None));

    // The writer hears back before the watcher does.
    pending.await.unwrap();
    assert_eq!(rx.try_recv(), Ok(None));

    _ = store.run_until_idle();
    let event = rx.try_recv().unwrap().unwrap();
    assert_eq!(event.event_type, EventType::NodeDataChanged);
}

#[tokio::test]
async fn test_watchers_see_delete() {
    let store = Store::new();
    let zk = connected(&store, "localhost:2181").await;
    zk.create("/gone", None, CreateMode::Persistent)
        .unwrap()
        .await
        .unwrap();

    let (data_watcher, data_rx) = Watcher::channel();
    let (child_watcher, child_rx) = Watcher::channel();
    let (exists_watcher, exists_rx) = Watcher::channel();
    zk.get_data("/gone", Some(data_watcher)).unwrap().await.unwrap();
    zk.get_children("/gone", Some(child_watcher))
        .unwrap()
        .await
        .unwrap();
    zk.exists("/gone", Some(exists_watcher)).unwrap().await.unwrap();

    zk.remove("/gone", None).unwrap().await.unwrap();
    _ = store.run_until_idle();

    for rx in [data_rx, child_rx, exists_rx] {
        assert_eq!(rx.await.unwrap().event_type, EventType::NodeDeleted);
    }
}

#[tokio::test]
async fn test_exists_watcher_sees_creation() {
    let store = Store::new();
    let waiter = connected(&store, "localhost:2181").await;
    let creator = connected(&store, "localhost:2181").await;

    let (watcher, rx) = Watcher::channel();
    assert_eq!(waiter.exists("/ready", Some(watcher)).unwrap().await, Ok(None));

    creator
        .create("/ready", None, CreateMode::Persistent)
        .unwrap()
        .await
        .unwrap();
    _ = store.run_until_idle();
    assert_eq!(
        rx.await.unwrap(),
        WatchedEvent {
            event_type: EventType::NodeCreated,
            path: "/ready".to_string(),
        }
    );
}

#[tokio::test]
async fn test_unrelated_mutations_do_not_fire() {
    let store = Store::new();
    let zk = connected(&store, "localhost:2181").await;
    zk.mkdirp("/a/b", None, CreateMode::Persistent)
        .unwrap()
        .await
        .unwrap();

    let count = Arc::new(AtomicUsize::new(0));
    zk.get_data("/a", Some(counting_watcher(&count)))
        .unwrap()
        .await
        .unwrap();
    // Children changes do not concern a data watcher.
    zk.create("/a/c", None, CreateMode::Persistent)
        .unwrap()
        .await
        .unwrap();
    zk.set_data("/a/b", Some(b"x".to_vec()), None)
        .unwrap()
        .await
        .unwrap();
    _ = store.run_until_idle();
    assert_eq!(count.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_children_watcher_is_one_shot() {
    let store = Store::new();
    let zk = connected(&store, "localhost:2181").await;
    zk.create("/dir", None, CreateMode::Persistent)
        .unwrap()
        .await
        .unwrap();

    let count = Arc::new(AtomicUsize::new(0));
    zk.get_children("/dir", Some(counting_watcher(&count)))
        .unwrap()
        .await
        .unwrap();
    for name in ["/dir/a", "/dir/b", "/dir/c"] {
        zk.create(name, None, CreateMode::Persistent)
            .unwrap()
            .await
            .unwrap();
    }
    zk.remove("/dir/a", None).unwrap().await.unwrap();
    _ = store.run_until_idle();
    assert_eq!(count.load(Ordering::SeqCst), 1);

    // Registering again observes the next change only.
    zk.get_children("/dir", Some(counting_watcher(&count)))
        .unwrap()
        .await
        .unwrap();
    zk.remove("/dir/b", None).unwrap().await.unwrap();
    zk.remove("/dir/c", None).unwrap().await.unwrap();
    _ = store.run_until_idle();
    assert_eq!(count.load(Ordering::SeqCst), 2);
}
