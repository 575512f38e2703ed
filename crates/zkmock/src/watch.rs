// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! One-shot watchers and the events they receive.
//!
//! A watcher is attached to a node by a read (`get_data`, `get_children`,
//! `exists`). The next matching mutation detaches it and hands it to the
//! scheduler together with the event, so it fires at most once and never
//! inside the mutating call.

use futures::channel::oneshot;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventType {
    NodeCreated,
    NodeDeleted,
    NodeDataChanged,
    NodeChildrenChanged,
}

impl EventType {
    /// The wire value used by ZooKeeper clients
    pub fn code(self) -> i32 {
        match self {
            EventType::NodeCreated => 1,
            EventType::NodeDeleted => 2,
            EventType::NodeDataChanged => 3,
            EventType::NodeChildrenChanged => 4,
        }
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            EventType::NodeCreated => "NODE_CREATED",
            EventType::NodeDeleted => "NODE_DELETED",
            EventType::NodeDataChanged => "NODE_DATA_CHANGED",
            EventType::NodeChildrenChanged => "NODE_CHILDREN_CHANGED",
        };
        f.write_str(name)
    }
}

/// What a watcher is told when it fires.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchedEvent {
    pub event_type: EventType,
    /// Full path of the node, chroot included
    pub path: String,
}

/// A one-shot callback registered by a read operation.
pub struct Watcher(Box<dyn FnOnce(WatchedEvent) + Send + 'static>);

impl Watcher {
    pub fn new<F>(callback: F) -> Self
    where
        F: FnOnce(WatchedEvent) + Send + 'static,
    {
        Self(Box::new(callback))
    }

    /// A watcher that forwards its event to the returned receiver.
    ///
    /// The receiver only completes once the scheduler delivers the event, e.g.
    /// after awaiting a later operation or calling `Store::run_until_idle`.
    pub fn channel() -> (Self, oneshot::Receiver<WatchedEvent>) {
        let (tx, rx) = oneshot::channel();
        let watcher = Self::new(move |event| {
            // The receiver may have been dropped; nobody is listening then.
            let _ = tx.send(event);
        });
        (watcher, rx)
    }

    pub(crate) fn fire(self, event: WatchedEvent) {
        (self.0)(event)
    }
}

impl std::fmt::Debug for Watcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Watcher")
    }
}

/// A watcher that has been triggered and is waiting for delivery.
#[derive(Debug)]
pub(crate) struct Notification {
    watcher: Watcher,
    event: WatchedEvent,
}

impl Notification {
    pub(crate) fn deliver(self) {
        self.watcher.fire(self.event)
    }
}

/// Detaches every watcher in `watchers` and queues it with a fresh event.
pub(crate) fn trigger(
    watchers: &mut Vec<Watcher>,
    event_type: EventType,
    path: &str,
    fired: &mut Vec<Notification>,
) {
    fired.extend(watchers.drain(..).map(|watcher| Notification {
        watcher,
        event: WatchedEvent {
            event_type,
            path: path.to_string(),
        },
    }));
}
