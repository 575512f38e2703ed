// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

use diagnostics::{debug, info, warn};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use crate::config::MockConfig;
use crate::error::{ArgumentError, Result};
use crate::node::SessionId;
use crate::path;
use crate::scheduler::{Deferred, Scheduler, lock};
use crate::session::Session;
use crate::tree::{TraversalOrder, Tree};
use crate::watch::Notification;

/// What every session operation returns: argument errors right away, domain
/// results later.
pub type Pending<T> = std::result::Result<Deferred<Result<T>>, ArgumentError>;

/// One in-memory node tree and the sessions that share it.
///
/// Cloning is cheap and yields another handle to the same tree. Independent
/// fixtures each build their own store.
#[derive(Clone)]
pub struct Store(Arc<Inner>);

struct Inner {
    tree: Mutex<Tree>,
    scheduler: Scheduler,
    config: MockConfig,
    next_session: AtomicU64,
}

impl Default for Store {
    fn default() -> Self {
        Self::build(MockConfig::default())
    }
}

impl Store {
    /// A store with no trace logging and no injected latency
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: MockConfig) -> std::result::Result<Self, ArgumentError> {
        config.validate()?;
        if config.enable_trace_log {
            diagnostics::init_with_default("debug");
        }
        Ok(Self::build(config))
    }

    fn build(config: MockConfig) -> Self {
        let scheduler = Scheduler::new(config.min_delay_ms, config.max_delay_ms, config.seed);
        Self(Arc::new(Inner {
            tree: Mutex::new(Tree::default()),
            scheduler,
            config,
            next_session: AtomicU64::new(1),
        }))
    }

    pub fn config(&self) -> &MockConfig {
        &self.0.config
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.0.scheduler
    }

    /// Opens a disconnected session.
    ///
    /// The chroot is everything from the first `/` of `connection`, so
    /// `"localhost:2181/app"` confines the session to `/app`.
    pub fn create_session(&self, connection: &str) -> std::result::Result<Session, ArgumentError> {
        let chroot = path::parse_chroot(connection)?;
        let id = SessionId::new(self.0.next_session.fetch_add(1, Ordering::Relaxed));
        info!(
            "Opened session {session} with chroot '{chroot}'",
            session: id.to_string(),
            chroot: chroot.as_str()
        );
        Ok(Session::new(self.clone(), id, chroot))
    }

    /// Drops every node except the root.
    ///
    /// Meant for use between test cases; completions still queued are
    /// delivered as they were computed.
    pub fn reset(&self) {
        let pending = self.0.scheduler.pending();
        if pending > 0 {
            warn!("Store reset with {pending} completions still queued", pending: pending);
        }
        *lock(&self.0.tree) = Tree::default();
        info!("Store reset");
    }

    /// Delivers every queued completion and watcher event.
    pub fn run_until_idle(&self) -> usize {
        self.0.scheduler.run_until_idle()
    }

    /// Number of nodes, root included
    pub fn node_count(&self) -> usize {
        lock(&self.0.tree).len()
    }

    /// Every node path, visited without recursion
    pub fn paths(&self, order: TraversalOrder) -> Vec<String> {
        lock(&self.0.tree).paths(order)
    }

    /// Box-drawing rendering of the whole tree
    pub fn dump(&self) -> String {
        lock(&self.0.tree).dump()
    }

    pub(crate) fn with_tree<R>(&self, f: impl FnOnce(&mut Tree) -> R) -> R {
        f(&mut lock(&self.0.tree))
    }

    /// Runs one operation against the tree and defers its outcome.
    pub(crate) fn apply<T, F>(
        &self,
        op: &'static str,
        session: SessionId,
        path: String,
        f: F,
    ) -> Deferred<Result<T>>
    where
        T: Send + 'static,
        F: FnOnce(&mut Tree, &str, &mut Vec<Notification>) -> Result<T>,
    {
        let (result, fired) = self.run(op, session, &path, f);
        self.complete(result, fired)
    }

    /// Runs one operation against the tree and traces it, without deferring.
    pub(crate) fn run<T, F>(
        &self,
        op: &'static str,
        session: SessionId,
        path: &str,
        f: F,
    ) -> (Result<T>, Vec<Notification>)
    where
        F: FnOnce(&mut Tree, &str, &mut Vec<Notification>) -> Result<T>,
    {
        let mut fired = Vec::new();
        let result = self.with_tree(|tree| f(tree, path, &mut fired));
        let outcome = match &result {
            Ok(_) => "ok".to_string(),
            Err(err) => err.code().to_string(),
        };
        self.trace(op, session, path, &outcome, fired.len());
        (result, fired)
    }

    /// One debug line per operation when trace logging is on.
    pub(crate) fn trace(
        &self,
        op: &'static str,
        session: SessionId,
        path: &str,
        outcome: &str,
        watchers: usize,
    ) {
        if !self.0.config.enable_trace_log {
            return;
        }
        debug!(
            "{op} {node} by session {session}: {outcome}, {watchers} watchers fired",
            op: op,
            node: path,
            session: session.to_string(),
            outcome: outcome,
            watchers: watchers
        );
    }

    /// Queues `value` for its caller, then every fired watcher.
    pub(crate) fn complete<T>(&self, value: T, fired: Vec<Notification>) -> Deferred<T>
    where
        T: Send + 'static,
    {
        let deferred = self.0.scheduler.defer(value);
        for notification in fired {
            self.0.scheduler.schedule(move || notification.deliver());
        }
        deferred
    }
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("config", &self.0.config)
            .field("scheduler", &self.0.scheduler)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::CreateMode;

    #[test]
    fn test_stores_are_isolated() {
        let a = Store::new();
        let b = Store::new();
        let session = a.create_session("localhost:2181").unwrap();
        session
            .create("/only-in-a", None, CreateMode::Persistent)
            .unwrap()
            .wait()
            .unwrap();

        assert_eq!(a.node_count(), 2);
        assert_eq!(b.node_count(), 1);
    }

    #[test]
    fn test_reset() {
        let store = Store::new();
        let session = store.create_session("localhost:2181").unwrap();
        session
            .mkdirp("/a/b/c", None, CreateMode::Persistent)
            .unwrap()
            .wait()
            .unwrap();
        assert_eq!(store.node_count(), 4);

        store.reset();
        assert_eq!(store.paths(TraversalOrder::PreOrder), vec!["/"]);
    }

    #[test]
    fn test_invalid_config() {
        let err = Store::with_config(MockConfig::default().with_delay(10, 1)).unwrap_err();
        assert!(matches!(err, ArgumentError::InvalidConfig(_)));
    }

    #[test]
    fn test_trace_log_does_not_change_results() {
        let store = Store::with_config(MockConfig::default().with_trace_log(true)).unwrap();
        let session = store.create_session("localhost:2181").unwrap();
        let path = session
            .create("/traced", Some(b"x".to_vec()), CreateMode::Persistent)
            .unwrap()
            .wait()
            .unwrap();
        assert_eq!(path, "/traced");
    }

    #[test]
    fn test_session_ids_are_unique() {
        let store = Store::new();
        let a = store.create_session("localhost:2181").unwrap();
        let b = store.create_session("localhost:2181").unwrap();
        assert_ne!(a.id(), b.id());
    }
}
