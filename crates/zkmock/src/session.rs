// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! Client handles onto a [`Store`].
//!
//! A session validates caller paths, applies its chroot, and owns the
//! ephemeral nodes it creates. Every operation returns a [`Pending`]: bad
//! arguments fail immediately, everything else arrives through the store's
//! scheduler.

use diagnostics::info;
use std::sync::{Arc, Mutex};

use crate::error::ArgumentError;
use crate::node::{Acl, CreateMode, SessionId, Stat};
use crate::path;
use crate::scheduler::{Deferred, lock};
use crate::store::{Pending, Store};
use crate::watch::Watcher;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connected,
}

/// Connection lifecycle events, distinct from node watches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    Connected,
}

/// Creation parameters shared by `create` and `mkdirp`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateOptions {
    pub acl: Vec<Acl>,
    pub mode: CreateMode,
}

impl Default for CreateOptions {
    fn default() -> Self {
        Self {
            acl: Acl::open_unsafe(),
            mode: CreateMode::Persistent,
        }
    }
}

impl CreateOptions {
    pub fn new(mode: CreateMode) -> Self {
        Self {
            mode,
            ..Self::default()
        }
    }

    pub fn with_acl(mut self, acl: Vec<Acl>) -> Self {
        self.acl = acl;
        self
    }

    fn validate(&self) -> Result<(), ArgumentError> {
        if self.acl.is_empty() {
            return Err(ArgumentError::EmptyAcl);
        }
        Ok(())
    }
}

impl From<CreateMode> for CreateOptions {
    fn from(mode: CreateMode) -> Self {
        Self::new(mode)
    }
}

enum Listener {
    On(Arc<dyn Fn(SessionEvent) + Send + Sync>),
    Once(Box<dyn FnOnce(SessionEvent) + Send>),
}

struct SessionInner {
    id: SessionId,
    chroot: String,
    store: Store,
    state: Mutex<SessionState>,
    listeners: Mutex<Vec<Listener>>,
}

/// One client's view of a store. Clones share the same session.
#[derive(Clone)]
pub struct Session(Arc<SessionInner>);

impl Session {
    pub(crate) fn new(store: Store, id: SessionId, chroot: String) -> Self {
        Self(Arc::new(SessionInner {
            id,
            chroot,
            store,
            state: Mutex::new(SessionState::Disconnected),
            listeners: Mutex::new(Vec::new()),
        }))
    }

    pub fn id(&self) -> SessionId {
        self.0.id
    }

    /// The chroot prefix, empty when there is none
    pub fn chroot(&self) -> &str {
        &self.0.chroot
    }

    pub fn state(&self) -> SessionState {
        *lock(&self.0.state)
    }

    pub fn store(&self) -> &Store {
        &self.0.store
    }

    /// Registers a listener for every future lifecycle event.
    pub fn on<F>(&self, listener: F)
    where
        F: Fn(SessionEvent) + Send + Sync + 'static,
    {
        lock(&self.0.listeners).push(Listener::On(Arc::new(listener)));
    }

    /// Registers a listener for the next lifecycle event only.
    pub fn once<F>(&self, listener: F)
    where
        F: FnOnce(SessionEvent) + Send + 'static,
    {
        lock(&self.0.listeners).push(Listener::Once(Box::new(listener)));
    }

    /// Marks the session connected.
    ///
    /// Listeners hear `Connected` after the returned completion is delivered.
    /// Connecting an already connected session only delivers the completion.
    pub fn connect(&self) -> Deferred<()> {
        let was = std::mem::replace(&mut *lock(&self.0.state), SessionState::Connected);
        let scheduler = self.0.store.scheduler();
        let deferred = scheduler.defer(());
        if was == SessionState::Connected {
            return deferred;
        }

        self.0.store.trace("connect", self.0.id, &self.0.chroot, "ok", 0);
        info!("Session {session} connected", session: self.0.id.to_string());
        for listener in self.take_listeners() {
            scheduler.schedule(move || listener(SessionEvent::Connected));
        }
        deferred
    }

    /// Detaches `once` listeners and clones `on` listeners for one event.
    fn take_listeners(&self) -> Vec<Box<dyn FnOnce(SessionEvent) + Send>> {
        let mut listeners = lock(&self.0.listeners);
        let mut fire: Vec<Box<dyn FnOnce(SessionEvent) + Send>> = Vec::new();
        let mut keep = Vec::new();
        for listener in std::mem::take(&mut *listeners) {
            match listener {
                Listener::On(f) => {
                    let g = f.clone();
                    fire.push(Box::new(move |event| g(event)));
                    keep.push(Listener::On(f));
                }
                Listener::Once(f) => fire.push(f),
            }
        }
        *listeners = keep;
        fire
    }

    /// Removes every ephemeral node this session owns and disconnects.
    ///
    /// Never fails. Closing a disconnected session still sweeps, which finds
    /// nothing unless nodes were created while disconnected.
    pub fn close(&self) -> Deferred<()> {
        let owner = self.0.id;
        let (removed, fired) = self.0.store.run("close", owner, "/", |tree, _, fired| {
            Ok(tree.remove_ephemerals(owner, fired))
        });
        *lock(&self.0.state) = SessionState::Disconnected;

        info!(
            "Session {session} closed, removed {count} ephemeral nodes",
            session: owner.to_string(),
            count: removed.as_ref().map_or(0, Vec::len)
        );
        self.0.store.complete((), fired)
    }

    /// Validates a caller path and applies the chroot.
    fn full_path(&self, path: &str) -> Result<String, ArgumentError> {
        path::validate_path(path)?;
        Ok(path::prepend_chroot(&self.0.chroot, path))
    }

    pub fn create(
        &self,
        path: &str,
        data: Option<Vec<u8>>,
        options: impl Into<CreateOptions>,
    ) -> Pending<String> {
        let full = self.full_path(path)?;
        let options = options.into();
        options.validate()?;
        let CreateOptions { acl, mode } = options;
        let owner = self.0.id;
        Ok(self.0.store.apply("create", owner, full, move |tree, path, fired| {
            tree.create(path, data, acl, mode, owner, fired)
        }))
    }

    /// Overwrites a node's data. `version` of `None` or `Some(-1)` matches any.
    pub fn set_data(
        &self,
        path: &str,
        data: Option<Vec<u8>>,
        version: Option<i32>,
    ) -> Pending<Stat> {
        let full = self.full_path(path)?;
        Ok(self.0.store.apply("set_data", self.0.id, full, move |tree, path, fired| {
            tree.set_data(path, data, version, fired)
        }))
    }

    pub fn get_data(
        &self,
        path: &str,
        watcher: Option<Watcher>,
    ) -> Pending<(Option<Vec<u8>>, Stat)> {
        let full = self.full_path(path)?;
        Ok(self.0.store.apply("get_data", self.0.id, full, move |tree, path, _| {
            tree.get_data(path, watcher)
        }))
    }

    /// Lists child names in sorted order.
    pub fn get_children(
        &self,
        path: &str,
        watcher: Option<Watcher>,
    ) -> Pending<(Vec<String>, Stat)> {
        let full = self.full_path(path)?;
        Ok(self.0.store.apply("get_children", self.0.id, full, move |tree, path, _| {
            tree.get_children(path, watcher)
        }))
    }

    /// Resolves to `None` for a missing node.
    ///
    /// A watcher on a missing node waits for it to be created.
    pub fn exists(&self, path: &str, watcher: Option<Watcher>) -> Pending<Option<Stat>> {
        let full = self.full_path(path)?;
        Ok(self.0.store.apply("exists", self.0.id, full, move |tree, path, _| {
            Ok(tree.exists(path, watcher))
        }))
    }

    pub fn get_acl(&self, path: &str) -> Pending<(Vec<Acl>, Stat)> {
        let full = self.full_path(path)?;
        Ok(self
            .0
            .store
            .apply("get_acl", self.0.id, full, |tree, path, _| tree.get_acl(path)))
    }

    pub fn remove(&self, path: &str, version: Option<i32>) -> Pending<()> {
        let full = self.full_path(path)?;
        if full == "/" {
            return Err(ArgumentError::RootNotRemovable);
        }
        Ok(self.0.store.apply("remove", self.0.id, full, move |tree, path, fired| {
            tree.remove(path, version, fired)
        }))
    }

    /// Deletes `path` together with everything below it.
    ///
    /// Unlike `remove` there is no version check and no `NotEmpty`. Every
    /// removed node raises its own events.
    pub fn remove_recursive(&self, path: &str) -> Pending<()> {
        let full = self.full_path(path)?;
        if full == "/" {
            return Err(ArgumentError::RootNotRemovable);
        }
        Ok(self
            .0
            .store
            .apply("remove_recursive", self.0.id, full, |tree, path, fired| {
                tree.remove_recursive(path, fired).map(|_| ())
            }))
    }

    /// Creates `path` and any missing ancestors in one step.
    ///
    /// Ancestors are persistent and empty; `data` and `options` apply to the
    /// final segment only. An existing node at `path` is not an error.
    pub fn mkdirp(
        &self,
        path: &str,
        data: Option<Vec<u8>>,
        options: impl Into<CreateOptions>,
    ) -> Pending<String> {
        let full = self.full_path(path)?;
        let options = options.into();
        options.validate()?;
        let CreateOptions { acl, mode } = options;
        let owner = self.0.id;
        Ok(self.0.store.apply("mkdirp", owner, full, move |tree, path, fired| {
            tree.mkdirp(path, data, acl, mode, owner, fired)
        }))
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.0.id)
            .field("chroot", &self.0.chroot)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}
