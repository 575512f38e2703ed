// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

use async_trait::async_trait;

use crate::error::ClientError;
use crate::node::{Acl, Stat};
use crate::session::{CreateOptions, Session};
use crate::watch::Watcher;

pub type ClientResult<T> = std::result::Result<T, ClientError>;

/// The coordination-client operations, as one async interface.
///
/// Code written against this trait runs unchanged on a [`Session`] in tests
/// and on a networked client elsewhere. Argument and domain errors both
/// surface as a [`ClientError`].
#[async_trait]
pub trait ZkClient: Send + Sync {
    async fn create(
        &self,
        path: &str,
        data: Option<Vec<u8>>,
        options: CreateOptions,
    ) -> ClientResult<String>;

    async fn set_data(
        &self,
        path: &str,
        data: Option<Vec<u8>>,
        version: Option<i32>,
    ) -> ClientResult<Stat>;

    async fn get_data(
        &self,
        path: &str,
        watcher: Option<Watcher>,
    ) -> ClientResult<(Option<Vec<u8>>, Stat)>;

    async fn get_children(
        &self,
        path: &str,
        watcher: Option<Watcher>,
    ) -> ClientResult<(Vec<String>, Stat)>;

    async fn exists(&self, path: &str, watcher: Option<Watcher>) -> ClientResult<Option<Stat>>;

    async fn get_acl(&self, path: &str) -> ClientResult<(Vec<Acl>, Stat)>;

    async fn remove(&self, path: &str, version: Option<i32>) -> ClientResult<()>;

    async fn remove_recursive(&self, path: &str) -> ClientResult<()>;

    async fn mkdirp(
        &self,
        path: &str,
        data: Option<Vec<u8>>,
        options: CreateOptions,
    ) -> ClientResult<String>;
}

#[async_trait]
impl ZkClient for Session {
    async fn create(
        &self,
        path: &str,
        data: Option<Vec<u8>>,
        options: CreateOptions,
    ) -> ClientResult<String> {
        Ok(Session::create(self, path, data, options)?.await?)
    }

    async fn set_data(
        &self,
        path: &str,
        data: Option<Vec<u8>>,
        version: Option<i32>,
    ) -> ClientResult<Stat> {
        Ok(Session::set_data(self, path, data, version)?.await?)
    }

    async fn get_data(
        &self,
        path: &str,
        watcher: Option<Watcher>,
    ) -> ClientResult<(Option<Vec<u8>>, Stat)> {
        Ok(Session::get_data(self, path, watcher)?.await?)
    }

    async fn get_children(
        &self,
        path: &str,
        watcher: Option<Watcher>,
    ) -> ClientResult<(Vec<String>, Stat)> {
        Ok(Session::get_children(self, path, watcher)?.await?)
    }

    async fn exists(&self, path: &str, watcher: Option<Watcher>) -> ClientResult<Option<Stat>> {
        Ok(Session::exists(self, path, watcher)?.await?)
    }

    async fn get_acl(&self, path: &str) -> ClientResult<(Vec<Acl>, Stat)> {
        Ok(Session::get_acl(self, path)?.await?)
    }

    async fn remove(&self, path: &str, version: Option<i32>) -> ClientResult<()> {
        Ok(Session::remove(self, path, version)?.await?)
    }

    async fn remove_recursive(&self, path: &str) -> ClientResult<()> {
        Ok(Session::remove_recursive(self, path)?.await?)
    }

    async fn mkdirp(
        &self,
        path: &str,
        data: Option<Vec<u8>>,
        options: CreateOptions,
    ) -> ClientResult<String> {
        Ok(Session::mkdirp(self, path, data, options)?.await?)
    }
}
