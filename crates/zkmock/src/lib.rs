// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! An in-memory stand-in for a ZooKeeper ensemble.
//!
//! A [`Store`] holds one node tree. Sessions created from it validate and
//! chroot their paths, own their ephemeral nodes, and get every result back as
//! a [`Deferred`] delivered by the store's cooperative scheduler, so client
//! code sees the same asynchrony it would against a real server.
//!
//! ```
//! use zkmock::{CreateMode, Store};
//!
//! let store = Store::new();
//! let session = store.create_session("localhost:2181/app").unwrap();
//! session
//!     .mkdirp("/election", None, CreateMode::Persistent)
//!     .unwrap()
//!     .wait()
//!     .unwrap();
//! let path = session
//!     .create("/election/n_", None, CreateMode::EphemeralSequential)
//!     .unwrap()
//!     .wait()
//!     .unwrap();
//! assert_eq!(path, "/app/election/n_0000000000");
//! ```

mod client;
mod config;
mod error;
mod node;
pub mod path;
mod scheduler;
mod session;
mod store;
mod tree;
mod tree_format;
mod watch;

pub use client::{ClientResult, ZkClient};
pub use config::MockConfig;
pub use error::{ArgumentError, ClientError, ErrorCode, Result, ZkError};
pub use node::{Acl, CreateMode, SessionId, Stat, perms};
pub use scheduler::{Deferred, Scheduler};
pub use session::{CreateOptions, Session, SessionEvent, SessionState};
pub use store::{Pending, Store};
pub use tree::TraversalOrder;
pub use tree_format::{TreeNode, format_tree};
pub use watch::{EventType, WatchedEvent, Watcher};

#[cfg(test)]
mod tests;
