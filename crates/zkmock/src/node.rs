// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::watch::Watcher;

pub(crate) const ROOT_ID: NodeId = NodeId(0);

/// Arena index of a node in the tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(crate) struct NodeId(u64);

impl NodeId {
    pub(crate) fn new(id: u64) -> Self {
        Self(id)
    }

    pub(crate) fn is_root(self) -> bool {
        self == ROOT_ID
    }
}

/// Identity of a session; owner of the ephemeral nodes it creates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SessionId(u64);

impl SessionId {
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "0x{:016x}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum CreateMode {
    #[default]
    Persistent,
    PersistentSequential,
    Ephemeral,
    EphemeralSequential,
}

impl CreateMode {
    pub fn is_ephemeral(self) -> bool {
        matches!(self, CreateMode::Ephemeral | CreateMode::EphemeralSequential)
    }

    pub fn is_sequential(self) -> bool {
        matches!(
            self,
            CreateMode::PersistentSequential | CreateMode::EphemeralSequential
        )
    }

    /// The wire value used by ZooKeeper clients
    pub fn code(self) -> i32 {
        match self {
            CreateMode::Persistent => 0,
            CreateMode::Ephemeral => 1,
            CreateMode::PersistentSequential => 2,
            CreateMode::EphemeralSequential => 3,
        }
    }
}

/// Permission bits, stored and reported but never enforced.
pub mod perms {
    pub const READ: u32 = 1;
    pub const WRITE: u32 = 1 << 1;
    pub const CREATE: u32 = 1 << 2;
    pub const DELETE: u32 = 1 << 3;
    pub const ADMIN: u32 = 1 << 4;
    pub const ALL: u32 = READ | WRITE | CREATE | DELETE | ADMIN;
}

/// An access control entry. The store keeps these opaquely.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Acl {
    pub perms: u32,
    pub scheme: String,
    pub id: String,
}

impl Acl {
    pub fn new(perms: u32, scheme: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            perms,
            scheme: scheme.into(),
            id: id.into(),
        }
    }

    /// `world:anyone` with every permission
    pub fn open_unsafe() -> Vec<Acl> {
        vec![Acl::new(perms::ALL, "world", "anyone")]
    }
}

/// Node metadata returned alongside reads and writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Stat {
    /// Transaction that created the node
    pub czxid: i64,
    /// Transaction that last modified the node's data
    pub mzxid: i64,
    /// Transaction that last added or removed a child
    pub pzxid: i64,
    /// Number of data changes
    pub version: i32,
    /// Number of child changes
    pub cversion: i32,
    pub ephemeral_owner: Option<SessionId>,
    pub data_length: usize,
    pub num_children: usize,
}

/// The child table of a node that can have children.
#[derive(Debug, Default)]
pub(crate) struct Children {
    pub names: BTreeMap<String, NodeId>,
    /// Next suffix for sequential children; never decremented
    pub sequence: u64,
}

/// One entry in the tree.
pub(crate) struct ZNode {
    pub name: String,
    pub data: Option<Vec<u8>>,
    pub acl: Vec<Acl>,
    pub mode: CreateMode,
    pub parent: Option<NodeId>,
    /// `None` for ephemeral nodes, which cannot have children
    pub children: Option<Children>,
    pub owner: Option<SessionId>,
    pub czxid: i64,
    pub mzxid: i64,
    pub pzxid: i64,
    pub version: i32,
    pub cversion: i32,
    /// Fire on data-changed or deleted
    pub data_watchers: Vec<Watcher>,
    /// Fire on children-changed or deleted
    pub child_watchers: Vec<Watcher>,
}

impl ZNode {
    pub(crate) fn root() -> Self {
        Self::new(String::new(), None, Vec::new(), CreateMode::Persistent, None, None, 0)
    }

    pub(crate) fn new(
        name: String,
        data: Option<Vec<u8>>,
        acl: Vec<Acl>,
        mode: CreateMode,
        parent: Option<NodeId>,
        owner: Option<SessionId>,
        zxid: i64,
    ) -> Self {
        let children = if mode.is_ephemeral() {
            None
        } else {
            Some(Children::default())
        };
        Self {
            name,
            data,
            acl,
            mode,
            parent,
            children,
            owner: if mode.is_ephemeral() { owner } else { None },
            czxid: zxid,
            mzxid: zxid,
            pzxid: zxid,
            version: 0,
            cversion: 0,
            data_watchers: Vec::new(),
            child_watchers: Vec::new(),
        }
    }

    pub(crate) fn stat(&self) -> Stat {
        Stat {
            czxid: self.czxid,
            mzxid: self.mzxid,
            pzxid: self.pzxid,
            version: self.version,
            cversion: self.cversion,
            ephemeral_owner: self.owner,
            data_length: self.data.as_ref().map_or(0, Vec::len),
            num_children: self.children.as_ref().map_or(0, |c| c.names.len()),
        }
    }

    pub(crate) fn has_children(&self) -> bool {
        self.children.as_ref().is_some_and(|c| !c.names.is_empty())
    }
}

impl std::fmt::Debug for ZNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ZNode")
            .field("name", &self.name)
            .field("mode", &self.mode)
            .field("parent", &self.parent)
            .field("owner", &self.owner)
            .field("children", &self.children.as_ref().map(|c| &c.names))
            .finish_non_exhaustive()
    }
}
