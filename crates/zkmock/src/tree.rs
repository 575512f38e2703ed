// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

use std::collections::HashMap;

use crate::error::{ErrorCode, Result, ZkError};
use crate::node::*;
use crate::path;
use crate::tree_format::{TreeNode, format_tree};
use crate::watch::{EventType, Notification, Watcher, trigger};

/// Visiting order for [`Tree::walk`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraversalOrder {
    /// Parents before their children
    PreOrder,
    /// Children before their parent
    PostOrder,
}

/// The node tree. All paths handed to it are validated and chrooted already.
pub(crate) struct Tree {
    nodes: HashMap<NodeId, ZNode>,
    next_id: u64,
    zxid: i64,
    /// Watchers registered by `exists` on paths that had no node
    creation_watchers: HashMap<String, Vec<Watcher>>,
}

impl Default for Tree {
    fn default() -> Self {
        Self {
            nodes: HashMap::from([(ROOT_ID, ZNode::root())]),
            next_id: 1,
            zxid: 0,
            creation_watchers: HashMap::new(),
        }
    }
}

impl Tree {
    fn node(&self, id: NodeId) -> &ZNode {
        &self.nodes[&id]
    }

    fn node_mut(&mut self, id: NodeId) -> &mut ZNode {
        self.nodes
            .get_mut(&id)
            .expect("ids reachable from the root are live")
    }

    fn next_zxid(&mut self) -> i64 {
        self.zxid += 1;
        self.zxid
    }

    /// Number of nodes, root included
    pub(crate) fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Finds the node at `path`.
    fn resolve(&self, path: &str) -> Result<NodeId> {
        let mut cur = ROOT_ID;
        for name in path::segments(path) {
            cur = self
                .node(cur)
                .children
                .as_ref()
                .and_then(|children| children.names.get(name))
                .copied()
                .ok_or_else(|| ZkError::no_node(path))?;
        }
        Ok(cur)
    }

    /// Finds the would-be parent of `path` and the final name.
    fn resolve_parent<'a>(&self, path: &'a str) -> Result<(NodeId, &'a str)> {
        let names: Vec<&str> = path::segments(path).collect();
        let Some((leaf, ancestors)) = names.split_last() else {
            // The root always exists.
            return Err(ZkError::node_exists(path));
        };
        let mut cur = ROOT_ID;
        for name in ancestors {
            let children = self
                .node(cur)
                .children
                .as_ref()
                .ok_or_else(|| ZkError::no_children_for_ephemerals(path))?;
            cur = *children
                .names
                .get(*name)
                .ok_or_else(|| ZkError::no_node(path))?;
        }
        if self.node(cur).children.is_none() {
            return Err(ZkError::no_children_for_ephemerals(path));
        }
        Ok((cur, leaf))
    }

    /// Rebuilds the absolute path of a node from its parent links.
    pub(crate) fn path_of(&self, id: NodeId) -> String {
        let mut names = Vec::new();
        let mut cur = id;
        while let Some(parent) = self.node(cur).parent {
            names.push(self.node(cur).name.as_str());
            cur = parent;
        }
        if names.is_empty() {
            return "/".to_string();
        }
        names.reverse();
        format!("/{}", names.join("/"))
    }

    pub(crate) fn create(
        &mut self,
        path: &str,
        data: Option<Vec<u8>>,
        acl: Vec<Acl>,
        mode: CreateMode,
        owner: SessionId,
        fired: &mut Vec<Notification>,
    ) -> Result<String> {
        let (parent_id, base) = self.resolve_parent(path)?;
        let Some(children) = self.node_mut(parent_id).children.as_mut() else {
            return Err(ZkError::no_children_for_ephemerals(path));
        };
        let name = if mode.is_sequential() {
            let name = path::zero_pad(base, children.sequence, path::SEQUENCE_WIDTH);
            // The suffix is spent even if the name turns out to be taken.
            children.sequence += 1;
            name
        } else {
            base.to_string()
        };
        let exists = children.names.contains_key(&name);
        let parent_path = path::dirname(path).unwrap_or("/");
        let created = path::join(parent_path, &name);
        if exists {
            return Err(ZkError::node_exists(created));
        }

        let zxid = self.next_zxid();
        let id = NodeId::new(self.next_id);
        self.next_id += 1;
        _ = self.nodes.insert(
            id,
            ZNode::new(name.clone(), data, acl, mode, Some(parent_id), Some(owner), zxid),
        );

        let parent = self.node_mut(parent_id);
        if let Some(children) = parent.children.as_mut() {
            _ = children.names.insert(name, id);
        }
        parent.cversion += 1;
        parent.pzxid = zxid;

        if let Some(mut watchers) = self.creation_watchers.remove(&created) {
            trigger(&mut watchers, EventType::NodeCreated, &created, fired);
        }
        let parent = self.node_mut(parent_id);
        trigger(
            &mut parent.child_watchers,
            EventType::NodeChildrenChanged,
            parent_path,
            fired,
        );
        Ok(created)
    }

    pub(crate) fn set_data(
        &mut self,
        path: &str,
        data: Option<Vec<u8>>,
        version: Option<i32>,
        fired: &mut Vec<Notification>,
    ) -> Result<Stat> {
        let id = self.resolve(path)?;
        check_version(self.node(id), path, version)?;
        let zxid = self.next_zxid();
        let node = self.node_mut(id);
        node.data = data;
        node.version += 1;
        node.mzxid = zxid;
        trigger(&mut node.data_watchers, EventType::NodeDataChanged, path, fired);
        Ok(node.stat())
    }

    pub(crate) fn get_data(
        &mut self,
        path: &str,
        watcher: Option<Watcher>,
    ) -> Result<(Option<Vec<u8>>, Stat)> {
        let id = self.resolve(path)?;
        let node = self.node_mut(id);
        node.data_watchers.extend(watcher);
        Ok((node.data.clone(), node.stat()))
    }

    pub(crate) fn get_children(
        &mut self,
        path: &str,
        watcher: Option<Watcher>,
    ) -> Result<(Vec<String>, Stat)> {
        let id = self.resolve(path)?;
        let node = self.node_mut(id);
        node.child_watchers.extend(watcher);
        let names = node
            .children
            .as_ref()
            .map(|children| children.names.keys().cloned().collect())
            .unwrap_or_default();
        Ok((names, node.stat()))
    }

    pub(crate) fn get_acl(&self, path: &str) -> Result<(Vec<Acl>, Stat)> {
        let node = self.node(self.resolve(path)?);
        Ok((node.acl.clone(), node.stat()))
    }

    /// Like `get_data` without the payload; absence is not an error.
    pub(crate) fn exists(&mut self, path: &str, watcher: Option<Watcher>) -> Option<Stat> {
        match self.resolve(path) {
            Ok(id) => {
                let node = self.node_mut(id);
                node.data_watchers.extend(watcher);
                Some(node.stat())
            }
            Err(_) => {
                if let Some(watcher) = watcher {
                    self.creation_watchers
                        .entry(path.to_string())
                        .or_default()
                        .push(watcher);
                }
                None
            }
        }
    }

    pub(crate) fn remove(
        &mut self,
        path: &str,
        version: Option<i32>,
        fired: &mut Vec<Notification>,
    ) -> Result<()> {
        let id = self.resolve(path)?;
        let node = self.node(id);
        check_version(node, path, version)?;
        if node.has_children() {
            return Err(ZkError::not_empty(path));
        }
        self.remove_leaf(id, path, fired);
        Ok(())
    }

    /// Unlinks a childless, non-root node and raises its events.
    fn remove_leaf(&mut self, id: NodeId, path: &str, fired: &mut Vec<Notification>) {
        // The root has no parent and is never removed.
        let Some(parent_id) = self.node(id).parent else {
            return;
        };
        let Some(mut node) = self.nodes.remove(&id) else {
            return;
        };
        trigger(&mut node.data_watchers, EventType::NodeDeleted, path, fired);
        trigger(&mut node.child_watchers, EventType::NodeDeleted, path, fired);

        let zxid = self.next_zxid();
        let parent = self.node_mut(parent_id);
        if let Some(children) = parent.children.as_mut() {
            _ = children.names.remove(&node.name);
        }
        parent.cversion += 1;
        parent.pzxid = zxid;
        let parent_path = path::dirname(path).unwrap_or("/");
        trigger(
            &mut parent.child_watchers,
            EventType::NodeChildrenChanged,
            parent_path,
            fired,
        );
    }

    /// Deletes `path` and its whole subtree, deepest nodes first.
    ///
    /// Each node raises its own deleted and children-changed events. Returns
    /// the paths removed. The root is left in place.
    pub(crate) fn remove_recursive(
        &mut self,
        path: &str,
        fired: &mut Vec<Notification>,
    ) -> Result<Vec<String>> {
        let start = self.resolve(path)?;
        let doomed: Vec<(NodeId, String)> = self
            .walk_from(start, TraversalOrder::PostOrder)
            .into_iter()
            .filter(|id| !id.is_root())
            .map(|id| (id, self.path_of(id)))
            .collect();

        for (id, path) in &doomed {
            self.remove_leaf(*id, path, fired);
        }
        Ok(doomed.into_iter().map(|(_, path)| path).collect())
    }

    /// Creates every missing ancestor as a persistent node, then the leaf.
    ///
    /// `NodeExists` is not an error for any segment, the leaf included: an
    /// existing leaf is left untouched and its path returned.
    pub(crate) fn mkdirp(
        &mut self,
        path: &str,
        data: Option<Vec<u8>>,
        acl: Vec<Acl>,
        mode: CreateMode,
        owner: SessionId,
        fired: &mut Vec<Notification>,
    ) -> Result<String> {
        let names: Vec<&str> = path::segments(path).collect();
        let Some((_, ancestors)) = names.split_last() else {
            return Ok("/".to_string());
        };

        let mut current = String::new();
        for name in ancestors {
            current.push('/');
            current.push_str(name);
            match self.create(&current, None, acl.clone(), CreateMode::Persistent, owner, fired) {
                Ok(_) => {}
                Err(err) if err.code() == ErrorCode::NodeExists => {}
                Err(err) => return Err(err),
            }
        }

        match self.create(path, data, acl, mode, owner, fired) {
            Err(err) if err.code() == ErrorCode::NodeExists && !mode.is_sequential() => {
                Ok(path.to_string())
            }
            other => other,
        }
    }

    /// Deletes every ephemeral node owned by `owner`, wherever it lives.
    ///
    /// Returns the paths removed, deepest first.
    pub(crate) fn remove_ephemerals(
        &mut self,
        owner: SessionId,
        fired: &mut Vec<Notification>,
    ) -> Vec<String> {
        let owned: Vec<(NodeId, String)> = self
            .walk(TraversalOrder::PostOrder)
            .into_iter()
            .filter(|id| {
                let node = self.node(*id);
                node.mode.is_ephemeral() && node.owner == Some(owner)
            })
            .map(|id| (id, self.path_of(id)))
            .collect();

        for (id, path) in &owned {
            self.remove_leaf(*id, path, fired);
        }
        owned.into_iter().map(|(_, path)| path).collect()
    }

    /// Lists every node id without recursion.
    pub(crate) fn walk(&self, order: TraversalOrder) -> Vec<NodeId> {
        self.walk_from(ROOT_ID, order)
    }

    /// Lists `start` and everything below it without recursion.
    fn walk_from(&self, start: NodeId, order: TraversalOrder) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![(start, false)];
        while let Some((id, expanded)) = stack.pop() {
            if expanded {
                out.push(id);
                continue;
            }
            match order {
                TraversalOrder::PreOrder => out.push(id),
                TraversalOrder::PostOrder => stack.push((id, true)),
            }
            if let Some(children) = &self.node(id).children {
                stack.extend(children.names.values().rev().map(|child| (*child, false)));
            }
        }
        out
    }

    /// Paths of every node, in the given order
    pub(crate) fn paths(&self, order: TraversalOrder) -> Vec<String> {
        self.walk(order)
            .into_iter()
            .map(|id| self.path_of(id))
            .collect()
    }

    /// Renders the tree with box-drawing characters, for debugging.
    pub(crate) fn dump(&self) -> String {
        let mut built: HashMap<NodeId, TreeNode> = HashMap::new();
        for id in self.walk(TraversalOrder::PostOrder) {
            let node = self.node(id);
            let mut tree_node = TreeNode::new(label(id, node));
            if let Some(children) = &node.children {
                for child in children.names.values() {
                    if let Some(child) = built.remove(child) {
                        tree_node.add_child(child);
                    }
                }
            }
            _ = built.insert(id, tree_node);
        }
        built
            .remove(&ROOT_ID)
            .map(|root| format_tree(&root))
            .unwrap_or_default()
    }
}

fn check_version(node: &ZNode, path: &str, version: Option<i32>) -> Result<()> {
    match version {
        Some(expected) if expected != -1 && expected != node.version => {
            Err(ZkError::bad_version(path))
        }
        _ => Ok(()),
    }
}

fn label(id: NodeId, node: &ZNode) -> String {
    if id.is_root() {
        return "/".to_string();
    }
    let size = node.data.as_ref().map_or(0, Vec::len);
    match node.owner {
        Some(owner) => format!("{} ({:?}, {size}B, owner {owner})", node.name, node.mode),
        None => format!("{} ({:?}, {size}B)", node.name, node.mode),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const OWNER: SessionId = SessionId::new(1);

    fn create(tree: &mut Tree, path: &str, mode: CreateMode) -> Result<String> {
        tree.create(path, None, Acl::open_unsafe(), mode, OWNER, &mut Vec::new())
    }

    #[test]
    fn test_create_requires_parent() {
        let mut tree = Tree::default();
        assert_eq!(
            create(&mut tree, "/a/b", CreateMode::Persistent),
            Err(ZkError::no_node("/a/b"))
        );
        assert_eq!(tree.len(), 1);
    }

    #[test]
    fn test_create_root_exists() {
        let mut tree = Tree::default();
        assert_eq!(
            create(&mut tree, "/", CreateMode::Persistent),
            Err(ZkError::node_exists("/"))
        );
    }

    #[test]
    fn test_sequence_survives_collision() {
        let mut tree = Tree::default();
        create(&mut tree, "/q", CreateMode::Persistent).unwrap();
        create(&mut tree, "/q/n0000000000", CreateMode::Persistent).unwrap();

        let err = create(&mut tree, "/q/n", CreateMode::PersistentSequential).unwrap_err();
        assert_eq!(err, ZkError::node_exists("/q/n0000000000"));
        assert_eq!(
            create(&mut tree, "/q/n", CreateMode::PersistentSequential),
            Ok("/q/n0000000001".to_string())
        );
    }

    #[test]
    fn test_path_of() {
        let mut tree = Tree::default();
        tree.mkdirp(
            "/foo/bar/qux",
            None,
            Acl::open_unsafe(),
            CreateMode::Persistent,
            OWNER,
            &mut Vec::new(),
        )
        .unwrap();
        let id = tree.resolve("/foo/bar/qux").unwrap();
        assert_eq!(tree.path_of(id), "/foo/bar/qux");
        let parent = tree.node(id).parent.unwrap();
        assert_eq!(tree.path_of(parent), "/foo/bar");
        assert_eq!(tree.path_of(ROOT_ID), "/");
    }

    #[test]
    fn test_walk_orders() {
        let mut tree = Tree::default();
        for path in ["/a", "/a/x", "/a/y", "/b"] {
            create(&mut tree, path, CreateMode::Persistent).unwrap();
        }
        assert_eq!(
            tree.paths(TraversalOrder::PreOrder),
            vec!["/", "/a", "/a/x", "/a/y", "/b"]
        );
        assert_eq!(
            tree.paths(TraversalOrder::PostOrder),
            vec!["/a/x", "/a/y", "/a", "/b", "/"]
        );
    }

    #[test]
    fn test_walk_deep_tree() {
        let mut tree = Tree::default();
        let mut path = String::new();
        for _ in 0..5000 {
            path.push_str("/d");
            create(&mut tree, &path, CreateMode::Persistent).unwrap();
        }
        assert_eq!(tree.walk(TraversalOrder::PostOrder).len(), 5001);
    }

    #[test]
    fn test_versions() {
        let mut tree = Tree::default();
        create(&mut tree, "/v", CreateMode::Persistent).unwrap();
        let mut fired = Vec::new();

        let stat = tree.set_data("/v", Some(b"1".to_vec()), Some(0), &mut fired).unwrap();
        assert_eq!(stat.version, 1);
        assert_eq!(
            tree.set_data("/v", Some(b"2".to_vec()), Some(0), &mut fired),
            Err(ZkError::bad_version("/v"))
        );
        assert_eq!(
            tree.remove("/v", Some(7), &mut fired),
            Err(ZkError::bad_version("/v"))
        );
        tree.remove("/v", Some(-1), &mut fired).unwrap();
        assert_eq!(tree.exists("/v", None), None);
    }

    #[test]
    fn test_remove_ephemerals_only_for_owner() {
        let mut tree = Tree::default();
        let other = SessionId::new(2);
        let mut fired = Vec::new();
        create(&mut tree, "/a", CreateMode::Persistent).unwrap();
        create(&mut tree, "/a/mine", CreateMode::Ephemeral).unwrap();
        create(&mut tree, "/mine", CreateMode::EphemeralSequential).unwrap();
        tree.create("/a/theirs", None, Acl::open_unsafe(), CreateMode::Ephemeral, other, &mut fired)
            .unwrap();

        let removed = tree.remove_ephemerals(OWNER, &mut fired);
        assert_eq!(removed, vec!["/a/mine", "/mine0000000000"]);
        assert_eq!(tree.paths(TraversalOrder::PreOrder), vec!["/", "/a", "/a/theirs"]);
    }

    #[test]
    fn test_remove_recursive() {
        let mut tree = Tree::default();
        for path in ["/a", "/a/x", "/a/x/deep", "/a/y", "/b"] {
            create(&mut tree, path, CreateMode::Persistent).unwrap();
        }
        create(&mut tree, "/a/e", CreateMode::Ephemeral).unwrap();

        let mut fired = Vec::new();
        let removed = tree.remove_recursive("/a", &mut fired).unwrap();
        assert_eq!(removed, vec!["/a/e", "/a/x/deep", "/a/x", "/a/y", "/a"]);
        assert_eq!(tree.paths(TraversalOrder::PreOrder), vec!["/", "/b"]);
        assert_eq!(tree.len(), 2);

        assert_eq!(
            tree.remove_recursive("/a", &mut fired),
            Err(ZkError::no_node("/a"))
        );
    }

    #[test]
    fn test_remove_recursive_keeps_root() {
        let mut tree = Tree::default();
        create(&mut tree, "/a", CreateMode::Persistent).unwrap();
        create(&mut tree, "/a/b", CreateMode::Persistent).unwrap();

        let removed = tree.remove_recursive("/", &mut Vec::new()).unwrap();
        assert_eq!(removed, vec!["/a/b", "/a"]);
        assert_eq!(tree.paths(TraversalOrder::PreOrder), vec!["/"]);

        // Sequence counters survive on the root.
        create(&mut tree, "/s", CreateMode::PersistentSequential).unwrap();
        assert_eq!(
            create(&mut tree, "/s", CreateMode::PersistentSequential),
            Ok("/s0000000001".to_string())
        );
    }

    #[test]
    fn test_dump() {
        let mut tree = Tree::default();
        create(&mut tree, "/a", CreateMode::Persistent).unwrap();
        create(&mut tree, "/a/b", CreateMode::Persistent).unwrap();
        create(&mut tree, "/c", CreateMode::Ephemeral).unwrap();

        let dump = tree.dump();
        assert_eq!(
            dump,
            "/\n\
             ├─┬ a (Persistent, 0B)\n\
             │ └── b (Persistent, 0B)\n\
             └── c (Ephemeral, 0B, owner 0x0000000000000001)\n"
        );
    }
}
