// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! Box-drawing rendering of a node tree, used by `Store::dump`.
//!
//! ```text
//! /
//! ├─┬ election
//! │ └── n_0000000000 (EphemeralSequential, 0B, owner 0x0000000000000001)
//! └── config (Persistent, 12B)
//! ```

use std::fmt;

/// A labelled node of the rendered tree.
#[derive(Debug, Clone)]
pub struct TreeNode {
    pub label: String,
    pub children: Vec<TreeNode>,
}

impl TreeNode {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            children: Vec::new(),
        }
    }

    pub fn with_child(mut self, child: TreeNode) -> Self {
        self.children.push(child);
        self
    }

    pub fn add_child(&mut self, child: TreeNode) {
        self.children.push(child);
    }
}

/// Format a tree, one node per line.
///
/// Rendering uses an explicit stack so very deep trees don't recurse.
pub fn format_tree(root: &TreeNode) -> String {
    let mut output = String::new();
    output.push_str(&root.label);
    output.push('\n');

    // (node, prefix for its line, is last sibling)
    let mut stack: Vec<(&TreeNode, String, bool)> = Vec::new();
    push_children(&mut stack, &root.children, "");

    while let Some((node, prefix, is_last)) = stack.pop() {
        let connector = match (is_last, node.children.is_empty()) {
            (true, true) => "└──",
            (false, true) => "├──",
            (true, false) => "└─┬",
            (false, false) => "├─┬",
        };
        let continuation = if is_last { ' ' } else { '│' };

        for (idx, line) in node.label.lines().enumerate() {
            output.push_str(&prefix);
            if idx == 0 {
                output.push_str(connector);
            } else {
                output.push(continuation);
                output.push_str("  ");
            }
            output.push(' ');
            output.push_str(line);
            output.push('\n');
        }

        let child_prefix = format!("{prefix}{continuation} ");
        push_children(&mut stack, &node.children, &child_prefix);
    }
    output
}

fn push_children<'a>(stack: &mut Vec<(&'a TreeNode, String, bool)>, children: &'a [TreeNode], prefix: &str) {
    let last = children.len().saturating_sub(1);
    for (idx, child) in children.iter().enumerate().rev() {
        stack.push((child, prefix.to_string(), idx == last));
    }
}

impl fmt::Display for TreeNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&format_tree(self))
    }
}
