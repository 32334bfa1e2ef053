//! Client-side mirror of the node set. Edits land here first so views update
//! before the server confirms; a full refresh reconciles it.

use std::collections::{HashSet, VecDeque};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::node::{normalize_title, Node};

/// A local edit to one field of a node.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NodeEdit {
    Title(String),
    Content(String),
}

#[derive(Clone, Debug, Default)]
pub struct TreeProjection {
    nodes: Vec<Node>,
}

impl TreeProjection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_nodes(nodes: Vec<Node>) -> Self {
        Self { nodes }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn get(&self, id: Uuid) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn replace_all(&mut self, nodes: Vec<Node>) {
        self.nodes = nodes;
    }

    /// Append a server node, or replace the local copy with the same id.
    pub fn upsert(&mut self, node: Node) {
        match self.nodes.iter_mut().find(|n| n.id == node.id) {
            Some(existing) => *existing = node,
            None => self.nodes.push(node),
        }
    }

    /// Replace the local set with `server`, except that nodes listed in
    /// `keep` (unsaved local edits) keep their local copy while the server
    /// still has them.
    pub fn reconcile(&mut self, server: Vec<Node>, keep: &HashSet<Uuid>) {
        let merged: Vec<Node> = server
            .into_iter()
            .map(|remote| {
                if keep.contains(&remote.id) {
                    self.get(remote.id).cloned().unwrap_or(remote)
                } else {
                    remote
                }
            })
            .collect();
        self.nodes = merged;
    }

    /// Drop `id` and every locally known descendant, returning the removed ids.
    pub fn remove_subtree(&mut self, id: Uuid) -> Vec<Uuid> {
        if self.get(id).is_none() {
            return Vec::new();
        }
        let mut removed = HashSet::from([id]);
        let mut queue = VecDeque::from([id]);
        while let Some(current) = queue.pop_front() {
            for node in &self.nodes {
                if node.parent_id == Some(current) && removed.insert(node.id) {
                    queue.push_back(node.id);
                }
            }
        }
        let mut order = Vec::with_capacity(removed.len());
        self.nodes.retain(|n| {
            if removed.contains(&n.id) {
                order.push(n.id);
                false
            } else {
                true
            }
        });
        order
    }

    /// Apply a keystroke-level edit and return the full snapshot to save.
    pub fn apply_edit(&mut self, id: Uuid, edit: NodeEdit) -> Result<Node> {
        let node = self
            .nodes
            .iter_mut()
            .find(|n| n.id == id)
            .ok_or(Error::NotFound(id))?;
        match edit {
            NodeEdit::Title(title) => node.title = normalize_title(Some(&title)),
            NodeEdit::Content(content) => {
                if node.is_folder {
                    return Err(Error::validation("folders do not carry content"));
                }
                node.content = Some(content);
            }
        }
        Ok(node.clone())
    }

    pub fn folders(&self) -> Vec<&Node> {
        self.nodes.iter().filter(|n| n.is_folder).collect()
    }

    pub fn root_documents(&self) -> Vec<&Node> {
        self.nodes
            .iter()
            .filter(|n| !n.is_folder && n.parent_id.is_none())
            .collect()
    }

    pub fn children(&self, folder: Uuid) -> Vec<&Node> {
        self.nodes
            .iter()
            .filter(|n| n.parent_id == Some(folder))
            .collect()
    }

    /// Case-insensitive title match over the flat node set.
    pub fn search(&self, query: &str) -> Vec<&Node> {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return Vec::new();
        }
        self.nodes
            .iter()
            .filter(|n| n.title.to_lowercase().contains(&needle))
            .collect()
    }
}
