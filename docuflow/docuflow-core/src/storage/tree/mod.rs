//! File-backed storage for the node tree.
//! Every node is one JSON record in the data directory; all records are
//! loaded at startup and kept in memory.

use crate::error::{Error, Result};
use crate::node::{normalize_title, DeleteSummary, ListFilter, NewNode, Node, NodePatch};
use chrono::Utc;
use std::{
    collections::{HashMap, HashSet, VecDeque},
    fmt,
    io::ErrorKind,
    path::{Path, PathBuf},
};
use tracing::{debug, info, warn};
use uuid::Uuid;

const RECORD_EXT: &str = "json";

/// A malformed parent link found by [`DocumentStore::check_integrity`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IntegrityIssue {
    DanglingParent { id: Uuid, parent_id: Uuid },
    ParentNotFolder { id: Uuid, parent_id: Uuid },
    Cycle { id: Uuid },
}

impl fmt::Display for IntegrityIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IntegrityIssue::DanglingParent { id, parent_id } => {
                write!(f, "node {} points at missing parent {}", id, parent_id)
            }
            IntegrityIssue::ParentNotFolder { id, parent_id } => {
                write!(f, "node {} is nested under document {}", id, parent_id)
            }
            IntegrityIssue::Cycle { id } => write!(f, "node {} is its own ancestor", id),
        }
    }
}

/// Owner of the node set and the only place tree invariants are enforced.
pub struct DocumentStore {
    docs: HashMap<Uuid, Node>,
    dir: PathBuf,
}

impl DocumentStore {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        // load existing
        let mut docs = HashMap::new();
        for entry in std::fs::read_dir(&dir)? {
            let entry = entry?;
            let path = entry.path();
            if !entry.file_type()?.is_file()
                || path.extension().and_then(|e| e.to_str()) != Some(RECORD_EXT)
            {
                continue;
            }
            match Self::load_record(&path) {
                Ok(node) => {
                    docs.insert(node.id, node);
                }
                Err(e) => warn!(path = %path.display(), error = %e, "skipping node record"),
            }
        }
        debug!(dir = %dir.display(), count = docs.len(), "opened document store");
        Ok(Self { docs, dir })
    }

    fn load_record(path: &Path) -> Result<Node> {
        let bytes = std::fs::read(path)?;
        let node: Node = serde_json::from_slice(&bytes)?;
        let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or_default();
        if stem != node.id.to_string() {
            return Err(Error::consistency(format!(
                "record {} holds node {}",
                stem, node.id
            )));
        }
        Ok(node)
    }

    pub fn data_dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, id: Uuid) -> PathBuf {
        self.dir.join(format!("{}.{}", id, RECORD_EXT))
    }

    fn save(&self, node: &Node) -> Result<()> {
        let data = serde_json::to_vec_pretty(node)?;
        std::fs::write(self.path(node.id), data)?;
        Ok(())
    }

    fn remove_record(&self, id: Uuid) -> std::io::Result<()> {
        match std::fs::remove_file(self.path(id)) {
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            other => other,
        }
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    fn fresh_id(&self) -> Uuid {
        loop {
            let id = Uuid::new_v4();
            if !self.docs.contains_key(&id) {
                return id;
            }
        }
    }

    fn require_folder(&self, parent: Uuid) -> Result<()> {
        match self.docs.get(&parent) {
            None => Err(Error::validation(format!("parent {} does not exist", parent))),
            Some(p) if !p.is_folder => Err(Error::validation(format!(
                "parent {} is a document, not a folder",
                parent
            ))),
            Some(_) => Ok(()),
        }
    }

    pub fn create(&mut self, new: NewNode) -> Result<Node> {
        if let Some(parent) = new.parent_id {
            self.require_folder(parent)?;
        }
        let now = Utc::now();
        let node = Node {
            id: self.fresh_id(),
            title: new.title(),
            is_folder: new.is_folder(),
            content: None,
            parent_id: new.parent_id,
            is_archived: false,
            created_at: now,
            updated_at: now,
        };
        self.save(&node)?;
        debug!(id = %node.id, folder = node.is_folder, "created node");
        self.docs.insert(node.id, node.clone());
        Ok(node)
    }

    pub fn get(&self, id: Uuid) -> Result<&Node> {
        self.docs.get(&id).ok_or(Error::NotFound(id))
    }

    /// Nodes matching `filter`, ordered by creation time.
    pub fn list(&self, filter: ListFilter) -> Vec<Node> {
        let mut nodes: Vec<Node> = self
            .docs
            .values()
            .filter(|n| filter.matches(n))
            .cloned()
            .collect();
        nodes.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        nodes
    }

    pub fn update(&mut self, id: Uuid, patch: NodePatch) -> Result<Node> {
        let mut node = self.get(id)?.clone();
        if node.is_folder && patch.content.is_some() {
            return Err(Error::validation("folders do not carry content"));
        }
        if let Some(title) = patch.title.as_deref() {
            node.title = normalize_title(Some(title));
        }
        if let Some(content) = patch.content {
            node.content = Some(content);
        }
        node.updated_at = Utc::now();
        self.save(&node)?;
        debug!(id = %id, "updated node");
        self.docs.insert(id, node.clone());
        Ok(node)
    }

    /// Reparent `id`; `None` moves it to the root level.
    pub fn move_node(&mut self, id: Uuid, new_parent: Option<Uuid>) -> Result<Node> {
        let mut node = self.get(id)?.clone();
        // perform invariant checks before mutating anything
        if let Some(parent) = new_parent {
            self.require_folder(parent)?;
            if self.descendant_ids(id)?.contains(&parent) {
                return Err(Error::validation(
                    "cannot move a node into its own subtree",
                ));
            }
        }
        if node.parent_id == new_parent {
            return Ok(node);
        }
        node.parent_id = new_parent;
        node.updated_at = Utc::now();
        self.save(&node)?;
        debug!(id = %id, parent = ?new_parent, "moved node");
        self.docs.insert(id, node.clone());
        Ok(node)
    }

    fn children_index(&self) -> HashMap<Uuid, Vec<Uuid>> {
        let mut index: HashMap<Uuid, Vec<Uuid>> = HashMap::new();
        for node in self.docs.values() {
            if let Some(pid) = node.parent_id {
                index.entry(pid).or_default().push(node.id);
            }
        }
        index
    }

    /// `id` followed by its whole subtree in breadth-first order, so every
    /// node appears after its parent.
    pub fn descendant_ids(&self, id: Uuid) -> Result<Vec<Uuid>> {
        if !self.docs.contains_key(&id) {
            return Err(Error::NotFound(id));
        }
        let children = self.children_index();
        let mut order = vec![id];
        let mut seen = HashSet::from([id]);
        let mut queue = VecDeque::from([id]);
        while let Some(current) = queue.pop_front() {
            for &child in children.get(&current).into_iter().flatten() {
                // every other node has a single parent, so only the start
                // node can be reached twice
                if child == id {
                    return Err(Error::consistency(format!(
                        "node {} is its own ancestor",
                        id
                    )));
                }
                if seen.insert(child) {
                    order.push(child);
                    queue.push_back(child);
                }
            }
        }
        Ok(order)
    }

    /// Delete `id` and its whole subtree.
    pub fn delete(&mut self, id: Uuid) -> Result<DeleteSummary> {
        let ids = self.descendant_ids(id)?;
        let mut deleted = Vec::with_capacity(ids.len());
        // deepest first: a node goes only after all of its descendants
        for (pos, &target) in ids.iter().enumerate().rev() {
            if let Err(e) = self.remove_record(target) {
                warn!(root = %id, node = %target, error = %e, "cascade delete interrupted");
                return Err(Error::PartialFailure {
                    deleted,
                    remaining: ids[..=pos].to_vec(),
                });
            }
            self.docs.remove(&target);
            deleted.push(target);
        }
        info!(root = %id, count = deleted.len(), "deleted subtree");
        Ok(DeleteSummary {
            deleted_count: deleted.len(),
        })
    }

    /// Scan every parent link for dangling references, documents used as
    /// folders and cycles.
    pub fn check_integrity(&self) -> Vec<IntegrityIssue> {
        let mut issues = Vec::new();
        for node in self.list(ListFilter::All) {
            let Some(pid) = node.parent_id else { continue };
            match self.docs.get(&pid) {
                None => issues.push(IntegrityIssue::DanglingParent {
                    id: node.id,
                    parent_id: pid,
                }),
                Some(parent) if !parent.is_folder => issues.push(IntegrityIssue::ParentNotFolder {
                    id: node.id,
                    parent_id: pid,
                }),
                Some(_) => {}
            }
            let mut current = Some(pid);
            let mut steps = 0;
            while let Some(ancestor) = current {
                if ancestor == node.id {
                    issues.push(IntegrityIssue::Cycle { id: node.id });
                    break;
                }
                steps += 1;
                if steps > self.docs.len() {
                    break;
                }
                current = self.docs.get(&ancestor).and_then(|d| d.parent_id);
            }
        }
        issues
    }
}
