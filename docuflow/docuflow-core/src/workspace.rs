//! Client-side session: the tree projection, one autosave coordinator per
//! edited document, and notices for create/delete outcomes.

use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::{broadcast, watch, RwLock};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::autosave::{AutosaveConfig, AutosaveCoordinator, SaveStatus};
use crate::error::Result;
use crate::events::{Notice, NoticeBus};
use crate::gateway::SyncGateway;
use crate::node::{DeleteSummary, ListFilter, NewNode, Node};
use crate::projection::{NodeEdit, TreeProjection};

pub struct Workspace {
    gateway: Arc<dyn SyncGateway>,
    config: AutosaveConfig,
    projection: Arc<RwLock<TreeProjection>>,
    sessions: Mutex<HashMap<Uuid, AutosaveCoordinator>>,
    active: Mutex<Option<Uuid>>,
    notices: NoticeBus,
}

impl Workspace {
    pub fn new(gateway: Arc<dyn SyncGateway>, config: AutosaveConfig) -> Self {
        Self {
            gateway,
            config,
            projection: Arc::new(RwLock::new(TreeProjection::new())),
            sessions: Mutex::new(HashMap::new()),
            active: Mutex::new(None),
            notices: NoticeBus::new(),
        }
    }

    pub fn projection(&self) -> Arc<RwLock<TreeProjection>> {
        self.projection.clone()
    }

    pub fn notices(&self) -> broadcast::Receiver<Notice> {
        self.notices.subscribe()
    }

    pub fn active(&self) -> Option<Uuid> {
        *self.active.lock()
    }

    fn coordinator(&self, id: Uuid) -> AutosaveCoordinator {
        self.sessions
            .lock()
            .entry(id)
            .or_insert_with(|| AutosaveCoordinator::new(id, self.gateway.clone(), self.config))
            .clone()
    }

    fn unsaved_ids(&self) -> HashSet<Uuid> {
        self.sessions
            .lock()
            .iter()
            .filter(|(_, c)| c.has_unsaved_changes())
            .map(|(id, _)| *id)
            .collect()
    }

    pub fn status(&self, id: Uuid) -> SaveStatus {
        self.sessions
            .lock()
            .get(&id)
            .map(|c| c.status())
            .unwrap_or(SaveStatus::Idle)
    }

    pub fn subscribe_status(&self, id: Uuid) -> watch::Receiver<SaveStatus> {
        self.coordinator(id).subscribe()
    }

    /// Reload the full node set, keeping local copies that still have
    /// unsaved edits.
    pub async fn refresh(&self) -> Result<()> {
        let nodes = self.gateway.list(ListFilter::All).await?;
        let mut projection = self.projection.write().await;
        // edits record under this lock, so the set is current once we hold it
        let keep = self.unsaved_ids();
        projection.reconcile(nodes, &keep);
        Ok(())
    }

    pub async fn create(&self, new: NewNode) -> Result<Node> {
        let title = new.title();
        match self.gateway.create(new).await {
            Ok(node) => {
                self.projection.write().await.upsert(node.clone());
                self.notices.send(Notice::Created { id: node.id });
                Ok(node)
            }
            Err(e) => {
                warn!(title = %title, error = %e, "create failed");
                self.notices.send(Notice::CreateFailed {
                    title,
                    reason: e.to_string(),
                });
                Err(e)
            }
        }
    }

    /// Remove the subtree locally right away, then ask the server to cascade.
    /// Pending edits in the subtree are dropped only once the server confirms;
    /// after a failure their coordinators keep running.
    pub async fn delete(&self, id: Uuid) -> Result<DeleteSummary> {
        let mut removed = self.projection.write().await.remove_subtree(id);
        if !removed.contains(&id) {
            removed.push(id);
        }
        let detached: Vec<AutosaveCoordinator> = {
            let mut sessions = self.sessions.lock();
            removed.iter().filter_map(|rid| sessions.remove(rid)).collect()
        };
        let was_active = {
            let mut active = self.active.lock();
            match *active {
                Some(a) if removed.contains(&a) => active.take(),
                _ => None,
            }
        };
        match self.gateway.delete(id).await {
            Ok(summary) => {
                for coordinator in &detached {
                    coordinator.cancel();
                }
                self.notices.send(Notice::Deleted {
                    id,
                    count: summary.deleted_count,
                });
                Ok(summary)
            }
            Err(e) => {
                warn!(id = %id, error = %e, "delete failed");
                {
                    let mut sessions = self.sessions.lock();
                    for coordinator in detached {
                        sessions.entry(coordinator.doc_id()).or_insert(coordinator);
                    }
                }
                if let Some(prev) = was_active {
                    self.active.lock().get_or_insert(prev);
                }
                self.notices.send(Notice::DeleteFailed {
                    id,
                    reason: e.to_string(),
                });
                Err(e)
            }
        }
    }

    /// Make `id` the active document. The previously active document's
    /// timer is cancelled and its pending edit written immediately.
    pub async fn open(&self, id: Uuid) -> Result<Node> {
        let node = self.gateway.get(id).await?;
        let previous = self.active.lock().replace(id);
        if let Some(prev) = previous.filter(|p| *p != id) {
            let coordinator = self.sessions.lock().get(&prev).cloned();
            if let Some(coordinator) = coordinator {
                if let Err(e) = coordinator.flush().await {
                    warn!(id = %prev, error = %e, "flush on switch failed");
                }
            }
        }
        let unsaved = self.unsaved_ids().contains(&id);
        let mut projection = self.projection.write().await;
        if unsaved {
            if let Some(local) = projection.get(id) {
                return Ok(local.clone());
            }
        }
        projection.upsert(node.clone());
        debug!(id = %id, "opened document");
        Ok(node)
    }

    pub async fn edit(&self, id: Uuid, edit: NodeEdit) -> Result<Node> {
        // projection lock held across record so snapshots queue in edit order
        let mut projection = self.projection.write().await;
        let snapshot = projection.apply_edit(id, edit)?;
        self.coordinator(id).record(snapshot.clone())?;
        Ok(snapshot)
    }

    pub async fn edit_title(&self, id: Uuid, title: impl Into<String>) -> Result<Node> {
        self.edit(id, NodeEdit::Title(title.into())).await
    }

    pub async fn edit_content(&self, id: Uuid, content: impl Into<String>) -> Result<Node> {
        self.edit(id, NodeEdit::Content(content.into())).await
    }

    /// Write every pending edit now.
    pub async fn flush_all(&self) -> Result<()> {
        let coordinators: Vec<AutosaveCoordinator> =
            self.sessions.lock().values().cloned().collect();
        let mut outcome = Ok(());
        for coordinator in coordinators {
            if let Err(e) = coordinator.flush().await {
                warn!(id = %coordinator.doc_id(), error = %e, "flush failed");
                outcome = Err(e);
            }
        }
        outcome
    }
}
