//! The boundary the client side talks through. `LocalGateway` serves calls
//! from an in-process store; the HTTP implementation lives in the client crate.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::Result;
use crate::node::{DeleteSummary, ListFilter, NewNode, Node, NodePatch};
use crate::storage::DocumentStore;

#[async_trait]
pub trait SyncGateway: Send + Sync {
    async fn create(&self, new: NewNode) -> Result<Node>;
    async fn get(&self, id: Uuid) -> Result<Node>;
    async fn list(&self, filter: ListFilter) -> Result<Vec<Node>>;
    async fn update(&self, id: Uuid, patch: NodePatch) -> Result<Node>;
    async fn delete(&self, id: Uuid) -> Result<DeleteSummary>;
}

pub struct LocalGateway {
    store: Arc<RwLock<DocumentStore>>,
}

impl LocalGateway {
    pub fn new(store: Arc<RwLock<DocumentStore>>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl SyncGateway for LocalGateway {
    async fn create(&self, new: NewNode) -> Result<Node> {
        self.store.write().await.create(new)
    }

    async fn get(&self, id: Uuid) -> Result<Node> {
        self.store.read().await.get(id).cloned()
    }

    async fn list(&self, filter: ListFilter) -> Result<Vec<Node>> {
        Ok(self.store.read().await.list(filter))
    }

    async fn update(&self, id: Uuid, patch: NodePatch) -> Result<Node> {
        self.store.write().await.update(id, patch)
    }

    async fn delete(&self, id: Uuid) -> Result<DeleteSummary> {
        self.store.write().await.delete(id)
    }
}
