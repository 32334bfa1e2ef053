use serde::Serialize;
use tokio::sync::broadcast;
use uuid::Uuid;

/// User-facing notices for operations whose failure must not go unnoticed.
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum Notice {
    Created { id: Uuid },
    Deleted { id: Uuid, count: usize },
    CreateFailed { title: String, reason: String },
    DeleteFailed { id: Uuid, reason: String },
}

#[derive(Clone)]
pub struct NoticeBus {
    tx: broadcast::Sender<Notice>,
}

impl Default for NoticeBus {
    fn default() -> Self {
        Self::new()
    }
}

impl NoticeBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(100);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notice> {
        self.tx.subscribe()
    }

    pub fn send(&self, notice: Notice) {
        let _ = self.tx.send(notice);
    }
}
