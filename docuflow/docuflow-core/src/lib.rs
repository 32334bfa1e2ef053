pub mod autosave;
pub mod error;
pub mod events;
pub mod gateway;
pub mod node;
pub mod projection;
pub mod storage;
pub mod workspace;

pub use autosave::{AutosaveConfig, AutosaveCoordinator, RetryPolicy, SaveStatus};
pub use error::{Error, Result};
pub use events::{Notice, NoticeBus};
pub use gateway::{LocalGateway, SyncGateway};
pub use node::{DeleteSummary, ListFilter, NewNode, Node, NodePatch};
pub use projection::{NodeEdit, TreeProjection};
pub use storage::{DocumentStore, IntegrityIssue};
pub use workspace::Workspace;
