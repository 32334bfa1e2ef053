//! HTTP side of the sync gateway: talks to a docuflow server over reqwest and
//! maps its statuses onto the shared error taxonomy.

use async_trait::async_trait;
use docuflow_core::{
    AutosaveConfig, DeleteSummary, Error, ListFilter, NewNode, Node, NodePatch, Result,
    SyncGateway, Workspace,
};
use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:3001/api";

#[derive(Clone, Debug)]
pub struct ClientConfig {
    pub base_url: String,
    pub autosave: AutosaveConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            autosave: AutosaveConfig::default(),
        }
    }
}

/// Build a workspace that syncs with the server at `config.base_url`.
pub fn connect(config: ClientConfig) -> Workspace {
    let gateway = Arc::new(HttpGateway::new(config.base_url));
    Workspace::new(gateway, config.autosave)
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

pub struct HttpGateway {
    client: reqwest::Client,
    base_url: String,
}

impl HttpGateway {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { client, base_url }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn documents(&self) -> String {
        format!("{}/documents", self.base_url)
    }

    fn document(&self, id: Uuid) -> String {
        format!("{}/documents/{}", self.base_url, id)
    }

    /// Decode a 2xx body, or turn the status into an [`Error`]. `subject`
    /// names the node a 404 refers to.
    async fn decode<T: DeserializeOwned>(resp: Response, subject: Option<Uuid>) -> Result<T> {
        let status = resp.status();
        if status.is_success() {
            return resp
                .json::<T>()
                .await
                .map_err(|e| Error::transport(format!("undecodable response: {}", e)));
        }
        let message = match resp.json::<ErrorBody>().await {
            Ok(body) => body.message,
            Err(_) => status.to_string(),
        };
        debug!(%status, %message, "server rejected request");
        match (status, subject) {
            (StatusCode::NOT_FOUND, Some(id)) => Err(Error::NotFound(id)),
            (StatusCode::BAD_REQUEST, _) => Err(Error::Validation(message)),
            (StatusCode::CONFLICT, _) => Err(Error::Consistency(message)),
            _ => Err(Error::transport(format!("{}: {}", status, message))),
        }
    }
}

fn transport_error(e: reqwest::Error) -> Error {
    Error::transport(e.to_string())
}

#[async_trait]
impl SyncGateway for HttpGateway {
    async fn create(&self, new: NewNode) -> Result<Node> {
        let resp = self
            .client
            .post(self.documents())
            .json(&new)
            .send()
            .await
            .map_err(transport_error)?;
        Self::decode(resp, None).await
    }

    async fn get(&self, id: Uuid) -> Result<Node> {
        let resp = self
            .client
            .get(self.document(id))
            .send()
            .await
            .map_err(transport_error)?;
        Self::decode(resp, Some(id)).await
    }

    async fn list(&self, filter: ListFilter) -> Result<Vec<Node>> {
        let req = self.client.get(self.documents());
        let req = match filter {
            ListFilter::All => req,
            ListFilter::Roots => req.query(&[("root", "true")]),
            ListFilter::Children(parent) => req.query(&[("parentId", parent.to_string())]),
        };
        let resp = req.send().await.map_err(transport_error)?;
        Self::decode(resp, None).await
    }

    async fn update(&self, id: Uuid, patch: NodePatch) -> Result<Node> {
        let resp = self
            .client
            .put(self.document(id))
            .json(&patch)
            .send()
            .await
            .map_err(transport_error)?;
        Self::decode(resp, Some(id)).await
    }

    async fn delete(&self, id: Uuid) -> Result<DeleteSummary> {
        let resp = self
            .client
            .delete(self.document(id))
            .send()
            .await
            .map_err(transport_error)?;
        Self::decode(resp, Some(id)).await
    }
}
