use axum::{http::StatusCode, routing::get, Json, Router};
use docuflow_client::{connect, ClientConfig, HttpGateway};
use docuflow_core::{
    AutosaveConfig, DocumentStore, Error, ListFilter, NewNode, NodePatch, SaveStatus, SyncGateway,
};
use serde_json::json;
use std::future::IntoFuture;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::RwLock;
use uuid::Uuid;

async fn serve(app: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(axum::serve(listener, app).into_future());
    addr
}

async fn docuflow_server(dir: &std::path::Path) -> String {
    let store = Arc::new(RwLock::new(DocumentStore::new(dir).unwrap()));
    let addr = serve(docuflow::router(store)).await;
    format!("http://{}/api", addr)
}

#[tokio::test]
async fn gateway_round_trip() {
    let tempdir = tempfile::tempdir().unwrap();
    let gateway = HttpGateway::new(docuflow_server(tempdir.path()).await);

    let folder = gateway.create(NewNode::folder("Projects")).await.unwrap();
    assert!(folder.is_folder);
    let doc = gateway
        .create(NewNode::document("Notes").under(folder.id))
        .await
        .unwrap();
    assert_eq!(doc.parent_id, Some(folder.id));
    let untitled = gateway.create(NewNode::default()).await.unwrap();
    assert_eq!(untitled.title, "Untitled");

    let fetched = gateway.get(doc.id).await.unwrap();
    assert_eq!(fetched, doc);

    let roots = gateway.list(ListFilter::Roots).await.unwrap();
    assert_eq!(roots.len(), 2);
    let children = gateway.list(ListFilter::Children(folder.id)).await.unwrap();
    assert_eq!(children, vec![doc.clone()]);
    assert_eq!(gateway.list(ListFilter::All).await.unwrap().len(), 3);

    let updated = gateway
        .update(doc.id, NodePatch::content("<p>body</p>"))
        .await
        .unwrap();
    assert_eq!(updated.content.as_deref(), Some("<p>body</p>"));
    assert_eq!(updated.title, "Notes");

    let summary = gateway.delete(folder.id).await.unwrap();
    assert_eq!(summary.deleted_count, 2);
    assert!(matches!(gateway.get(doc.id).await, Err(Error::NotFound(id)) if id == doc.id));
}

#[tokio::test]
async fn server_errors_map_onto_the_taxonomy() {
    let tempdir = tempfile::tempdir().unwrap();
    let gateway = HttpGateway::new(docuflow_server(tempdir.path()).await);

    let missing = Uuid::new_v4();
    match gateway.create(NewNode::document("x").under(missing)).await {
        Err(Error::Validation(message)) => assert!(message.contains(&missing.to_string())),
        other => panic!("expected validation error, got {:?}", other),
    }
    assert!(matches!(
        gateway.update(missing, NodePatch::title("t")).await,
        Err(Error::NotFound(_))
    ));
    assert!(matches!(gateway.delete(missing).await, Err(Error::NotFound(_))));
}

#[tokio::test]
async fn conflicts_and_garbage_are_distinguished() {
    let app = Router::new()
        .route(
            "/api/documents/{id}",
            get(|| async { "definitely not json" }).delete(|| async {
                (
                    StatusCode::CONFLICT,
                    Json(json!({"message": "node is its own ancestor"})),
                )
            }),
        )
        .route(
            "/api/documents",
            get(|| async { (StatusCode::SERVICE_UNAVAILABLE, "down") }),
        );
    let addr = serve(app).await;
    let gateway = HttpGateway::new(format!("http://{}/api", addr));
    let id = Uuid::new_v4();

    assert!(matches!(gateway.get(id).await, Err(Error::Transport(_))));
    match gateway.delete(id).await {
        Err(Error::Consistency(message)) => assert_eq!(message, "node is its own ancestor"),
        other => panic!("expected consistency error, got {:?}", other),
    }
    assert!(matches!(
        gateway.list(ListFilter::All).await,
        Err(Error::Transport(_))
    ));
}

#[tokio::test]
async fn unreachable_server_is_a_transport_failure() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let gateway = HttpGateway::new(format!("http://{}/api", addr));
    assert!(matches!(
        gateway.list(ListFilter::All).await,
        Err(Error::Transport(_))
    ));
}

#[tokio::test]
async fn workspace_autosaves_over_http() {
    let tempdir = tempfile::tempdir().unwrap();
    let base_url = docuflow_server(tempdir.path()).await;
    let workspace = connect(ClientConfig {
        base_url: base_url.clone(),
        autosave: AutosaveConfig::with_delay(Duration::from_millis(100)),
    });
    let server = HttpGateway::new(base_url);

    let doc = workspace.create(NewNode::document("Draft")).await.unwrap();
    workspace.open(doc.id).await.unwrap();
    for text in ["<p>a</p>", "<p>ab</p>", "<p>abc</p>"] {
        workspace.edit_content(doc.id, text).await.unwrap();
    }
    assert_eq!(workspace.status(doc.id), SaveStatus::Saving);

    let mut status = workspace.subscribe_status(doc.id);
    tokio::time::timeout(Duration::from_secs(5), async {
        while *status.borrow_and_update() != SaveStatus::Saved {
            status.changed().await.unwrap();
        }
    })
    .await
    .unwrap();

    let saved = server.get(doc.id).await.unwrap();
    assert_eq!(saved.content.as_deref(), Some("<p>abc</p>"));
}
