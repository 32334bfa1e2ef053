//! The node record shared by the store, the wire format and the client.
//! A node is either a folder or a document; `isFolder` never changes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

/// Title given to nodes created or renamed with an empty title.
pub const PLACEHOLDER_TITLE: &str = "Untitled";

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub title: String,
    pub is_folder: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default)]
    pub parent_id: Option<Uuid>,
    #[serde(default)]
    pub is_archived: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Node {
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }
}

/// Input of a create call. Every field is optional; see [`NewNode::title`].
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct NewNode {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub is_folder: Option<bool>,
    #[serde(default, deserialize_with = "blank_as_none")]
    pub parent_id: Option<Uuid>,
}

impl NewNode {
    pub fn document(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            is_folder: Some(false),
            parent_id: None,
        }
    }

    pub fn folder(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            is_folder: Some(true),
            parent_id: None,
        }
    }

    pub fn under(mut self, parent: Uuid) -> Self {
        self.parent_id = Some(parent);
        self
    }

    /// Title after applying the placeholder default.
    pub fn title(&self) -> String {
        normalize_title(self.title.as_deref())
    }

    pub fn is_folder(&self) -> bool {
        self.is_folder.unwrap_or(false)
    }
}

/// Partial update: `None` fields keep their stored value.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct NodePatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

impl NodePatch {
    pub fn title(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            content: None,
        }
    }

    pub fn content(content: impl Into<String>) -> Self {
        Self {
            title: None,
            content: Some(content.into()),
        }
    }

    /// Whole-record write used by autosave: the latest title and content.
    pub fn from_snapshot(node: &Node) -> Self {
        Self {
            title: Some(node.title.clone()),
            content: node.content.clone(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.content.is_none()
    }
}

/// Which nodes a list call returns.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ListFilter {
    #[default]
    All,
    Roots,
    Children(Uuid),
}

impl ListFilter {
    pub fn matches(&self, node: &Node) -> bool {
        match self {
            ListFilter::All => true,
            ListFilter::Roots => node.parent_id.is_none(),
            ListFilter::Children(parent) => node.parent_id == Some(*parent),
        }
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DeleteSummary {
    pub deleted_count: usize,
}

pub fn normalize_title(title: Option<&str>) -> String {
    match title {
        Some(t) if !t.trim().is_empty() => t.to_string(),
        _ => PLACEHOLDER_TITLE.to_string(),
    }
}

/// Parent id field that treats `null`, a missing value and `""` alike as "no parent".
pub fn blank_as_none<'de, D>(deserializer: D) -> std::result::Result<Option<Uuid>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) => Uuid::parse_str(s)
            .map(Some)
            .map_err(serde::de::Error::custom),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample(is_folder: bool) -> Node {
        let now = Utc::now();
        Node {
            id: Uuid::new_v4(),
            title: "Notes".to_string(),
            is_folder,
            content: if is_folder { None } else { Some("<p>hi</p>".to_string()) },
            parent_id: None,
            is_archived: false,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn json_shape_uses_wire_names() {
        let node = sample(false);
        let v = serde_json::to_value(&node).unwrap();
        assert_eq!(v["_id"], json!(node.id.to_string()));
        assert_eq!(v["isFolder"], json!(false));
        assert_eq!(v["content"], json!("<p>hi</p>"));
        assert_eq!(v["parentId"], json!(null));
        assert_eq!(v["isArchived"], json!(false));
        assert!(v.get("createdAt").is_some());
        assert!(v.get("updatedAt").is_some());
    }

    #[test]
    fn folder_json_omits_content() {
        let v = serde_json::to_value(sample(true)).unwrap();
        assert!(v.get("content").is_none());
    }

    #[test]
    fn new_node_defaults() {
        let req: NewNode = serde_json::from_value(json!({})).unwrap();
        assert_eq!(req.title(), PLACEHOLDER_TITLE);
        assert!(!req.is_folder());
        assert_eq!(req.parent_id, None);

        let req: NewNode = serde_json::from_value(json!({"title": "   ", "parentId": ""})).unwrap();
        assert_eq!(req.title(), PLACEHOLDER_TITLE);
        assert_eq!(req.parent_id, None);
    }

    #[test]
    fn new_node_rejects_garbage_parent() {
        let res: std::result::Result<NewNode, _> =
            serde_json::from_value(json!({"parentId": "not-an-id"}));
        assert!(res.is_err());
    }

    #[test]
    fn patch_treats_null_as_absent() {
        let patch: NodePatch = serde_json::from_value(json!({"title": null, "content": "x"})).unwrap();
        assert_eq!(patch, NodePatch::content("x"));
        assert!(NodePatch::default().is_empty());
    }

    #[test]
    fn list_filter_matching() {
        let root = sample(true);
        let mut child = sample(false);
        child.parent_id = Some(root.id);
        assert!(ListFilter::Roots.matches(&root));
        assert!(!ListFilter::Roots.matches(&child));
        assert!(ListFilter::Children(root.id).matches(&child));
        assert!(ListFilter::All.matches(&child));
    }
}
