//! Structured section content
//!
//! Minimal JSON content format used to mount a section tree outside of a
//! full renderer (CLI, fixtures, benchmarks).
//!
//! ```json
//! { "id": "chapter-1",
//!   "root": { "tag": "section", "children": [
//!       { "tag": "p", "children": ["Plain text ", { "tag": "em", "children": ["emphasis"] }] }
//!   ] } }
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{DocumentTree, NodeId, TreeError};

/// A node of structured content
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ContentNode {
    /// Text leaf
    Text(String),
    /// Element with optional attributes and children
    Element {
        tag: String,
        #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
        attrs: BTreeMap<String, String>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        children: Vec<ContentNode>,
    },
}

/// A section with its identifier and content root
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectionContent {
    pub id: String,
    pub root: ContentNode,
}

impl DocumentTree {
    /// Build a tree from structured content. The root must be an element.
    pub fn from_content(root: &ContentNode) -> Result<Self, TreeError> {
        let ContentNode::Element {
            tag,
            attrs,
            children,
        } = root
        else {
            return Err(TreeError::InvalidRoot);
        };

        let attrs = attrs
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        let mut tree = DocumentTree::with_root_attrs(tag, attrs);
        let root_id = tree.root();
        for child in children {
            tree.append_content(root_id, child)?;
        }
        Ok(tree)
    }

    fn append_content(&mut self, parent: NodeId, node: &ContentNode) -> Result<(), TreeError> {
        match node {
            ContentNode::Text(text) => {
                self.append_text(parent, text)?;
            }
            ContentNode::Element {
                tag,
                attrs,
                children,
            } => {
                let attrs = attrs
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect();
                let id = self.append_element_with_attrs(parent, tag, attrs)?;
                for child in children {
                    self.append_content(id, child)?;
                }
            }
        }
        Ok(())
    }
}

/// Parse section content JSON and mount it as a tree
pub fn load_section(json: &str) -> crate::Result<(String, DocumentTree)> {
    let content: SectionContent = serde_json::from_str(json)?;
    let tree = DocumentTree::from_content(&content.root)?;
    Ok((content.id, tree))
}
