//! HTML serialization of a (possibly decorated) section tree

use super::{DocumentTree, NodeId, NodeKind};

/// Configuration for decoration markup
#[derive(Debug, Clone)]
pub struct HighlightConfig {
    /// Element name used for decorations
    pub element: String,
    /// CSS class prefix for highlights
    pub class_prefix: String,
    /// Data attribute carrying the highlight id
    pub id_attribute: String,
}

impl Default for HighlightConfig {
    fn default() -> Self {
        Self {
            element: "mark".to_string(),
            class_prefix: "ll-highlight".to_string(),
            id_attribute: "data-highlight-id".to_string(),
        }
    }
}

/// Render the subtree under `node` as HTML
pub fn render_html(tree: &DocumentTree, node: NodeId, config: &HighlightConfig) -> String {
    let mut out = String::new();
    write_node(tree, node, config, &mut out);
    out
}

fn write_node(tree: &DocumentTree, node: NodeId, config: &HighlightConfig, out: &mut String) {
    let Some(n) = tree.get(node) else {
        return;
    };

    match n.kind() {
        NodeKind::Text(text) => out.push_str(&html_escape::encode_text(text)),
        NodeKind::Element { tag, attrs } => {
            out.push('<');
            out.push_str(tag);
            for (name, value) in attrs {
                out.push_str(&format!(
                    " {}=\"{}\"",
                    name,
                    html_escape::encode_double_quoted_attribute(value)
                ));
            }
            out.push('>');
            write_children(tree, node, config, out);
            out.push_str(&format!("</{}>", tag));
        }
        NodeKind::Decoration(tag) => {
            out.push_str(&format!(
                "<{} class=\"{} {}-{}\" {}=\"{}\">",
                config.element,
                config.class_prefix,
                config.class_prefix,
                tag.color.as_str(),
                config.id_attribute,
                html_escape::encode_double_quoted_attribute(&tag.highlight_id)
            ));
            write_children(tree, node, config, out);
            out.push_str(&format!("</{}>", config.element));
        }
    }
}

fn write_children(tree: &DocumentTree, node: NodeId, config: &HighlightConfig, out: &mut String) {
    for &child in tree.children(node) {
        write_node(tree, child, config, out);
    }
}
