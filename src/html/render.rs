//! Serialization of the tree back to markup.

use std::fmt::Write;

use super::{Document, NodeData, NodeId};
use crate::utils::html::{escape_attr, is_void_element};

impl Document {
    /// Render the whole document.
    pub fn render(&self) -> String {
        let mut out = String::with_capacity(self.nodes.len() * 32);
        if let Some(doctype) = &self.doctype {
            out.push_str(doctype);
        }
        for &root in &self.roots {
            self.render_node(root, &mut out);
        }
        out
    }

    fn render_node(&self, id: NodeId, out: &mut String) {
        match self.data(id) {
            NodeData::Text(text) | NodeData::Comment(text) => out.push_str(text),
            NodeData::Element(element) => {
                out.push('<');
                out.push_str(&element.name);
                for (key, value) in &element.attrs {
                    match value {
                        Some(value) => {
                            let _ = write!(out, " {key}=\"{}\"", escape_attr(value));
                        }
                        None => {
                            out.push(' ');
                            out.push_str(key);
                        }
                    }
                }
                out.push('>');

                if is_void_element(&element.name) {
                    return;
                }
                // Raw text (script/style) children are Text nodes and pass through unescaped.
                for &child in self.children(id) {
                    self.render_node(child, out);
                }
                let _ = write!(out, "</{}>", element.name);
            }
        }
    }
}
