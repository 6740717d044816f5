//! Owned, mutable HTML tree.
//!
//! Parsed once from the site's root markup, walked by the link rewriter,
//! mutated in place, and rendered back into the root record's content.

mod parse;
mod render;

/// Markup parse failures.
#[derive(Debug, thiserror::Error)]
pub enum HtmlError {
    #[error("failed to parse markup: {0}")]
    Parse(String),

    #[error("markup contains no elements")]
    NoElements,
}

/// Index of a node inside its [`Document`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

/// Element name and attributes in source order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    /// Lower-cased tag name.
    pub name: String,
    /// `(name, value)` pairs; `None` is a boolean attribute.
    pub attrs: Vec<(String, Option<String>)>,
}

impl Element {
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .and_then(|(_, value)| value.as_deref())
    }

    fn set_attr(&mut self, name: &str, value: String) {
        match self
            .attrs
            .iter_mut()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
        {
            Some((_, slot)) => *slot = Some(value),
            None => self.attrs.push((name.to_owned(), Some(value))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeData {
    Element(Element),
    /// Source text, entities left as written.
    Text(String),
    /// Full comment including delimiters.
    Comment(String),
}

#[derive(Debug, Clone)]
struct Node {
    data: NodeData,
    children: Vec<NodeId>,
}

/// Arena-backed document.
#[derive(Debug, Clone, Default)]
pub struct Document {
    doctype: Option<String>,
    nodes: Vec<Node>,
    roots: Vec<NodeId>,
}

impl Document {
    fn push(&mut self, data: NodeData) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            data,
            children: Vec::new(),
        });
        id
    }

    pub fn data(&self, id: NodeId) -> &NodeData {
        &self.nodes[id.0].data
    }

    pub fn element(&self, id: NodeId) -> Option<&Element> {
        match self.data(id) {
            NodeData::Element(element) => Some(element),
            _ => None,
        }
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.0].children
    }

    /// Every node in document order (pre-order, depth first).
    pub fn descendants(&self) -> Vec<NodeId> {
        let mut out = Vec::with_capacity(self.nodes.len());
        let mut stack: Vec<NodeId> = self.roots.iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            out.push(id);
            stack.extend(self.children(id).iter().rev().copied());
        }
        out
    }

    /// Elements in document order.
    pub fn elements(&self) -> Vec<NodeId> {
        self.descendants()
            .into_iter()
            .filter(|&id| self.element(id).is_some())
            .collect()
    }

    pub fn attr(&self, id: NodeId, name: &str) -> Option<&str> {
        self.element(id).and_then(|e| e.attr(name))
    }

    /// Overwrite (or add) an attribute. No-op on non-element nodes.
    pub fn set_attr(&mut self, id: NodeId, name: &str, value: impl Into<String>) {
        if let NodeData::Element(element) = &mut self.nodes[id.0].data {
            element.set_attr(name, value.into());
        }
    }
}
