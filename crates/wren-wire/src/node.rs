use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::jid::Jid;

/// One labelled node of a protocol unit tree: a tag, string attributes, and
/// either binary content, child nodes, or nothing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub tag: String,
    pub attrs: BTreeMap<String, String>,
    pub content: NodeContent,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeContent {
    None,
    Bytes(Vec<u8>),
    Children(Vec<Node>),
}

impl Node {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            attrs: BTreeMap::new(),
            content: NodeContent::None,
        }
    }

    pub fn bytes(tag: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            tag: tag.into(),
            attrs: BTreeMap::new(),
            content: NodeContent::Bytes(data),
        }
    }

    pub fn with_children(tag: impl Into<String>, children: Vec<Node>) -> Self {
        Self {
            tag: tag.into(),
            attrs: BTreeMap::new(),
            content: NodeContent::Children(children),
        }
    }

    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attrs.insert(name.into(), value.into());
        self
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs.get(name).map(String::as_str)
    }

    pub fn jid_attr(&self, name: &str) -> Option<Jid> {
        self.attr(name).and_then(|raw| Jid::parse(raw).ok())
    }

    pub fn children(&self) -> &[Node] {
        match &self.content {
            NodeContent::Children(children) => children,
            _ => &[],
        }
    }

    pub fn children_by_tag<'a>(&'a self, tag: &'a str) -> impl Iterator<Item = &'a Node> + 'a {
        self.children().iter().filter(move |child| child.tag == tag)
    }

    pub fn child(&self, tag: &str) -> Option<&Node> {
        self.children().iter().find(|child| child.tag == tag)
    }

    pub fn content_bytes(&self) -> Option<&[u8]> {
        match &self.content {
            NodeContent::Bytes(data) => Some(data),
            _ => None,
        }
    }

    /// Appends a child, converting non-children content into a child list.
    pub fn push_child(&mut self, child: Node) {
        match &mut self.content {
            NodeContent::Children(children) => children.push(child),
            _ => self.content = NodeContent::Children(vec![child]),
        }
    }
}
