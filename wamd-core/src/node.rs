// SPDX-License-Identifier: MIT OR Apache-2.0

//! Attribute-tree representation of protocol stanzas.
//!
//! A [`Node`] is a tag, a string attribute map and either raw bytes or child
//! nodes as content. The dynamic attribute map only exists at the wire
//! boundary; everything above it goes through the typed accessors of
//! [`Attributes`], which turn a missing or malformed attribute into a
//! [`NodeError`] naming the tag and key.
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::jid::Jid;

/// Content of a node: leaf bytes or nested children.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NodeContent {
    Bytes(Vec<u8>),
    Children(Vec<Node>),
}

/// One element of the stanza tree.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Node {
    tag: String,
    attributes: Attributes,
    content: Option<NodeContent>,
}

impl Node {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            attributes: Attributes::default(),
            content: None,
        }
    }

    pub fn with_attributes<I, K, V>(tag: impl Into<String>, attributes: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: fmt::Display,
    {
        let mut node = Self::new(tag);
        for (key, value) in attributes {
            node.attributes.insert(key, value);
        }
        node
    }

    pub fn with_children(tag: impl Into<String>, children: Vec<Node>) -> Self {
        let mut node = Self::new(tag);
        node.content = Some(NodeContent::Children(children));
        node
    }

    pub fn with_bytes(tag: impl Into<String>, bytes: Vec<u8>) -> Self {
        let mut node = Self::new(tag);
        node.content = Some(NodeContent::Bytes(bytes));
        node
    }

    /// Adds or replaces an attribute, builder-style.
    pub fn attr(mut self, key: impl Into<String>, value: impl fmt::Display) -> Self {
        self.attributes.insert(key, value);
        self
    }

    pub fn push_child(&mut self, child: Node) {
        match &mut self.content {
            Some(NodeContent::Children(children)) => children.push(child),
            _ => self.content = Some(NodeContent::Children(vec![child])),
        }
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    pub fn attributes_mut(&mut self) -> &mut Attributes {
        &mut self.attributes
    }

    pub fn children(&self) -> &[Node] {
        match &self.content {
            Some(NodeContent::Children(children)) => children,
            _ => &[],
        }
    }

    pub fn bytes(&self) -> Option<&[u8]> {
        match &self.content {
            Some(NodeContent::Bytes(bytes)) => Some(bytes),
            _ => None,
        }
    }

    /// Leaf bytes, as an error when absent.
    pub fn required_bytes(&self) -> Result<&[u8], NodeError> {
        self.bytes().ok_or_else(|| NodeError::MissingContent {
            tag: self.tag.clone(),
        })
    }

    /// First direct child with the given tag.
    pub fn find_child(&self, tag: &str) -> Option<&Node> {
        self.children().iter().find(|child| child.tag == tag)
    }

    pub fn required_child(&self, tag: &str) -> Result<&Node, NodeError> {
        self.find_child(tag).ok_or_else(|| NodeError::MissingChild {
            tag: self.tag.clone(),
            child: tag.to_string(),
        })
    }

    /// All direct children with the given tag.
    pub fn children_by_tag<'a>(&'a self, tag: &'a str) -> impl Iterator<Item = &'a Node> + 'a {
        self.children().iter().filter(move |child| child.tag == tag)
    }

    pub fn has_child(&self, tag: &str) -> bool {
        self.find_child(tag).is_some()
    }
}

/// String attribute map with typed accessors.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Attributes(BTreeMap<String, String>);

impl Attributes {
    pub fn insert(&mut self, key: impl Into<String>, value: impl fmt::Display) {
        self.0.insert(key.into(), value.to_string());
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn optional_string(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn string(&self, key: &str) -> Result<&str, NodeError> {
        self.optional_string(key)
            .ok_or_else(|| NodeError::MissingAttribute {
                key: key.to_string(),
            })
    }

    pub fn optional_u64(&self, key: &str) -> Result<Option<u64>, NodeError> {
        self.optional_string(key)
            .map(|value| {
                value.parse::<u64>().map_err(|_| NodeError::InvalidAttribute {
                    key: key.to_string(),
                    value: value.to_string(),
                })
            })
            .transpose()
    }

    pub fn u64(&self, key: &str) -> Result<u64, NodeError> {
        self.optional_u64(key)?
            .ok_or_else(|| NodeError::MissingAttribute {
                key: key.to_string(),
            })
    }

    pub fn optional_jid(&self, key: &str) -> Result<Option<Jid>, NodeError> {
        self.optional_string(key)
            .map(|value| {
                Jid::from_str(value).map_err(|_| NodeError::InvalidAttribute {
                    key: key.to_string(),
                    value: value.to_string(),
                })
            })
            .transpose()
    }

    pub fn jid(&self, key: &str) -> Result<Jid, NodeError> {
        self.optional_jid(key)?
            .ok_or_else(|| NodeError::MissingAttribute {
                key: key.to_string(),
            })
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

#[derive(Debug, Error)]
pub enum NodeError {
    #[error("missing required attribute \"{key}\"")]
    MissingAttribute { key: String },

    #[error("invalid value \"{value}\" for attribute \"{key}\"")]
    InvalidAttribute { key: String, value: String },

    #[error("node <{tag}> has no <{child}> child")]
    MissingChild { tag: String, child: String },

    #[error("node <{tag}> has no byte content")]
    MissingContent { tag: String },
}

#[cfg(test)]
mod tests {
    use crate::jid::Jid;

    use super::{Node, NodeError};

    #[test]
    fn builders_and_finders() {
        let enc = Node::with_bytes("enc", vec![1, 2, 3])
            .attr("v", 2)
            .attr("type", "msg");
        let to = Node::with_children("to", vec![enc]).attr("jid", "bob:2@s.whatsapp.net");
        let participants = Node::with_children("participants", vec![to]);
        let message = Node::with_children("message", vec![participants]).attr("id", "ABCD");

        let found = message
            .required_child("participants")
            .unwrap()
            .required_child("to")
            .unwrap();
        assert_eq!(
            found.attributes().jid("jid").unwrap(),
            "bob:2@s.whatsapp.net".parse::<Jid>().unwrap()
        );
        let enc = found.find_child("enc").unwrap();
        assert_eq!(enc.attributes().string("type").unwrap(), "msg");
        assert_eq!(enc.required_bytes().unwrap(), &[1, 2, 3]);
    }

    #[test]
    fn typed_accessor_errors() {
        let node = Node::new("message").attr("t", "not-a-number");
        assert!(matches!(
            node.attributes().u64("t"),
            Err(NodeError::InvalidAttribute { .. })
        ));
        assert!(matches!(
            node.attributes().string("id"),
            Err(NodeError::MissingAttribute { .. })
        ));
        assert_eq!(node.attributes().optional_string("missing"), None);
    }

    #[test]
    fn push_child_converts_leaf() {
        let mut node = Node::new("query");
        node.push_child(Node::new("devices").attr("version", 2));
        assert!(node.has_child("devices"));
        assert_eq!(node.children().len(), 1);
    }
}
