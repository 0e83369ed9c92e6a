//! Locations of nodes inside an item's document tree.
//!
//! The item model is an owned tree without parent links, so diagnostics carry
//! a [`NodePath`] instead: the chain of element names (with sibling indexes)
//! from the item root down to the node. Walking "up" the tree is walking the
//! path's segments backwards.

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodePath(Vec<String>);

impl NodePath {
    pub fn root(name: impl Into<String>) -> Self {
        NodePath(vec![name.into()])
    }

    pub fn child(&self, name: impl Into<String>) -> Self {
        let mut segments = self.0.clone();
        segments.push(name.into());
        NodePath(segments)
    }

    /// Child segment rendered as `name[index]`.
    pub fn indexed(&self, name: &str, index: usize) -> Self {
        self.child(format!("{}[{}]", name, index))
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    pub fn leaf(&self) -> Option<&str> {
        self.0.last().map(String::as_str)
    }

    pub fn depth(&self) -> usize {
        self.0.len()
    }

    /// True when this node or any ancestor is named `element`, ignoring
    /// sibling indexes.
    pub fn is_within(&self, element: &str) -> bool {
        self.0
            .iter()
            .any(|segment| segment.split('[').next() == Some(element))
    }
}

impl fmt::Display for NodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("/");
        }
        f.write_str(&self.0.join("/"))
    }
}
