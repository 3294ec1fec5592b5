//! Node decoration hooks.
//!
//! A [`NodeDecorator`] is called twice for every node the tree builder
//! creates: [`on_enter`](NodeDecorator::on_enter) before the node's children
//! are built and [`on_exit`](NodeDecorator::on_exit) after. Each hook may
//! return a [`Decoration`], stored under its key in the node's `extra` map.
//! When both hooks return the same key, the `on_exit` value replaces the
//! `on_enter` one, so a decorator can finalize a value once the subtree is
//! known.

use serde_json::Value;
use uuid::Uuid;

use crate::builder::StructureNode;

/// A keyed value attached to a node.
#[derive(Debug, Clone, PartialEq)]
pub struct Decoration {
    /// Field name in the node's JSON object.
    pub key: String,
    /// Field value.
    pub value: Value,
}

impl Decoration {
    /// Create a decoration.
    pub fn new(key: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Per-node hook pair invoked by the tree builder.
pub trait NodeDecorator {
    /// Called with the fresh node, before its children are built.
    fn on_enter(&mut self, _node: &StructureNode) -> Option<Decoration> {
        None
    }

    /// Called with the finished node, after its children are built.
    fn on_exit(&mut self, _node: &StructureNode) -> Option<Decoration> {
        None
    }
}

/// Attaches a random `uuid` to every occurrence.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidDecorator;

impl NodeDecorator for UuidDecorator {
    fn on_enter(&mut self, _node: &StructureNode) -> Option<Decoration> {
        Some(Decoration::new("uuid", Uuid::new_v4().to_string()))
    }
}

/// Attaches `descendants`, the number of nodes below each node.
#[derive(Debug, Clone, Copy, Default)]
pub struct DescendantCountDecorator;

impl NodeDecorator for DescendantCountDecorator {
    fn on_exit(&mut self, node: &StructureNode) -> Option<Decoration> {
        Some(Decoration::new("descendants", node.descendant_count() as u64))
    }
}
