//! Output nodes.
//!
//! A `Node` is the unit of pipeline output: a row plus its named
//! relationships to other nodes. Leaf sources emit nodes with no
//! relationships; joins attach one relationship per hop.

use crate::row::Row;
use alloc::rc::Rc;
use alloc::vec::Vec;

/// A named relationship attached to a node.
#[derive(Clone, Debug, PartialEq)]
pub struct Relationship {
    name: Rc<str>,
    nodes: Vec<Node>,
    hidden: bool,
}

impl Relationship {
    /// Creates a relationship with the given child nodes.
    pub fn new(name: Rc<str>, nodes: Vec<Node>, hidden: bool) -> Self {
        Self { name, nodes, hidden }
    }

    /// Returns the relationship name.
    #[inline]
    pub fn name(&self) -> &Rc<str> {
        &self.name
    }

    /// Returns the child nodes, in the child input's ordering.
    #[inline]
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Returns whether this relationship is hidden from final output.
    #[inline]
    pub fn hidden(&self) -> bool {
        self.hidden
    }
}

/// A row plus its named relationships.
#[derive(Clone, Debug, PartialEq)]
pub struct Node {
    row: Rc<Row>,
    relationships: Vec<Relationship>,
}

impl Node {
    /// Creates a node with no relationships.
    pub fn leaf(row: Rc<Row>) -> Self {
        Self {
            row,
            relationships: Vec::new(),
        }
    }

    /// Returns the node's row.
    #[inline]
    pub fn row(&self) -> &Rc<Row> {
        &self.row
    }

    /// Returns the relationships, in attachment order.
    #[inline]
    pub fn relationships(&self) -> &[Relationship] {
        &self.relationships
    }

    /// Attaches a relationship. The name must not already be present; the
    /// pipeline builder rejects overlapping relationship names up front.
    pub fn attach(&mut self, relationship: Relationship) {
        debug_assert!(
            !self
                .relationships
                .iter()
                .any(|r| r.name == relationship.name),
            "relationship attached twice"
        );
        self.relationships.push(relationship);
    }

    /// Looks up a relationship by name.
    pub fn relationship(&self, name: &str) -> Option<&Relationship> {
        self.relationships.iter().find(|r| &*r.name == name)
    }

    /// Recursively removes every hidden relationship.
    pub fn strip_hidden(&mut self) {
        self.relationships.retain(|r| !r.hidden);
        for rel in &mut self.relationships {
            for node in &mut rel.nodes {
                node.strip_hidden();
            }
        }
    }
}
