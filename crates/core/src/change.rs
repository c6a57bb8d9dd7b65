//! Change types.
//!
//! `SourceChange` is the primitive leaf-level delta accepted by a row
//! source. `Change` is the derived delta that flows between operators: it
//! adds the `Child` envelope, which nests a change inside a named
//! relationship of a parent row, and carries whole nodes so downstream
//! consumers see relationship subtrees without re-fetching.

use crate::node::Node;
use crate::row::Row;
use alloc::boxed::Box;
use alloc::rc::Rc;

/// A primitive change applied to a row source.
#[derive(Clone, Debug, PartialEq)]
pub enum SourceChange {
    /// Insert a new row.
    Add(Row),
    /// Remove an existing row. The row must deep-equal the stored one.
    Remove(Row),
    /// Replace a row in place. If the primary key differs between `old`
    /// and `new`, the source decomposes this into remove + add.
    Edit { old: Row, new: Row },
}

impl SourceChange {
    /// Creates an edit change.
    pub fn edit(old: Row, new: Row) -> Self {
        SourceChange::Edit { old, new }
    }

    /// Returns the inverse change: applying a change and then its inverse
    /// restores the source (and everything downstream) exactly.
    pub fn inverse(&self) -> SourceChange {
        match self {
            SourceChange::Add(row) => SourceChange::Remove(row.clone()),
            SourceChange::Remove(row) => SourceChange::Add(row.clone()),
            SourceChange::Edit { old, new } => SourceChange::Edit {
                old: new.clone(),
                new: old.clone(),
            },
        }
    }
}

/// A derived change propagated between operators.
#[derive(Clone, Debug, PartialEq)]
pub enum Change {
    /// A node appearing, with its full relationship subtree.
    Add(Node),
    /// A node disappearing, with its full relationship subtree.
    Remove(Node),
    /// An in-place value change; primary-key columns are unchanged.
    Edit { old: Rc<Row>, new: Rc<Row> },
    /// A change nested inside the named relationship of a parent row.
    Child {
        row: Rc<Row>,
        relationship: Rc<str>,
        change: Box<Change>,
    },
}

impl Change {
    /// Creates an edit change.
    pub fn edit(old: Rc<Row>, new: Rc<Row>) -> Self {
        Change::Edit { old, new }
    }

    /// Wraps a change in a child envelope under `relationship` of `row`.
    pub fn child(row: Rc<Row>, relationship: Rc<str>, change: Change) -> Self {
        Change::Child {
            row,
            relationship,
            change: Box::new(change),
        }
    }

    /// Returns the top-level row this change is about: the node's row for
    /// add/remove, the new row for edits, and the parent row for child
    /// envelopes.
    pub fn row(&self) -> &Rc<Row> {
        match self {
            Change::Add(node) | Change::Remove(node) => node.row(),
            Change::Edit { new, .. } => new,
            Change::Child { row, .. } => row,
        }
    }

    /// Returns true for `Add`.
    #[inline]
    pub fn is_add(&self) -> bool {
        matches!(self, Change::Add(_))
    }

    /// Returns true for `Remove`.
    #[inline]
    pub fn is_remove(&self) -> bool {
        matches!(self, Change::Remove(_))
    }

    /// A short tag for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Change::Add(_) => "add",
            Change::Remove(_) => "remove",
            Change::Edit { .. } => "edit",
            Change::Child { .. } => "child",
        }
    }
}
