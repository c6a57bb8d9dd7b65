//! Join operator.
//!
//! Composes parent rows with the matching child nodes under a named
//! relationship, maintained incrementally from both sides. The operator's
//! scratch is the primary-key-set: for every child join value, the set of
//! parent primary keys currently visible above the join. Parent removal
//! re-constrains the child input through `cleanup` and deletes its scratch
//! entry; child changes locate their parents through a constrained parent
//! fetch and are emitted wrapped in `child` envelopes, one per matching
//! parent, never coalesced.
//!
//! Joins chain: when the child input is itself a join, envelopes nest one
//! level per hop, producing the relationship tree downstream views expect.

use crate::scratch::KeySet;
use alloc::rc::{Rc, Weak};
use alloc::string::String;
use alloc::vec::Vec;
use core::cell::RefCell;
use tributary_core::{
    Change, Error, FetchRequest, FlowInfo, Node, NodeStream, Operator, Output, OutputSlot,
    Relationship, Result, Row, RowKey, Value,
};

/// Declaration of one join hop.
#[derive(Clone, Debug)]
pub struct JoinParams {
    /// Column of the parent input holding the join value.
    pub parent_key: String,
    /// Column of the child input holding the join value.
    pub child_key: String,
    /// Name of the relationship the child nodes appear under.
    pub relationship: String,
    /// Whether the relationship is stripped from final output.
    pub hidden: bool,
}

impl JoinParams {
    /// Creates a visible join declaration.
    pub fn new(
        parent_key: impl Into<String>,
        child_key: impl Into<String>,
        relationship: impl Into<String>,
    ) -> Self {
        Self {
            parent_key: parent_key.into(),
            child_key: child_key.into(),
            relationship: relationship.into(),
            hidden: false,
        }
    }

    /// Marks the relationship hidden.
    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }
}

/// The join operator.
pub struct Join {
    parent: Rc<dyn Operator>,
    child: Rc<dyn Operator>,
    parent_key: usize,
    child_key: usize,
    relationship: Rc<str>,
    hidden: bool,
    parent_pk: Vec<usize>,
    scratch: Rc<RefCell<KeySet>>,
    info: FlowInfo,
    output: OutputSlot,
    /// Keeps the upstream-facing ports alive; upstream holds them weakly.
    ports: RefCell<Vec<Rc<dyn Output>>>,
}

/// Receives pushes from the parent input.
struct ParentPort(Weak<Join>);

impl Output for ParentPort {
    fn push(&self, change: Change) -> Result<()> {
        match self.0.upgrade() {
            Some(join) => join.push_parent(change),
            None => Ok(()),
        }
    }
}

/// Receives pushes from the child input.
struct ChildPort(Weak<Join>);

impl Output for ChildPort {
    fn push(&self, change: Change) -> Result<()> {
        match self.0.upgrade() {
            Some(join) => join.push_child(change),
            None => Ok(()),
        }
    }
}

impl Join {
    /// Creates a join over two inputs and wires itself as the output of
    /// both.
    pub fn link(
        parent: Rc<dyn Operator>,
        child: Rc<dyn Operator>,
        params: JoinParams,
    ) -> Result<Rc<Join>> {
        let parent_key = parent.info().schema().require_column(&params.parent_key)?;
        let child_key = child.info().schema().require_column(&params.child_key)?;
        let parent_pk = parent.info().schema().primary_key().to_vec();
        let info = parent.info().clone();

        let join = Rc::new(Join {
            parent,
            child,
            parent_key,
            child_key,
            relationship: Rc::from(params.relationship.as_str()),
            hidden: params.hidden,
            parent_pk,
            scratch: Rc::new(RefCell::new(KeySet::new())),
            info,
            output: OutputSlot::new(),
            ports: RefCell::new(Vec::new()),
        });

        let parent_port: Rc<dyn Output> = Rc::new(ParentPort(Rc::downgrade(&join)));
        let child_port: Rc<dyn Output> = Rc::new(ChildPort(Rc::downgrade(&join)));
        join.parent.set_output(Rc::downgrade(&parent_port));
        join.child.set_output(Rc::downgrade(&child_port));
        join.ports.borrow_mut().push(parent_port);
        join.ports.borrow_mut().push(child_port);
        Ok(join)
    }

    /// Returns a sorted snapshot of the primary-key-set scratch.
    pub fn scratch_snapshot(&self) -> Vec<(Value, RowKey)> {
        self.scratch.borrow().snapshot()
    }

    /// Returns the relationship name.
    pub fn relationship(&self) -> &Rc<str> {
        &self.relationship
    }

    fn parent_join_value(&self, row: &Row) -> Value {
        row.get(self.parent_key).cloned().unwrap_or(Value::Null)
    }

    fn child_join_value(&self, row: &Row) -> Value {
        row.get(self.child_key).cloned().unwrap_or(Value::Null)
    }

    fn parent_row_key(&self, row: &Row) -> RowKey {
        RowKey::extract(row, &self.parent_pk)
    }

    /// The parents currently visible above this join that reference
    /// `value`, in the parent input's ordering.
    fn matching_parents(&self, value: &Value) -> Result<Vec<Node>> {
        self.parent
            .fetch(FetchRequest::eq(self.parent_key, value.clone()))?
            .drain()
    }

    /// Handles a change arriving from the parent side.
    fn push_parent(&self, change: Change) -> Result<()> {
        match change {
            Change::Add(mut node) => {
                let value = self.parent_join_value(node.row());
                let children = self
                    .child
                    .fetch(FetchRequest::eq(self.child_key, value.clone()))?
                    .drain()?;
                self.scratch
                    .borrow_mut()
                    .insert(value, self.parent_row_key(node.row()));
                node.attach(Relationship::new(
                    self.relationship.clone(),
                    children,
                    self.hidden,
                ));
                self.output.push(Change::Add(node))
            }
            Change::Remove(mut node) => {
                let value = self.parent_join_value(node.row());
                let children = self
                    .child
                    .cleanup(FetchRequest::eq(self.child_key, value.clone()))?
                    .drain()?;
                self.scratch
                    .borrow_mut()
                    .remove(&value, &self.parent_row_key(node.row()));
                node.attach(Relationship::new(
                    self.relationship.clone(),
                    children,
                    self.hidden,
                ));
                self.output.push(Change::Remove(node))
            }
            Change::Edit { old, new } => {
                let old_key = self.parent_row_key(&old);
                let new_key = self.parent_row_key(&new);
                if old_key != new_key {
                    return Err(Error::primary_key_mismatch(
                        self.info.schema().name(),
                        old_key,
                        new_key,
                    ));
                }
                if self.parent_join_value(&old) == self.parent_join_value(&new) {
                    self.output.push(Change::Edit { old, new })
                } else {
                    // The parent moved to a different join partition:
                    // rebuild its relationship from scratch.
                    self.push_parent(Change::Remove(Node::leaf(old)))?;
                    self.push_parent(Change::Add(Node::leaf(new)))
                }
            }
            // A relationship attached upstream changed; this join's key
            // columns are untouched, so the envelope passes through.
            envelope @ Change::Child { .. } => self.output.push(envelope),
        }
    }

    /// Handles a change arriving from the child side.
    fn push_child(&self, change: Change) -> Result<()> {
        match change {
            Change::Add(node) => {
                let value = self.child_join_value(node.row());
                for parent in self.matching_parents(&value)? {
                    self.output.push(Change::child(
                        parent.row().clone(),
                        self.relationship.clone(),
                        Change::Add(node.clone()),
                    ))?;
                }
                Ok(())
            }
            Change::Remove(node) => {
                let value = self.child_join_value(node.row());
                for parent in self.matching_parents(&value)? {
                    self.output.push(Change::child(
                        parent.row().clone(),
                        self.relationship.clone(),
                        Change::Remove(node.clone()),
                    ))?;
                }
                Ok(())
            }
            Change::Edit { old, new } => {
                let old_value = self.child_join_value(&old);
                let new_value = self.child_join_value(&new);
                if old_value == new_value {
                    for parent in self.matching_parents(&new_value)? {
                        self.output.push(Change::child(
                            parent.row().clone(),
                            self.relationship.clone(),
                            Change::Edit {
                                old: old.clone(),
                                new: new.clone(),
                            },
                        ))?;
                    }
                } else {
                    // The child rebound to different parents: it leaves the
                    // old partition before it enters the new one.
                    for parent in self.matching_parents(&old_value)? {
                        self.output.push(Change::child(
                            parent.row().clone(),
                            self.relationship.clone(),
                            Change::Remove(Node::leaf(old.clone())),
                        ))?;
                    }
                    for parent in self.matching_parents(&new_value)? {
                        self.output.push(Change::child(
                            parent.row().clone(),
                            self.relationship.clone(),
                            Change::Add(Node::leaf(new.clone())),
                        ))?;
                    }
                }
                Ok(())
            }
            Change::Child {
                row,
                relationship,
                change,
            } => {
                let value = self.child_join_value(&row);
                for parent in self.matching_parents(&value)? {
                    self.output.push(Change::child(
                        parent.row().clone(),
                        self.relationship.clone(),
                        Change::Child {
                            row: row.clone(),
                            relationship: relationship.clone(),
                            change: change.clone(),
                        },
                    ))?;
                }
                Ok(())
            }
        }
    }

    /// Pulls parents and composes each with its children. With `release`
    /// the pull goes through `cleanup` on both sides and scratch entries
    /// are deleted instead of recorded.
    fn compose(&self, req: FetchRequest, release: bool) -> Result<NodeStream> {
        let mut parents = if release {
            self.parent.cleanup(req)?
        } else {
            self.parent.fetch(req)?
        };
        let child = self.child.clone();
        let scratch = self.scratch.clone();
        let child_key = self.child_key;
        let parent_key = self.parent_key;
        let parent_pk = self.parent_pk.clone();
        let relationship = self.relationship.clone();
        let hidden = self.hidden;

        Ok(NodeStream::new(move || {
            let mut node = match parents.next() {
                Some(node) => node,
                None => return parents.take_error().map(Err),
            };
            let value = node
                .row()
                .get(parent_key)
                .cloned()
                .unwrap_or(Value::Null);
            let composed = (|| -> Result<Node> {
                let stream = if release {
                    child.cleanup(FetchRequest::eq(child_key, value.clone()))?
                } else {
                    child.fetch(FetchRequest::eq(child_key, value.clone()))?
                };
                let children = stream.drain()?;
                let parent_key_tuple = RowKey::extract(node.row(), &parent_pk);
                if release {
                    scratch.borrow_mut().remove(&value, &parent_key_tuple);
                } else {
                    scratch.borrow_mut().insert(value, parent_key_tuple);
                }
                node.attach(Relationship::new(relationship.clone(), children, hidden));
                Ok(node)
            })();
            Some(composed)
        }))
    }
}

impl Operator for Join {
    fn info(&self) -> &FlowInfo {
        &self.info
    }

    fn fetch(&self, req: FetchRequest) -> Result<NodeStream> {
        self.compose(req, false)
    }

    fn cleanup(&self, req: FetchRequest) -> Result<NodeStream> {
        self.compose(req, true)
    }

    fn set_output(&self, output: Weak<dyn Output>) {
        self.output.set(output);
    }

    fn destroy(&self) {
        self.output.clear();
        self.ports.borrow_mut().clear();
        self.parent.destroy();
        self.child.destroy();
    }
}
