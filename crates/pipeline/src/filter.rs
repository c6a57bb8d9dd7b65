//! Filter operator.
//!
//! Forwards adds and removes whose row satisfies a comparison conjunction.
//! Edits follow transition semantics: satisfied on both sides they stay an
//! edit, entering the predicate they become an add, leaving it a remove,
//! and outside it on both sides they are dropped. Child envelopes pass
//! through when the parent row satisfies the predicate; relationship
//! contents are never re-filtered.
//!
//! When a source reports `applied_filters`, the builder skips this
//! operator; it exists for predicates that could not be pushed down.

use alloc::rc::{Rc, Weak};
use tributary_core::{
    Change, FetchRequest, Filters, FlowInfo, Node, NodeStream, Operator, Output, OutputSlot,
    Result,
};

/// A stateless selection operator.
pub struct Filter {
    input: Rc<dyn Operator>,
    filters: Filters,
    info: FlowInfo,
    output: OutputSlot,
}

impl Filter {
    /// Creates a filter over `input` and wires itself as its output.
    pub fn link(input: Rc<dyn Operator>, filters: Filters) -> Rc<Filter> {
        let filter = Rc::new(Filter {
            info: input.info().clone(),
            input,
            filters,
            output: OutputSlot::new(),
        });
        let weak: Weak<Filter> = Rc::downgrade(&filter);
        filter.input.set_output(weak);
        filter
    }

    fn accepts(&self, node: &Node) -> bool {
        self.filters.matches(node.row())
    }
}

impl Operator for Filter {
    fn info(&self) -> &FlowInfo {
        &self.info
    }

    fn fetch(&self, req: FetchRequest) -> Result<NodeStream> {
        let filters = self.filters.clone();
        Ok(self
            .input
            .fetch(req)?
            .filtered(move |node| filters.matches(node.row())))
    }

    fn cleanup(&self, req: FetchRequest) -> Result<NodeStream> {
        let filters = self.filters.clone();
        Ok(self
            .input
            .cleanup(req)?
            .filtered(move |node| filters.matches(node.row())))
    }

    fn set_output(&self, output: Weak<dyn Output>) {
        self.output.set(output);
    }

    fn destroy(&self) {
        self.output.clear();
        self.input.destroy();
    }
}

impl Output for Filter {
    fn push(&self, change: Change) -> Result<()> {
        let derived = match change {
            Change::Add(node) => self.accepts(&node).then_some(Change::Add(node)),
            Change::Remove(node) => self.accepts(&node).then_some(Change::Remove(node)),
            Change::Edit { old, new } => {
                match (self.filters.matches(&old), self.filters.matches(&new)) {
                    (true, true) => Some(Change::Edit { old, new }),
                    (false, true) => Some(Change::Add(Node::leaf(new))),
                    (true, false) => Some(Change::Remove(Node::leaf(old))),
                    (false, false) => None,
                }
            }
            Change::Child {
                row,
                relationship,
                change,
            } => self.filters.matches(&row).then_some(Change::Child {
                row,
                relationship,
                change,
            }),
        };
        match derived {
            Some(change) => self.output.push(change),
            None => Ok(()),
        }
    }
}
