//! Relationship pruning.
//!
//! A hidden join attaches its relationship for upstream consumers but the
//! final output must not carry it. `Prune` strips hidden-flagged
//! relationships from emitted nodes and drops child envelopes addressed to
//! a hidden relationship at any nesting depth. The builder appends one
//! prune stage whenever a pipeline declares a hidden join.

use alloc::rc::{Rc, Weak};
use alloc::string::String;
use hashbrown::HashSet;
use tributary_core::{
    Change, FetchRequest, FlowInfo, NodeStream, Operator, Output, OutputSlot, Result,
};

/// Strips hidden relationships from the change stream.
pub struct Prune {
    input: Rc<dyn Operator>,
    hidden: HashSet<String>,
    info: FlowInfo,
    output: OutputSlot,
}

impl Prune {
    /// Creates a prune stage over `input` for the given hidden
    /// relationship names.
    pub fn link(input: Rc<dyn Operator>, hidden: impl IntoIterator<Item = String>) -> Rc<Prune> {
        let prune = Rc::new(Prune {
            info: input.info().clone(),
            input,
            hidden: hidden.into_iter().collect(),
            output: OutputSlot::new(),
        });
        let weak: Weak<Prune> = Rc::downgrade(&prune);
        prune.input.set_output(weak);
        prune
    }

    /// Rewrites a change for final output, or drops it entirely.
    fn sanitize(&self, change: Change) -> Option<Change> {
        match change {
            Change::Add(mut node) => {
                node.strip_hidden();
                Some(Change::Add(node))
            }
            Change::Remove(mut node) => {
                node.strip_hidden();
                Some(Change::Remove(node))
            }
            edit @ Change::Edit { .. } => Some(edit),
            Change::Child {
                row,
                relationship,
                change,
            } => {
                if self.hidden.contains(&*relationship) {
                    return None;
                }
                let inner = self.sanitize(*change)?;
                Some(Change::child(row, relationship, inner))
            }
        }
    }
}

impl Operator for Prune {
    fn info(&self) -> &FlowInfo {
        &self.info
    }

    fn fetch(&self, req: FetchRequest) -> Result<NodeStream> {
        Ok(self.input.fetch(req)?.mapped(|mut node| {
            node.strip_hidden();
            node
        }))
    }

    fn cleanup(&self, req: FetchRequest) -> Result<NodeStream> {
        Ok(self.input.cleanup(req)?.mapped(|mut node| {
            node.strip_hidden();
            node
        }))
    }

    fn set_output(&self, output: Weak<dyn Output>) {
        self.output.set(output);
    }

    fn destroy(&self) {
        self.output.clear();
        self.input.destroy();
    }
}

impl Output for Prune {
    fn push(&self, change: Change) -> Result<()> {
        match self.sanitize(change) {
            Some(change) => self.output.push(change),
            None => Ok(()),
        }
    }
}
