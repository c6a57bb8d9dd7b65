//! Operator contracts.
//!
//! Every stage in a pipeline (a source connection, a join, a window, a
//! filter) implements `Operator`: it can be pulled from (`fetch`,
//! `cleanup`) and torn down (`destroy`), and it pushes derived changes into
//! exactly one downstream `Output`. Downstream stages own `Rc` handles to
//! their upstream inputs; the upstream's pointer back down is a `Weak` set
//! through `set_output`, so the graph has no ownership cycles.

use crate::change::Change;
use crate::constraint::FetchRequest;
use crate::error::Result;
use crate::schema::Schema;
use crate::sort::{ResolvedSort, SortSpec};
use crate::stream::NodeStream;
use alloc::rc::{Rc, Weak};
use core::cell::RefCell;

/// Static facts about what an operator produces: the row schema and the
/// normalized ordering its output streams follow.
#[derive(Clone, Debug)]
pub struct FlowInfo {
    schema: Rc<Schema>,
    spec: SortSpec,
    sort: Rc<ResolvedSort>,
}

impl FlowInfo {
    /// Builds flow info from a schema and a caller-requested ordering.
    /// The ordering is normalized against the schema's primary key.
    pub fn new(schema: Rc<Schema>, requested: &SortSpec) -> Result<Self> {
        let spec = requested.normalized(&schema);
        let sort = Rc::new(spec.resolve(&schema)?);
        Ok(Self { schema, spec, sort })
    }

    /// Returns the produced row schema.
    #[inline]
    pub fn schema(&self) -> &Rc<Schema> {
        &self.schema
    }

    /// Returns the normalized ordering, by column name.
    #[inline]
    pub fn spec(&self) -> &SortSpec {
        &self.spec
    }

    /// Returns the normalized ordering, resolved to positions.
    #[inline]
    pub fn sort(&self) -> &Rc<ResolvedSort> {
        &self.sort
    }
}

/// The pull half of the operator contract.
pub trait Operator {
    /// Returns what this operator produces.
    fn info(&self) -> &FlowInfo;

    /// Produces the matching nodes in this operator's ordering.
    fn fetch(&self, req: FetchRequest) -> Result<NodeStream>;

    /// Like `fetch`, but releases any scratch state tied to the request as
    /// a side effect. Used when a parent disappears above a join.
    fn cleanup(&self, req: FetchRequest) -> Result<NodeStream>;

    /// Sets the downstream output. An operator has exactly one.
    fn set_output(&self, output: Weak<dyn Output>);

    /// Releases subscriptions, recursively upstream.
    fn destroy(&self);
}

/// The push half of the operator contract.
pub trait Output {
    /// Accepts one derived change. Errors abort the whole cascade.
    fn push(&self, change: Change) -> Result<()>;
}

/// The single downstream slot every operator owns.
///
/// Pushing through an empty or dead slot is not an error: a view that was
/// destroyed mid-teardown simply stops receiving, matching how stale weak
/// handles are pruned at the source.
#[derive(Default)]
pub struct OutputSlot {
    slot: RefCell<Option<Weak<dyn Output>>>,
}

impl OutputSlot {
    /// Creates an unset slot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the downstream output.
    pub fn set(&self, output: Weak<dyn Output>) {
        *self.slot.borrow_mut() = Some(output);
    }

    /// Clears the slot.
    pub fn clear(&self) {
        *self.slot.borrow_mut() = None;
    }

    /// Pushes a change downstream if a live output is attached.
    pub fn push(&self, change: Change) -> Result<()> {
        let target = self.slot.borrow().as_ref().and_then(Weak::upgrade);
        match target {
            Some(output) => output.push(change),
            None => {
                log::warn!("change dropped: no downstream output attached");
                Ok(())
            }
        }
    }
}
