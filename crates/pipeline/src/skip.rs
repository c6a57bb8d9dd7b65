//! Skip (offset) operator.
//!
//! Hides the first `n` rows of the upstream ordering. The scratch is the
//! boundary: the first visible node plus the count of hidden rows.
//! Changes at or past the boundary forward directly; changes before it
//! shift the boundary by one, which is recomputed with a single bounded
//! upstream scan.
//!
//! Like `Take`, skip windows parent rows and sits below joins.

use alloc::rc::{Rc, Weak};
use alloc::vec::Vec;
use core::cell::RefCell;
use core::cmp::Ordering;
use tributary_core::{
    Change, Error, FetchRequest, FlowInfo, Node, NodeStream, Operator, Output, OutputSlot,
    Result, Row, RowKey, Value,
};
use tributary_index::KeyComparator;

struct SkipState {
    /// Number of upstream rows before the boundary, at most `n`.
    hidden: usize,
    /// The first visible node, if the upstream has more than `n` rows.
    first: Option<Node>,
}

/// An offset over the upstream ordering.
pub struct Skip {
    input: Rc<dyn Operator>,
    n: usize,
    state: Rc<RefCell<SkipState>>,
    info: FlowInfo,
    comparator: KeyComparator,
    output: OutputSlot,
}

impl Skip {
    /// Creates a skip over `input` and wires itself as its output.
    pub fn link(input: Rc<dyn Operator>, n: usize) -> Rc<Skip> {
        let info = input.info().clone();
        let comparator = KeyComparator::for_sort(info.sort());
        let skip = Rc::new(Skip {
            input,
            n,
            state: Rc::new(RefCell::new(SkipState {
                hidden: 0,
                first: None,
            })),
            info,
            comparator,
            output: OutputSlot::new(),
        });
        let weak: Weak<Skip> = Rc::downgrade(&skip);
        skip.input.set_output(weak);
        skip
    }

    fn sort_key(&self, row: &Row) -> Vec<Value> {
        self.info.sort().sort_key(row)
    }

    /// Compares a row against the boundary. `None` when nothing is
    /// visible.
    fn against_boundary(&self, row: &Row) -> Option<Ordering> {
        let state = self.state.borrow();
        let first = state.first.as_ref()?;
        Some(
            self.comparator
                .compare(&self.sort_key(row), &self.sort_key(first.row())),
        )
    }

    fn check_keys(&self, old: &Row, new: &Row) -> Result<()> {
        let pk = self.info.schema().primary_key();
        if RowKey::extract(old, pk) != RowKey::extract(new, pk) {
            return Err(Error::primary_key_mismatch(
                self.info.schema().name(),
                RowKey::extract(old, pk),
                RowKey::extract(new, pk),
            ));
        }
        Ok(())
    }

    /// Rescans the upstream boundary: counts up to `n` hidden rows and
    /// returns the first visible node.
    fn rescan(&self) -> Result<(usize, Option<Node>)> {
        let mut stream = self.input.fetch(FetchRequest::all())?;
        let mut hidden = 0usize;
        while hidden < self.n {
            match stream.next() {
                Some(_) => hidden += 1,
                None => {
                    if let Some(err) = stream.take_error() {
                        return Err(err);
                    }
                    return Ok((hidden, None));
                }
            }
        }
        let first = stream.next();
        if let Some(err) = stream.take_error() {
            return Err(err);
        }
        Ok((hidden, first))
    }

    fn reload_boundary(&self) -> Result<()> {
        let (hidden, first) = self.rescan()?;
        let mut state = self.state.borrow_mut();
        state.hidden = hidden;
        state.first = first;
        Ok(())
    }

    fn push_add(&self, node: Node) -> Result<()> {
        match self.against_boundary(node.row()) {
            // At or past the boundary: simply visible.
            Some(Ordering::Greater) | Some(Ordering::Equal) => {
                self.output.push(Change::Add(node))
            }
            Some(Ordering::Less) => {
                // A row entered the hidden range: the old rank-(n-1) row
                // becomes visible.
                self.reload_boundary()?;
                let newly_visible = self.state.borrow().first.clone();
                match newly_visible {
                    Some(first) => self.output.push(Change::Add(first)),
                    None => Ok(()),
                }
            }
            None => {
                let hidden = self.state.borrow().hidden;
                if hidden < self.n {
                    self.state.borrow_mut().hidden = hidden + 1;
                    Ok(())
                } else {
                    // The upstream just outgrew the offset.
                    self.reload_boundary()?;
                    let first = self.state.borrow().first.clone();
                    match first {
                        Some(first) => self.output.push(Change::Add(first)),
                        None => Ok(()),
                    }
                }
            }
        }
    }

    fn push_remove(&self, node: Node) -> Result<()> {
        match self.against_boundary(node.row()) {
            Some(Ordering::Greater) => self.output.push(Change::Remove(node)),
            Some(Ordering::Equal) => {
                // The boundary row itself went away; its successor was
                // already visible.
                self.output.push(Change::Remove(node))?;
                self.reload_boundary()
            }
            Some(Ordering::Less) => {
                // A hidden row went away: the old first visible row slides
                // into the hidden range.
                let old_first = self
                    .state
                    .borrow()
                    .first
                    .clone()
                    .expect("boundary comparison implies a first visible row");
                self.reload_boundary()?;
                self.output.push(Change::Remove(old_first))
            }
            None => {
                let mut state = self.state.borrow_mut();
                state.hidden = state.hidden.saturating_sub(1);
                Ok(())
            }
        }
    }
}

impl Operator for Skip {
    fn info(&self) -> &FlowInfo {
        &self.info
    }

    fn fetch(&self, req: FetchRequest) -> Result<NodeStream> {
        if req.constraint.is_none() && req.lower.is_none() {
            // Hydration: skip `n` rows, record the boundary as we pass it.
            let state = self.state.clone();
            {
                let mut state = state.borrow_mut();
                state.hidden = 0;
                state.first = None;
            }
            let mut upstream = self.input.fetch(req)?;
            let n = self.n;
            Ok(NodeStream::new(move || loop {
                match upstream.next() {
                    None => return upstream.take_error().map(Err),
                    Some(node) => {
                        let mut state = state.borrow_mut();
                        if state.hidden < n {
                            state.hidden += 1;
                            continue;
                        }
                        if state.first.is_none() {
                            state.first = Some(node.clone());
                        }
                        return Some(Ok(node));
                    }
                }
            }))
        } else {
            // Visibility query: rows before the boundary do not exist
            // downstream.
            let state = self.state.clone();
            let comparator = self.comparator.clone();
            let sort = self.info.sort().clone();
            Ok(self.input.fetch(req)?.filtered(move |node| {
                let state = state.borrow();
                match state.first.as_ref() {
                    None => false,
                    Some(first) => {
                        comparator.compare(
                            &sort.sort_key(node.row()),
                            &sort.sort_key(first.row()),
                        ) != Ordering::Less
                    }
                }
            }))
        }
    }

    fn cleanup(&self, req: FetchRequest) -> Result<NodeStream> {
        let stream = self.input.cleanup(req)?;
        let n = self.n;
        let mut skipped = 0usize;
        Ok(stream.filtered(move |_| {
            if skipped < n {
                skipped += 1;
                false
            } else {
                true
            }
        }))
    }

    fn set_output(&self, output: Weak<dyn Output>) {
        self.output.set(output);
    }

    fn destroy(&self) {
        self.output.clear();
        let mut state = self.state.borrow_mut();
        state.first = None;
        state.hidden = 0;
        drop(state);
        self.input.destroy();
    }
}

impl Output for Skip {
    fn push(&self, change: Change) -> Result<()> {
        match change {
            Change::Add(node) => self.push_add(node),
            Change::Remove(node) => self.push_remove(node),
            Change::Edit { old, new } => {
                self.check_keys(&old, &new)?;
                let old_key = self.sort_key(&old);
                let new_key = self.sort_key(&new);
                if self.comparator.is_equal(&old_key, &new_key) {
                    match self.against_boundary(&new) {
                        Some(Ordering::Less) | None => Ok(()),
                        Some(Ordering::Equal) => {
                            // The boundary row changed in place.
                            self.state.borrow_mut().first = Some(Node::leaf(new.clone()));
                            self.output.push(Change::Edit { old, new })
                        }
                        Some(Ordering::Greater) => {
                            self.output.push(Change::Edit { old, new })
                        }
                    }
                } else {
                    self.push_remove(Node::leaf(old))?;
                    self.push_add(Node::leaf(new))
                }
            }
            Change::Child {
                row,
                relationship,
                change,
            } => match self.against_boundary(&row) {
                Some(Ordering::Greater) | Some(Ordering::Equal) => {
                    self.output.push(Change::Child {
                        row,
                        relationship,
                        change,
                    })
                }
                _ => Ok(()),
            },
        }
    }
}
