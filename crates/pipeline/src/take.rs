//! Take (limit) operator.
//!
//! Maintains the first `limit` rows of the upstream ordering. The buffered
//! window doubles as the operator's scratch: its last entry is the window
//! boundary, and a removal refills by fetching exactly one upstream row
//! past that boundary. Constrained fetches from downstream (a join looking
//! up parents) are served from the window, so only visible rows join.
//!
//! Take windows parent rows; the builder places it below joins, so nodes
//! passing through here carry no relationships yet.

use alloc::rc::{Rc, Weak};
use alloc::vec::Vec;
use core::cell::RefCell;
use core::cmp::Ordering;
use tributary_core::{
    Change, Error, FetchRequest, FlowInfo, Node, NodeStream, Operator, Output, OutputSlot,
    Result, Row, RowKey, Value,
};
use tributary_index::KeyComparator;

/// A windowed limit over the upstream ordering.
pub struct Take {
    input: Rc<dyn Operator>,
    limit: usize,
    window: Rc<RefCell<Vec<Node>>>,
    info: FlowInfo,
    comparator: KeyComparator,
    output: OutputSlot,
}

impl Take {
    /// Creates a take over `input` and wires itself as its output.
    pub fn link(input: Rc<dyn Operator>, limit: usize) -> Rc<Take> {
        let info = input.info().clone();
        let comparator = KeyComparator::for_sort(info.sort());
        let take = Rc::new(Take {
            input,
            limit,
            window: Rc::new(RefCell::new(Vec::new())),
            info,
            comparator,
            output: OutputSlot::new(),
        });
        let weak: Weak<Take> = Rc::downgrade(&take);
        take.input.set_output(weak);
        take
    }

    /// Returns the current window size.
    pub fn window_len(&self) -> usize {
        self.window.borrow().len()
    }

    fn sort_key(&self, row: &Row) -> Vec<Value> {
        self.info.sort().sort_key(row)
    }

    /// Insert position of a key in the window.
    fn position(&self, key: &[Value]) -> usize {
        let window = self.window.borrow();
        window.partition_point(|n| {
            self.comparator.compare(&self.sort_key(n.row()), key) == Ordering::Less
        })
    }

    /// Window index holding exactly this key, if any.
    fn find(&self, key: &[Value]) -> Option<usize> {
        let pos = self.position(key);
        let window = self.window.borrow();
        match window.get(pos) {
            Some(node) if self.comparator.is_equal(&self.sort_key(node.row()), key) => Some(pos),
            _ => None,
        }
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

    /// Fetches one upstream row past the window boundary to refill after a
    /// removal.
    fn refill(&self) -> Result<Option<Node>> {
        let bound = self
            .window
            .borrow()
            .last()
            .map(|n| self.sort_key(n.row()));
        let req = match bound {
            Some(key) => FetchRequest::all().starting_after(key),
            None => FetchRequest::all(),
        };
        let mut stream = self.input.fetch(req)?;
        let next = stream.next();
        if let Some(err) = stream.take_error() {
            return Err(err);
        }
        Ok(next)
    }

    fn push_add(&self, node: Node) -> Result<()> {
        let key = self.sort_key(node.row());
        // A refill may already have surfaced this row (the source applies
        // a decomposed edit fully before fanning out its halves).
        if self.find(&key).is_some() {
            return Ok(());
        }
        let pos = self.position(&key);
        let mut window = self.window.borrow_mut();
        if window.len() < self.limit {
            window.insert(pos, node.clone());
            drop(window);
            self.output.push(Change::Add(node))
        } else if pos < self.limit {
            window.insert(pos, node.clone());
            let evicted = window.pop().expect("window overflow implies an entry");
            drop(window);
            self.output.push(Change::Add(node))?;
            self.output.push(Change::Remove(evicted))
        } else {
            Ok(())
        }
    }

    fn push_remove(&self, node: Node) -> Result<()> {
        let key = self.sort_key(node.row());
        let Some(pos) = self.find(&key) else {
            return Ok(());
        };
        let stored = self.window.borrow_mut().remove(pos);
        self.output.push(Change::Remove(stored))?;
        if let Some(next) = self.refill()? {
            self.window.borrow_mut().push(next.clone());
            self.output.push(Change::Add(next))?;
        }
        Ok(())
    }
}

impl Operator for Take {
    fn info(&self) -> &FlowInfo {
        &self.info
    }

    fn fetch(&self, req: FetchRequest) -> Result<NodeStream> {
        if req.constraint.is_none() && req.lower.is_none() {
            // Hydration: pull up to `limit` rows and rebuild the window.
            let window = self.window.clone();
            window.borrow_mut().clear();
            let mut upstream = Some(self.input.fetch(req)?);
            let limit = self.limit;
            let mut count = 0usize;
            Ok(NodeStream::new(move || {
                if count >= limit {
                    upstream = None;
                    return None;
                }
                let stream = upstream.as_mut()?;
                match stream.next() {
                    Some(node) => {
                        count += 1;
                        window.borrow_mut().push(node.clone());
                        Some(Ok(node))
                    }
                    None => {
                        let err = stream.take_error();
                        upstream = None;
                        err.map(Err)
                    }
                }
            }))
        } else {
            // Visibility query: only in-window rows exist downstream.
            let constraint = req.constraint;
            let lower = req.lower;
            let comparator = self.comparator.clone();
            let sort = self.info.sort().clone();
            let nodes: Vec<Node> = self
                .window
                .borrow()
                .iter()
                .filter(|node| {
                    constraint
                        .as_ref()
                        .map(|c| c.matches(node.row()))
                        .unwrap_or(true)
                })
                .filter(|node| match &lower {
                    None => true,
                    Some(bound) => {
                        let key = sort.sort_key(node.row());
                        let ord = comparator.compare(&key, &bound.key);
                        ord == Ordering::Greater || (bound.inclusive && ord == Ordering::Equal)
                    }
                })
                .cloned()
                .collect();
            Ok(NodeStream::from_nodes(nodes))
        }
    }

    fn cleanup(&self, req: FetchRequest) -> Result<NodeStream> {
        if req.constraint.is_none() && req.lower.is_none() {
            self.window.borrow_mut().clear();
            let stream = self.input.cleanup(req)?;
            let limit = self.limit;
            let mut count = 0usize;
            let mut upstream = Some(stream);
            Ok(NodeStream::new(move || {
                if count >= limit {
                    upstream = None;
                    return None;
                }
                let stream = upstream.as_mut()?;
                match stream.next() {
                    Some(node) => {
                        count += 1;
                        Some(Ok(node))
                    }
                    None => {
                        let err = stream.take_error();
                        upstream = None;
                        err.map(Err)
                    }
                }
            }))
        } else {
            self.fetch(req)
        }
    }

    fn set_output(&self, output: Weak<dyn Output>) {
        self.output.set(output);
    }

    fn destroy(&self) {
        self.output.clear();
        self.window.borrow_mut().clear();
        self.input.destroy();
    }
}

impl Output for Take {
    fn push(&self, change: Change) -> Result<()> {
        match change {
            Change::Add(node) => self.push_add(node),
            Change::Remove(node) => self.push_remove(node),
            Change::Edit { old, new } => {
                self.check_keys(&old, &new)?;
                let old_key = self.sort_key(&old);
                let new_key = self.sort_key(&new);
                if self.comparator.is_equal(&old_key, &new_key) {
                    match self.find(&old_key) {
                        Some(pos) => {
                            self.window.borrow_mut()[pos] = Node::leaf(new.clone());
                            self.output.push(Change::Edit { old, new })
                        }
                        None => Ok(()),
                    }
                } else {
                    // The sort key moved; the row may exit or enter the
                    // window, handled as two primitive steps.
                    self.push_remove(Node::leaf(old))?;
                    self.push_add(Node::leaf(new))
                }
            }
            Change::Child {
                row,
                relationship,
                change,
            } => {
                let key = self.sort_key(&row);
                if self.find(&key).is_some() {
                    self.output.push(Change::Child {
                        row,
                        relationship,
                        change,
                    })
                } else {
                    Ok(())
                }
            }
        }
    }
}
