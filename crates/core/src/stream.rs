//! Lazy node streams.
//!
//! A `NodeStream` is a single-consumer, single-pass pull iterator over
//! nodes. Operators build streams from boxed generator closures that
//! capture shared handles to upstream state; nothing is computed until the
//! consumer pulls. A consumer must either drain the stream or call
//! `cleanup` on the producing operator; abandoning a stream mid-way and
//! then pushing is an `OutOfOrder` error at the source.

use crate::error::{Error, Result};
use crate::node::Node;
use alloc::boxed::Box;
use alloc::vec::Vec;

/// Generator closure yielding nodes or a mid-stream error.
pub type NextFn = Box<dyn FnMut() -> Option<Result<Node>>>;

/// A single-pass pull stream of nodes.
pub struct NodeStream {
    next_fn: Option<NextFn>,
    error: Option<Error>,
}

impl core::fmt::Debug for NodeStream {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("NodeStream")
            .field("next_fn", &self.next_fn.as_ref().map(|_| "<closure>"))
            .field("error", &self.error)
            .finish()
    }
}

impl NodeStream {
    /// Creates a stream from a generator closure.
    pub fn new(next_fn: impl FnMut() -> Option<Result<Node>> + 'static) -> Self {
        Self {
            next_fn: Some(Box::new(next_fn)),
            error: None,
        }
    }

    /// Creates an empty stream.
    pub fn empty() -> Self {
        Self {
            next_fn: None,
            error: None,
        }
    }

    /// Creates a stream over already-materialized nodes.
    pub fn from_nodes(nodes: Vec<Node>) -> Self {
        let mut iter = nodes.into_iter();
        Self::new(move || iter.next().map(Ok))
    }

    /// Pulls every remaining node, failing if the stream erred mid-way.
    pub fn drain(mut self) -> Result<Vec<Node>> {
        let mut nodes = Vec::new();
        for node in &mut self {
            nodes.push(node);
        }
        match self.error.take() {
            Some(err) => Err(err),
            None => Ok(nodes),
        }
    }

    /// Returns the mid-stream error, if iteration stopped on one.
    pub fn take_error(&mut self) -> Option<Error> {
        self.error.take()
    }

    /// Wraps this stream, keeping only nodes the predicate accepts.
    pub fn filtered(mut self, mut predicate: impl FnMut(&Node) -> bool + 'static) -> NodeStream {
        NodeStream::new(move || loop {
            match self.pull() {
                Some(Ok(node)) => {
                    if predicate(&node) {
                        return Some(Ok(node));
                    }
                }
                other => return other,
            }
        })
    }

    /// Wraps this stream, transforming each node.
    pub fn mapped(mut self, mut f: impl FnMut(Node) -> Node + 'static) -> NodeStream {
        NodeStream::new(move || self.pull().map(|r| r.map(|n| f(n))))
    }

    /// Wraps this stream, transforming each node fallibly.
    pub fn try_mapped(mut self, mut f: impl FnMut(Node) -> Result<Node> + 'static) -> NodeStream {
        NodeStream::new(move || self.pull().map(|r| r.and_then(|n| f(n))))
    }

    /// Pulls the next item without the error-latching of `Iterator::next`.
    /// Used by wrapping streams so errors propagate outward.
    fn pull(&mut self) -> Option<Result<Node>> {
        if let Some(err) = self.error.take() {
            return Some(Err(err));
        }
        let next_fn = self.next_fn.as_mut()?;
        match next_fn() {
            Some(item) => Some(item),
            None => {
                self.next_fn = None;
                None
            }
        }
    }
}

impl Iterator for NodeStream {
    type Item = Node;

    fn next(&mut self) -> Option<Node> {
        match self.pull() {
            Some(Ok(node)) => Some(node),
            Some(Err(err)) => {
                self.error = Some(err);
                self.next_fn = None;
                None
            }
            None => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::row::Row;
    use crate::value::Value;
    use alloc::rc::Rc;
    use alloc::vec;

    fn node(v: i64) -> Node {
        Node::leaf(Rc::new(Row::new(vec![Value::Int(v)])))
    }

    #[test]
    fn test_from_nodes_drains_in_order() {
        let stream = NodeStream::from_nodes(vec![node(1), node(2), node(3)]);
        let nodes = stream.drain().unwrap();
        assert_eq!(nodes.len(), 3);
        assert_eq!(nodes[0].row().get(0), Some(&Value::Int(1)));
        assert_eq!(nodes[2].row().get(0), Some(&Value::Int(3)));
    }

    #[test]
    fn test_empty_stream() {
        assert!(NodeStream::empty().drain().unwrap().is_empty());
    }

    #[test]
    fn test_filtered() {
        let stream = NodeStream::from_nodes(vec![node(1), node(2), node(3), node(4)]);
        let even = stream
            .filtered(|n| n.row().get(0).and_then(|v| v.as_int()).unwrap_or(0) % 2 == 0)
            .drain()
            .unwrap();
        assert_eq!(even.len(), 2);
    }

    #[test]
    fn test_mid_stream_error_surfaces_in_drain() {
        let mut count = 0;
        let stream = NodeStream::new(move || {
            count += 1;
            if count <= 2 {
                Some(Ok(node(count)))
            } else {
                Some(Err(Error::abandoned("boom")))
            }
        });
        assert!(stream.drain().is_err());
    }

    #[test]
    fn test_error_propagates_through_wrappers() {
        let stream = NodeStream::new(move || Some(Err(Error::abandoned("boom"))));
        let wrapped = stream.filtered(|_| true).mapped(|n| n);
        assert!(wrapped.drain().is_err());
    }

    #[test]
    fn test_iterator_latches_error() {
        let mut yielded = false;
        let mut stream = NodeStream::new(move || {
            if !yielded {
                yielded = true;
                Some(Ok(node(1)))
            } else {
                Some(Err(Error::abandoned("late")))
            }
        });
        assert!(stream.next().is_some());
        assert!(stream.next().is_none());
        assert!(stream.take_error().is_some());
    }
}
