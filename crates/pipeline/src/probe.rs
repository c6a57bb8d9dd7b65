//! Test probes.
//!
//! `Probe` wraps any operator and records every call crossing it, so tests
//! can assert on the exact fetch/cleanup/push traffic of a pipeline.
//! `Sink` is a terminal output that collects pushed changes and can replay
//! them into another output. Both are used throughout the engine's own
//! tests and are exported for downstream crates' tests.

use alloc::rc::{Rc, Weak};
use alloc::vec::Vec;
use core::cell::RefCell;
use tributary_core::{
    Change, Constraint, FetchRequest, FlowInfo, NodeStream, Operator, Output, OutputSlot, Result,
};

/// One recorded call.
#[derive(Clone, Debug, PartialEq)]
pub enum ProbeEvent {
    /// A fetch crossed the probe, with its constraint if any.
    Fetch { constraint: Option<Constraint> },
    /// A cleanup crossed the probe.
    Cleanup { constraint: Option<Constraint> },
    /// A push crossed the probe; the tag is the change kind.
    Push { kind: &'static str },
    /// The probe was destroyed.
    Destroy,
}

/// Shared log of probe events.
#[derive(Clone, Default)]
pub struct ProbeLog {
    events: Rc<RefCell<Vec<ProbeEvent>>>,
}

impl ProbeLog {
    /// Creates an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of recorded events.
    pub fn events(&self) -> Vec<ProbeEvent> {
        self.events.borrow().clone()
    }

    /// Clears the log.
    pub fn clear(&self) {
        self.events.borrow_mut().clear();
    }

    fn record(&self, event: ProbeEvent) {
        self.events.borrow_mut().push(event);
    }
}

/// A transparent operator that records traffic.
pub struct Probe {
    input: Rc<dyn Operator>,
    log: ProbeLog,
    info: FlowInfo,
    output: OutputSlot,
}

impl Probe {
    /// Wraps `input`, wiring itself as its output. Returns the probe and
    /// the shared log.
    pub fn link(input: Rc<dyn Operator>) -> (Rc<Probe>, ProbeLog) {
        let log = ProbeLog::new();
        let probe = Rc::new(Probe {
            info: input.info().clone(),
            input,
            log: log.clone(),
            output: OutputSlot::new(),
        });
        let weak: Weak<Probe> = Rc::downgrade(&probe);
        probe.input.set_output(weak);
        (probe, log)
    }
}

impl Operator for Probe {
    fn info(&self) -> &FlowInfo {
        &self.info
    }

    fn fetch(&self, req: FetchRequest) -> Result<NodeStream> {
        self.log.record(ProbeEvent::Fetch {
            constraint: req.constraint.clone(),
        });
        self.input.fetch(req)
    }

    fn cleanup(&self, req: FetchRequest) -> Result<NodeStream> {
        self.log.record(ProbeEvent::Cleanup {
            constraint: req.constraint.clone(),
        });
        self.input.cleanup(req)
    }

    fn set_output(&self, output: Weak<dyn Output>) {
        self.output.set(output);
    }

    fn destroy(&self) {
        self.log.record(ProbeEvent::Destroy);
        self.output.clear();
        self.input.destroy();
    }
}

impl Output for Probe {
    fn push(&self, change: Change) -> Result<()> {
        self.log.record(ProbeEvent::Push {
            kind: change.kind(),
        });
        self.output.push(change)
    }
}

/// A terminal output that collects every pushed change.
pub struct Sink {
    changes: RefCell<Vec<Change>>,
}

impl Sink {
    /// Creates a detached sink.
    pub fn new() -> Rc<Sink> {
        Rc::new(Sink {
            changes: RefCell::new(Vec::new()),
        })
    }

    /// Creates a sink and attaches it as `op`'s output.
    pub fn attach(op: Rc<dyn Operator>) -> Rc<Sink> {
        let sink = Self::new();
        let weak: Weak<Sink> = Rc::downgrade(&sink);
        op.set_output(weak);
        sink
    }

    /// Returns a snapshot of collected changes.
    pub fn changes(&self) -> Vec<Change> {
        self.changes.borrow().clone()
    }

    /// Drains and returns the collected changes.
    pub fn take(&self) -> Vec<Change> {
        core::mem::take(&mut *self.changes.borrow_mut())
    }

    /// Replays every collected change into another output, in order.
    pub fn replay(&self, target: &dyn Output) -> Result<()> {
        for change in self.changes.borrow().iter() {
            target.push(change.clone())?;
        }
        Ok(())
    }
}

impl Output for Sink {
    fn push(&self, change: Change) -> Result<()> {
        self.changes.borrow_mut().push(change);
        Ok(())
    }
}
