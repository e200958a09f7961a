//! Frame Scheduler
//!
//! The scheduler is the context object every graph operation runs against.
//! It owns the loop clock, the frame epoch and write revision used by node
//! memoization, the queue of animation steps for the next frame, and the set
//! of nodes changed this frame.
//!
//! # Algorithm
//!
//! 1. `request_step` queues a step and arms one "next frame" callback on the
//!    host if none is armed.
//! 2. When the host fires the frame, `run_frame` takes the queue (steps
//!    queued while it runs land in the next frame), advances the clock and
//!    epoch, and runs each step once in queue order.
//! 3. `run_frame` then arms one property flush on the host.
//! 4. `flush` walks the dirty set depth-first through child edges, stopping
//!    at the first commit-capable node on each path, and commits every node
//!    of that frontier exactly once.
//!
//! All steps of a frame complete before its flush, so consumers never see a
//! half-stepped frame.
//!
//! # Threading
//!
//! Everything runs on one thread. The host is responsible for calling
//! `run_frame` and `flush` from the thread that owns the graph.

use std::cell::{Cell, RefCell};
use std::collections::HashSet;

use indexmap::IndexMap;
use tracing::{debug, error, trace};

use super::node::{Node, NodeId, NodeKind};
use crate::error::Result;
use crate::native::{NativeBridge, NativeExecutor, TracingExecutor};

/// A queued animation step.
pub type StepFn = Box<dyn FnOnce(&FrameScheduler) -> Result<()>>;

/// Platform hooks the scheduler arms when it has work.
///
/// The host must eventually call [`FrameScheduler::run_frame`] after
/// `request_frame` and [`FrameScheduler::flush`] after `request_flush`.
pub trait FrameHost {
    /// Arm a display-refresh callback.
    fn request_frame(&self);

    /// Arm an end-of-turn callback.
    fn request_flush(&self);
}

/// Host for loops driven by hand through [`FrameScheduler::tick`].
#[derive(Debug, Default, Clone, Copy)]
pub struct ManualHost;

impl FrameHost for ManualHost {
    fn request_frame(&self) {}
    fn request_flush(&self) {}
}

/// The frame scheduler coordinates stepping, invalidation, and flushing.
pub struct FrameScheduler {
    clock: Node,
    loop_ts: Cell<f64>,
    epoch: Cell<u64>,
    revision: Cell<u64>,

    pending: RefCell<Vec<StepFn>>,
    dirty: RefCell<IndexMap<NodeId, Node>>,
    frame_armed: Cell<bool>,
    flush_armed: Cell<bool>,

    interactions: Cell<usize>,

    host: Box<dyn FrameHost>,
    native: NativeBridge,
}

impl FrameScheduler {
    /// Create a scheduler with empty queues, a manual host, and an executor
    /// that only logs native ops.
    pub fn new() -> Self {
        Self {
            clock: Node::from_kind(NodeKind::Clock),
            loop_ts: Cell::new(0.0),
            epoch: Cell::new(1),
            revision: Cell::new(0),
            pending: RefCell::new(Vec::new()),
            dirty: RefCell::new(IndexMap::new()),
            frame_armed: Cell::new(false),
            flush_armed: Cell::new(false),
            interactions: Cell::new(0),
            host: Box::new(ManualHost),
            native: NativeBridge::new(Box::new(TracingExecutor)),
        }
    }

    /// Replace the platform host.
    pub fn with_host(mut self, host: impl FrameHost + 'static) -> Self {
        self.host = Box::new(host);
        self
    }

    /// Replace the native executor.
    pub fn with_executor(mut self, executor: impl NativeExecutor + 'static) -> Self {
        self.native = NativeBridge::new(Box::new(executor));
        self
    }

    /// The shared clock node.
    pub fn clock(&self) -> &Node {
        &self.clock
    }

    /// Current loop timestamp. Identical for every read within a frame.
    pub fn now(&self) -> f64 {
        self.loop_ts.get()
    }

    /// Current evaluation epoch. Advances once per frame.
    pub fn epoch(&self) -> u64 {
        self.epoch.get()
    }

    /// Start a new evaluation epoch; every memoized value becomes stale.
    pub fn invalidate(&self) {
        self.epoch.set(self.epoch.get() + 1);
    }

    /// Counter of value writes. Memos older than the latest write upstream
    /// of their node are recomputed.
    pub fn revision(&self) -> u64 {
        self.revision.get()
    }

    pub(crate) fn next_revision(&self) -> u64 {
        let revision = self.revision.get() + 1;
        self.revision.set(revision);
        revision
    }

    /// The bridge to the installed native executor.
    pub fn native(&self) -> &NativeBridge {
        &self.native
    }

    // ------------------------------------------------------------------
    // Steps
    // ------------------------------------------------------------------

    /// Queue a step for the next frame.
    pub fn request_step<F>(&self, step: F)
    where
        F: FnOnce(&FrameScheduler) -> Result<()> + 'static,
    {
        self.pending.borrow_mut().push(Box::new(step));
        self.arm_frame();
    }

    /// Number of steps waiting for the next frame.
    pub fn pending_steps(&self) -> usize {
        self.pending.borrow().len()
    }

    /// Whether a frame callback is armed.
    pub fn frame_pending(&self) -> bool {
        self.frame_armed.get()
    }

    /// Whether a flush callback is armed.
    pub fn flush_pending(&self) -> bool {
        self.flush_armed.get()
    }

    fn arm_frame(&self) {
        if !self.frame_armed.get() {
            self.frame_armed.set(true);
            self.host.request_frame();
        }
    }

    /// Run one display frame at `timestamp`.
    ///
    /// The clock never moves backwards; an earlier timestamp repeats the
    /// previous one. A failing step is logged and dropped for this frame.
    pub fn run_frame(&self, timestamp: f64) {
        self.frame_armed.set(false);
        self.loop_ts.set(timestamp.max(self.loop_ts.get()));
        self.invalidate();

        let steps = std::mem::take(&mut *self.pending.borrow_mut());
        debug!(timestamp = self.now(), steps = steps.len(), "running animation frame");

        for step in steps {
            if let Err(err) = step(self) {
                error!(error = %err, "animation step failed; dropping it for this frame");
            }
        }

        if !self.flush_armed.get() {
            self.flush_armed.set(true);
            self.host.request_flush();
        }
    }

    // ------------------------------------------------------------------
    // Dirty tracking
    // ------------------------------------------------------------------

    /// Mark a node as changed this frame. Idempotent.
    ///
    /// Arms a frame so the change reaches consumers after that frame's
    /// steps.
    pub fn mark_dirty(&self, node: &Node) {
        self.dirty
            .borrow_mut()
            .entry(node.id())
            .or_insert_with(|| node.clone());
        self.arm_frame();
    }

    /// Number of nodes marked dirty since the last flush.
    pub fn dirty_count(&self) -> usize {
        self.dirty.borrow().len()
    }

    /// Commit every commit-capable node reachable from the dirty set.
    pub fn flush(&self) {
        self.flush_armed.set(false);

        let frontier = self.take_commit_frontier();
        trace!(nodes = frontier.len(), "flushing property updates");

        for node in frontier {
            if let Err(err) = node.commit(self) {
                error!(node = %node.id(), error = %err, "commit failed");
            }
        }
    }

    /// Drain the dirty set into the minimal set of commit-capable nodes.
    fn take_commit_frontier(&self) -> Vec<Node> {
        let dirty = std::mem::take(&mut *self.dirty.borrow_mut());

        let mut frontier: IndexMap<NodeId, Node> = IndexMap::new();
        let mut visited = HashSet::new();
        let mut stack: Vec<Node> = dirty.into_values().rev().collect();

        while let Some(node) = stack.pop() {
            if !visited.insert(node.id()) {
                continue;
            }
            if node.is_committable() {
                frontier.entry(node.id()).or_insert(node);
                continue;
            }
            stack.extend(node.children().into_iter().rev());
        }

        frontier.into_values().collect()
    }

    /// Run the armed frame and then the armed flush, if any.
    ///
    /// Returns `true` if anything ran.
    pub fn tick(&self, timestamp: f64) -> bool {
        let ran_frame = self.frame_armed.get();
        if ran_frame {
            self.run_frame(timestamp);
        }
        let ran_flush = self.flush_armed.get();
        if ran_flush {
            self.flush();
        }
        ran_frame || ran_flush
    }

    // ------------------------------------------------------------------
    // Interactions
    // ------------------------------------------------------------------

    /// Number of running animations flagged as user interactions.
    pub fn interaction_count(&self) -> usize {
        self.interactions.get()
    }

    pub(crate) fn begin_interaction(&self) {
        self.interactions.set(self.interactions.get() + 1);
    }

    pub(crate) fn end_interaction(&self) {
        self.interactions.set(self.interactions.get().saturating_sub(1));
    }

    // ------------------------------------------------------------------
    // Native completion
    // ------------------------------------------------------------------

    /// Deliver a completion event from the native executor.
    pub fn native_animation_ended(&self, animation_id: crate::native::AnimationId, finished: bool) {
        self.native.animation_ended(self, animation_id, finished);
    }
}

impl Default for FrameScheduler {
    fn default() -> Self {
        Self::new()
    }
}
